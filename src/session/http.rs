//! HTTP page session.
//!
//! Loads the comparison page with a dedicated `reqwest` client per session.
//! The whole load is bounded by the configured wait; a page that comes back
//! without the return marker is treated the same as one that timed out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::markup::{self, PageMarkers};
use super::{PageSession, SessionFactory};
use crate::types::{MatchFragment, MonitorError};

const DEFAULT_USER_AGENT: &str = concat!("oddswatch/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct HttpSessionFactory {
    page_url: String,
    load_timeout: Duration,
    user_agent: String,
    markers: PageMarkers,
}

impl HttpSessionFactory {
    pub fn new(
        page_url: impl Into<String>,
        load_timeout_ms: u64,
        user_agent: Option<String>,
        markers: PageMarkers,
    ) -> Self {
        Self {
            page_url: page_url.into(),
            load_timeout: Duration::from_millis(load_timeout_ms),
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            markers,
        }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let http = Client::builder()
            .timeout(self.load_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .context("Failed to build page HTTP client")?;

        Ok(Box::new(HttpPageSession {
            id: Uuid::new_v4(),
            http,
            page_url: self.page_url.clone(),
            load_timeout: self.load_timeout,
            markers: self.markers.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct HttpPageSession {
    id: Uuid,
    http: Client,
    page_url: String,
    load_timeout: Duration,
    markers: PageMarkers,
}

impl HttpPageSession {
    fn timeout_error(&self) -> anyhow::Error {
        MonitorError::ExtractionTimeout {
            timeout_ms: self.load_timeout.as_millis() as u64,
        }
        .into()
    }

    async fn load_body(&self) -> Result<String> {
        let response = match self.http.get(&self.page_url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(self.timeout_error()),
            Err(e) => return Err(e).context("Failed to load comparison page"),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Session(format!("comparison page returned {status}")).into());
        }

        match response.text().await {
            Ok(body) => Ok(body),
            Err(e) if e.is_timeout() => Err(self.timeout_error()),
            Err(e) => Err(e).context("Failed to read comparison page body"),
        }
    }
}

#[async_trait]
impl PageSession for HttpPageSession {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn extract(&mut self) -> Result<Vec<MatchFragment>> {
        let body = self.load_body().await?;

        if !markup::is_loaded(&body, &self.markers) {
            return Err(self.timeout_error());
        }

        let fragments = markup::extract_fragments(&body, &self.markers);
        debug!(
            session = %self.id,
            bytes = body.len(),
            fragments = fragments.len(),
            "Comparison page read"
        );
        Ok(fragments)
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the client tears down its connection pool.
        debug!(session = %self.id, "Closing HTTP page session");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
