//! Page sessions.
//!
//! Defines the `PageSession` / `SessionFactory` traits that hide how the
//! comparison page is loaded, and the `SessionPool` that owns the single
//! live session: opened on demand, recycled after a number of successful
//! cycles or after any failed one, released on shutdown.

pub mod http;
pub mod markup;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{MatchFragment, MonitorError};

/// A live page session.
///
/// Implementors load the comparison page and return one fragment per match
/// block, in page order.
#[async_trait]
pub trait PageSession: Send {
    /// Identifier used to correlate log lines across a session's life.
    fn id(&self) -> Uuid;

    /// Load the page and read every match block.
    ///
    /// Must fail with `MonitorError::ExtractionTimeout` when the content
    /// does not show up within the configured wait.
    async fn extract(&mut self) -> Result<Vec<MatchFragment>>;

    /// Tear the session down. Called once, before the session is dropped.
    async fn close(&mut self) -> Result<()>;
}

/// Opens new page sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Holds at most one session and applies the recycle policy.
pub struct SessionPool {
    factory: Box<dyn SessionFactory>,
    current: Option<Box<dyn PageSession>>,
    uses: u32,
    recycle_after: u32,
}

impl SessionPool {
    /// `recycle_after` is clamped to at least 1.
    pub fn new(factory: Box<dyn SessionFactory>, recycle_after: u32) -> Self {
        Self {
            factory,
            current: None,
            uses: 0,
            recycle_after: recycle_after.max(1),
        }
    }

    /// Successful uses since the current session was opened.
    pub fn uses(&self) -> u32 {
        self.uses
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(|s| s.id())
    }

    /// Return the live session, opening one if there is none.
    pub async fn acquire(&mut self) -> Result<&mut Box<dyn PageSession>> {
        if self.current.is_none() {
            let session = self
                .factory
                .open()
                .await
                .context("Failed to open page session")?;
            info!(session = %session.id(), "Page session opened");
            self.current = Some(session);
        }
        self.current
            .as_mut()
            .ok_or_else(|| MonitorError::Session("page session unavailable".into()).into())
    }

    /// Count one successful cycle. Recycles the session when the count
    /// reaches the limit and returns whether it did.
    pub async fn record_use(&mut self) -> Result<bool> {
        self.uses += 1;
        if self.uses < self.recycle_after {
            return Ok(false);
        }
        info!(uses = self.uses, "Session reached its use limit, recycling");
        self.recycle().await?;
        Ok(true)
    }

    /// Close the current session (if any) and open a fresh one.
    ///
    /// The use counter is reset even when reopening fails; the next
    /// `acquire` then retries the open.
    pub async fn recycle(&mut self) -> Result<()> {
        self.close_current().await;
        self.uses = 0;
        self.acquire().await?;
        Ok(())
    }

    /// Close the current session for good.
    pub async fn release(&mut self) {
        self.close_current().await;
        self.uses = 0;
    }

    async fn close_current(&mut self) {
        if let Some(mut session) = self.current.take() {
            let id = session.id();
            match session.close().await {
                Ok(()) => info!(session = %id, "Page session closed"),
                Err(e) => warn!(session = %id, error = %e, "Page session did not close cleanly"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
