//! Mock page session and notifier for integration testing.
//!
//! The session factory replays a queue of scripted page loads shared by
//! every session it opens, so a test can line up what each cycle sees
//! regardless of how many times the controller recreates the session.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use oddswatch::notify::Notifier;
use oddswatch::session::{PageSession, SessionFactory};
use oddswatch::types::{Delivery, MatchFragment, MonitorError};

/// Outcome of one scripted page load.
#[derive(Debug, Clone)]
pub enum PageLoad {
    Matches(Vec<MatchFragment>),
    Timeout,
    Crash(String),
}

#[derive(Default)]
struct FactoryState {
    script: VecDeque<PageLoad>,
    opened: u32,
    closed: u32,
    /// If set, `open` fails with this error.
    force_error: Option<String>,
}

/// A session factory whose sessions replay a shared script.
#[derive(Clone, Default)]
pub struct MockSessionFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockSessionFactory {
    pub fn new(script: Vec<PageLoad>) -> Self {
        let factory = Self::default();
        factory.state.lock().unwrap().script = script.into();
        factory
    }

    pub fn set_error(&self, msg: &str) {
        self.state.lock().unwrap().force_error = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        self.state.lock().unwrap().force_error = None;
    }

    pub fn opened(&self) -> u32 {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> u32 {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.force_error {
            return Err(anyhow!("{msg}"));
        }
        state.opened += 1;
        Ok(Box::new(MockSession {
            id: Uuid::new_v4(),
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    id: Uuid,
    state: Arc<Mutex<FactoryState>>,
}

#[async_trait]
impl PageSession for MockSession {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn extract(&mut self) -> Result<Vec<MatchFragment>> {
        let next = self.state.lock().unwrap().script.pop_front();
        match next {
            Some(PageLoad::Matches(fragments)) => Ok(fragments),
            Some(PageLoad::Timeout) => {
                Err(MonitorError::ExtractionTimeout { timeout_ms: 20000 }.into())
            }
            Some(PageLoad::Crash(msg)) => Err(anyhow!("{msg}")),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Records every message and answers with a fixed status code.
#[derive(Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    status: Arc<Mutex<u16>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(204)),
        }
    }

    pub fn set_status(&self, status: u16) {
        *self.status.lock().unwrap() = status;
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<Delivery> {
        self.sent.lock().unwrap().push(text.to_string());
        let status = *self.status.lock().unwrap();
        Ok(Delivery::from_status(status, &[200, 204]))
    }
}

// ---------------------------------------------------------------------------
// Fragment builders
// ---------------------------------------------------------------------------

/// A match block kicking off on 17/10 at 21:00 page time.
pub fn fragment(home: &str, away: &str, return_text: &str) -> MatchFragment {
    MatchFragment {
        teams: vec![home.to_string(), away.to_string()],
        return_text: Some(return_text.to_string()),
        date_text: Some("Ven. 17/10".to_string()),
        time_text: Some("21:00".to_string()),
        odds: vec!["2,10".into(), "3,40".into(), "3,60".into()],
        bookmaker_class: Some("bookmaker-1 bookmaker-3".to_string()),
    }
}

pub fn with_bookmakers(mut fragment: MatchFragment, class: &str) -> MatchFragment {
    fragment.bookmaker_class = Some(class.to_string());
    fragment
}
