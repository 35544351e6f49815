//! Shared types for the ODDSWATCH monitor.
//!
//! These types form the data model used across all modules: the raw
//! fragments pulled off the comparison page, the normalized per-cycle
//! observations, the dedup entries, and the cycle bookkeeping.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Page fragments and observations
// ---------------------------------------------------------------------------

/// Raw text read from one match block of the comparison page.
///
/// Nothing here is parsed yet; `parse::normalize` turns it into a
/// `MatchObservation` or rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFragment {
    /// Team names in page order (home first).
    pub teams: Vec<String>,
    /// Localized return percentage, e.g. `"98,5 %"`.
    pub return_text: Option<String>,
    /// Day and month, e.g. `"15/10"`.
    pub date_text: Option<String>,
    /// Hour and minute, e.g. `"20:45"`.
    pub time_text: Option<String>,
    /// Best odds per outcome, as displayed.
    pub odds: Vec<String>,
    /// Class tokens carrying the contributing bookmaker markers.
    pub bookmaker_class: Option<String>,
}

/// One match as observed during a single cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchObservation {
    /// Canonical "TeamA vs TeamB" identity, stable across cycles.
    pub match_name: String,
    pub kickoff: DateTime<Utc>,
    /// Return percentage (98.5 means 98.5%).
    pub return_value: Decimal,
    pub odds_display: String,
    pub bookmaker_ids: BTreeSet<String>,
}

impl fmt::Display for MatchObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}%, kickoff {}, {} bookmakers)",
            self.match_name,
            self.return_value,
            self.kickoff.format("%Y-%m-%d %H:%M UTC"),
            self.bookmaker_ids.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Dedup state
// ---------------------------------------------------------------------------

/// Last alert emitted for a match. Owned by `engine::store::AlertStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub last_alert_time: DateTime<Utc>,
    pub last_return_value: Decimal,
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Outcome of one webhook dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    /// HTTP status, or `None` when the request never got a response.
    pub status_code: Option<u16>,
}

impl Delivery {
    /// Classify a response status against the accepted codes.
    pub fn from_status(status: u16, accepted: &[u16]) -> Self {
        Self {
            delivered: accepted.contains(&status),
            status_code: Some(status),
        }
    }

    pub fn transport_failure() -> Self {
        Self {
            delivered: false,
            status_code: None,
        }
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.delivered, self.status_code) {
            (true, Some(code)) => write!(f, "delivered ({code})"),
            (false, Some(code)) => write!(f, "rejected ({code})"),
            (_, None) => write!(f, "no response"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    /// The last cycle failed and the page session is being (or could not
    /// yet be) recreated.
    Restarting,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Running => write!(f, "RUNNING"),
            SessionState::Restarting => write!(f, "RESTARTING"),
            SessionState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Summary of one successful extract → filter → evaluate → dispatch cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub timestamp: DateTime<Utc>,
    pub fragments_seen: usize,
    /// Fragments rejected during normalization (parse errors, past kickoff).
    pub skipped: usize,
    /// Observations dropped by the bookmaker filter.
    pub excluded: usize,
    pub alerts: usize,
    pub expired: usize,
    /// `None` when nothing qualified and no dispatch was made.
    pub delivery: Option<Delivery>,
    pub session_recycled: bool,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delivery = self
            .delivery
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "Cycle #{}: fragments={} skipped={} excluded={} alerts={} expired={} delivery={}",
            self.cycle_number,
            self.fragments_seen,
            self.skipped,
            self.excluded,
            self.alerts,
            self.expired,
            delivery,
        )
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Level for operator-facing messages rendered from configured templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Route a rendered message to the matching `tracing` level.
    pub fn emit(self, message: &str) {
        match self {
            LogLevel::Debug => debug!(target: "oddswatch::messages", "{message}"),
            LogLevel::Info => info!(target: "oddswatch::messages", "{message}"),
            LogLevel::Warn => warn!(target: "oddswatch::messages", "{message}"),
            LogLevel::Error => error!(target: "oddswatch::messages", "{message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ODDSWATCH.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Page content not loaded within {timeout_ms} ms")]
    ExtractionTimeout { timeout_ms: u64 },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Cannot parse {field}: {value:?}")]
    Parse { field: String, value: String },

    #[error("Kickoff already passed for {match_name}")]
    KickoffPassed { match_name: String },

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
