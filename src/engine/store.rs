//! Dedup/expiry store.
//!
//! Remembers, per match, when it was last alerted and at what return, so
//! the evaluator can suppress repeats. Entries are forgotten once they go
//! longer than the expiration window without a fresh alert. State lives in
//! memory only and is reset on restart.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::types::AlertState;

#[derive(Debug, Default)]
pub struct AlertStore {
    entries: HashMap<String, AlertState>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, match_name: &str) -> Option<AlertState> {
        self.entries.get(match_name).copied()
    }

    /// Insert or overwrite the entry for `match_name`.
    pub fn upsert(&mut self, match_name: &str, time: DateTime<Utc>, value: Decimal) {
        self.entries.insert(
            match_name.to_string(),
            AlertState {
                last_alert_time: time,
                last_return_value: value,
            },
        );
    }

    /// Remove every entry with `now - last_alert_time > window`.
    /// Returns the number of entries removed.
    pub fn expire(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|match_name, state| {
            let keep = now - state.last_alert_time <= window;
            if !keep {
                debug!(
                    match_name = %match_name,
                    last_alert = %state.last_alert_time,
                    "Alert entry expired"
                );
            }
            keep
        });
        before - self.entries.len()
    }

    pub fn contains(&self, match_name: &str) -> bool {
        self.entries.contains_key(match_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
