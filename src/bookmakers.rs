//! Bookmaker registry and exclusion filter.
//!
//! Some odds sources publish promotional or stale prices that inflate the
//! computed return. Observations carrying one of those sources are dropped
//! before they reach the alert evaluator.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::types::{MatchObservation, MonitorError};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Static bookmaker id → display name lookup.
#[derive(Debug, Clone, Default)]
pub struct BookmakerRegistry {
    names: HashMap<u32, String>,
}

impl BookmakerRegistry {
    pub fn new(names: HashMap<u32, String>) -> Self {
        Self { names }
    }

    /// Build from the config table, whose keys are numeric ids as strings.
    pub fn from_table(table: &HashMap<String, String>) -> Result<Self> {
        let mut names = HashMap::with_capacity(table.len());
        for (key, name) in table {
            let id: u32 = key.trim().parse().map_err(|_| {
                MonitorError::Config(format!("Bookmaker id is not numeric: {key:?}"))
            })?;
            names.insert(id, name.trim().to_string());
        }
        Ok(Self { names })
    }

    /// Resolve a marker id to its name. Unknown or non-numeric ids
    /// resolve to nothing.
    pub fn resolve(&self, id: &str) -> Option<&str> {
        let id: u32 = id.trim().parse().ok()?;
        self.names.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Drops observations that any excluded bookmaker contributed to.
///
/// Names are compared case-insensitively after trimming.
#[derive(Debug, Clone)]
pub struct BookmakerFilter {
    registry: BookmakerRegistry,
    excluded: HashSet<String>,
}

impl BookmakerFilter {
    pub fn new(registry: BookmakerRegistry, excluded: &[String]) -> Self {
        let excluded = excluded
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self { registry, excluded }
    }

    pub fn registry(&self) -> &BookmakerRegistry {
        &self.registry
    }

    /// The first excluded bookmaker name found on the observation, if any.
    pub fn excluded_by(&self, observation: &MatchObservation) -> Option<&str> {
        if self.excluded.is_empty() {
            return None;
        }
        observation
            .bookmaker_ids
            .iter()
            .filter_map(|id| self.registry.resolve(id))
            .find(|name| self.excluded.contains(&name.to_lowercase()))
    }

    /// `true` to keep the observation, `false` to drop it.
    pub fn keep(&self, observation: &MatchObservation) -> bool {
        match self.excluded_by(observation) {
            Some(name) => {
                debug!(
                    match_name = %observation.match_name,
                    bookmaker = name,
                    "Observation excluded by bookmaker"
                );
                false
            }
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
