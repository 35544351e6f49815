//! Alert evaluation.
//!
//! Decides, for one observation, whether an alert is due and records it in
//! the dedup store when it is. A match alerts the first time its return
//! reaches the threshold, and again only when the return has climbed by at
//! least `min_return_increase` since the last alert.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::engine::store::AlertStore;
use crate::types::MatchObservation;

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

pub const DEFAULT_ALERT_TEMPLATE: &str = "Alerte : Le match **{match_name}** dépasse {threshold}% \
avec un retour de **{return_value}%** (coup d'envoi {match_datetime}, cotes {odds_display})\n";

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub return_threshold: Decimal,
    /// Returns above this are treated as data glitches. `None` = unbounded.
    pub max_return_threshold: Option<Decimal>,
    pub min_return_increase: Decimal,
    pub alert_template: String,
    /// Clock offset used to show kickoff in alert text.
    pub display_offset: FixedOffset,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            return_threshold: dec!(98.0),
            max_return_threshold: None,
            min_return_increase: dec!(0.1),
            alert_template: DEFAULT_ALERT_TEMPLATE.to_string(),
            display_offset: Utc.fix(),
        }
    }
}

/// Replace every `{key}` placeholder in `template` with its value.
/// Unknown placeholders are left as-is.
pub fn render_template(template: &str, values: &[(&str, String)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), value)
    })
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct AlertEvaluator {
    config: EvaluatorConfig,
}

impl AlertEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate one observation against the store.
    ///
    /// Returns the alert text when an alert is due, after recording
    /// `(now, return_value)` for the match. Returns `None` without touching
    /// the store otherwise.
    pub fn evaluate(
        &self,
        observation: &MatchObservation,
        store: &mut AlertStore,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let value = observation.return_value;

        if value < self.config.return_threshold {
            return None;
        }

        if let Some(max) = self.config.max_return_threshold {
            if value > max {
                warn!(
                    match_name = %observation.match_name,
                    return_value = %value,
                    max = %max,
                    "Return above sanity bound, ignoring"
                );
                return None;
            }
        }

        if let Some(previous) = store.get(&observation.match_name) {
            let required = previous.last_return_value + self.config.min_return_increase;
            if value < required {
                debug!(
                    match_name = %observation.match_name,
                    return_value = %value,
                    last = %previous.last_return_value,
                    required = %required,
                    "Already alerted, increase too small"
                );
                return None;
            }
            info!(
                match_name = %observation.match_name,
                return_value = %value,
                last = %previous.last_return_value,
                "Return increased, re-alerting"
            );
        } else {
            info!(
                match_name = %observation.match_name,
                return_value = %value,
                "Return above threshold"
            );
        }

        store.upsert(&observation.match_name, now, value);
        Some(self.render(observation))
    }

    fn render(&self, observation: &MatchObservation) -> String {
        let kickoff = observation
            .kickoff
            .with_timezone(&self.config.display_offset)
            .format("%d/%m/%Y %H:%M")
            .to_string();

        render_template(
            &self.config.alert_template,
            &[
                ("match_name", observation.match_name.clone()),
                ("threshold", self.config.return_threshold.to_string()),
                ("return_value", observation.return_value.to_string()),
                ("match_datetime", kickoff),
                ("odds_display", observation.odds_display.clone()),
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
