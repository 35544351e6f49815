//! Per-cycle alert pipeline.
//!
//! normalize → bookmaker filter → evaluate against the dedup store →
//! batch. Owns the store, so one pipeline instance carries the dedup state
//! for the life of the process.

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{debug, warn};

use crate::bookmakers::{BookmakerFilter, BookmakerRegistry};
use crate::config::AppConfig;
use crate::engine::evaluator::{render_template, AlertEvaluator, EvaluatorConfig};
use crate::engine::store::AlertStore;
use crate::parse;
use crate::types::{MatchFragment, MonitorError};

/// Settings the pipeline needs besides the filter and evaluator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// The page's clock offset, for reading kickoff strings.
    pub page_offset: FixedOffset,
    pub bookmaker_prefix: String,
    pub expiration: Duration,
    /// Appended once to every non-empty batch.
    pub footer: String,
    /// Longest message the notifier accepts, footer included.
    pub max_message_chars: usize,
}

/// One alert decided this cycle.
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub match_name: String,
    pub text: String,
}

/// Everything one cycle produced, before dispatch.
#[derive(Debug, Clone, Default)]
pub struct CycleBatch {
    pub fragments_seen: usize,
    pub skipped: usize,
    pub excluded: usize,
    pub alerts: Vec<PendingAlert>,
}

impl CycleBatch {
    /// Alert texts concatenated in page order, followed by `footer`, keeping
    /// whole alerts within `max_chars`. The first alert is always kept.
    /// `None` when nothing qualified.
    pub fn message(&self, footer: &str, max_chars: usize) -> Option<String> {
        let (first, rest) = self.alerts.split_first()?;

        let budget = max_chars.saturating_sub(footer.chars().count());
        let mut message = first.text.clone();
        let mut used = first.text.chars().count();
        let mut dropped = Vec::new();

        for alert in rest {
            let len = alert.text.chars().count();
            if used + len <= budget {
                message.push_str(&alert.text);
                used += len;
            } else {
                dropped.push(alert.match_name.as_str());
            }
        }

        if !dropped.is_empty() {
            warn!(
                dropped = ?dropped,
                max_chars,
                "Alert batch over the message limit, alerts left out"
            );
        }

        message.push_str(footer);
        Some(message)
    }
}

pub struct AlertPipeline {
    filter: BookmakerFilter,
    evaluator: AlertEvaluator,
    store: AlertStore,
    settings: PipelineSettings,
}

impl AlertPipeline {
    pub fn new(
        filter: BookmakerFilter,
        evaluator: AlertEvaluator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            filter,
            evaluator,
            store: AlertStore::new(),
            settings,
        }
    }

    /// Build the pipeline from loaded configuration.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let page_offset = cfg.monitor.page_offset()?;
        let registry = BookmakerRegistry::from_table(&cfg.bookmakers.names)?;
        let filter = BookmakerFilter::new(registry, &cfg.bookmakers.excluded);

        let evaluator = AlertEvaluator::new(EvaluatorConfig {
            return_threshold: cfg.alerts.return_threshold,
            max_return_threshold: cfg.alerts.max_return_threshold,
            min_return_increase: cfg.alerts.min_return_increase,
            alert_template: cfg.messages.alert.clone(),
            display_offset: page_offset,
        });

        let footer = render_template(
            &cfg.messages.footer,
            &[("page_url", cfg.monitor.page_url.clone())],
        );

        Ok(Self::new(
            filter,
            evaluator,
            PipelineSettings {
                page_offset,
                bookmaker_prefix: cfg.page.bookmaker_prefix.clone(),
                expiration: Duration::hours(cfg.monitor.expiration_hours as i64),
                footer,
                max_message_chars: cfg.notifier.max_message_chars,
            },
        ))
    }

    pub fn filter(&self) -> &BookmakerFilter {
        &self.filter
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every fragment of one cycle through the pipeline.
    pub fn process(&mut self, fragments: &[MatchFragment], now: DateTime<Utc>) -> CycleBatch {
        let mut batch = CycleBatch {
            fragments_seen: fragments.len(),
            ..CycleBatch::default()
        };

        for fragment in fragments {
            let observation = match parse::normalize(
                fragment,
                now,
                self.settings.page_offset,
                &self.settings.bookmaker_prefix,
            ) {
                Ok(obs) => obs,
                Err(MonitorError::KickoffPassed { match_name }) => {
                    debug!(match_name = %match_name, "Kickoff passed, skipping");
                    batch.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, teams = ?fragment.teams, "Skipping unreadable match");
                    batch.skipped += 1;
                    continue;
                }
            };

            if !self.filter.keep(&observation) {
                batch.excluded += 1;
                continue;
            }

            if let Some(text) = self.evaluator.evaluate(&observation, &mut self.store, now) {
                batch.alerts.push(PendingAlert {
                    match_name: observation.match_name,
                    text,
                });
            }
        }

        batch
    }

    /// Batched message for `batch`, with the configured footer.
    pub fn message(&self, batch: &CycleBatch) -> Option<String> {
        batch.message(&self.settings.footer, self.settings.max_message_chars)
    }

    /// Forget matches whose last alert is older than the expiration window.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        self.store.expire(now, self.settings.expiration)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
