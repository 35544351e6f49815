//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The webhook URL is a secret, referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::engine::evaluator::DEFAULT_ALERT_TEMPLATE;
use crate::session::markup::PageMarkers;
use crate::types::MonitorError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub bookmakers: BookmakersConfig,
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub page: PageMarkers,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub name: String,
    pub page_url: String,
    pub check_interval_minutes: u64,
    pub js_load_timeout_ms: u64,
    pub expiration_hours: u64,
    pub session_restart_iterations: u32,
    /// Offset of the page's clock from UTC, used to read kickoff times.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_utc_offset_hours() -> i32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    pub return_threshold: Decimal,
    /// Upper sanity bound; absent means unbounded.
    #[serde(default)]
    pub max_return_threshold: Option<Decimal>,
    pub min_return_increase: Decimal,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BookmakersConfig {
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Numeric id (as a string key) → display name.
    #[serde(default)]
    pub names: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    pub webhook_url_env: String,
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<u16>,
    #[serde(default = "default_notifier_timeout_secs")]
    pub timeout_secs: u64,
    /// Longest message the channel accepts (Discord: 2000).
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

fn default_success_codes() -> Vec<u16> {
    vec![200, 204]
}

fn default_notifier_timeout_secs() -> u64 {
    15
}

fn default_max_message_chars() -> usize {
    2000
}

/// Message templates with `{placeholder}` slots.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MessagesConfig {
    /// `match_name`, `threshold`, `return_value`, `match_datetime`, `odds_display`
    pub alert: String,
    /// `page_url`; appended once to every dispatched batch.
    pub footer: String,
    /// `message`
    pub delivered: String,
    /// `status_code`
    pub delivery_error: String,
    /// `minutes`
    pub timeout: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            alert: DEFAULT_ALERT_TEMPLATE.to_string(),
            footer: "\nVoir sur : {page_url}".to_string(),
            delivered: "Message envoyé sur Discord:\n{message}".to_string(),
            delivery_error: "Erreur lors de l'envoi du message sur Discord: {status_code}"
                .to_string(),
            timeout: "Données JavaScript non chargées dans le délai imparti. \
                      Nouvelle tentative dans {minutes} minutes."
                .to_string(),
        }
    }
}

impl MonitorConfig {
    /// The page's clock offset.
    pub fn page_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            MonitorError::Config(format!("Invalid utc_offset_hours: {}", self.utc_offset_hours))
                .into()
        })
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(MonitorError::Config(msg).into()) };

        let m = &self.monitor;
        if m.page_url.trim().is_empty() {
            return invalid("monitor.page_url is empty".into());
        }
        if m.check_interval_minutes == 0 {
            return invalid("monitor.check_interval_minutes must be > 0".into());
        }
        if m.js_load_timeout_ms == 0 {
            return invalid("monitor.js_load_timeout_ms must be > 0".into());
        }
        if m.expiration_hours == 0 {
            return invalid("monitor.expiration_hours must be > 0".into());
        }
        if m.session_restart_iterations == 0 {
            return invalid("monitor.session_restart_iterations must be > 0".into());
        }
        m.page_offset()?;

        let a = &self.alerts;
        if a.return_threshold <= Decimal::ZERO {
            return invalid("alerts.return_threshold must be > 0".into());
        }
        if a.min_return_increase < Decimal::ZERO {
            return invalid("alerts.min_return_increase must be >= 0".into());
        }
        if let Some(max) = a.max_return_threshold {
            if max < a.return_threshold {
                return invalid(format!(
                    "alerts.max_return_threshold ({max}) is below return_threshold ({})",
                    a.return_threshold
                ));
            }
        }

        if self.notifier.max_message_chars == 0 {
            return invalid("notifier.max_message_chars must be > 0".into());
        }
        if self.notifier.success_codes.is_empty() {
            return invalid("notifier.success_codes is empty".into());
        }
        if self.page.bookmaker_prefix.is_empty() {
            return invalid("page.bookmaker_prefix is empty".into());
        }

        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
