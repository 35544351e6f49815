//! Session lifecycle controller.
//!
//! Drives the fixed-interval loop: one extract → filter → evaluate →
//! dispatch cycle per interval, never overlapping. A failed cycle tears the
//! page session down and opens a new one; a successful one runs store
//! expiry and counts toward the proactive recycle limit.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::engine::evaluator::render_template;
use crate::engine::pipeline::AlertPipeline;
use crate::notify::Notifier;
use crate::session::SessionPool;
use crate::types::{CycleReport, Delivery, LogLevel, MonitorError, SessionState};

/// Loop timing and operator-facing message templates.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub check_interval_minutes: u64,
    /// Template with `{message}`.
    pub delivered_message: String,
    /// Template with `{status_code}`.
    pub delivery_error_message: String,
    /// Template with `{minutes}`.
    pub timeout_message: String,
}

impl ControllerSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            check_interval_minutes: cfg.monitor.check_interval_minutes,
            delivered_message: cfg.messages.delivered.clone(),
            delivery_error_message: cfg.messages.delivery_error.clone(),
            timeout_message: cfg.messages.timeout.clone(),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes * 60)
    }
}

pub struct SessionController {
    pool: SessionPool,
    pipeline: AlertPipeline,
    notifier: Box<dyn Notifier>,
    settings: ControllerSettings,
    state: SessionState,
    cycle_count: u64,
}

impl SessionController {
    /// Acquire the first session and enter `Running`.
    ///
    /// Failing to open the initial session is the one unrecoverable error.
    pub async fn start(
        mut pool: SessionPool,
        pipeline: AlertPipeline,
        notifier: Box<dyn Notifier>,
        settings: ControllerSettings,
    ) -> Result<Self> {
        pool.acquire()
            .await
            .context("Unable to acquire the initial page session")?;

        Ok(Self {
            pool,
            pipeline,
            notifier,
            settings,
            state: SessionState::Running,
            cycle_count: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Successful cycles since the current session was opened.
    pub fn iterations(&self) -> u32 {
        self.pool.uses()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn pipeline(&self) -> &AlertPipeline {
        &self.pipeline
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Run one cycle and apply the lifecycle transitions.
    ///
    /// Returns the cycle report on success, `None` when the cycle failed
    /// (the failure is logged and the session recreated).
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Option<CycleReport> {
        self.cycle_count += 1;

        match self.run_cycle(now).await {
            Ok(mut report) => {
                report.expired = self.pipeline.expire(now);
                match self.pool.record_use().await {
                    Ok(recycled) => {
                        report.session_recycled = recycled;
                        self.state = SessionState::Running;
                    }
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "Scheduled session recycle failed");
                        self.state = SessionState::Restarting;
                    }
                }
                log_cycle_report(&report);
                Some(report)
            }
            Err(e) => {
                self.recover(&e).await;
                None
            }
        }
    }

    /// One extract → filter → evaluate → dispatch pass.
    async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        info!(cycle = self.cycle_count, "Starting cycle");

        let session = self.pool.acquire().await?;
        let fragments = session.extract().await?;

        let batch = self.pipeline.process(&fragments, now);
        let delivery = match self.pipeline.message(&batch) {
            Some(message) => Some(self.dispatch(&message).await),
            None => None,
        };

        Ok(CycleReport {
            cycle_number: self.cycle_count,
            timestamp: now,
            fragments_seen: batch.fragments_seen,
            skipped: batch.skipped,
            excluded: batch.excluded,
            alerts: batch.alerts.len(),
            expired: 0,
            delivery,
            session_recycled: false,
        })
    }

    /// Send the batch. The store is never rolled back, whatever the outcome.
    async fn dispatch(&self, message: &str) -> Delivery {
        let delivery = match self.notifier.send(message).await {
            Ok(d) => d,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Notifier failed");
                Delivery::transport_failure()
            }
        };

        if delivery.delivered {
            LogLevel::Info.emit(&render_template(
                &self.settings.delivered_message,
                &[("message", message.to_string())],
            ));
        } else {
            let status = delivery
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string());
            LogLevel::Error.emit(&render_template(
                &self.settings.delivery_error_message,
                &[("status_code", status)],
            ));
        }
        delivery
    }

    /// Log the failure and recreate the page session.
    async fn recover(&mut self, err: &anyhow::Error) {
        match err.downcast_ref::<MonitorError>() {
            Some(MonitorError::ExtractionTimeout { timeout_ms }) => {
                warn!(timeout_ms, "Page load timed out");
                LogLevel::Warn.emit(&render_template(
                    &self.settings.timeout_message,
                    &[("minutes", self.settings.check_interval_minutes.to_string())],
                ));
            }
            _ => error!(error = %format!("{err:#}"), cycle = self.cycle_count, "Cycle failed"),
        }

        self.state = SessionState::Restarting;
        match self.pool.recycle().await {
            Ok(()) => {
                info!(session = ?self.pool.session_id(), "Page session recreated");
                self.state = SessionState::Running;
            }
            Err(e) => {
                error!(
                    error = %format!("{e:#}"),
                    "Session recreation failed; retrying on next cycle"
                );
            }
        }
    }

    /// Loop forever: tick, then sleep for the check interval.
    ///
    /// `shutdown` is only observed while sleeping, so a running cycle
    /// always completes. On shutdown the session is released and the
    /// controller enters `Stopped`.
    pub async fn run<S: Future>(&mut self, shutdown: S) -> Result<()> {
        tokio::pin!(shutdown);
        let interval = self.settings.check_interval();

        info!(
            interval_mins = self.settings.check_interval_minutes,
            "Entering main loop. Press Ctrl+C to stop."
        );

        loop {
            self.tick(Utc::now()).await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received.");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Release the session and stop.
    pub async fn shutdown(&mut self) {
        self.pool.release().await;
        self.state = SessionState::Stopped;
    }
}

/// Log a structured cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle_number,
        fragments = report.fragments_seen,
        skipped = report.skipped,
        excluded = report.excluded,
        alerts = report.alerts,
        expired = report.expired,
        delivery = ?report.delivery,
        recycled = report.session_recycled,
        "Cycle complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
