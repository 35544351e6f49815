//! ODDSWATCH: odds comparison monitor.
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the page session, alert pipeline and Discord notifier together, and runs
//! the monitoring loop until Ctrl+C.

use anyhow::{Context, Result};
use secrecy::Secret;
use std::time::Duration;
use tracing::info;

use oddswatch::config::{self, AppConfig};
use oddswatch::engine::controller::{ControllerSettings, SessionController};
use oddswatch::engine::pipeline::AlertPipeline;
use oddswatch::notify::discord::DiscordNotifier;
use oddswatch::session::http::HttpSessionFactory;
use oddswatch::session::SessionPool;

const BANNER: &str = r#"
   ___  ___  ___  ___ __      __ _  _____  ___  _  _
  / _ \|   \|   \/ __|\ \    / //_\|_   _|/ __|| || |
 | (_) | |) | |) \__ \ \ \/\/ // _ \ | | | (__ | __ |
  \___/|___/|___/|___/  \_/\_//_/ \_\|_|  \___||_||_|

  Odds comparison monitor
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("ODDSWATCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        monitor = %cfg.monitor.name,
        page_url = %cfg.monitor.page_url,
        interval_mins = cfg.monitor.check_interval_minutes,
        return_threshold = %cfg.alerts.return_threshold,
        restart_after = cfg.monitor.session_restart_iterations,
        "ODDSWATCH starting up"
    );

    // -- Initialise components -------------------------------------------

    let notifier = build_notifier(&cfg)?;

    let factory = HttpSessionFactory::new(
        cfg.monitor.page_url.clone(),
        cfg.monitor.js_load_timeout_ms,
        cfg.monitor.user_agent.clone(),
        cfg.page.clone(),
    );
    let pool = SessionPool::new(Box::new(factory), cfg.monitor.session_restart_iterations);

    let pipeline = AlertPipeline::from_config(&cfg)?;
    info!(
        bookmakers = pipeline.filter().registry().len(),
        excluded = ?cfg.bookmakers.excluded,
        "Alert pipeline ready"
    );

    let mut controller = SessionController::start(
        pool,
        pipeline,
        Box::new(notifier),
        ControllerSettings::from_config(&cfg),
    )
    .await?;

    // -- Main loop -------------------------------------------------------

    controller.run(tokio::signal::ctrl_c()).await?;

    info!(
        cycles = controller.cycle_count(),
        tracked = controller.pipeline().store().len(),
        state = %controller.state(),
        "ODDSWATCH shut down cleanly."
    );

    Ok(())
}

/// Resolve the webhook secret and build the Discord notifier.
fn build_notifier(cfg: &AppConfig) -> Result<DiscordNotifier> {
    let webhook_url = AppConfig::resolve_env(&cfg.notifier.webhook_url_env)
        .context("Discord webhook URL is required")?;

    DiscordNotifier::new(
        Secret::new(webhook_url),
        cfg.notifier.success_codes.clone(),
        Duration::from_secs(cfg.notifier.timeout_secs),
    )
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oddswatch=info"));

    let json_logging = std::env::var("ODDSWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
