//! Daily education news digest, one run per invocation.
//! Scheduling is external (cron / CI); the process exits when the run is done.

use anyhow::{Context, Result};
use ntpc_news_digest::{unix_now, BotConfig, DigestEngine, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ntpc_news_digest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env in local runs; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = BotConfig::load_default().context("loading bot config")?;
    let secrets = Secrets::from_env().context("loading secrets")?;
    tracing::info!(?secrets, "secrets loaded");

    let engine = DigestEngine::from_config(cfg, &secrets);
    let report = engine.run_once(unix_now()).await;

    match serde_json::to_string(&report) {
        Ok(line) => tracing::info!(report = %line, "run report"),
        Err(e) => tracing::debug!(error = %e, "run report not serializable"),
    }
    Ok(())
}
