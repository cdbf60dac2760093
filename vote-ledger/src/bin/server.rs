//! Vote ledger daemon
//!
//! Usage: `vote-ledger [config.toml]`. Without a path the configuration is
//! read from `VOTE_LEDGER_*` environment variables.

use anyhow::Context;
use vote_ledger::{CampaignFilter, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting vote ledger"
    );

    // Open ledger
    let repair_on_startup = config.repair_on_startup;
    let ledger = Ledger::open(config).await.context("opening ledger")?;

    if repair_on_startup {
        let report = ledger.reconcile().await.context("tally repair")?;
        if report.votes_restored > 0 || report.orphan_receipts > 0 {
            tracing::warn!(
                restored = report.votes_restored,
                orphans = report.orphan_receipts,
                "Startup repair changed or flagged tallies"
            );
        }
    }

    let stats = ledger.stats()?;
    let now = chrono::Utc::now().timestamp();
    let active = ledger
        .list_campaigns(CampaignFilter::all().active(), now)?
        .filter(Result::is_ok)
        .count();
    tracing::info!(
        campaigns = stats.total_campaigns,
        receipts = stats.total_receipts,
        active,
        "Ledger ready"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down vote ledger");
    match ledger.metrics().encode() {
        Ok(text) => tracing::info!(metrics = %text, "Final metrics"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
    }
    ledger.shutdown().await?;

    Ok(())
}
