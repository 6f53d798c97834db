//! Runs one discovery end-to-end and prints the scored collection as JSON.
//!
//! Usage: `run-discovery [icp.json]`. Without a file the default ICP is used.
//! `DISCOVERY_SEED` pins the signal draws; `DISCOVERY_STEP_DELAY_MS` paces steps.

use std::env;

use rust_lead_qualifier::config::Config;
use rust_lead_qualifier::discovery::{DiscoveryEvent, DiscoveryOrchestrator, RunOutcome};
use rust_lead_qualifier::models::IcpConfig;
use rust_lead_qualifier::views::{sort_by, SortKey};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let icp = match env::args().nth(1) {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            let icp: IcpConfig = serde_json::from_str(&raw)?;
            icp.validated()
                .map_err(|e| anyhow::anyhow!("{}: {}", path, e))?
        }
        None => IcpConfig::default(),
    };

    let orchestrator =
        DiscoveryOrchestrator::new(config.step_delay(), config.event_channel_capacity);
    let mut events = orchestrator.subscribe();

    let handle = orchestrator
        .start(icp, config.lead_source())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DiscoveryEvent::Progress { percent, .. } => {
                    tracing::info!("Discovery progress: {}%", percent)
                }
                DiscoveryEvent::PartialResults { leads, .. } => {
                    tracing::info!("Partial results: {} leads", leads.len())
                }
                DiscoveryEvent::FinalResults { .. }
                | DiscoveryEvent::Cancelled { .. }
                | DiscoveryEvent::Failed { .. } => break,
            }
        }
    });

    let outcome = handle.wait().await.map_err(|e| anyhow::anyhow!(e))?;
    progress.await?;

    match outcome {
        RunOutcome::Completed { leads, stats } => {
            let output = serde_json::json!({
                "stats": stats,
                "leads": sort_by(&leads, Some(SortKey::Score)),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        RunOutcome::Cancelled { last_percent } => {
            anyhow::bail!("discovery cancelled at {:?}%", last_percent)
        }
        RunOutcome::Failed(e) => Err(anyhow::anyhow!(e)),
    }
}
