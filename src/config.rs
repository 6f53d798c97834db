use serde::Deserialize;
use std::time::Duration;

use crate::candidates::{LeadSource, RandomSignals, SyntheticLeadSource};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Pause between discovery progress steps.
    pub step_delay_ms: u64,
    /// Pins signal draws for reproducible runs.
    pub discovery_seed: Option<u64>,
    pub lead_source_label: String,
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            step_delay_ms: 300,
            discovery_seed: None,
            lead_source_label: "Web Search".to_string(),
            event_channel_capacity: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            step_delay_ms: std::env::var("DISCOVERY_STEP_DELAY_MS")
                .ok()
                .map(|raw| {
                    raw.trim().parse().map_err(|_| {
                        anyhow::anyhow!("DISCOVERY_STEP_DELAY_MS must be a non-negative integer")
                    })
                })
                .transpose()?
                .unwrap_or(defaults.step_delay_ms),
            discovery_seed: std::env::var("DISCOVERY_SEED")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|raw| {
                    raw.trim()
                        .parse()
                        .map_err(|_| anyhow::anyhow!("DISCOVERY_SEED must be an unsigned integer"))
                })
                .transpose()?,
            lead_source_label: std::env::var("LEAD_SOURCE_LABEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.lead_source_label),
            event_channel_capacity: std::env::var("EVENT_CHANNEL_CAPACITY")
                .ok()
                .map(|raw| {
                    raw.trim()
                        .parse::<usize>()
                        .map_err(|_| anyhow::anyhow!("EVENT_CHANNEL_CAPACITY must be a number"))
                        .and_then(|capacity| {
                            if capacity == 0 {
                                anyhow::bail!("EVENT_CHANNEL_CAPACITY must be greater than 0");
                            }
                            Ok(capacity)
                        })
                })
                .transpose()?
                .unwrap_or(defaults.event_channel_capacity),
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Discovery step delay: {}ms", config.step_delay_ms);
        if let Some(seed) = config.discovery_seed {
            tracing::debug!("Discovery seed pinned: {}", seed);
        }

        Ok(config)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Lead source for a new run: seeded when a seed is configured.
    pub fn lead_source(&self) -> Box<dyn LeadSource> {
        let signals = match self.discovery_seed {
            Some(seed) => RandomSignals::seeded(seed),
            None => RandomSignals::from_entropy(),
        };
        Box::new(SyntheticLeadSource::new(
            signals,
            self.lead_source_label.clone(),
        ))
    }
}
