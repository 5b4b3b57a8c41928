//! Runs the extraction strategies in a fixed priority order and selects the
//! first non-empty result. Strategies are strictly sequential; hitting the
//! site over several channels at once is the fastest way to get blocked.

use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::models::{ScrapeResult, SearchRequest, Suggestions};
use crate::scrapers::{ApiStrategy, BrowserStrategy, HttpStrategy, Strategy};

/// Pause between strategy attempts, on top of each strategy's own internal
/// rate limiting.
const INTER_STRATEGY_DELAY: Duration = Duration::from_secs(3);

pub struct Orchestrator {
    strategies: Vec<Box<dyn Strategy>>,
    inter_strategy_delay: Duration,
}

impl Orchestrator {
    /// Default stack in priority order: browser first for fidelity, API
    /// second for speed, raw HTML as the last resort.
    pub fn with_default_strategies() -> Result<Self> {
        Ok(Self::new(
            vec![
                Box::new(BrowserStrategy::new()),
                Box::new(ApiStrategy::new()?),
                Box::new(HttpStrategy::new()?),
            ],
            INTER_STRATEGY_DELAY,
        ))
    }

    pub fn new(strategies: Vec<Box<dyn Strategy>>, inter_strategy_delay: Duration) -> Self {
        Self {
            strategies,
            inter_strategy_delay,
        }
    }

    /// One extraction run. The first strategy to return a non-empty listing
    /// sequence wins; its output is returned unmodified. Failures and empty
    /// results are recorded and the next strategy is tried after a delay.
    pub async fn run(&self, request: &SearchRequest) -> ScrapeResult {
        let mut failures: Vec<String> = Vec::new();

        for (index, strategy) in self.strategies.iter().enumerate() {
            info!(strategy = strategy.name(), "attempting extraction");

            match strategy.attempt(request).await {
                Ok(listings) if !listings.is_empty() => {
                    info!(
                        strategy = strategy.name(),
                        count = listings.len(),
                        "extraction succeeded"
                    );
                    return ScrapeResult {
                        success: true,
                        strategy_used: Some(strategy.source()),
                        listings,
                        error: None,
                        suggestions: Suggestions::default(),
                    };
                }
                Ok(_) => {
                    warn!(strategy = strategy.name(), "strategy returned no listings");
                    failures.push(format!("{}: returned no listings", strategy.name()));
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), %err, "strategy failed");
                    failures.push(format!("{}: {}", strategy.name(), err));
                }
            }

            if index + 1 < self.strategies.len() {
                sleep(self.inter_strategy_delay).await;
            }
        }

        ScrapeResult {
            success: false,
            strategy_used: None,
            listings: Vec::new(),
            error: Some(failures.join("; ")),
            suggestions: remediation_suggestions(),
        }
    }
}

/// Static operator guidance for an exhausted run. Deliberately not derived
/// from the specific failures.
fn remediation_suggestions() -> Suggestions {
    Suggestions {
        immediate: vec![
            "Retry from a different network or through a VPN; the site may have rate-limited this address".into(),
            "Increase the inter-request delays and retry during off-peak hours".into(),
            "Verify the search URL renders results in a regular browser".into(),
        ],
        infrastructure: vec![
            "Route requests through a rotating residential proxy pool".into(),
            "Monitor the site's markup and API envelopes for drift and update the strategy selectors".into(),
            "Cache successful extractions to reduce request volume".into(),
        ],
        alternative_sources: vec![
            "Official partner or affiliate APIs where available".into(),
            "Licensed short-term-rental datasets (e.g. AirDNA-style providers)".into(),
            "Public tourism or municipal registry data for the target market".into(),
        ],
    }
}
