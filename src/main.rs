mod error;
mod extract;
mod models;
mod normalize;
mod orchestrator;
mod rate_limit;
mod scrapers;
mod sink;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use models::{RunMetadata, SearchRequest};
use orchestrator::Orchestrator;
use sink::JsonFileSink;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🏠 Stay Scout - rental listing extractor");
    info!("==========================================");

    let request = request_from_args()?;
    info!(
        "Searching {} for {} → {} ({} adults, {} children)",
        request.location, request.check_in, request.check_out, request.adults, request.children
    );

    let orchestrator = Orchestrator::with_default_strategies()?;
    let result = orchestrator.run(&request).await;

    if result.success {
        info!(
            "\n✅ Extracted {} listings via the {} strategy\n",
            result.listings.len(),
            result
                .strategy_used
                .map(|s| s.tag())
                .unwrap_or("unknown")
        );
        for (i, listing) in result.listings.iter().enumerate() {
            println!(
                "{}. {} (${:.0}/night)",
                i + 1,
                listing.title,
                listing.price_per_night
            );
            if listing.rating > 0.0 {
                let marker = if listing.review_count_estimated { "~" } else { "" };
                println!(
                    "   ★ {:.2} ({}{} reviews)",
                    listing.rating, marker, listing.review_count
                );
            }
            println!("   {} | ID: {}", listing.location, listing.id);
            println!();
        }
    } else {
        warn!(
            "❌ All strategies exhausted: {}",
            result.error.as_deref().unwrap_or("unknown failure")
        );
        println!("\nWhat to try next:");
        for tip in result
            .suggestions
            .immediate
            .iter()
            .chain(&result.suggestions.infrastructure)
            .chain(&result.suggestions.alternative_sources)
        {
            println!("  - {tip}");
        }
    }

    let metadata = RunMetadata {
        location: request.location.clone(),
        strategy_used: result.strategy_used,
        count: result.listings.len(),
        finished_at: Utc::now(),
    };
    let sink = JsonFileSink::new("scrape_results.json");
    sink.persist(&metadata, &result.listings).await?;

    Ok(())
}

/// Plain positional arguments with demo defaults:
/// `stay-scout [location] [check-in] [check-out] [adults] [children]`
fn request_from_args() -> Result<SearchRequest> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let location = args
        .first()
        .cloned()
        .unwrap_or_else(|| "Mississauga, Ontario".to_string());
    let today = Utc::now().date_naive();
    let check_in = match args.get(1) {
        Some(raw) => parse_date(raw)?,
        None => today + ChronoDuration::days(30),
    };
    let check_out = match args.get(2) {
        Some(raw) => parse_date(raw)?,
        None => check_in + ChronoDuration::days(3),
    };
    let adults = match args.get(3) {
        Some(raw) => raw.parse().context("adults must be a number")?,
        None => 2,
    };
    let children = match args.get(4) {
        Some(raw) => raw.parse().context("children must be a number")?,
        None => 0,
    };

    SearchRequest::new(location, check_in, check_out, adults, children)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse()
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}
