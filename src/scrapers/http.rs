//! Raw-HTML extraction: plain HTTP fetch with browser-like headers, then two
//! parse passes over the returned markup. Pass (a) scans inline script tags
//! for the JSON bootstrap blob the site embeds for hydration; pass (b) falls
//! back to scanning result-card markup directly. Last resort in the priority
//! order, but also the cheapest channel.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::StrategyError;
use crate::extract::extract_price;
use crate::models::{Listing, SearchRequest, Source};
use crate::normalize::normalize;
use crate::rate_limit::RateLimiter;
use crate::scrapers::traits::Strategy;
use crate::scrapers::{flatten_entry, listing_id_from_url, search_url, BASE_URL, USER_AGENT};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(2);

pub struct HttpStrategy {
    client: Client,
    limiter: RateLimiter,
}

impl HttpStrategy {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        })
    }
}

#[async_trait]
impl Strategy for HttpStrategy {
    async fn attempt(&self, request: &SearchRequest) -> Result<Vec<Listing>, StrategyError> {
        // Warm-up hit on the site root picks up session cookies that the
        // search page checks for.
        self.limiter.wait().await;
        debug!("http strategy: warming up session");
        self.client.get(BASE_URL).send().await?;

        self.limiter.wait().await;
        let url = search_url(request);
        info!(%url, "http strategy: fetching search page");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::HttpStatus(status.as_u16()));
        }
        let html = response.text().await?;
        debug!(bytes = html.len(), "http strategy: page downloaded");

        let fragments = match parse_bootstrap_blob(&html) {
            Some(fragments) => {
                debug!(count = fragments.len(), "http strategy: bootstrap blob parsed");
                fragments
            }
            None => {
                warn!("http strategy: no bootstrap blob, falling back to card markup");
                parse_result_cards(&html)
            }
        };

        let run_id = Utc::now().timestamp_millis();
        let listings = fragments
            .iter()
            .enumerate()
            .map(|(seq, fragment)| normalize(fragment, Source::Http, &request.location, run_id, seq))
            .collect();
        Ok(listings)
    }

    fn source(&self) -> Source {
        Source::Http
    }
}

/// Pass (a): look for the embedded JSON bootstrap blob in inline script tags
/// and extract listings structurally. Returns `None` when no blob yields
/// anything, so the caller can fall back to markup scanning.
pub(crate) fn parse_bootstrap_blob(html: &str) -> Option<Vec<Value>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(
        "script#__NEXT_DATA__, script[data-deferred-state], script[id^='data-deferred-state']",
    )
    .expect("bootstrap script selector is valid");

    for script in document.select(&selector) {
        let text = script.text().collect::<String>();
        let Ok(blob) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let fragments = fragments_from_blob(&blob);
        if !fragments.is_empty() {
            return Some(fragments);
        }
    }
    None
}

/// The blob nests its search results under a handful of known paths that the
/// site has shipped over time.
fn fragments_from_blob(blob: &Value) -> Vec<Value> {
    const RESULT_PATHS: &[&str] = &[
        "/props/pageProps/searchResults",
        "/data/presentation/staysSearch/results/searchResults",
        "/niobeMinimalClientData/0/1/data/presentation/staysSearch/results/searchResults",
    ];

    for path in RESULT_PATHS {
        if let Some(entries) = blob.pointer(path).and_then(Value::as_array) {
            let fragments: Vec<Value> = entries
                .iter()
                .map(flatten_entry)
                .filter(|f| !f.as_object().map(|o| o.is_empty()).unwrap_or(true))
                .collect();
            if !fragments.is_empty() {
                return fragments;
            }
        }
    }
    Vec::new()
}

/// Pass (b): scan result-card-like markup directly. Only cards with a
/// non-empty title and a positive price are kept; everything else is assumed
/// to be navigation chrome or an ad slot.
pub(crate) fn parse_result_cards(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let card_selector =
        Selector::parse("[data-testid='card-container'], [itemprop='itemListElement']")
            .expect("card selector is valid");
    let title_selector = Selector::parse("[data-testid='listing-card-title']")
        .expect("title selector is valid");
    let link_selector = Selector::parse("a[href*='/rooms/']").expect("link selector is valid");
    let rating_selector =
        Selector::parse("span[aria-label*='out of 5']").expect("rating selector is valid");

    let mut fragments = Vec::new();
    for card in document.select(&card_selector) {
        let title = card
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let card_text = card.text().collect::<Vec<_>>().join(" ");
        let price = extract_price(&card_text);

        if title.is_empty() || price <= 0.0 {
            continue;
        }

        let id = card
            .select(&link_selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(listing_id_from_url);

        let rating = card
            .select(&rating_selector)
            .next()
            .and_then(|el| el.value().attr("aria-label"))
            .map(crate::extract::extract_rating)
            .unwrap_or(0.0);

        fragments.push(json!({
            "id": id,
            "title": title,
            "price_per_night": price,
            "rating": rating,
        }));
    }
    fragments
}
