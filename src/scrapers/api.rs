//! Structured-API extraction: probe the site's internal search endpoints
//! directly. Fastest channel when it works, but the payload and envelope
//! shapes are owned by the site and drift without notice, so every endpoint
//! that errors or answers with an unrecognized shape is skipped silently.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::StrategyError;
use crate::models::{Listing, SearchRequest, Source};
use crate::normalize::normalize;
use crate::rate_limit::RateLimiter;
use crate::scrapers::traits::Strategy;
use crate::scrapers::{flatten_entry, BASE_URL, USER_AGENT};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(2);

/// Publicly shipped client key; the site embeds it in every page.
const API_KEY: &str = "d306zoyjsyarp7ifhu67rjxn52tv0t20";

/// Known internal search endpoints, tried in order.
const ENDPOINTS: &[&str] = &[
    "/api/v3/StaysSearch",
    "/api/v3/ExploreSearch",
    "/api/v2/explore_tabs",
];

pub struct ApiStrategy {
    client: Client,
    limiter: RateLimiter,
}

impl ApiStrategy {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create API client")?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        })
    }
}

#[async_trait]
impl Strategy for ApiStrategy {
    async fn attempt(&self, request: &SearchRequest) -> Result<Vec<Listing>, StrategyError> {
        let payload = search_payload(request);

        for endpoint in ENDPOINTS {
            self.limiter.wait().await;
            let url = format!("{BASE_URL}{endpoint}");
            info!(%url, "api strategy: probing endpoint");

            let response = self
                .client
                .post(&url)
                .header("X-Airbnb-API-Key", API_KEY)
                .header("X-Airbnb-GraphQL-Platform", "web")
                .json(&payload)
                .send()
                .await;

            let body: Value = match response {
                Ok(response) if response.status().is_success() => {
                    match response.json().await {
                        Ok(body) => body,
                        Err(err) => {
                            debug!(%endpoint, %err, "api strategy: non-JSON body, skipping");
                            continue;
                        }
                    }
                }
                Ok(response) => {
                    debug!(%endpoint, status = %response.status(), "api strategy: skipping");
                    continue;
                }
                Err(err) => {
                    debug!(%endpoint, %err, "api strategy: request failed, skipping");
                    continue;
                }
            };

            // First recognizable envelope wins; later endpoints are not tried
            // even when it carries zero listings.
            if let Some(fragments) = fragments_from_envelope(&body) {
                debug!(%endpoint, count = fragments.len(), "api strategy: envelope recognized");
                let run_id = Utc::now().timestamp_millis();
                let listings = fragments
                    .iter()
                    .enumerate()
                    .map(|(seq, f)| normalize(f, Source::Api, &request.location, run_id, seq))
                    .collect();
                return Ok(listings);
            }
            debug!(%endpoint, "api strategy: unrecognized payload shape");
        }

        warn!("api strategy: no endpoint returned a recognizable envelope");
        Err(StrategyError::Parse(
            "no API endpoint returned a recognizable payload envelope".into(),
        ))
    }

    fn source(&self) -> Source {
        Source::Api
    }
}

/// The search payload shape the site's own web client posts.
fn search_payload(request: &SearchRequest) -> Value {
    json!({
        "operationName": "StaysSearch",
        "variables": {
            "staysSearchRequest": {
                "metadataOnly": false,
                "searchType": "filter_change",
                "rawParams": [
                    { "filterName": "query", "filterValues": [request.location] },
                    { "filterName": "checkin", "filterValues": [request.check_in.to_string()] },
                    { "filterName": "checkout", "filterValues": [request.check_out.to_string()] },
                    { "filterName": "adults", "filterValues": [request.adults.to_string()] },
                    { "filterName": "children", "filterValues": [request.children.to_string()] },
                ]
            }
        }
    })
}

/// Recognize a response envelope and traverse `sections -> items -> listing`.
/// Returns `None` for unrecognized shapes, `Some(vec![])` for a recognized
/// envelope with no listings in it (the sections chain may be absent at any
/// depth without being an error).
pub(crate) fn fragments_from_envelope(body: &Value) -> Option<Vec<Value>> {
    // Older explore envelope: data.dora.exploreV3.sections[].items[].listing
    if let Some(explore) = body.pointer("/data/dora/exploreV3") {
        return Some(fragments_from_sections(explore.get("sections")));
    }
    // explore_tabs answers at the top level: explore_tabs[].sections[...]
    if let Some(tabs) = body.get("explore_tabs").and_then(Value::as_array) {
        let fragments = tabs
            .iter()
            .flat_map(|tab| fragments_from_sections(tab.get("sections")))
            .collect();
        return Some(fragments);
    }
    // Current stays-search envelope.
    if let Some(results) = body.pointer("/data/presentation/staysSearch/results") {
        let fragments = results
            .get("searchResults")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(flatten_entry).collect())
            .unwrap_or_default();
        return Some(fragments);
    }
    None
}

fn fragments_from_sections(sections: Option<&Value>) -> Vec<Value> {
    let Some(sections) = sections.and_then(Value::as_array) else {
        return Vec::new();
    };
    sections
        .iter()
        .filter_map(|section| section.get("items").and_then(Value::as_array))
        .flatten()
        .filter(|item| item.get("listing").is_some())
        .map(flatten_entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explore_envelope_is_traversed() {
        let body = json!({
            "data": { "dora": { "exploreV3": { "sections": [
                { "items": [
                    { "listing": { "id": 1, "name": "First", "avg_rating": 4.5 },
                      "pricing_quote": { "rate": { "amount": 100 } } },
                    { "not_a_listing": {} }
                ]},
                { "items": [
                    { "listing": { "id": 2, "name": "Second" },
                      "pricing_quote": { "rate": { "amount": 80 } } }
                ]}
            ]}}}
        });
        let fragments = fragments_from_envelope(&body).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0]["title"], "First");
        assert_eq!(fragments[1]["price"]["amount"], 80);
    }

    #[test]
    fn absent_sections_is_empty_not_error() {
        let body = json!({ "data": { "dora": { "exploreV3": {} } } });
        let fragments = fragments_from_envelope(&body).unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn sections_without_items_are_skipped() {
        let body = json!({
            "data": { "dora": { "exploreV3": { "sections": [
                { "title": "header section" },
                { "items": "not an array" }
            ]}}}
        });
        assert!(fragments_from_envelope(&body).unwrap().is_empty());
    }

    #[test]
    fn stays_search_envelope_is_traversed() {
        let body = json!({
            "data": { "presentation": { "staysSearch": { "results": {
                "searchResults": [
                    { "listing": { "id": "9", "name": "Stays Result" },
                      "pricingQuote": { "price": { "amount": 75 } } }
                ]
            }}}}
        });
        let fragments = fragments_from_envelope(&body).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0]["id"], "9");
    }

    #[test]
    fn explore_tabs_envelope_is_traversed() {
        let body = json!({
            "explore_tabs": [
                { "sections": [
                    { "items": [
                        { "listing": { "id": 7, "name": "Tab Result" },
                          "pricing_quote": { "rate": { "amount": 60 } } }
                    ]}
                ]}
            ]
        });
        let fragments = fragments_from_envelope(&body).unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        assert!(fragments_from_envelope(&json!({})).is_none());
        assert!(fragments_from_envelope(&json!({ "data": {} })).is_none());
        assert!(fragments_from_envelope(&json!({ "error": "blocked" })).is_none());
    }

    #[test]
    fn payload_carries_the_request() {
        let request = SearchRequest::new(
            "Mississauga, Ontario",
            "2024-01-15".parse().unwrap(),
            "2024-01-18".parse().unwrap(),
            2,
            0,
        )
        .unwrap();
        let payload = search_payload(&request);
        assert_eq!(payload["operationName"], "StaysSearch");
        let params = payload["variables"]["staysSearchRequest"]["rawParams"]
            .as_array()
            .unwrap();
        assert!(params
            .iter()
            .any(|p| p["filterName"] == "checkin" && p["filterValues"][0] == "2024-01-15"));
        assert!(params
            .iter()
            .any(|p| p["filterName"] == "query"
                && p["filterValues"][0] == "Mississauga, Ontario"));
    }
}
