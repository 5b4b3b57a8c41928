use anyhow::{ensure, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which extraction strategy produced a listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Browser,
    Http,
    Api,
}

impl Source {
    /// Short tag used to namespace generated listing ids.
    pub fn tag(self) -> &'static str {
        match self {
            Source::Browser => "browser",
            Source::Http => "http",
            Source::Api => "api",
        }
    }
}

/// A search the caller wants answered. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub location: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: u32,
    pub children: u32,
}

impl SearchRequest {
    pub fn new(
        location: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
        adults: u32,
        children: u32,
    ) -> Result<Self> {
        ensure!(check_in < check_out, "check-in must be before check-out");
        ensure!(adults >= 1, "at least one adult is required");
        Ok(Self {
            location: location.into(),
            check_in,
            check_out,
            adults,
            children,
        })
    }
}

/// Host information for a listing. Everything here is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    pub id: Option<String>,
    pub name: Option<String>,
    pub is_superhost: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Canonical listing record. Built only by the normalizer, never mutated
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price_per_night: f64,
    pub total_price: f64,
    pub rating: f64,
    pub review_count: u32,
    /// True when the review count was synthesized rather than read from the
    /// page. Downstream consumers must not treat estimated counts as measured.
    pub review_count_estimated: bool,
    pub location: String,
    pub property_type: Option<String>,
    pub host: Host,
    pub coordinates: Option<Coordinates>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub source: Source,
    pub extracted_at: DateTime<Utc>,
}

/// Static operator guidance attached to a failed run. Not derived from the
/// specific failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suggestions {
    pub immediate: Vec<String>,
    pub infrastructure: Vec<String>,
    pub alternative_sources: Vec<String>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty()
            && self.infrastructure.is_empty()
            && self.alternative_sources.is_empty()
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub success: bool,
    pub strategy_used: Option<Source>,
    pub listings: Vec<Listing>,
    pub error: Option<String>,
    pub suggestions: Suggestions,
}

/// Run metadata handed to the persistence sink next to the listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub location: String,
    pub strategy_used: Option<Source>,
    pub count: usize,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn request_rejects_inverted_dates() {
        let result = SearchRequest::new(
            "Mississauga, Ontario",
            date("2024-01-18"),
            date("2024-01-15"),
            2,
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn request_rejects_equal_dates() {
        let result = SearchRequest::new("Toronto", date("2024-01-15"), date("2024-01-15"), 2, 0);
        assert!(result.is_err());
    }

    #[test]
    fn request_requires_an_adult() {
        let result = SearchRequest::new("Toronto", date("2024-01-15"), date("2024-01-18"), 0, 1);
        assert!(result.is_err());
    }

    #[test]
    fn valid_request_builds() {
        let request = SearchRequest::new(
            "Mississauga, Ontario",
            date("2024-01-15"),
            date("2024-01-18"),
            2,
            0,
        )
        .unwrap();
        assert_eq!(request.location, "Mississauga, Ontario");
        assert_eq!(request.adults, 2);
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Source::Http).unwrap(), "\"http\"");
        assert_eq!(
            serde_json::to_string(&Source::Browser).unwrap(),
            "\"browser\""
        );
    }
}
