pub mod api;
pub mod browser;
pub mod http;
pub mod traits;

pub use api::ApiStrategy;
pub use browser::BrowserStrategy;
pub use http::HttpStrategy;
pub use traits::Strategy;

use serde_json::{json, Value};
use url::Url;

use crate::models::SearchRequest;

/// Root of the target site. All strategies derive their URLs from it.
pub const BASE_URL: &str = "https://www.airbnb.com";

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build the search-results URL for a request. Query-parameter shapes are
/// owned by the external site and may drift; they live only in this module
/// and the strategy files.
pub fn search_url(request: &SearchRequest) -> String {
    let mut url = Url::parse(BASE_URL).expect("base url is valid");
    url.path_segments_mut()
        .expect("base url has a path")
        .push("s")
        .push(&request.location)
        .push("homes");
    url.query_pairs_mut()
        .append_pair("query", &request.location)
        .append_pair("checkin", &request.check_in.to_string())
        .append_pair("checkout", &request.check_out.to_string())
        .append_pair("adults", &request.adults.to_string())
        .append_pair("children", &request.children.to_string())
        .append_pair("tab_id", "home_tab")
        .append_pair("refinement_paths[]", "/homes");
    url.to_string()
}

/// Pull the numeric listing id out of a `/rooms/<id>` link.
pub(crate) fn listing_id_from_url(href: &str) -> Option<String> {
    let parts: Vec<&str> = href.split('/').collect();
    let position = parts.iter().position(|part| *part == "rooms")?;
    let id = parts.get(position + 1)?.split('?').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn first_present<'a>(entry: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers.iter().find_map(|p| entry.pointer(p))
}

/// Flatten one raw search-result entry (bootstrap-blob or API shaped, camel
/// or snake cased) into the key set the normalizer understands. Absent fields
/// stay absent; the normalizer supplies the defaults.
pub(crate) fn flatten_entry(entry: &Value) -> Value {
    let listing = entry.get("listing").unwrap_or(entry);
    let mut fragment = json!({});
    let fields: &[(&str, &[&str])] = &[
        ("id", &["/id", "/listingId", "/listing_id"]),
        ("title", &["/name", "/title"]),
        (
            "price",
            &[
                "/pricingQuote/price",
                "/pricingQuote/rate",
                "/pricing_quote/price",
                "/pricing_quote/rate",
                "/price",
            ],
        ),
        (
            "total_price",
            &["/pricingQuote/total", "/pricing_quote/total"],
        ),
        ("rating", &["/avgRating", "/avg_rating", "/starRating"]),
        ("review_count", &["/reviewsCount", "/reviews_count"]),
        ("location", &["/city", "/publicAddress", "/public_address"]),
        ("property_type", &["/roomType", "/room_type"]),
        ("lat", &["/lat", "/latitude"]),
        ("lng", &["/lng", "/longitude"]),
        ("images", &["/images", "/pictureUrls", "/picture_urls"]),
        ("amenities", &["/amenities", "/previewAmenityNames"]),
    ];
    for (key, pointers) in fields {
        // Price lives next to the listing in blob entries, inside it in API items.
        let value = first_present(entry, pointers).or_else(|| first_present(listing, pointers));
        if let Some(value) = value {
            fragment[*key] = value.clone();
        }
    }
    if let Some(user) = listing.get("user").or_else(|| listing.get("host")) {
        fragment["host"] = json!({
            "id": user.get("id").cloned().unwrap_or(Value::Null),
            "name": user
                .get("firstName")
                .or_else(|| user.get("first_name"))
                .or_else(|| user.get("name"))
                .cloned()
                .unwrap_or(Value::Null),
            "is_superhost": user
                .get("isSuperhost")
                .or_else(|| user.get("is_superhost"))
                .cloned()
                .unwrap_or(Value::Null),
        });
    }
    fragment
}
