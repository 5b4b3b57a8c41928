//! Turns a strategy-specific raw fragment into a canonical [`Listing`].
//!
//! Fragments are untyped `serde_json::Value`s because every strategy surfaces
//! a different shape (rendered-DOM card, bootstrap blob subtree, API payload
//! subtree). Every nested lookup here has an explicit default: empty string
//! for text, 0 for numbers, `None` for optionals, empty vec for collections,
//! and the request location when the fragment carries no location of its own.
//! Normalization never fails; a malformed fragment yields a minimally
//! populated record.

use chrono::Utc;
use serde_json::Value;

use crate::extract::{coerce_price, extract_rating};
use crate::models::{Coordinates, Host, Listing, Source};

/// Build a canonical listing from `fragment`. `run_id` and `seq` feed the
/// generated id when the fragment does not carry one, keeping ids unique
/// within a run and namespaced by strategy.
pub fn normalize(
    fragment: &Value,
    source: Source,
    request_location: &str,
    run_id: i64,
    seq: usize,
) -> Listing {
    let id = string_at(fragment, &["id", "listing_id"])
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}-{}-{}", source.tag(), run_id, seq));

    let title = string_at(fragment, &["title", "name"])
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown listing".to_string());

    let price_per_night = price_at(
        fragment,
        &[
            &["price_per_night"],
            &["price"],
            &["pricing_quote", "rate"],
            &["pricing_quote", "price"],
        ],
    );
    let total_price = price_at(
        fragment,
        &[&["total_price"], &["pricing_quote", "total"]],
    );

    let rating = rating_of(fragment);

    let review_count = fragment
        .get("review_count")
        .or_else(|| fragment.get("reviews_count"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let review_count_estimated = fragment
        .get("review_count_estimated")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let location = string_at(fragment, &["location", "city", "public_address"])
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| request_location.to_string());

    let property_type = string_at(fragment, &["property_type", "room_type"]);

    Listing {
        id,
        title,
        price_per_night,
        total_price,
        rating,
        review_count,
        review_count_estimated,
        location,
        property_type,
        host: host_of(fragment),
        coordinates: coordinates_of(fragment),
        amenities: dedup(strings_at(fragment, &["amenities"])),
        images: strings_at(fragment, &["images", "photos"]),
        source,
        extracted_at: Utc::now(),
    }
}

fn string_at(fragment: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let value = fragment.get(key)?;
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

fn strings_at(fragment: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|key| fragment.get(key)?.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// First path that coerces to a positive price wins.
fn price_at(fragment: &Value, paths: &[&[&str]]) -> f64 {
    for path in paths {
        let mut current = fragment;
        let mut found = true;
        for key in *path {
            match current.get(key) {
                Some(next) => current = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            let price = coerce_price(current);
            if price > 0.0 {
                return price;
            }
        }
    }
    0.0
}

fn rating_of(fragment: &Value) -> f64 {
    let raw = fragment.get("rating").or_else(|| fragment.get("avg_rating"));
    match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0).clamp(0.0, 5.0),
        Some(Value::String(s)) => extract_rating(s),
        _ => 0.0,
    }
}

fn host_of(fragment: &Value) -> Host {
    let node = fragment.get("host").or_else(|| fragment.get("user"));
    let Some(node) = node else {
        return Host::default();
    };
    Host {
        id: string_at(node, &["id"]),
        name: string_at(node, &["name", "first_name"]),
        is_superhost: node
            .get("is_superhost")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn coordinates_of(fragment: &Value) -> Option<Coordinates> {
    let node = fragment.get("coordinates").unwrap_or(fragment);
    let latitude = node
        .get("latitude")
        .or_else(|| node.get("lat"))
        .and_then(Value::as_f64)?;
    let longitude = node
        .get("longitude")
        .or_else(|| node.get("lng"))
        .and_then(Value::as_f64)?;
    if latitude.is_finite() && longitude.is_finite() {
        Some(Coordinates {
            latitude,
            longitude,
        })
    } else {
        None
    }
}

fn dedup(mut items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invariants_hold(listing: &Listing) {
        assert!(!listing.id.is_empty());
        assert!(!listing.title.is_empty());
        assert!(listing.price_per_night >= 0.0);
        assert!((0.0..=5.0).contains(&listing.rating));
    }

    #[test]
    fn full_fragment_maps_through() {
        let fragment = json!({
            "id": "12345",
            "title": "Cozy Loft",
            "price_per_night": 120.0,
            "total_price": 360.0,
            "rating": 4.8,
            "review_count": 42,
            "location": "Mississauga, Ontario",
            "property_type": "Entire loft",
            "host": { "id": "h1", "name": "Sam", "is_superhost": true },
            "coordinates": { "latitude": 43.58, "longitude": -79.64 },
            "amenities": ["Wifi", "Kitchen", "Wifi"],
            "images": ["https://example.com/a.jpg"]
        });
        let listing = normalize(&fragment, Source::Http, "Mississauga, Ontario", 1, 0);
        invariants_hold(&listing);
        assert_eq!(listing.id, "12345");
        assert_eq!(listing.title, "Cozy Loft");
        assert_eq!(listing.price_per_night, 120.0);
        assert_eq!(listing.rating, 4.8);
        assert!(listing.host.is_superhost);
        assert_eq!(listing.host.name.as_deref(), Some("Sam"));
        assert_eq!(listing.amenities, vec!["Wifi", "Kitchen"]);
        assert!(listing.coordinates.is_some());
        assert_eq!(listing.source, Source::Http);
    }

    #[test]
    fn null_fragment_yields_minimal_listing() {
        let listing = normalize(&json!(null), Source::Api, "Toronto", 99, 3);
        invariants_hold(&listing);
        assert_eq!(listing.id, "api-99-3");
        assert_eq!(listing.title, "Unknown listing");
        assert_eq!(listing.price_per_night, 0.0);
        assert_eq!(listing.location, "Toronto");
        assert!(listing.coordinates.is_none());
        assert!(listing.amenities.is_empty());
    }

    #[test]
    fn generated_ids_are_strategy_namespaced_and_unique() {
        let a = normalize(&json!({}), Source::Browser, "Toronto", 7, 0);
        let b = normalize(&json!({}), Source::Browser, "Toronto", 7, 1);
        let c = normalize(&json!({}), Source::Http, "Toronto", 7, 0);
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert!(a.id.starts_with("browser-"));
    }

    #[test]
    fn numeric_id_is_stringified() {
        let listing = normalize(&json!({ "id": 99887766 }), Source::Api, "Ottawa", 1, 0);
        assert_eq!(listing.id, "99887766");
    }

    #[test]
    fn api_shaped_pricing_quote_is_read() {
        let fragment = json!({
            "id": "x",
            "name": "Quiet Suite",
            "pricing_quote": { "rate": { "amount": 150 }, "total": { "amount": 450 } },
            "avg_rating": 4.5,
            "reviews_count": 12,
            "user": { "first_name": "Ana" }
        });
        let listing = normalize(&fragment, Source::Api, "Ottawa", 1, 0);
        invariants_hold(&listing);
        assert_eq!(listing.price_per_night, 150.0);
        assert_eq!(listing.total_price, 450.0);
        assert_eq!(listing.rating, 4.5);
        assert_eq!(listing.review_count, 12);
        assert_eq!(listing.host.name.as_deref(), Some("Ana"));
    }

    #[test]
    fn out_of_range_rating_is_clamped() {
        let listing = normalize(&json!({ "rating": 9.9 }), Source::Http, "Ottawa", 1, 0);
        assert_eq!(listing.rating, 5.0);
        let listing = normalize(&json!({ "rating": -1.0 }), Source::Http, "Ottawa", 1, 0);
        assert_eq!(listing.rating, 0.0);
    }

    #[test]
    fn rating_from_string_text() {
        let listing = normalize(
            &json!({ "rating": "4.85 (231 reviews)" }),
            Source::Browser,
            "Ottawa",
            1,
            0,
        );
        assert_eq!(listing.rating, 4.85);
    }

    #[test]
    fn partial_coordinates_are_dropped() {
        let listing = normalize(
            &json!({ "coordinates": { "latitude": 43.5 } }),
            Source::Api,
            "Ottawa",
            1,
            0,
        );
        assert!(listing.coordinates.is_none());
    }

    #[test]
    fn flat_lat_lng_is_accepted() {
        let listing = normalize(
            &json!({ "lat": 43.5, "lng": -79.6 }),
            Source::Api,
            "Ottawa",
            1,
            0,
        );
        let coords = listing.coordinates.unwrap();
        assert_eq!(coords.latitude, 43.5);
        assert_eq!(coords.longitude, -79.6);
    }

    #[test]
    fn estimated_flag_carries_through() {
        let fragment = json!({
            "title": "Card",
            "review_count": 23,
            "review_count_estimated": true
        });
        let listing = normalize(&fragment, Source::Browser, "Ottawa", 1, 0);
        assert_eq!(listing.review_count, 23);
        assert!(listing.review_count_estimated);
    }

    #[test]
    fn adversarial_shapes_never_panic() {
        let shapes = vec![
            json!([]),
            json!("just a string"),
            json!(42),
            json!({ "host": "not an object", "coordinates": [1, 2] }),
            json!({ "amenities": [1, null, {}], "images": "nope" }),
            json!({ "price": { "amount": { "amount": "$95" } } }),
        ];
        for fragment in &shapes {
            let listing = normalize(fragment, Source::Http, "Ottawa", 1, 0);
            invariants_hold(&listing);
        }
    }
}
