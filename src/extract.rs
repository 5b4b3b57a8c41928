//! Field extractors: the single point of contact with the site's unstable
//! text formatting. Every function here is total over arbitrary input and
//! returns 0 when nothing parseable is found, because upstream markup changes
//! are expected and must not abort extraction.

use serde_json::Value;

/// Pull a currency-prefixed price out of free text, e.g. `"$120 per night"`
/// or `"$1,450 total"`. Returns 0.0 when no `$<digits>` run is present.
pub fn extract_price(text: &str) -> f64 {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'$' {
            continue;
        }
        let digits: String = text[i + 1..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ',')
            .filter(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            if let Ok(price) = digits.parse::<f64>() {
                return price;
            }
        }
    }
    0.0
}

/// Pull the first decimal number out of free text, e.g. `"4.85 (231 reviews)"`.
/// Clamped to the rating scale `[0, 5]`; 0.0 when no number is present.
pub fn extract_rating(text: &str) -> f64 {
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if !c.is_ascii_digit() {
            continue;
        }
        let mut end = start + c.len_utf8();
        let mut seen_dot = false;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_ascii_digit() || (next == '.' && !seen_dot) {
                seen_dot |= next == '.';
                end = i + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let number = text[start..end].trim_end_matches('.');
        if let Ok(rating) = number.parse::<f64>() {
            return rating.clamp(0.0, 5.0);
        }
    }
    0.0
}

/// Coerce a loosely-typed price value: a bare number, a numeric string, or an
/// object exposing an `amount` field. Anything else (and anything negative)
/// is 0.0.
pub fn coerce_price(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .unwrap_or_else(|| extract_price(s)),
        Value::Object(map) => map.get("amount").map(coerce_price).unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        0.0
    }
}
