//! Field helpers for loosely-typed source payloads.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y%m%d%H%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y"];

/// First non-empty string among `keys`. Keys starting with `/` are JSON
/// pointers; numbers are rendered as strings.
pub fn first_str(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let value = if key.starts_with('/') {
            item.pointer(key)
        } else {
            item.get(*key)
        }?;
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

/// Items of a list payload: a bare array, `{"item": [...]}`, `{"item": {...}}`,
/// or a single object.
pub fn item_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("item") {
            Some(inner) => item_list(inner),
            None if map.is_empty() => Vec::new(),
            None => vec![value.clone()],
        },
        _ => Vec::new(),
    }
}

/// A count that may arrive as a number or a numeric string.
pub fn as_count(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the date and datetime shapes seen across sources. Date-only values
/// land on midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    // "2024-05-01+02:00" and similar: keep the date part
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// A positive monetary amount from a number or a formatted string.
pub fn parse_amount(value: Option<&Value>) -> Option<f64> {
    let amount = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            cleaned.parse().ok()?
        }
        _ => return None,
    };
    (amount > 0.0).then_some(amount)
}

/// Collapse runs of whitespace.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn first_str_skips_blank_and_reads_pointers() {
        let item = json!({"bidNtceNm": " ", "ntceNm": "PCR 시약", "buyer": {"name": "NHS"}, "n": 7});
        assert_eq!(first_str(&item, &["bidNtceNm", "ntceNm"]).as_deref(), Some("PCR 시약"));
        assert_eq!(first_str(&item, &["/buyer/name"]).as_deref(), Some("NHS"));
        assert_eq!(first_str(&item, &["n"]).as_deref(), Some("7"));
        assert_eq!(first_str(&item, &["missing"]), None);
    }

    #[test]
    fn item_list_handles_nested_shapes() {
        assert_eq!(item_list(&json!([1, 2])).len(), 2);
        assert_eq!(item_list(&json!({"item": [{"a": 1}, {"a": 2}]})).len(), 2);
        assert_eq!(item_list(&json!({"item": {"a": 1}})).len(), 1);
        assert_eq!(item_list(&json!({"a": 1})).len(), 1);
        assert!(item_list(&json!({})).is_empty());
        assert!(item_list(&json!("")).is_empty());
    }

    #[test]
    fn parses_source_date_shapes() {
        let dt = parse_date("2024-03-05 14:30:00").unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour()), (3, 5, 14));
        assert_eq!(parse_date("202403051430").unwrap().minute(), 30);
        assert_eq!(parse_date("20240305").unwrap().day(), 5);
        assert_eq!(parse_date("03/05/2024").unwrap().month(), 3);
        assert_eq!(parse_date("2024-03-05+01:00").unwrap().day(), 5);
        assert!(parse_date("2024-03-05T10:00:00Z").is_some());
        assert!(parse_date("Tue, 05 Mar 2024 10:00:00 GMT").is_some());
        assert!(parse_date("soon").is_none());
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount(Some(&json!("1,250,000"))), Some(1_250_000.0));
        assert_eq!(parse_amount(Some(&json!(99.5))), Some(99.5));
        assert_eq!(parse_amount(Some(&json!("0"))), None);
        assert_eq!(parse_amount(None), None);
    }

    #[test]
    fn counts_from_numbers_or_strings() {
        assert_eq!(as_count(Some(&json!(12))), Some(12));
        assert_eq!(as_count(Some(&json!("12"))), Some(12));
        assert_eq!(as_count(Some(&json!(null))), None);
    }
}
