//! Lenient conversion of wizard input.
//!
//! Form fields arrive as whatever the browser had: empty strings for unset
//! selects, numbers as strings, stale enum labels. None of these are errors.
//! Id fields and numbers that do not parse become `None`; enum fields fall
//! back to their default.
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use super::model::TextEnum;

/// A foreign-key id. Only positive integers survive.
pub fn fk_id(value: &Value) -> Option<i64> {
    integer(value).filter(|id| *id > 0)
}

pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
}

/// `integer` narrowed to `i32`; out-of-range values are dropped.
pub fn small_integer(value: &Value) -> Option<i32> {
    integer(value).and_then(|n| i32::try_from(n).ok())
}

/// Trimmed text; blanks become `None`.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

pub fn enumeration<E: TextEnum>(value: &Value) -> E {
    value.as_str().map(E::parse_or_default).unwrap_or_default()
}

/// Arrays of ids, or a comma-separated string. Invalid entries are skipped.
pub fn id_list(value: &Value) -> Vec<i64> {
    match value {
        Value::Array(items) => items.iter().filter_map(fk_id).collect(),
        Value::String(s) => s
            .split(',')
            .filter_map(|part| fk_id(&Value::String(part.to_string())))
            .collect(),
        other => fk_id(other).into_iter().collect(),
    }
}

pub fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        Value::String(s) => s
            .split(',')
            .filter_map(|part| text(&Value::String(part.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

/// Enum lists keep only recognised labels.
pub fn enum_list<E: TextEnum>(value: &Value) -> Vec<E> {
    text_list(value)
        .iter()
        .filter_map(|s| E::parse_text(s))
        .collect()
}

/// `deserialize_with` adapters.
///
/// Each is only invoked when the key is present, so the outer `Option`
/// distinguishes "leave unchanged" (absent) from "set" (present, even if the
/// coerced value is `None`).
pub mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::domain::model::TextEnum;

    fn raw<'de, D: Deserializer<'de>>(d: D) -> Result<Value, D::Error> {
        Value::deserialize(d)
    }

    pub fn fk_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<i64>>, D::Error> {
        Ok(Some(super::fk_id(&raw(d)?)))
    }

    pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<i64>>, D::Error> {
        Ok(Some(super::integer(&raw(d)?)))
    }

    pub fn small_integer<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Option<i32>>, D::Error> {
        Ok(Some(super::small_integer(&raw(d)?)))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<String>>, D::Error> {
        Ok(Some(super::text(&raw(d)?)))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<bool>>, D::Error> {
        Ok(Some(super::flag(&raw(d)?)))
    }

    pub fn date<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Option<chrono::NaiveDate>>, D::Error> {
        Ok(Some(super::date(&raw(d)?)))
    }

    pub fn enumeration<'de, D, E>(d: D) -> Result<Option<E>, D::Error>
    where
        D: Deserializer<'de>,
        E: TextEnum,
    {
        Ok(Some(super::enumeration(&raw(d)?)))
    }

    pub fn id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<i64>>, D::Error> {
        Ok(Some(super::id_list(&raw(d)?)))
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
        Ok(Some(super::text_list(&raw(d)?)))
    }

    pub fn enum_list<'de, D, E>(d: D) -> Result<Option<Vec<E>>, D::Error>
    where
        D: Deserializer<'de>,
        E: TextEnum,
    {
        Ok(Some(super::enum_list(&raw(d)?)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::model::{MaritalStatus, Visibility};

    #[test]
    fn fk_ids_drop_blank_and_garbage() {
        assert_eq!(fk_id(&json!("")), None);
        assert_eq!(fk_id(&json!("  ")), None);
        assert_eq!(fk_id(&json!(null)), None);
        assert_eq!(fk_id(&json!("abc")), None);
        assert_eq!(fk_id(&json!(0)), None);
        assert_eq!(fk_id(&json!(-4)), None);
        assert_eq!(fk_id(&json!("12")), Some(12));
        assert_eq!(fk_id(&json!(12)), Some(12));
        assert_eq!(fk_id(&json!({"id": 3})), None);
    }

    #[test]
    fn integers_accept_numeric_strings() {
        assert_eq!(integer(&json!("170")), Some(170));
        assert_eq!(integer(&json!("170.6")), Some(171));
        assert_eq!(integer(&json!("abc")), None);
        assert_eq!(integer(&json!(true)), None);
        assert_eq!(small_integer(&json!(5_000_000_000_i64)), None);
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(text(&json!("  Pune ")), Some("Pune".into()));
        assert_eq!(text(&json!("")), None);
        assert_eq!(text(&json!(5)), Some("5".into()));
        assert_eq!(text(&json!(["x"])), None);
    }

    #[test]
    fn enums_fall_back_to_default() {
        assert_eq!(enumeration::<Visibility>(&json!("Public")), Visibility::Public);
        assert_eq!(enumeration::<Visibility>(&json!("Everyone")), Visibility::MembersOnly);
        assert_eq!(enumeration::<Visibility>(&json!(3)), Visibility::MembersOnly);
        assert_eq!(
            enumeration::<MaritalStatus>(&json!("Single")),
            MaritalStatus::NeverMarried
        );
    }

    #[test]
    fn dates_accept_plain_and_rfc3339() {
        let expected = NaiveDate::from_ymd_opt(1996, 2, 29);
        assert_eq!(date(&json!("1996-02-29")), expected);
        assert_eq!(date(&json!("1996-02-29T00:00:00.000Z")), expected);
        assert_eq!(date(&json!("29/02/1996")), None);
    }

    #[test]
    fn lists_skip_invalid_entries() {
        assert_eq!(id_list(&json!([1, "", "x", "4"])), vec![1, 4]);
        assert_eq!(id_list(&json!("2, 3,,z")), vec![2, 3]);
        assert_eq!(text_list(&json!(["a", " ", "b "])), vec!["a", "b"]);
        assert_eq!(
            enum_list::<MaritalStatus>(&json!(["Divorced", "Unknown"])),
            vec![MaritalStatus::Divorced]
        );
        assert!(flag(&json!("yes")).unwrap());
        assert_eq!(flag(&json!("maybe")), None);
    }
}
