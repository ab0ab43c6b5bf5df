//! Typed document values and the rules for turning raw input into storable form.
//!
//! Raw input arrives as [`bson::Bson`] (or JSON through [`normalize_json`]) and is
//! converted into a [`Value`] tree by [`normalize`]. Normalization never mutates the
//! caller's data and rejects a document wholesale when it:
//!
//! - contains `Bson::Undefined` anywhere in its object graph
//!   ([`DocumentStoreError::ContainsUnassignedField`], listing every offending path),
//! - contains an array directly inside another array ([`DocumentStoreError::NestedArray`]),
//! - contains a raw type without a [`Value`] counterpart such as binary data
//!   ([`DocumentStoreError::UnsupportedValue`]).
//!
//! Every date-like input (`Bson::DateTime`, `Bson::Timestamp`) becomes a [`Timestamp`].

use std::fmt;

use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

// 2^53, the largest range in which every integer is an exact f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Ordered field map of an object value. Field order follows insertion order.
pub type Map = IndexMap<String, Value>;

/// An opaque point in time, comparable and orderable by its instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }

    pub fn from_date(date: DateTime<Utc>) -> Self {
        Timestamp(date)
    }

    /// Builds a timestamp from milliseconds since the Unix epoch.
    ///
    /// Returns `None` when the value is outside the representable range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Timestamp)
    }

    pub fn to_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn to_date(&self) -> DateTime<Utc> {
        self.0
    }

    /// Whole seconds since the Unix epoch.
    pub fn seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Sub-second part of the instant in nanoseconds.
    pub fn nanoseconds(&self) -> u32 {
        self.0.timestamp_subsec_nanos()
    }

    pub fn to_bson(&self) -> Bson {
        Bson::DateTime(bson::DateTime::from_chrono(self.0))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(date: DateTime<Utc>) -> Self {
        Timestamp(date)
    }
}

impl From<bson::DateTime> for Timestamp {
    fn from(date: bson::DateTime) -> Self {
        Timestamp(date.to_chrono())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Timestamp,
    String,
    Array,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Timestamp => "timestamp",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };

        f.write_str(name)
    }
}

/// A typed, recursive document value.
///
/// `Array` never directly contains another `Array` once a value has gone through
/// [`normalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Timestamp(Timestamp),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    /// Returns the type tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Value::Timestamp(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Converts this value back into BSON. Integral numbers within the exactly
    /// representable range become 64-bit integers, other numbers doubles. Timestamps
    /// become BSON date-times (millisecond precision).
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::Bool(value) => Bson::Boolean(*value),
            Value::Number(value) if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER => {
                Bson::Int64(*value as i64)
            }
            Value::Number(value) => Bson::Double(*value),
            Value::String(value) => Bson::String(value.clone()),
            Value::Timestamp(value) => value.to_bson(),
            Value::Array(values) => Bson::Array(values.iter().map(Value::to_bson).collect()),
            Value::Object(map) => Bson::Document(map_to_bson(map)),
        }
    }

    /// Converts this value into JSON. Timestamps are rendered as RFC 3339 strings.
    pub fn to_json(&self) -> DocumentStoreResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Converts an object map into a BSON document, keeping field order.
pub fn map_to_bson(map: &Map) -> BsonDocument {
    map.iter()
        .map(|(key, value)| (key.clone(), value.to_bson()))
        .collect()
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

/// Normalizes a raw value into a storable [`Value`].
///
/// # Errors
///
/// Fails with [`DocumentStoreError::ContainsUnassignedField`] if any field is
/// `Bson::Undefined`, [`DocumentStoreError::NestedArray`] if an array holds another
/// array, and [`DocumentStoreError::UnsupportedValue`] for raw types with no
/// [`Value`] counterpart.
pub fn normalize(raw: &Bson) -> DocumentStoreResult<Value> {
    Normalizer::strict().run(raw)
}

/// Normalizes a raw document into an object map. See [`normalize`].
pub fn normalize_document(raw: &BsonDocument) -> DocumentStoreResult<Map> {
    let mut normalizer = Normalizer::strict();
    let map = normalizer.visit_document("", raw)?;
    normalizer.finish()?;

    Ok(map)
}

/// Normalizes a JSON value. JSON has no dates, so no timestamps are produced.
pub fn normalize_json(raw: &serde_json::Value) -> DocumentStoreResult<Value> {
    normalize(&json_to_bson(raw))
}

/// Normalizes a query operand.
///
/// Unlike [`normalize`], arrays of arrays are accepted so list operators can
/// carry array members; unassigned values are still rejected.
pub fn normalize_operand(raw: &Bson) -> DocumentStoreResult<Value> {
    Normalizer {
        allow_nested_arrays: true,
        ..Normalizer::strict()
    }
    .run(raw)
}

fn json_to_bson(raw: &serde_json::Value) -> Bson {
    match raw {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(value) => Bson::Boolean(*value),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(value) => Bson::Int64(value),
            None => Bson::Double(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(value) => Bson::String(value.clone()),
        serde_json::Value::Array(values) => Bson::Array(values.iter().map(json_to_bson).collect()),
        serde_json::Value::Object(map) => Bson::Document(
            map.iter()
                .map(|(key, value)| (key.clone(), json_to_bson(value)))
                .collect()
        ),
    }
}

struct Normalizer {
    allow_nested_arrays: bool,
    unassigned: Vec<String>,
    nested_array: Option<String>,
}

impl Normalizer {
    fn strict() -> Self {
        Self {
            allow_nested_arrays: false,
            unassigned: Vec::new(),
            nested_array: None,
        }
    }

    fn run(mut self, raw: &Bson) -> DocumentStoreResult<Value> {
        let value = self.visit("", raw, false)?;
        self.finish()?;

        Ok(value)
    }

    // Unassigned fields are reported before nested arrays.
    fn finish(self) -> DocumentStoreResult<()> {
        if !self.unassigned.is_empty() {
            return Err(DocumentStoreError::ContainsUnassignedField(self.unassigned));
        }

        if let Some(path) = self.nested_array {
            return Err(DocumentStoreError::NestedArray(path));
        }

        Ok(())
    }

    fn visit(&mut self, path: &str, raw: &Bson, in_array: bool) -> DocumentStoreResult<Value> {
        Ok(match raw {
            Bson::Undefined => {
                self.unassigned.push(display_path(path));
                Value::Null
            }
            Bson::Null => Value::Null,
            Bson::Boolean(value) => Value::Bool(*value),
            Bson::Int32(value) => Value::Number(*value as f64),
            Bson::Int64(value) => Value::Number(*value as f64),
            Bson::Double(value) => Value::Number(*value),
            Bson::String(value) => Value::String(value.clone()),
            Bson::Symbol(value) => Value::String(value.clone()),
            Bson::DateTime(value) => Value::Timestamp(Timestamp::from(*value)),
            Bson::Timestamp(value) => {
                let date = Utc
                    .timestamp_opt(value.time as i64, 0)
                    .single()
                    .ok_or_else(|| DocumentStoreError::UnsupportedValue(display_path(path), "timestamp".to_string()))?;

                Value::Timestamp(Timestamp(date))
            }
            Bson::Array(values) => {
                if in_array && !self.allow_nested_arrays && self.nested_array.is_none() {
                    self.nested_array = Some(display_path(path));
                }

                let mut items = Vec::with_capacity(values.len());
                for (index, value) in values.iter().enumerate() {
                    items.push(self.visit(&format!("{path}[{index}]"), value, true)?);
                }

                Value::Array(items)
            }
            Bson::Document(document) => Value::Object(self.visit_document(path, document)?),
            other => {
                return Err(DocumentStoreError::UnsupportedValue(
                    display_path(path),
                    format!("{:?}", other.element_type()),
                ));
            }
        })
    }

    fn visit_document(&mut self, path: &str, document: &BsonDocument) -> DocumentStoreResult<Map> {
        let mut map = Map::with_capacity(document.len());

        for (key, value) in document {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };

            map.insert(key.clone(), self.visit(&child, value, false)?);
        }

        Ok(map)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    #[test]
    fn scalars_and_nested_objects_keep_their_values() {
        let raw = doc! { "a": "1", "b": 2, "c": true, "d": null, "e": { "f": { "g": "WOWZA" } } };
        let map = normalize_document(&raw).unwrap();

        assert_eq!(map["a"], Value::from("1"));
        assert_eq!(map["b"], Value::Number(2.0));
        assert_eq!(map["c"], Value::Bool(true));
        assert_eq!(map["d"], Value::Null);
        assert_eq!(
            map["e"].as_object().unwrap()["f"].as_object().unwrap()["g"],
            Value::from("WOWZA")
        );
    }

    #[test]
    fn dates_become_timestamps_at_any_depth() {
        let now = chrono::Utc::now();
        let raw = doc! {
            "date": now,
            "list": ["a", now],
            "nested": { "inner": now, "objects": [{ "deep": now }] },
        };
        let map = normalize_document(&raw).unwrap();
        let millis = now.timestamp_millis();

        assert_eq!(map["date"].as_timestamp().unwrap().to_millis(), millis);
        assert_eq!(map["list"].as_array().unwrap()[1].as_timestamp().unwrap().to_millis(), millis);

        let nested = map["nested"].as_object().unwrap();
        assert_eq!(nested["inner"].as_timestamp().unwrap().to_millis(), millis);

        let deep = nested["objects"].as_array().unwrap()[0].as_object().unwrap();
        assert_eq!(deep["deep"].as_timestamp().unwrap().to_millis(), millis);
    }

    #[test]
    fn unassigned_fields_are_all_reported() {
        let raw = doc! { "date": Bson::Undefined, "ok": 1, "inner": { "missing": Bson::Undefined } };

        assert_eq!(
            normalize_document(&raw),
            Err(DocumentStoreError::ContainsUnassignedField(vec![
                "date".to_string(),
                "inner.missing".to_string(),
            ]))
        );
    }

    #[test]
    fn nested_arrays_are_rejected() {
        let raw = doc! { "a": { "b": [["1"]] } };

        assert_eq!(
            normalize_document(&raw),
            Err(DocumentStoreError::NestedArray("a.b[0]".to_string()))
        );
    }

    #[test]
    fn arrays_inside_objects_inside_arrays_are_allowed() {
        let raw = doc! { "a": [{ "b": ["1", 2] }, "1", 2, null] };

        assert!(normalize_document(&raw).is_ok());
    }

    #[test]
    fn null_is_kept_distinct_from_unassigned() {
        let map = normalize_document(&doc! { "a": null }).unwrap();

        assert!(map["a"].is_null());
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let raw = doc! { "id": bson::oid::ObjectId::new() };

        assert!(matches!(
            normalize_document(&raw),
            Err(DocumentStoreError::UnsupportedValue(path, _)) if path == "id"
        ));
    }

    #[test]
    fn operands_may_hold_arrays_of_arrays() {
        let raw = bson!([["a"], ["b"]]);

        assert!(normalize_operand(&raw).is_ok());
        assert!(matches!(normalize(&raw), Err(DocumentStoreError::NestedArray(_))));
    }

    #[test]
    fn input_is_left_untouched() {
        let now = chrono::Utc::now();
        let raw = doc! { "date": now };
        let before = raw.clone();

        normalize_document(&raw).unwrap();

        assert_eq!(raw, before);
    }

    #[test]
    fn json_input_is_normalized() {
        let raw = serde_json::json!({ "a": 1, "b": ["x", 2.5], "c": { "d": null } });
        let value = normalize_json(&raw).unwrap();
        let map = value.as_object().unwrap();

        assert_eq!(map["a"], Value::Number(1.0));
        assert_eq!(map["b"], Value::Array(vec![Value::from("x"), Value::Number(2.5)]));
        assert_eq!(value.to_json().unwrap(), serde_json::json!({ "a": 1.0, "b": ["x", 2.5], "c": { "d": null } }));
    }

    #[test]
    fn timestamps_round_trip_through_millis() {
        let timestamp = Timestamp::from_millis(1_700_000_000_123).unwrap();

        assert_eq!(timestamp.to_millis(), 1_700_000_000_123);
        assert_eq!(timestamp.seconds(), 1_700_000_000);
        assert_eq!(timestamp.nanoseconds(), 123_000_000);
    }
}
