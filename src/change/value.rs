//! Typed attribute values and their canonical form.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::{NormalizeError, Result};

/// A DynamoDB attribute value with its type descriptor.
///
/// Numbers and binaries stay in their wire text form here; decoding happens
/// in [`AttributeValue::to_canonical`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    M(HashMap<String, AttributeValue>),
    L(Vec<AttributeValue>),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    #[serde(rename = "BS")]
    BinarySet(Vec<String>),
}

/// Store-agnostic value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    String(String),
    Number(BigDecimal),
    Binary(Vec<u8>),
    List(Vec<CanonicalValue>),
    Map(CanonicalRecord),
    StringSet(Vec<String>),
    NumberSet(Vec<BigDecimal>),
    BinarySet(Vec<Vec<u8>>),
}

/// The normalized current values of one changed item.
pub type CanonicalRecord = BTreeMap<String, CanonicalValue>;

/// A decimal that has no finite floating point equivalent.
#[derive(Debug, Error)]
#[error("Number {0} has no finite float representation")]
pub struct UnrepresentableNumber(pub String);

fn parse_number(path: &str, text: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(text).map_err(|_| NormalizeError::InvalidNumber {
        path: path.to_string(),
        value: text.to_string(),
    })
}

fn parse_binary(path: &str, text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| NormalizeError::InvalidBinary {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

impl AttributeValue {
    /// Decode into a canonical value. `path` names the attribute in errors.
    pub fn to_canonical(&self, path: &str) -> Result<CanonicalValue> {
        Ok(match self {
            AttributeValue::S(s) => CanonicalValue::String(s.clone()),
            AttributeValue::N(n) => CanonicalValue::Number(parse_number(path, n)?),
            AttributeValue::B(b) => CanonicalValue::Binary(parse_binary(path, b)?),
            AttributeValue::Bool(b) => CanonicalValue::Bool(*b),
            AttributeValue::Null(_) => CanonicalValue::Null,
            AttributeValue::M(map) => CanonicalValue::Map(item_to_canonical(path, map)?),
            AttributeValue::L(items) => CanonicalValue::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v.to_canonical(&format!("{}[{}]", path, i)))
                    .collect::<Result<_>>()?,
            ),
            AttributeValue::StringSet(items) => CanonicalValue::StringSet(items.clone()),
            AttributeValue::NumberSet(items) => CanonicalValue::NumberSet(
                items
                    .iter()
                    .map(|n| parse_number(path, n))
                    .collect::<Result<_>>()?,
            ),
            AttributeValue::BinarySet(items) => CanonicalValue::BinarySet(
                items
                    .iter()
                    .map(|b| parse_binary(path, b))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Decode a whole item (or nested map) into a canonical record.
pub(crate) fn item_to_canonical(
    path: &str,
    item: &HashMap<String, AttributeValue>,
) -> Result<CanonicalRecord> {
    item.iter()
        .map(|(name, value)| -> Result<(String, CanonicalValue)> {
            let child = if path.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", path, name)
            };
            Ok((name.clone(), value.to_canonical(&child)?))
        })
        .collect()
}

fn number_to_json(n: &BigDecimal) -> std::result::Result<Value, UnrepresentableNumber> {
    // Lossy on purpose: Redshift's JSON 'auto' ingestion wants plain floats.
    // Parsing the decimal text rounds to the nearest float.
    n.to_string()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| UnrepresentableNumber(n.to_string()))
}

impl CanonicalValue {
    /// JSON form written to staged data files.
    ///
    /// Numbers become floats, binaries become base64 strings and sets become
    /// arrays.
    pub fn to_json(&self) -> std::result::Result<Value, UnrepresentableNumber> {
        Ok(match self {
            CanonicalValue::Null => Value::Null,
            CanonicalValue::Bool(b) => Value::Bool(*b),
            CanonicalValue::String(s) => Value::String(s.clone()),
            CanonicalValue::Number(n) => number_to_json(n)?,
            CanonicalValue::Binary(b) => Value::String(STANDARD.encode(b)),
            CanonicalValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(CanonicalValue::to_json)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            CanonicalValue::Map(record) => record_to_json(record)?,
            CanonicalValue::StringSet(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            CanonicalValue::NumberSet(items) => Value::Array(
                items
                    .iter()
                    .map(number_to_json)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            CanonicalValue::BinarySet(items) => Value::Array(
                items
                    .iter()
                    .map(|b| Value::String(STANDARD.encode(b)))
                    .collect(),
            ),
        })
    }
}

/// JSON object for one canonical record.
pub fn record_to_json(
    record: &CanonicalRecord,
) -> std::result::Result<Value, UnrepresentableNumber> {
    let mut object = Map::new();
    for (name, value) in record {
        object.insert(name.clone(), value.to_json()?);
    }
    Ok(Value::Object(object))
}
