//! Change events from the DynamoDB stream.
//!
//! The stream delivers batches of records shaped like:
//! ```text
//! {"Records": [{"eventName": "INSERT", "dynamodb": {"NewImage": {"id": {"S": "1"}}}}]}
//! ```
//!
//! `ChangeNormalizer` turns one such batch into canonical records, keeping
//! input order and dropping REMOVE events.

mod normalizer;
mod value;

pub use normalizer::ChangeNormalizer;
pub use value::{
    record_to_json, AttributeValue, CanonicalRecord, CanonicalValue, UnrepresentableNumber,
};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while decoding a stream batch.
///
/// Every variant is a contract violation from upstream. None of them are
/// retryable: the same batch will fail the same way.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Unexpected eventName {name:?} at record {index}")]
    UnexpectedOperation { index: usize, name: String },

    #[error("{operation} record {index} has no NewImage")]
    MissingNewImage { index: usize, operation: Operation },

    #[error("Invalid number {value:?} at {path}")]
    InvalidNumber { path: String, value: String },

    #[error("Invalid base64 binary at {path}: {reason}")]
    InvalidBinary { path: String, reason: String },
}

/// Result type for normalization.
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Mutation kind carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Modify,
    Remove,
}

impl Operation {
    /// Name as it appears in the stream's `eventName` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Modify => "MODIFY",
            Operation::Remove => "REMOVE",
        }
    }

    /// Whether this operation produces a staged row.
    pub fn carries_image(&self) -> bool {
        matches!(self, Operation::Insert | Operation::Modify)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(Operation::Insert),
            "MODIFY" => Ok(Operation::Modify),
            "REMOVE" => Ok(Operation::Remove),
            other => Err(other.to_string()),
        }
    }
}

/// Attribute name to typed value, as found in `NewImage`.
pub type Item = HashMap<String, AttributeValue>;

/// One batch delivered by the stream trigger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

/// One raw record of a stream batch.
///
/// `event_name` is kept as text so unknown operations can be reported with
/// the name upstream actually sent.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(default)]
    pub dynamodb: StreamImage,
}

/// The `dynamodb` section of a stream record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamImage {
    #[serde(rename = "NewImage", default)]
    pub new_image: Option<Item>,
    #[serde(rename = "SequenceNumber", default)]
    pub sequence_number: Option<String>,
}

/// A validated change event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub operation: Operation,
    pub new_image: Option<Item>,
}

impl ChangeRecord {
    /// Validate a raw stream record at position `index` of its batch.
    pub fn from_stream(index: usize, record: &StreamRecord) -> Result<Self> {
        let operation = record.event_name.parse::<Operation>().map_err(|name| {
            NormalizeError::UnexpectedOperation { index, name }
        })?;

        if operation.carries_image() && record.dynamodb.new_image.is_none() {
            return Err(NormalizeError::MissingNewImage { index, operation });
        }

        Ok(Self {
            operation,
            new_image: record.dynamodb.new_image.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse() {
        assert_eq!("INSERT".parse::<Operation>(), Ok(Operation::Insert));
        assert_eq!("MODIFY".parse::<Operation>(), Ok(Operation::Modify));
        assert_eq!("REMOVE".parse::<Operation>(), Ok(Operation::Remove));
        assert_eq!("insert".parse::<Operation>(), Err("insert".to_string()));
    }

    #[test]
    fn test_operation_carries_image() {
        assert!(Operation::Insert.carries_image());
        assert!(Operation::Modify.carries_image());
        assert!(!Operation::Remove.carries_image());
    }

    #[test]
    fn test_stream_event_deserialize() {
        let json = r#"{
            "Records": [
                {
                    "eventID": "abc",
                    "eventName": "INSERT",
                    "eventSource": "aws:dynamodb",
                    "dynamodb": {
                        "Keys": {"id": {"S": "1"}},
                        "NewImage": {"id": {"S": "1"}, "price": {"N": "10.5"}},
                        "SequenceNumber": "111",
                        "StreamViewType": "NEW_IMAGE"
                    }
                },
                {
                    "eventName": "REMOVE",
                    "dynamodb": {"Keys": {"id": {"S": "2"}}}
                }
            ]
        }"#;

        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.records.len(), 2);
        assert_eq!(event.records[0].event_name, "INSERT");
        assert_eq!(event.records[0].event_id.as_deref(), Some("abc"));
        assert_eq!(
            event.records[0].dynamodb.sequence_number.as_deref(),
            Some("111")
        );
        let image = event.records[0].dynamodb.new_image.as_ref().unwrap();
        assert_eq!(image.get("price"), Some(&AttributeValue::N("10.5".into())));
        assert!(event.records[1].dynamodb.new_image.is_none());
    }

    #[test]
    fn test_stream_event_without_records() {
        let event: StreamEvent = serde_json::from_str("{}").unwrap();
        assert!(event.records.is_empty());
    }

    #[test]
    fn test_change_record_unknown_operation() {
        let record = StreamRecord {
            event_id: None,
            event_name: "TRUNCATE".to_string(),
            dynamodb: StreamImage::default(),
        };

        let err = ChangeRecord::from_stream(3, &record).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::UnexpectedOperation { index: 3, ref name } if name == "TRUNCATE"
        ));
        assert!(err.to_string().contains("TRUNCATE"));
    }

    #[test]
    fn test_change_record_insert_without_image() {
        let record = StreamRecord {
            event_id: None,
            event_name: "MODIFY".to_string(),
            dynamodb: StreamImage::default(),
        };

        let err = ChangeRecord::from_stream(0, &record).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MissingNewImage {
                index: 0,
                operation: Operation::Modify
            }
        ));
    }

    #[test]
    fn test_change_record_remove_without_image() {
        let record = StreamRecord {
            event_id: None,
            event_name: "REMOVE".to_string(),
            dynamodb: StreamImage::default(),
        };

        let change = ChangeRecord::from_stream(0, &record).unwrap();
        assert_eq!(change.operation, Operation::Remove);
        assert!(change.new_image.is_none());
    }
}
