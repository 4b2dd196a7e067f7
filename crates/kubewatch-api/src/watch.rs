//! Decoding of streamed watch records.
//!
//! Each record on a watch stream is one JSON object on its own line:
//! `{"type": "ADDED", "object": {...}}`. The server spells the type in upper
//! case; `Added`/`added` are accepted as well.

use crate::ApiError;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
            EventType::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "ADDED" => Ok(EventType::Added),
            "MODIFIED" => Ok(EventType::Modified),
            "DELETED" => Ok(EventType::Deleted),
            "ERROR" => Ok(EventType::Error),
            _ => Err(de::Error::unknown_variant(
                &raw,
                &["ADDED", "MODIFIED", "DELETED", "ERROR"],
            )),
        }
    }
}

/// Server-side failure carried by an `ERROR` record (e.g. "too old resource version").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message.as_deref().unwrap_or("no message");
        match (self.code, self.reason.as_deref()) {
            (Some(code), Some(reason)) => write!(f, "{code} {reason}: {message}"),
            (Some(code), None) => write!(f, "{code}: {message}"),
            (None, Some(reason)) => write!(f, "{reason}: {message}"),
            (None, None) => f.write_str(message),
        }
    }
}

/// One decoded watch record.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchRecord<T> {
    Added(T),
    Modified(T),
    Deleted(T),
    Error(Status),
}

impl<T> WatchRecord<T> {
    pub fn event_type(&self) -> EventType {
        match self {
            WatchRecord::Added(_) => EventType::Added,
            WatchRecord::Modified(_) => EventType::Modified,
            WatchRecord::Deleted(_) => EventType::Deleted,
            WatchRecord::Error(_) => EventType::Error,
        }
    }
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    object: Value,
}

/// Decode a single line of a watch stream.
pub fn decode_watch_record<T: DeserializeOwned>(line: &[u8]) -> Result<WatchRecord<T>, ApiError> {
    let raw: RawRecord = serde_json::from_slice(line).map_err(ApiError::InvalidRecord)?;
    let object = |value: Value| -> Result<T, ApiError> {
        serde_json::from_value(value).map_err(|source| ApiError::InvalidObject {
            kind: std::any::type_name::<T>(),
            source,
        })
    };
    match raw.event_type {
        EventType::Added => object(raw.object).map(WatchRecord::Added),
        EventType::Modified => object(raw.object).map(WatchRecord::Modified),
        EventType::Deleted => object(raw.object).map(WatchRecord::Deleted),
        EventType::Error => Ok(WatchRecord::Error(
            serde_json::from_value(raw.object).unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{Pod, PodPhase};

    #[test]
    fn decodes_modified_pod_record() {
        let line = br#"{"type":"MODIFIED","object":{"metadata":{"name":"p","resourceVersion":"7"},"status":{"phase":"Running"}}}"#;
        let record: WatchRecord<Pod> = decode_watch_record(line).unwrap();
        assert_eq!(record.event_type(), EventType::Modified);
        let WatchRecord::Modified(pod) = record else {
            panic!("expected Modified");
        };
        assert_eq!(pod.phase(), Some(PodPhase::Running));
        assert_eq!(pod.metadata.resource_version, "7");
    }

    #[test]
    fn event_type_is_case_insensitive() {
        let line = br#"{"type":"Added","object":{"metadata":{"name":"p"}}}"#;
        let record: WatchRecord<Pod> = decode_watch_record(line).unwrap();
        assert_eq!(record.event_type(), EventType::Added);
    }

    #[test]
    fn error_record_carries_status() {
        let line = br#"{"type":"ERROR","object":{"kind":"Status","code":410,"reason":"Gone","message":"too old resource version"}}"#;
        let record: WatchRecord<Pod> = decode_watch_record(line).unwrap();
        let WatchRecord::Error(status) = record else {
            panic!("expected Error");
        };
        assert_eq!(status.code, Some(410));
        assert_eq!(status.to_string(), "410 Gone: too old resource version");
    }

    #[test]
    fn malformed_json_is_invalid_record() {
        let err = decode_watch_record::<Pod>(b"{\"type\":").unwrap_err();
        assert!(matches!(err, ApiError::InvalidRecord(_)));
    }

    #[test]
    fn unknown_event_type_is_invalid_record() {
        let err = decode_watch_record::<Pod>(br#"{"type":"BOOKMARKED","object":{}}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRecord(_)));
    }

    #[test]
    fn wrong_object_shape_is_invalid_object() {
        let err = decode_watch_record::<Pod>(br#"{"type":"ADDED","object":{"metadata":"oops"}}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidObject { .. }));
        assert!(err.to_string().contains("Pod"));
    }

    #[test]
    fn event_type_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&EventType::Deleted).unwrap(), "\"DELETED\"");
    }
}
