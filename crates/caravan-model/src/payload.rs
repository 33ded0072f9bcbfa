//! Typed per-object payload blobs
//!
//! Each packaged dependency ships one or more [`Payload`]s in the archive.
//! The payload-type set is closed per exporter version but must stay
//! forward compatible: readers skip types they do not know.

use serde::{Deserialize, Serialize};

/// Payload blob classification
///
/// Readers built before a new variant existed deserialize it as
/// [`PayloadType::Unknown`] and skip the payload instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadType {
    /// Structured record XML (the object's primary fields)
    StructuredRecord,
    /// Raw table-row snapshot (child rows shipped alongside the record)
    TableSnapshot,
    /// Raw resource bytes (files restored to a filesystem path)
    RawResource,
    /// Generated metadata XML
    GeneratedMetadata,
    /// Written by a newer exporter; skipped on read
    #[serde(other)]
    Unknown,
}

impl PayloadType {
    /// Stable tag, used in diagnostics
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StructuredRecord => "structured_record",
            Self::TableSnapshot => "table_snapshot",
            Self::RawResource => "raw_resource",
            Self::GeneratedMetadata => "generated_metadata",
            Self::Unknown => "unknown",
        }
    }
}

/// One typed blob belonging to exactly one dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub payload_type: PayloadType,
    /// Raw bytes; hex in the JSON archive so documents stay diffable
    #[serde(with = "hex_bytes")]
    pub content: Vec<u8>,
    /// Relative path hint for resources restored to a filesystem path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_location: Option<String>,
}

impl Payload {
    /// Create a payload with no location hint
    pub fn new(payload_type: PayloadType, content: impl Into<Vec<u8>>) -> Self {
        Self {
            payload_type,
            content: content.into(),
            original_location: None,
        }
    }

    /// Attach the filesystem location hint
    #[inline]
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.original_location = Some(location.into());
        self
    }
}

/// Hex serde adapter for payload bytes
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_bytes_round_trip() {
        let payload = Payload::new(PayloadType::RawResource, vec![0u8, 1, 2, 255])
            .with_location("themes/default/logo.png");
        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn payload_bytes_hex_encoded() {
        let payload = Payload::new(PayloadType::StructuredRecord, b"<r/>".to_vec());
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(&hex::encode(b"<r/>")));
    }

    #[test]
    fn unknown_payload_type_deserializes() {
        let back: PayloadType = serde_json::from_str("\"holographic_record\"").unwrap();
        assert_eq!(back, PayloadType::Unknown);
    }

    #[test]
    fn known_payload_types_stable() {
        let json = serde_json::to_string(&PayloadType::TableSnapshot).unwrap();
        assert_eq!(json, "\"table_snapshot\"");
    }
}
