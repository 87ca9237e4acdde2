// Copyright 2025 Cowboy AI, LLC.

//! Event envelope wire record
//!
//! The envelope is the unit of push/pop traffic on the bus and the unit of
//! dispatch inside the runtime. All bus consumers, kernel or not,
//! interoperate through this record: camelCase field names, RFC 3339 UTC
//! timestamps with millisecond precision, opaque string ids.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire-format version stamped on every envelope this kernel produces.
pub const ENVELOPE_VERSION: u32 = 1;

fn envelope_version() -> u32 {
    ENVELOPE_VERSION
}

/// Current time truncated to the millisecond precision of the wire format,
/// so an envelope compares equal to its own serialization round trip.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// The wire record carrying one event instance across the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Name of the event this envelope carries
    pub event_name: String,

    /// Envelope format version
    #[serde(default = "envelope_version")]
    pub version: u32,

    /// Fresh unique id of this envelope
    pub event_id: String,

    /// Cross-cutting id carried through the causal chain; minted when absent
    #[serde(default)]
    pub trace_id: String,

    /// Opaque id tying envelopes belonging to one saga instance
    pub correlation_id: String,

    /// When the event occurred, UTC with millisecond precision
    #[serde(with = "rfc3339_millis")]
    #[schemars(with = "String")]
    pub occurred_at: DateTime<Utc>,

    /// Id of the envelope that caused this one, absent for root events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// Opaque event payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Create a root envelope: fresh event and trace ids, no causation.
    pub fn root(
        event_name: impl Into<String>,
        correlation_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            version: ENVELOPE_VERSION,
            event_id: Uuid::new_v4().to_string(),
            trace_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            occurred_at: now_millis(),
            causation_id: None,
            data,
        }
    }

    /// Derive an outbound envelope from this one: the correlation id is
    /// carried through, the trace id is carried through or minted when
    /// empty, and the new envelope's causation id is this envelope's
    /// event id.
    pub fn follow_from(
        &self,
        event_name: impl Into<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let trace_id = if self.trace_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.trace_id.clone()
        };
        Self {
            event_name: event_name.into(),
            version: ENVELOPE_VERSION,
            event_id: Uuid::new_v4().to_string(),
            trace_id,
            correlation_id: self.correlation_id.clone(),
            occurred_at: now_millis(),
            causation_id: Some(self.event_id.clone()),
            data: serde_json::Value::Object(data),
        }
    }

    /// The payload as a record, treating arrays, scalars and null as `{}`.
    pub fn data_record(&self) -> serde_json::Map<String, serde_json::Value> {
        match &self.data {
            serde_json::Value::Object(record) => record.clone(),
            _ => serde_json::Map::new(),
        }
    }
}

/// RFC 3339 UTC serialization with millisecond precision.
mod rfc3339_millis {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
