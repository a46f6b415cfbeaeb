//! The wire envelope exchanged with the message-bus bridge.

use crate::types;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message on the bus: routing metadata around an opaque body.
///
/// Wire field names are PascalCase, matching what the bridge emits and
/// accepts. Only `MessageType` and `Message` are required on inbound frames;
/// the rest default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    /// Originator id.
    #[serde(default)]
    pub sender: String,
    /// Addressee ids; empty means unaddressed (broadcast).
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Namespaced operation name, e.g. `/Script/AvalancheMediaEditor.AvaRundownPing`.
    pub message_type: String,
    /// Routing scope; always `"Network"` outbound.
    #[serde(default)]
    pub scope: String,
    /// Unix seconds after which the call is considered dead.
    #[serde(default)]
    pub expiration: u64,
    /// Unix seconds at send time.
    #[serde(default)]
    pub time_sent: u64,
    /// Request or reply body.
    pub message: Map<String, Value>,
}

impl Envelope {
    /// Build an outbound request.
    ///
    /// Writes `request_id` into the body as `RequestId` next to the caller's
    /// payload fields and stamps `Expiration` as `now + timeout_secs`,
    /// saturating.
    pub fn request(
        message_type: impl Into<String>,
        payload: Map<String, Value>,
        sender: impl Into<String>,
        recipients: Vec<String>,
        request_id: u64,
        now: u64,
        timeout_secs: u64,
    ) -> Self {
        let mut message = payload;
        message.insert("RequestId".to_string(), Value::from(request_id));
        Self {
            sender: sender.into(),
            recipients,
            message_type: message_type.into(),
            scope: types::SCOPE_NETWORK.to_string(),
            expiration: now.saturating_add(timeout_secs),
            time_sent: now,
            message,
        }
    }

    /// Serialize to the compact JSON text the transport sends.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an inbound text frame.
    pub fn decode(text: &str) -> Result<Self, MalformedMessage> {
        Ok(serde_json::from_str(text)?)
    }

    /// The request id this envelope carries or answers, if any.
    ///
    /// Outbound bodies spell it `RequestId`; the bridge replies with
    /// `requestId`. Both are accepted.
    pub fn request_id(&self) -> Option<u64> {
        self.message
            .get("requestId")
            .or_else(|| self.message.get("RequestId"))
            .and_then(Value::as_u64)
    }

    /// Deserialize the body into a typed payload.
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, MalformedMessage> {
        Ok(serde_json::from_value(Value::Object(self.message.clone()))?)
    }
}

/// An inbound frame that could not be understood.
#[derive(Debug, thiserror::Error)]
#[error("malformed message: {0}")]
pub struct MalformedMessage(#[from] serde_json::Error);
