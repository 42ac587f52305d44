//! Conventional message envelope.
//!
//! Peers exchange objects of the form `{"Type": "...", "Payload": ...}`.
//! Older peers call the payload field `"Text"`; both spellings decode, and
//! `"Payload"` is always written. The transport itself does not require this
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message kinds the line client understands.
pub mod kind {
    pub const UNAME: &str = "uname";
    pub const CMD: &str = "cmd";
    pub const TXT: &str = "txt";
    pub const LOGOUT: &str = "logout";
}

/// A typed `{Type, Payload}` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Payload", alias = "Text", default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Envelope carrying a plain string payload.
    pub fn text(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(kind, Value::String(text.into()))
    }

    /// The payload if it is a string.
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_str()
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl TryFrom<Value> for Envelope {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::text(kind::CMD, "look north");

        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"Type":"cmd","Payload":"look north"}"#
        );
    }

    #[test]
    fn test_envelope_accepts_text_alias() {
        let envelope = Envelope::try_from(json!({"Type": "txt", "Text": "Hello."})).unwrap();

        assert_eq!(envelope, Envelope::text("txt", "Hello."));
        assert_eq!(envelope.payload_str(), Some("Hello."));
        assert!(envelope.is(kind::TXT));
    }

    #[test]
    fn test_envelope_structured_payload() {
        let envelope = Envelope::try_from(json!({"Type": "stats", "Payload": {"hp": 10}})).unwrap();

        assert_eq!(envelope.payload["hp"], 10);
        assert_eq!(envelope.payload_str(), None);
    }

    #[test]
    fn test_envelope_missing_payload_is_null() {
        let envelope = Envelope::try_from(json!({"Type": "logout"})).unwrap();

        assert_eq!(envelope.payload, Value::Null);
    }

    #[test]
    fn test_envelope_requires_type() {
        assert!(Envelope::try_from(json!({"Payload": "x"})).is_err());
        assert!(Envelope::try_from(json!("just a string")).is_err());
    }
}
