//! Approve/reject callback decoding
//!
//! The approve button embeds a small JSON object; the reject button's
//! payload is the bare token `reject`, not JSON. Decoding tolerates both
//! shapes and folds everything unrecognized into [`CallbackAction::Unknown`].

use serde::Deserialize;

/// Payload carried by the reject button.
const REJECT_TOKEN: &str = "reject";

/// What an operator's button press asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Apply `repository:version` to the manifest and redeploy.
    Approve { repository: String, version: String },
    /// Leave the deployment alone.
    Reject,
    /// Anything that did not match a known payload shape.
    Unknown,
}

#[derive(Deserialize)]
struct WirePayload {
    a: String,
    #[serde(default)]
    i: Option<String>,
    #[serde(default)]
    v: Option<String>,
}

impl CallbackAction {
    /// Decodes a callback payload. Never fails: malformed JSON, unknown
    /// action codes, and missing fields all come back as `Unknown`.
    pub fn decode(payload: &str) -> Self {
        if payload.trim() == REJECT_TOKEN {
            return Self::Reject;
        }

        let wire: WirePayload = match serde_json::from_str(payload) {
            Ok(wire) => wire,
            Err(_) => return Self::Unknown,
        };

        match wire.a.as_str() {
            "approve" => match (wire.i, wire.v) {
                (Some(repository), Some(version)) => Self::Approve {
                    repository,
                    version,
                },
                _ => Self::Unknown,
            },
            "reject" => Self::Reject,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_approve_payload() {
        let action = CallbackAction::decode(r#"{"a":"approve","i":"acme/app","v":"2.0"}"#);
        assert_eq!(
            action,
            CallbackAction::Approve {
                repository: "acme/app".to_string(),
                version: "2.0".to_string(),
            }
        );
    }

    #[test]
    fn decodes_bare_reject_token() {
        assert_eq!(CallbackAction::decode("reject"), CallbackAction::Reject);
        assert_eq!(CallbackAction::decode(" reject "), CallbackAction::Reject);
    }

    #[test]
    fn decodes_json_reject() {
        assert_eq!(
            CallbackAction::decode(r#"{"a":"reject"}"#),
            CallbackAction::Reject
        );
    }

    #[test]
    fn unknown_action_code_is_unknown() {
        assert_eq!(
            CallbackAction::decode(r#"{"a":"snooze","i":"acme/app","v":"2.0"}"#),
            CallbackAction::Unknown
        );
    }

    #[test]
    fn malformed_payloads_are_unknown() {
        assert_eq!(CallbackAction::decode("not json at all"), CallbackAction::Unknown);
        assert_eq!(CallbackAction::decode(r#"{"a":"#), CallbackAction::Unknown);
        assert_eq!(CallbackAction::decode(""), CallbackAction::Unknown);
    }

    #[test]
    fn approve_without_target_is_unknown() {
        assert_eq!(
            CallbackAction::decode(r#"{"a":"approve","i":"acme/app"}"#),
            CallbackAction::Unknown
        );
        assert_eq!(
            CallbackAction::decode(r#"{"a":"approve"}"#),
            CallbackAction::Unknown
        );
    }
}
