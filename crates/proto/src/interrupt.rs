//! Interrupts raised by a paused agent turn and the decisions that resume it.
//!
//! On the wire an interrupt payload is a flag-tagged JSON object:
//!
//! ```json
//! {"authorization_required": true, "tool_name": "...", "authorization_response": {"url": "...", "id": "..."}}
//! {"hitl_required": true, "tool_name": "...", "input": {...}}
//! ```
//!
//! [`InterruptKind`] is the typed form. Payloads carrying neither flag parse
//! to [`InterruptKind::Unrecognized`] instead of being silently guessed at.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::InputMessage;

/// What a paused tool call is waiting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterruptKind {
    /// The tool service needs the user to complete an out-of-band authorization.
    AuthorizationRequired {
        tool_name: String,
        url: String,
        authorization_id: String,
    },
    /// The operator must explicitly approve the call with its proposed input.
    HumanApprovalRequired { tool_name: String, input: Value },
    /// A payload that matches neither known shape.
    Unrecognized { payload: Value },
}

impl InterruptKind {
    /// Parses a flag-tagged interrupt payload.
    pub fn from_payload(payload: &Value) -> Self {
        let flag = |key: &str| payload.get(key).and_then(Value::as_bool) == Some(true);
        let text = |value: Option<&Value>| {
            value
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };

        if flag("authorization_required") {
            let response = payload.get("authorization_response");
            InterruptKind::AuthorizationRequired {
                tool_name: text(payload.get("tool_name")),
                url: text(response.and_then(|r| r.get("url"))),
                authorization_id: text(response.and_then(|r| r.get("id"))),
            }
        } else if flag("hitl_required") {
            InterruptKind::HumanApprovalRequired {
                tool_name: text(payload.get("tool_name")),
                input: payload.get("input").cloned().unwrap_or(Value::Null),
            }
        } else {
            InterruptKind::Unrecognized {
                payload: payload.clone(),
            }
        }
    }
}

/// A paused-execution signal for one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    /// Identifier of the tool call that raised the interrupt.
    pub id: String,
    /// What the call is waiting for.
    pub kind: InterruptKind,
}

impl Interrupt {
    /// Creates an interrupt for a tool call.
    pub fn new(id: impl Into<String>, kind: InterruptKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Authorization decision for one interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub authorized: bool,
}

impl Decision {
    pub const fn allow() -> Self {
        Self { authorized: true }
    }

    pub const fn deny() -> Self {
        Self { authorized: false }
    }
}

/// Resumption payload answering the interrupts of one streaming pass.
///
/// A single interrupt is answered with a bare decision, several with a list
/// in interrupt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resume {
    Single(Decision),
    Batch(Vec<Decision>),
}

impl Resume {
    /// Collapses exactly one decision to [`Resume::Single`].
    pub fn from_decisions(mut decisions: Vec<Decision>) -> Self {
        if decisions.len() == 1 {
            Resume::Single(decisions.remove(0))
        } else {
            Resume::Batch(decisions)
        }
    }

    /// Flattens back to an ordered decision list.
    pub fn into_decisions(self) -> Vec<Decision> {
        match self {
            Resume::Single(decision) => vec![decision],
            Resume::Batch(decisions) => decisions,
        }
    }
}

/// Input submitted to the runtime for one pass of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnInput {
    /// Fresh conversation messages.
    Message { messages: Vec<InputMessage> },
    /// Decisions for the interrupts that paused the previous pass.
    Resume(Resume),
}

impl TurnInput {
    /// Builds a turn input carrying one user message.
    pub fn user(content: impl Into<String>) -> Self {
        TurnInput::Message {
            messages: vec![InputMessage::user(content)],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_authorization_payload() {
        let payload = json!({
            "authorization_required": true,
            "tool_name": "Gmail_SendEmail",
            "authorization_response": {"url": "https://auth.example/x", "id": "auth-9"}
        });
        let kind = InterruptKind::from_payload(&payload);
        assert_eq!(
            kind,
            InterruptKind::AuthorizationRequired {
                tool_name: "Gmail_SendEmail".to_string(),
                url: "https://auth.example/x".to_string(),
                authorization_id: "auth-9".to_string(),
            }
        );
    }

    #[test]
    fn parses_approval_payload() {
        let payload = json!({
            "hitl_required": true,
            "tool_name": "Firecrawl_CrawlWebsite",
            "input": {"url": "https://example.com", "limit": 5}
        });
        let kind = InterruptKind::from_payload(&payload);
        assert!(matches!(
            &kind,
            InterruptKind::HumanApprovalRequired { tool_name, input }
                if tool_name == "Firecrawl_CrawlWebsite" && input["limit"] == 5
        ));
    }

    #[test]
    fn payload_without_flags_is_unrecognized() {
        let payload = json!({"tool_name": "X", "authorization_required": false});
        let kind = InterruptKind::from_payload(&payload);
        assert_eq!(kind, InterruptKind::Unrecognized { payload });
    }

    #[test]
    fn authorization_flag_takes_precedence_over_hitl() {
        let payload = json!({
            "authorization_required": true,
            "hitl_required": true,
            "tool_name": "X",
            "authorization_response": {"url": "u", "id": "i"}
        });
        assert!(matches!(
            InterruptKind::from_payload(&payload),
            InterruptKind::AuthorizationRequired { .. }
        ));
    }

    #[test]
    fn single_decision_collapses_and_batch_keeps_order() {
        let single = Resume::from_decisions(vec![Decision::deny()]);
        assert_eq!(single, Resume::Single(Decision::deny()));
        assert_eq!(
            serde_json::to_value(&single).expect("serialize"),
            json!({"authorized": false})
        );

        let batch = Resume::from_decisions(vec![Decision::allow(), Decision::deny()]);
        assert_eq!(
            serde_json::to_value(&batch).expect("serialize"),
            json!([{"authorized": true}, {"authorized": false}])
        );
        assert_eq!(
            batch.into_decisions(),
            vec![Decision::allow(), Decision::deny()]
        );
    }

    #[test]
    fn resume_deserializes_object_and_array_forms() {
        let single: Resume =
            serde_json::from_value(json!({"authorized": true})).expect("object form");
        assert_eq!(single, Resume::Single(Decision::allow()));

        let batch: Resume =
            serde_json::from_value(json!([{"authorized": true}])).expect("array form");
        assert_eq!(batch, Resume::Batch(vec![Decision::allow()]));
    }

    #[test]
    fn interrupt_kind_round_trips_through_checkpoint_encoding() {
        let interrupt = Interrupt::new(
            "call-1",
            InterruptKind::HumanApprovalRequired {
                tool_name: "Firecrawl_ScrapeUrl".to_string(),
                input: json!({"url": "https://example.com"}),
            },
        );
        let encoded = serde_json::to_string(&interrupt).expect("encode");
        assert!(encoded.contains("\"kind\":\"human_approval_required\""));
        let decoded: Interrupt = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, interrupt);
    }

    #[test]
    fn user_turn_input_wraps_one_message() {
        let TurnInput::Message { messages } = TurnInput::user("hello") else {
            panic!("expected message input");
        };
        assert_eq!(messages, vec![InputMessage::user("hello")]);
    }
}
