//! Answer surface types.
//!
//! `AnswerEvent` is the streamed protocol a client consumes: zero or
//! more `partial` frames followed by exactly one `final` event carrying
//! the full answer text and its citations.

use crate::store::Citation;
use serde::{Deserialize, Serialize};

/// The result of a blocking answer operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Events emitted by the streaming answer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerEvent {
    /// A fixed-size frame of answer text.
    Partial { content: String },

    /// The stream is complete. `content` is the full answer text;
    /// concatenating all partial frames yields the same string.
    Final {
        content: String,
        citations: Vec<Citation>,
    },
}

impl AnswerEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Partial { .. } => "partial",
            Self::Final { .. } => "final",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_event_serialization() {
        let event = AnswerEvent::Partial { content: "The notice".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"partial""#));
        assert!(json.contains(r#""content":"The notice""#));
    }

    #[test]
    fn final_event_serialization() {
        let event = AnswerEvent::Final {
            content: "Three months.".into(),
            citations: vec![Citation {
                file: "contract.pdf".into(),
                path: "/storage/contract.pdf".into(),
                chunk: 2,
                score: Some(0.81),
                excerpt: None,
            }],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"final""#));
        assert!(json.contains("contract.pdf"));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AnswerEvent::Partial { content: "x".into() }.event_type(), "partial");
        assert_eq!(
            AnswerEvent::Final { content: "x".into(), citations: vec![] }.event_type(),
            "final"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"partial","content":"hi"}"#;
        let event: AnswerEvent = serde_json::from_str(json).unwrap();
        match event {
            AnswerEvent::Partial { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
