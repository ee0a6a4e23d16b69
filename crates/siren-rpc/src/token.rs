//! Token events on the LLM streaming channel

use serde::{Deserialize, Serialize};

/// Generation metrics reported with a completed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetrics {
    /// Wall-clock generation time in seconds.
    #[serde(default)]
    pub total_duration: f64,
    /// Seconds from request to the first token.
    #[serde(default)]
    pub time_to_first_token: f64,
    /// Response length in characters.
    #[serde(default)]
    pub total_length: usize,
    /// Rough whitespace token count.
    #[serde(default)]
    pub estimated_tokens: usize,
    /// Estimated generation throughput.
    #[serde(default)]
    pub tokens_per_second: f64,
}

/// One event on the LLM worker's text event stream.
///
/// Exactly one `Complete` **or** one `Error` terminates a stream. The wire
/// form is a JSON object tagged by `type`, e.g.
/// `{"type": "chunk", "content": "Hello "}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    /// Detected intent label, sent before any text.
    Intent {
        /// Intent label such as `note` or `default`.
        #[serde(rename = "content")]
        label: String,
    },
    /// First token arrived; carries the elapsed latency.
    FirstToken {
        /// Seconds from request start to the first token.
        #[serde(rename = "time")]
        elapsed_s: f64,
    },
    /// A span of generated text.
    Chunk {
        /// The text fragment.
        #[serde(rename = "content")]
        text: String,
    },
    /// Terminal event: the full response plus metrics.
    Complete {
        /// The complete response text.
        #[serde(rename = "content", default)]
        full_text: String,
        /// Generation metrics.
        #[serde(default)]
        metrics: ResponseMetrics,
    },
    /// Terminal event: the worker failed mid-generation.
    Error {
        /// Human-readable failure description.
        #[serde(rename = "content")]
        message: String,
    },
}

impl TokenEvent {
    /// Whether this event terminates its stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenEvent::Complete { .. } | TokenEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_round_trips_through_wire_form() {
        let wire = r#"{"type": "chunk", "content": "Hello ", "is_final": false}"#;
        let event: TokenEvent = serde_json::from_str(wire).unwrap();
        assert_eq!(
            event,
            TokenEvent::Chunk {
                text: "Hello ".to_string()
            }
        );
    }

    #[test]
    fn complete_parses_metrics() {
        let wire = r#"{"type": "complete", "content": "done", "is_final": true,
            "metrics": {"total_duration": 1.5, "time_to_first_token": 0.2,
                        "total_length": 4, "estimated_tokens": 1,
                        "tokens_per_second": 0.66}}"#;
        let event: TokenEvent = serde_json::from_str(wire).unwrap();
        match event {
            TokenEvent::Complete { full_text, metrics } => {
                assert_eq!(full_text, "done");
                assert!((metrics.total_duration - 1.5).abs() < f64::EPSILON);
                assert_eq!(metrics.total_length, 4);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn complete_without_metrics_defaults() {
        let wire = r#"{"type": "complete", "content": "Got it. Note saved.", "is_final": true}"#;
        let event: TokenEvent = serde_json::from_str(wire).unwrap();
        match event {
            TokenEvent::Complete { full_text, metrics } => {
                assert_eq!(full_text, "Got it. Note saved.");
                assert_eq!(metrics, ResponseMetrics::default());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn first_token_carries_elapsed() {
        let wire = r#"{"type": "first_token", "time": 0.31}"#;
        let event: TokenEvent = serde_json::from_str(wire).unwrap();
        assert_eq!(event, TokenEvent::FirstToken { elapsed_s: 0.31 });
        assert!(!event.is_terminal());
    }

    #[test]
    fn terminal_detection() {
        assert!(TokenEvent::Error {
            message: "boom".to_string()
        }
        .is_terminal());
        assert!(TokenEvent::Complete {
            full_text: String::new(),
            metrics: ResponseMetrics::default()
        }
        .is_terminal());
        assert!(!TokenEvent::Intent {
            label: "default".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let wire = r#"{"type": "heartbeat"}"#;
        assert!(serde_json::from_str::<TokenEvent>(wire).is_err());
    }
}
