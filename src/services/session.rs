use crate::errors::GraphError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Result of the one-shot `$top=1` probe after a bad request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub failed_url: String,
    pub error: String,
    pub probe_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

/// Bad-request recovery for one interaction.
///
/// `Idle -> Requested -> Failed -> Probing -> Suggested`, and back to `Idle`
/// once the suggestion is consumed or any other outcome is reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecoveryState {
    #[default]
    Idle,
    Requested {
        url: String,
    },
    Failed {
        url: String,
        error: String,
    },
    Probing {
        url: String,
        error: String,
        probe_url: String,
    },
    Suggested(Suggestion),
}

impl RecoveryState {
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryState::Idle => "idle",
            RecoveryState::Requested { .. } => "requested",
            RecoveryState::Failed { .. } => "failed",
            RecoveryState::Probing { .. } => "probing",
            RecoveryState::Suggested(_) => "suggested",
        }
    }

    pub fn request(&mut self, url: &str) {
        *self = RecoveryState::Requested {
            url: url.to_string(),
        };
    }

    /// Records the outcome of the original request. Only a bad request moves
    /// the machine forward; success and other errors return it to `Idle`.
    pub fn record_result<T>(&mut self, result: &Result<T, GraphError>) -> bool {
        let RecoveryState::Requested { url } = self else {
            return false;
        };
        match result {
            Err(err) if err.is_bad_request() => {
                *self = RecoveryState::Failed {
                    url: url.clone(),
                    error: err.to_string(),
                };
                true
            }
            _ => {
                *self = RecoveryState::Idle;
                false
            }
        }
    }

    pub fn start_probe(&mut self, probe_url: &str) -> bool {
        let RecoveryState::Failed { url, error } = self else {
            return false;
        };
        *self = RecoveryState::Probing {
            url: url.clone(),
            error: error.clone(),
            probe_url: probe_url.to_string(),
        };
        true
    }

    pub fn finish_probe(&mut self, outcome: Result<Value, GraphError>) -> Option<Suggestion> {
        let RecoveryState::Probing {
            url,
            error,
            probe_url,
        } = self
        else {
            return None;
        };
        let (sample, probe_error) = match outcome {
            Ok(sample) => (Some(sample), None),
            Err(err) => (None, Some(err.to_string())),
        };
        let suggestion = Suggestion {
            failed_url: url.clone(),
            error: error.clone(),
            probe_url: probe_url.clone(),
            sample,
            probe_error,
        };
        *self = RecoveryState::Suggested(suggestion.clone());
        Some(suggestion)
    }

    /// Hands the pending suggestion to the interpretation step.
    pub fn take_suggestion(&mut self) -> Option<Suggestion> {
        match std::mem::take(self) {
            RecoveryState::Suggested(suggestion) => Some(suggestion),
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn reset(&mut self) {
        *self = RecoveryState::Idle;
    }
}

/// Conversation history and recovery state for one user.
#[derive(Debug, Clone)]
pub struct CopilotSession {
    system_prompt: String,
    history: Vec<ChatMessage>,
    pub recovery: RecoveryState,
}

impl CopilotSession {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            history: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            recovery: RecoveryState::Idle,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Replaces the history. A leading system message is kept as given;
    /// otherwise the session prompt is put back in front.
    pub fn replace_history(&mut self, messages: Vec<ChatMessage>) {
        let mut history = Vec::with_capacity(messages.len() + 1);
        if messages.first().map(|m| m.role) != Some(Role::System) {
            history.push(ChatMessage::system(self.system_prompt.clone()));
        }
        history.extend(messages);
        self.history = history;
        self.recovery.reset();
    }

    pub fn clear(&mut self) {
        self.history = vec![ChatMessage::system(self.system_prompt.clone())];
        self.recovery.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bad_request() -> GraphError {
        GraphError::BadRequest {
            url: "https://graph.microsoft.com/v1.0/users?$filter=x".to_string(),
            message: "Invalid filter clause".to_string(),
        }
    }

    #[test]
    fn bad_request_walks_the_full_recovery_path() {
        let mut state = RecoveryState::default();
        state.request("https://graph.microsoft.com/v1.0/users?$filter=x");
        assert_eq!(state.name(), "requested");

        assert!(state.record_result::<Value>(&Err(bad_request())));
        assert_eq!(state.name(), "failed");

        assert!(state.start_probe("https://graph.microsoft.com/v1.0/users?$top=1"));
        assert_eq!(state.name(), "probing");

        let suggestion = state
            .finish_probe(Ok(serde_json::json!({"value": [{"id": "1"}]})))
            .expect("suggestion");
        assert!(suggestion.error.contains("Invalid filter clause"));
        assert_eq!(state.name(), "suggested");

        assert_eq!(state.take_suggestion(), Some(suggestion));
        assert_eq!(state, RecoveryState::Idle);
    }

    #[test]
    fn other_errors_return_to_idle() {
        let mut state = RecoveryState::default();
        state.request("u");
        let err = GraphError::Http {
            url: "u".to_string(),
            status: 404,
            message: "not found".to_string(),
        };
        assert!(!state.record_result::<Value>(&Err(err)));
        assert_eq!(state, RecoveryState::Idle);
        assert!(!state.start_probe("u?$top=1"));
    }

    #[test]
    fn probe_failure_is_still_a_suggestion() {
        let mut state = RecoveryState::default();
        state.request("u");
        state.record_result::<Value>(&Err(bad_request()));
        state.start_probe("u?$top=1");
        let suggestion = state
            .finish_probe(Err(GraphError::Network("connection reset".to_string())))
            .expect("suggestion");
        assert!(suggestion.sample.is_none());
        assert!(suggestion.probe_error.is_some());
    }

    #[test]
    fn take_suggestion_outside_suggested_keeps_state() {
        let mut state = RecoveryState::Requested {
            url: "u".to_string(),
        };
        assert_eq!(state.take_suggestion(), None);
        assert_eq!(state.name(), "requested");
    }

    #[test]
    fn clear_reseeds_system_prompt_and_resets_recovery() {
        let mut session = CopilotSession::new("prompt");
        session.push(ChatMessage::user("hello"));
        session.recovery.request("u");
        session.clear();
        assert_eq!(session.history(), &[ChatMessage::system("prompt")]);
        assert_eq!(session.recovery, RecoveryState::Idle);
    }

    #[test]
    fn replace_history_restores_missing_system_prompt() {
        let mut session = CopilotSession::new("prompt");
        session.replace_history(vec![ChatMessage::user("a"), ChatMessage::assistant("b")]);
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.history()[0], ChatMessage::system("prompt"));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("x")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "x"}));
    }
}
