//! Context builder for assembling prompts

use parley_core::config::{ChatConfig, HistoryPolicy};
use parley_core::Session;
use parley_providers::Message;

/// Builds the outbound message list for a turn.
///
/// The provider keeps no memory between calls, so whatever continuity the
/// conversation has is reconstructed here from the caller's session.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: Option<String>,
    policy: HistoryPolicy,
    window: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            system_prompt: None,
            policy: HistoryPolicy::Replay,
            window: 20,
        }
    }
}

impl ContextBuilder {
    /// Create a new context builder
    pub fn new(policy: HistoryPolicy, window: usize) -> Self {
        Self {
            system_prompt: None,
            policy,
            window,
        }
    }

    pub fn from_config(chat: &ChatConfig) -> Self {
        Self {
            system_prompt: chat
                .system_prompt
                .clone()
                .filter(|prompt| !prompt.trim().is_empty()),
            policy: chat.history_policy,
            window: chat.history_window,
        }
    }

    /// Prepend a system prompt to every request
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    /// Build the messages for `user_text` given the prior `session`
    pub fn build_messages(&self, session: &Session, user_text: &str) -> Vec<Message> {
        let mut messages = Vec::new();

        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt));
        }

        if self.policy == HistoryPolicy::Replay {
            for turn in session.recent(self.window) {
                messages.push(Message::user(&turn.user_text));
                messages.push(Message::assistant(&turn.assistant_text));
            }
        }

        messages.push(Message::user(user_text));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.role.as_str()).collect()
    }

    #[test]
    fn test_replay_interleaves_history() {
        let session = Session::from_pairs([("A", "a"), ("B", "b")]);
        let messages = ContextBuilder::default().build_messages(&session, "C");

        assert_eq!(
            roles(&messages),
            vec!["user", "assistant", "user", "assistant", "user"]
        );
        assert_eq!(messages[0].content, "A");
        assert_eq!(messages[3].content, "b");
        assert_eq!(messages[4].content, "C");
    }

    #[test]
    fn test_replay_respects_window() {
        let session = Session::from_pairs((0..5).map(|i| (format!("q{}", i), format!("a{}", i))));
        let messages = ContextBuilder::new(HistoryPolicy::Replay, 2).build_messages(&session, "next");

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].content, "q3");
        assert_eq!(messages[2].content, "q4");
    }

    #[test]
    fn test_discard_sends_only_new_input() {
        let session = Session::from_pairs([("A", "a")]);
        let messages = ContextBuilder::new(HistoryPolicy::Discard, 20)
            .with_system_prompt("Be brief.")
            .build_messages(&session, "B");

        assert_eq!(
            messages,
            vec![Message::system("Be brief."), Message::user("B")]
        );
    }

    #[test]
    fn test_blank_system_prompt_from_config_is_ignored() {
        let chat = ChatConfig {
            system_prompt: Some("   ".to_string()),
            ..Default::default()
        };
        let messages = ContextBuilder::from_config(&chat).build_messages(&Session::new(), "hi");
        assert_eq!(messages, vec![Message::user("hi")]);
    }
}
