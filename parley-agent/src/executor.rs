//! Turn executor: one submission, one provider call, one appended turn

use parley_core::config::ChatConfig;
use parley_core::utils::truncate;
use parley_core::{GenerationParameters, Session, Turn};
use parley_providers::LLMProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::error::Result;

/// Executes chat turns against a provider.
///
/// The executor holds no conversation state. The caller passes the current
/// session in and gets the extended session back; the value passed in is never
/// modified, so a failed turn leaves the caller exactly where it was.
pub struct TurnExecutor {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    max_tokens: Option<u32>,
    context: ContextBuilder,
}

impl TurnExecutor {
    /// Create an executor using the provider's default model
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: None,
            max_tokens: None,
            context: ContextBuilder::default(),
        }
    }

    /// Create an executor from the chat section of the config
    pub fn from_config(provider: Arc<dyn LLMProvider>, chat: &ChatConfig) -> Self {
        Self {
            provider,
            model: None,
            max_tokens: chat.max_tokens,
            context: ContextBuilder::from_config(chat),
        }
    }

    /// Override the model instead of using the provider default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Model the next turn will use
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.get_default_model())
    }

    /// Run one turn.
    ///
    /// `user_text` is forwarded as given, empty or not, and `params` are passed
    /// to the provider unmodified. Returns the reply and a new session equal to
    /// `session` plus `(user_text, reply)`.
    pub async fn execute_turn(
        &self,
        user_text: &str,
        session: &Session,
        params: &GenerationParameters,
    ) -> Result<(String, Session)> {
        let model = self.model();
        info!(
            "Processing turn {} (model: {}): {}",
            session.len() + 1,
            model,
            truncate(user_text, 80)
        );

        let messages = self.context.build_messages(session, user_text);
        debug!(
            "Sending {} messages ({:?} history)",
            messages.len(),
            self.context.policy()
        );

        let response = match self
            .provider
            .chat(messages, Some(model), params, self.max_tokens)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Turn failed: {}", e);
                return Err(e.into());
            }
        };

        if !response.usage.is_empty() {
            debug!("Usage: {:?}", response.usage);
        }
        let reply = response.into_text()?;
        info!("Reply: {}", truncate(&reply, 120));

        let updated = session.with_turn(Turn::new(user_text, reply.clone()));
        Ok((reply, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnError;
    use async_trait::async_trait;
    use parley_core::config::HistoryPolicy;
    use parley_providers::{LLMResponse, Message, ProviderError, ProviderResult};
    use std::sync::Mutex;

    /// Records every request and answers by a fixed rule
    struct StubProvider {
        reply: fn(&str) -> ProviderResult<LLMResponse>,
        calls: Mutex<Vec<(Vec<Message>, GenerationParameters)>>,
    }

    impl StubProvider {
        fn new(reply: fn(&str) -> ProviderResult<LLMResponse>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Vec<Message>, GenerationParameters)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _model: Option<String>,
            params: &GenerationParameters,
            _max_tokens: Option<u32>,
        ) -> ProviderResult<LLMResponse> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.calls.lock().unwrap().push((messages, *params));
            (self.reply)(&last)
        }

        fn get_default_model(&self) -> String {
            "stub".to_string()
        }
    }

    fn echo(input: &str) -> ProviderResult<LLMResponse> {
        Ok(LLMResponse::text(input))
    }

    fn four(_: &str) -> ProviderResult<LLMResponse> {
        Ok(LLMResponse::text("4"))
    }

    fn network_failure(_: &str) -> ProviderResult<LLMResponse> {
        Err(ProviderError::ApiError("connection reset".to_string()))
    }

    fn missing_key(_: &str) -> ProviderResult<LLMResponse> {
        Err(ProviderError::ConfigError("API key is not set".to_string()))
    }

    fn no_content(_: &str) -> ProviderResult<LLMResponse> {
        Ok(LLMResponse {
            content: None,
            finish_reason: "stop".to_string(),
            usage: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_single_turn() {
        let executor = TurnExecutor::new(StubProvider::new(four));
        let params = GenerationParameters::with_temperature(0.8);

        let (reply, session) = executor
            .execute_turn("Whats 2 + 2?", &Session::new(), &params)
            .await
            .unwrap();

        assert_eq!(reply, "4");
        assert_eq!(session, Session::from_pairs([("Whats 2 + 2?", "4")]));
    }

    #[tokio::test]
    async fn test_sequential_turns_keep_order() {
        let executor = TurnExecutor::new(StubProvider::new(echo));
        let params = GenerationParameters::default();

        let (_, session) = executor
            .execute_turn("A", &Session::new(), &params)
            .await
            .unwrap();
        let (_, session) = executor.execute_turn("B", &session, &params).await.unwrap();

        assert_eq!(session, Session::from_pairs([("A", "A"), ("B", "B")]));
    }

    #[tokio::test]
    async fn test_n_turns_produce_n_entries() {
        let executor = TurnExecutor::new(StubProvider::new(echo));
        let params = GenerationParameters::default();
        let inputs: Vec<String> = (0..7).map(|i| format!("message {}", i)).collect();

        let mut session = Session::new();
        for input in &inputs {
            session = executor.execute_turn(input, &session, &params).await.unwrap().1;
        }

        assert_eq!(session.len(), inputs.len());
        for (turn, input) in session.turns().iter().zip(&inputs) {
            assert_eq!(turn.as_pair(), (input.as_str(), input.as_str()));
        }
    }

    #[tokio::test]
    async fn test_input_session_is_not_mutated() {
        let executor = TurnExecutor::new(StubProvider::new(echo));
        let params = GenerationParameters::default();
        let before = Session::from_pairs([("A", "A")]);
        let snapshot = before.clone();

        let (_, after) = executor.execute_turn("B", &before, &params).await.unwrap();

        assert_eq!(before, snapshot);
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after.turns()[..1], before.turns());
    }

    #[tokio::test]
    async fn test_deterministic_at_zero_temperature() {
        let executor = TurnExecutor::new(StubProvider::new(echo));
        let params = GenerationParameters::with_temperature(0.0);
        let session = Session::new();

        let (first, _) = executor.execute_turn("same", &session, &params).await.unwrap();
        let (second, _) = executor.execute_turn("same", &session, &params).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_temperature_extremes_pass_through() {
        let provider = StubProvider::new(echo);
        let executor = TurnExecutor::new(provider.clone());

        for temperature in [0.0, 2.0] {
            let params = GenerationParameters {
                temperature,
                top_k: Some(40),
                top_p: Some(0.9),
            };
            executor
                .execute_turn("hi", &Session::new(), &params)
                .await
                .unwrap();
        }

        let temperatures: Vec<f64> = provider.calls().iter().map(|(_, p)| p.temperature).collect();
        assert_eq!(temperatures, vec![0.0, 2.0]);
    }

    #[tokio::test]
    async fn test_out_of_range_params_are_not_validated() {
        let provider = StubProvider::new(echo);
        let executor = TurnExecutor::new(provider.clone());
        let params = GenerationParameters {
            temperature: 5.0,
            top_k: Some(1000),
            top_p: None,
        };

        executor
            .execute_turn("hi", &Session::new(), &params)
            .await
            .unwrap();
        assert_eq!(provider.calls()[0].1, params);
    }

    #[tokio::test]
    async fn test_empty_input_is_forwarded() {
        let provider = StubProvider::new(echo);
        let executor = TurnExecutor::new(provider.clone());

        let (_, session) = executor
            .execute_turn("", &Session::new(), &GenerationParameters::default())
            .await
            .unwrap();

        assert_eq!(session.turns()[0].as_pair(), ("", ""));
        assert_eq!(provider.calls()[0].0, vec![Message::user("")]);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_session_unchanged() {
        let executor = TurnExecutor::new(StubProvider::new(network_failure));
        let session = Session::from_pairs([("A", "a")]);

        let err = executor
            .execute_turn("B", &session, &GenerationParameters::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::Provider(_)));
        assert_eq!(session, Session::from_pairs([("A", "a")]));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_error() {
        let executor = TurnExecutor::new(StubProvider::new(missing_key));
        let err = executor
            .execute_turn("hi", &Session::new(), &GenerationParameters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_reply_without_content_is_provider_error() {
        let executor = TurnExecutor::new(StubProvider::new(no_content));
        let err = executor
            .execute_turn("hi", &Session::new(), &GenerationParameters::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TurnError::Provider(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_policy_sends_history() {
        let provider = StubProvider::new(echo);
        let chat = ChatConfig {
            history_policy: HistoryPolicy::Replay,
            ..Default::default()
        };
        let executor = TurnExecutor::from_config(provider.clone(), &chat);

        let session = Session::from_pairs([("A", "A")]);
        executor
            .execute_turn("B", &session, &GenerationParameters::default())
            .await
            .unwrap();

        assert_eq!(
            provider.calls()[0].0,
            vec![Message::user("A"), Message::assistant("A"), Message::user("B")]
        );
    }

    #[tokio::test]
    async fn test_discard_policy_sends_only_input() {
        let provider = StubProvider::new(echo);
        let chat = ChatConfig {
            history_policy: HistoryPolicy::Discard,
            ..Default::default()
        };
        let executor = TurnExecutor::from_config(provider.clone(), &chat);

        let session = Session::from_pairs([("A", "A")]);
        let (_, updated) = executor
            .execute_turn("B", &session, &GenerationParameters::default())
            .await
            .unwrap();

        assert_eq!(provider.calls()[0].0, vec![Message::user("B")]);
        assert_eq!(updated.len(), 2);
    }

    #[test]
    fn test_model_falls_back_to_provider_default() {
        let executor = TurnExecutor::new(StubProvider::new(echo));
        assert_eq!(executor.model(), "stub");
        assert_eq!(executor.with_model("gemma:7b").model(), "gemma:7b");
    }
}
