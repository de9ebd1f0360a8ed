//! Turn processing: prime a session, run user turns through the model,
//! dispatch requested functions and shape the final reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use procura_core::config::AssistantConfig;
use procura_core::services::availability;
use procura_core::{ApplicationError, DomainError, RecordStore, SessionState};
use serde::Serialize;
use thiserror::Error;

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{FunctionResponse, GenerateRequest, GenerativeModel, LlmError, ModelResponse, Part};
use crate::reply;
use crate::retry::{retry_with_backoff, Retried, RetryPolicy};
use crate::session::{ResetOutcome, SessionKey, SessionRegistry};
use crate::tools::{ToolContext, ToolRegistry};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("session `{0}` does not exist")]
    UnknownSession(String),
    #[error(transparent)]
    Session(#[from] DomainError),
    #[error("message rejected ({reason_code}): {message}")]
    MessageRejected { reason_code: &'static str, message: String },
    #[error("model produced no response after {attempts} attempts: {reason}")]
    ModelUnavailable { attempts: u32, reason: String },
}

impl From<ChatError> for ApplicationError {
    fn from(value: ChatError) -> Self {
        match value {
            ChatError::Configuration(message) => Self::Configuration(message),
            ChatError::Session(error) => Self::Domain(error),
            ChatError::UnknownSession(key) => {
                Self::Domain(DomainError::InvariantViolation(format!("unknown session {key}")))
            }
            ChatError::MessageRejected { message, .. } => {
                Self::Domain(DomainError::InvariantViolation(message))
            }
            error @ ChatError::ModelUnavailable { .. } => Self::Integration(error.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FunctionCallSummary {
    pub name: String,
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub reply: String,
    pub function_calls: Vec<FunctionCallSummary>,
    pub primary_retries: u32,
    pub follow_up_retries: u32,
    pub truncated: bool,
    pub elapsed_ms: u64,
}

pub struct Orchestrator {
    model: Arc<dyn GenerativeModel>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn RecordStore>,
    sessions: SessionRegistry,
    settings: AssistantConfig,
    guardrails: GuardrailPolicy,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn RecordStore>,
        settings: AssistantConfig,
    ) -> Self {
        let guardrails = GuardrailPolicy::new(settings.max_message_chars);
        Self { model, tools, store, sessions: SessionRegistry::new(), settings, guardrails }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn session_state(&self, key: &SessionKey) -> Option<SessionState> {
        let handle = self.sessions.get(key).await?;
        let session = handle.lock().await;
        Some(session.state())
    }

    /// Create the session and install its system instruction.
    ///
    /// `reference_context`, when present, is appended to the prime.
    pub async fn open_session(
        &self,
        key: &SessionKey,
        system_prime: &str,
        reference_context: Option<&str>,
    ) -> Result<(), ChatError> {
        let prime = system_prime.trim();
        if prime.is_empty() {
            tracing::error!(
                event_name = "session.prime_missing",
                session = %key,
                "refusing to start a session without a system prime"
            );
            return Err(ChatError::Configuration("system prime is empty".to_string()));
        }

        let instruction = match reference_context.map(str::trim).filter(|text| !text.is_empty()) {
            Some(context) => format!("{prime}\n\nReference material:\n{context}"),
            None => prime.to_string(),
        };

        let handle = self.sessions.get_or_create(key).await;
        let mut session = handle.lock().await;
        session.prime(instruction)?;
        tracing::info!(
            event_name = "session.primed",
            session = %key,
            model = self.model.name(),
            functions = self.tools.len(),
            "session primed"
        );
        Ok(())
    }

    pub async fn reset(&self, key: &SessionKey) -> ResetOutcome {
        self.sessions.reset(key).await
    }

    /// Run one user turn. The session stays locked for the whole turn.
    pub async fn send(&self, key: &SessionKey, message: &str) -> Result<TurnOutcome, ChatError> {
        let started = Instant::now();
        let handle =
            self.sessions.get(key).await.ok_or_else(|| ChatError::UnknownSession(key.to_string()))?;
        let mut session = handle.lock().await;

        let state = session.state();
        if !state.accepts_turns() {
            return Err(DomainError::InvalidSessionTransition { from: state, to: SessionState::Active }
                .into());
        }
        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.guardrails.evaluate(message)
        {
            tracing::warn!(event_name = "turn.rejected", session = %key, reason_code, "message rejected");
            return Err(ChatError::MessageRejected { reason_code, message: user_message });
        }
        session.begin_turn()?;

        let mut parts = vec![Part::text(message.trim())];
        match availability(self.store.as_ref(), &key.owner_id).await {
            Ok(counts) => parts.push(Part::text(counts.note())),
            Err(error) => tracing::warn!(
                event_name = "turn.availability_failed",
                session = %key,
                error = %error,
                "could not count uploaded records"
            ),
        }

        let checkpoint = session.conversation().checkpoint();
        session.conversation_mut().push_user(parts)?;

        let declarations = self.tools.declarations();
        let primary_policy = RetryPolicy::fixed(
            self.settings.primary_attempts,
            Duration::from_millis(self.settings.primary_delay_ms),
        );
        let primary = {
            let conversation = session.conversation();
            let request = GenerateRequest {
                system_instruction: conversation.system_instruction(),
                contents: conversation.contents(),
                functions: &declarations,
            };
            self.call_model(&request, &primary_policy, |result| matches!(result, Ok(Some(_))))
                .await
        };
        let primary_retries = primary.retries();
        let attempts = primary.attempts;

        let response = match primary.value {
            Ok(Some(response)) => response,
            failed => {
                session.conversation_mut().rollback(checkpoint);
                let reason = match failed {
                    Err(error) => error.to_string(),
                    _ => "no response object".to_string(),
                };
                tracing::error!(
                    event_name = "turn.model_unavailable",
                    session = %key,
                    attempts,
                    reason = %reason,
                    "primary model call failed; user turn removed"
                );
                return Err(ChatError::ModelUnavailable { attempts, reason });
            }
        };

        let calls = response.function_calls();
        if calls.is_empty() {
            let text = response.text();
            let text = if text.trim().is_empty() {
                tracing::warn!(
                    event_name = "turn.empty_reply",
                    session = %key,
                    finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
                    "model returned an empty reply"
                );
                reply::EMPTY_REPLY_FALLBACK.to_string()
            } else {
                text
            };
            session.conversation_mut().push_model(vec![Part::text(text.clone())])?;
            return Ok(self.finish(key, &text, Vec::new(), primary_retries, 0, started));
        }

        session.conversation_mut().push_model(response.parts)?;

        let context =
            ToolContext { owner_id: key.owner_id.clone(), session_id: key.session_id.clone() };
        let mut summaries = Vec::with_capacity(calls.len());
        let mut responses = Vec::with_capacity(calls.len());
        for call in &calls {
            let dispatched = self.tools.dispatch(&context, call).await;
            summaries.push(FunctionCallSummary {
                name: dispatched.name.clone(),
                success: dispatched.success,
            });
            responses.push(FunctionResponse { name: dispatched.name, response: dispatched.response });
        }
        session.conversation_mut().push_function_responses(responses)?;

        let follow_up_policy = RetryPolicy::exponential(
            self.settings.follow_up_attempts,
            Duration::from_millis(self.settings.follow_up_base_delay_ms),
        );
        let follow_up = {
            let conversation = session.conversation();
            let request = GenerateRequest {
                system_instruction: conversation.system_instruction(),
                contents: conversation.contents(),
                functions: &declarations,
            };
            self.call_model(&request, &follow_up_policy, |result| {
                matches!(result, Ok(Some(response)) if response.has_text())
            })
            .await
        };
        let follow_up_retries = follow_up.retries();
        let accepted = follow_up.accepted;

        let text = match follow_up.value {
            Ok(Some(response)) if accepted => response.text(),
            _ => {
                tracing::warn!(
                    event_name = "turn.follow_up_exhausted",
                    session = %key,
                    attempts = follow_up.attempts,
                    functions = calls.len(),
                    "no text after function results; using fallback"
                );
                reply::follow_up_fallback(calls.len())
            }
        };
        session.conversation_mut().push_model(vec![Part::text(text.clone())])?;

        Ok(self.finish(key, &text, summaries, primary_retries, follow_up_retries, started))
    }

    async fn call_model<A>(
        &self,
        request: &GenerateRequest<'_>,
        policy: &RetryPolicy,
        accept: A,
    ) -> Retried<Result<Option<ModelResponse>, LlmError>>
    where
        A: Fn(&Result<Option<ModelResponse>, LlmError>) -> bool,
    {
        let model = self.model.as_ref();
        retry_with_backoff(
            policy,
            |attempt| async move {
                let result = model.generate(request).await;
                match &result {
                    Err(error) => tracing::warn!(
                        event_name = "model.call_failed",
                        attempt,
                        error = %error,
                        "model call failed"
                    ),
                    Ok(None) => tracing::warn!(
                        event_name = "model.no_candidate",
                        attempt,
                        "model returned no response object"
                    ),
                    Ok(Some(response)) => tracing::debug!(
                        event_name = "model.responded",
                        attempt,
                        prompt_tokens = response.usage.prompt_tokens,
                        candidate_tokens = response.usage.candidate_tokens,
                        "model responded"
                    ),
                }
                result
            },
            accept,
        )
        .await
    }

    fn finish(
        &self,
        key: &SessionKey,
        text: &str,
        function_calls: Vec<FunctionCallSummary>,
        primary_retries: u32,
        follow_up_retries: u32,
        started: Instant,
    ) -> TurnOutcome {
        let (reply, truncated) = reply::finalize(text);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            event_name = "turn.completed",
            session = %key,
            functions = function_calls.len(),
            primary_retries,
            follow_up_retries,
            truncated,
            elapsed_ms,
            "turn completed"
        );
        TurnOutcome { reply, function_calls, primary_retries, follow_up_retries, truncated, elapsed_ms }
    }
}
