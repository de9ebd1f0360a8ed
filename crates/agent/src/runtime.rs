use std::sync::Arc;

use procura_core::config::{AppConfig, AssistantConfig};
use procura_core::{ArtifactSink, RecordStore};

use crate::functions::procurement_registry;
use crate::gemini::GeminiClient;
use crate::llm::{GenerativeModel, LlmError};
use crate::orchestrator::{ChatError, Orchestrator, TurnOutcome};
use crate::session::{ResetOutcome, SessionKey};

pub const DEFAULT_SYSTEM_PRIME: &str = "You are Procura, a purchasing assistant for a small \
maintenance company. Answer questions about the user's uploaded purchase orders, sales invoices \
and supplier price lists by calling the available functions; never invent records. Dates are \
written as YYYY-MM-DD when passed to functions. Price list searches need at least one product, \
price list or supplier term. When the user asks to create a purchase order, collect the order \
number, supplier, buyer, order date and at least one row before calling createPurchaseOrder. \
Each user message ends with a [data-availability] note counting the records per data set; if a \
set is empty, say so instead of searching it. Keep answers short and use tables for lists.";

/// Wires the model, the procurement functions and the session orchestrator.
pub struct AgentRuntime {
    orchestrator: Orchestrator,
    system_prime: String,
}

impl AgentRuntime {
    pub fn new(
        settings: &AssistantConfig,
        model: Arc<dyn GenerativeModel>,
        store: Arc<dyn RecordStore>,
        artifacts: Arc<dyn ArtifactSink>,
    ) -> Self {
        let tools = procurement_registry(store.clone(), artifacts, settings);
        Self {
            orchestrator: Orchestrator::new(model, Arc::new(tools), store, settings.clone()),
            system_prime: DEFAULT_SYSTEM_PRIME.to_string(),
        }
    }

    /// Runtime backed by Gemini; fails when no api key is configured.
    pub fn with_gemini(
        config: &AppConfig,
        store: Arc<dyn RecordStore>,
        artifacts: Arc<dyn ArtifactSink>,
    ) -> Result<Self, LlmError> {
        let model = GeminiClient::from_config(&config.llm)?;
        Ok(Self::new(&config.assistant, Arc::new(model), store, artifacts))
    }

    pub fn with_system_prime(mut self, prime: impl Into<String>) -> Self {
        self.system_prime = prime.into();
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn start_session(
        &self,
        owner_id: &str,
        reference_context: Option<&str>,
    ) -> Result<SessionKey, ChatError> {
        let key = SessionKey::generate(owner_id);
        self.orchestrator.open_session(&key, &self.system_prime, reference_context).await?;
        Ok(key)
    }

    pub async fn handle_message(
        &self,
        key: &SessionKey,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        self.orchestrator.send(key, text).await
    }

    pub async fn reset(&self, key: &SessionKey) -> ResetOutcome {
        self.orchestrator.reset(key).await
    }
}
