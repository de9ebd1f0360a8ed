//! Provider-neutral view of a function-calling generative model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// One entry of the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Role::User, parts }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self { role: Role::Model, parts }
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|part| match part {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn has_function_calls(&self) -> bool {
        self.function_calls().next().is_some()
    }

    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.parts.iter().filter_map(|part| match part {
            Part::FunctionResponse(response) => Some(response),
            _ => None,
        })
    }
}

/// Schema the model sees for a callable function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Copy, Debug)]
pub struct GenerateRequest<'a> {
    pub system_instruction: &'a str,
    pub contents: &'a [Content],
    pub functions: &'a [FunctionDeclaration],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub candidate_tokens: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelResponse {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { parts: vec![Part::Text(text.into())], ..Self::default() }
    }

    pub fn from_calls(calls: Vec<FunctionCall>) -> Self {
        Self { parts: calls.into_iter().map(Part::FunctionCall).collect(), ..Self::default() }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_text(&self) -> bool {
        !self.text().trim().is_empty()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm api key is not configured (set PROCURA_LLM_API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,
    #[error("llm client setup failed: {0}")]
    Setup(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm rejected request: {0}")]
    Rejected(String),
    #[error("llm unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },
    #[error("llm response decode failed: {0}")]
    Decode(String),
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider answered without any candidate.
    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<Option<ModelResponse>, LlmError>;
}
