//! `generateContent` client for Google Gemini.

use std::time::Duration;

use async_trait::async_trait;
use procura_core::config::LlmConfig;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest,
    GenerativeModel, LlmError, ModelResponse, Part, TokenUsage,
};

pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        if api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| LlmError::Setup(format!("http client build failed: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<Option<ModelResponse>, LlmError> {
        let body = build_request(request);
        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Transport(err.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unavailable>".into());
            return Err(map_http_error(status, &body));
        }

        let payload = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| LlmError::Decode(err.without_url().to_string()))?;
        Ok(parse_response(payload))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    function_call: Option<CandidateCall>,
}

#[derive(Deserialize)]
struct CandidateCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

fn build_request(request: &GenerateRequest<'_>) -> GenerateContentRequest {
    let system_instruction = Some(request.system_instruction.trim())
        .filter(|text| !text.is_empty())
        .map(|text| WireContent {
            role: None,
            parts: vec![WirePart { text: Some(text.to_string()), ..WirePart::default() }],
        });

    let contents = request
        .contents
        .iter()
        .map(|content| WireContent {
            role: Some(content.role.as_str()),
            parts: content.parts.iter().map(wire_part).collect(),
        })
        .collect();

    let tools = if request.functions.is_empty() {
        Vec::new()
    } else {
        vec![WireTool { function_declarations: request.functions.to_vec() }]
    };

    GenerateContentRequest { contents, system_instruction, tools }
}

fn wire_part(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart { text: Some(text.clone()), ..WirePart::default() },
        Part::FunctionCall(call) => {
            WirePart { function_call: Some(call.clone()), ..WirePart::default() }
        }
        Part::FunctionResponse(response) => {
            WirePart { function_response: Some(response.clone()), ..WirePart::default() }
        }
    }
}

fn parse_response(payload: GenerateContentResponse) -> Option<ModelResponse> {
    let usage = payload
        .usage_metadata
        .map(|usage| TokenUsage {
            prompt_tokens: usage.prompt_token_count.unwrap_or(0),
            candidate_tokens: usage.candidates_token_count.unwrap_or(0),
        })
        .unwrap_or_default();

    let candidate = payload.candidates.into_iter().next()?;
    let mut parts = Vec::new();
    for part in candidate.content.map(|content| content.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            parts.push(Part::Text(text));
        }
        if let Some(call) = part.function_call {
            parts.push(Part::FunctionCall(FunctionCall { name: call.name, args: call.args }));
        }
    }

    Some(ModelResponse { parts, finish_reason: candidate.finish_reason, usage })
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    match status {
        StatusCode::BAD_REQUEST => LlmError::Rejected(body.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Unavailable {
            status: status.as_u16(),
            message: format!("authentication failed: {body}"),
        },
        _ => LlmError::Unavailable { status: status.as_u16(), message: body.to_string() },
    }
}
