//! Google Gemini inference client
//!
//! One `generateContent` call per request. The system prompt travels as
//! `systemInstruction`, the conversation as role-tagged `contents`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use swarm_core::{Credentials, InferenceClient, InferenceError, InferenceRequest, MessageRole};

/// Public Gemini endpoint
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Transport-level bound; the pipeline applies its own, usually shorter, bound
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Gemini REST client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create client
    ///
    /// # Errors
    /// `InferenceError::Transport` if the HTTP client cannot be built.
    pub fn new(credentials: &Credentials) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| InferenceError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: credentials.api_key().to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point at another endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn invoke(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        let url = self.endpoint(&request.model);
        let body = GeminiRequest::from(&request);

        tracing::debug!(role = %request.role, model = %request.model, "sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        secs: REQUEST_TIMEOUT_SECS,
                    }
                } else {
                    InferenceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Gemini request failed");
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                InferenceError::QuotaExceeded(message)
            } else {
                InferenceError::Http {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let decoded: GeminiResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        decoded.into_text()
    }
}

// Gemini API types

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

impl From<&InferenceRequest> for GeminiRequest {
    fn from(request: &InferenceRequest) -> Self {
        let system_instruction = (!request.system_prompt.trim().is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: request.system_prompt.clone(),
            }],
        });

        let contents = request
            .messages
            .iter()
            .map(|message| GeminiContent {
                role: Some(
                    match message.role {
                        MessageRole::User => "user",
                        MessageRole::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            })
            .collect();

        Self {
            system_instruction,
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: request.generation.temperature,
                max_output_tokens: request.generation.max_output_tokens,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    finish_reason: Option<String>,
}

impl GeminiResponse {
    /// Text of the first candidate
    fn into_text(self) -> Result<String, InferenceError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(InferenceError::EmptyResponse)?;

        let text: String = candidate.content.parts.into_iter().map(|p| p.text).collect();
        if text.trim().is_empty() {
            tracing::warn!(finish_reason = ?candidate.finish_reason, "Gemini returned empty text");
            return Err(InferenceError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use swarm_core::{AgentRole, GenerationConfig, Message};

    fn request() -> InferenceRequest {
        InferenceRequest {
            role: AgentRole::Auditor,
            model: "gemini-2.5-flash".into(),
            system_prompt: "You are the Auditor".into(),
            messages: vec![Message::user("audit this"), Message::model("{}"), Message::user("again")],
            generation: GenerationConfig::new(0.1, 4000),
        }
    }

    #[test]
    fn request_body_uses_gemini_layout() {
        let body = serde_json::to_value(GeminiRequest::from(&request())).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are the Auditor");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "again");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4000);
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let mut req = request();
        req.system_prompt = "  ".into();
        let body = serde_json::to_value(GeminiRequest::from(&req)).unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn response_parts_are_concatenated() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": " 1}"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.into_text(), Err(InferenceError::EmptyResponse));

        let blocked: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert_eq!(blocked.into_text(), Err(InferenceError::EmptyResponse));
    }

    #[test]
    fn debug_hides_api_key() {
        let client = GeminiClient::new(&Credentials::new("secret-key")).unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
    }
}
