//! HTTP client for the Gemini `generateContent` API.
//!
//! Each batch becomes one request carrying a system instruction, the
//! classification prompt and a JSON response schema. Configuration normally
//! comes from [`crate::config::AppConfig`]:
//! - `GEMINI_API_KEY` - API key (required)
//! - `FEEDBACK_LENS_MODEL` - Model id (default: `gemini-2.0-flash`)
//! - `FEEDBACK_LENS_BASE_URL` - API root (default: `https://generativelanguage.googleapis.com/v1beta`)

pub mod prompt;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::classify::{BoxFuture, Classifier, ClassifierError};
use crate::config::AppConfig;
use crate::models::ClassifiedItem;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Classifier backed by Gemini structured output.
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    base_url: String,
    model: String,
    api_key: Option<String>,
    system_instruction: Option<String>,
    suggested_labels: Vec<String>,
    client: Client,
}

impl GeminiClassifier {
    /// Create with explicit configuration.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            system_instruction: None,
            suggested_labels: Vec::new(),
            client: Client::new(),
        }
    }

    /// Create from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            ..Self::new(&config.base_url, &config.model, config.api_key.clone())
                .with_system_instruction(config.system_instruction.clone())
                .with_suggested_labels(config.suggested_labels.clone())
        })
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_suggested_labels(mut self, labels: Vec<String>) -> Self {
        self.suggested_labels = labels;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(&self, batch: &str) -> serde_json::Value {
        let instruction = self
            .system_instruction
            .as_deref()
            .unwrap_or(prompt::DEFAULT_SYSTEM_INSTRUCTION);

        json!({
            "systemInstruction": {
                "parts": [{ "text": instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt::build_prompt(batch, &self.suggested_labels) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": prompt::response_schema()
            }
        })
    }

    async fn generate(&self, batch: &str) -> Result<Vec<ClassifiedItem>, ClassifierError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClassifierError::MissingApiKey)?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(batch))
            .send()
            .await?;

        let body: GenerateContentResponse = Self::handle_response(response).await?;
        parse_items(&body)
    }

    /// Handle response, converting HTTP errors to ClassifierError.
    async fn handle_response(
        response: reqwest::Response,
    ) -> Result<GenerateContentResponse, ClassifierError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Gemini returned {}: {}", status, body);
        match status {
            StatusCode::BAD_REQUEST => Err(ClassifierError::BadRequest(body)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClassifierError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(ClassifierError::RateLimited(body)),
            _ => Err(ClassifierError::Server(format!("{}: {}", status, body))),
        }
    }
}

impl Classifier for GeminiClassifier {
    fn classify_batch<'a>(
        &'a self,
        batch: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ClassifiedItem>, ClassifierError>> {
        Box::pin(self.generate(batch))
    }
}

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

/// Pull the JSON array out of the first candidate's text parts.
pub fn parse_items(response: &GenerateContentResponse) -> Result<Vec<ClassifiedItem>, ClassifierError> {
    let candidate = response
        .candidates
        .first()
        .ok_or(ClassifierError::EmptyResponse)?;

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        if let Some(reason) = &candidate.finish_reason {
            tracing::warn!("Gemini candidate had no text (finish reason: {})", reason);
        }
        return Err(ClassifierError::EmptyResponse);
    }

    serde_json::from_str(text.trim()).map_err(|e| ClassifierError::InvalidResponse(e.to_string()))
}
