//! Plain-language health explainer backed by Gemini's OpenAI-compatible
//! chat-completions endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GeminiConfig;

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Returned when the model reply carries no content.
pub const FALLBACK_EXPLANATION: &str = "I couldn't generate an explanation at this time.";

const SYSTEM_PROMPT: &str = "\
You are a friendly, helpful AI health assistant that explains medical information in plain, simple language.

Your role:
- Explain medical terms, diagnoses, and procedures in everyday language
- Break down lab results and what they mean for the patient
- Explain medications, their purposes, and how they work
- Provide context about treatments and what to expect
- Use analogies and simple examples to make complex concepts understandable
- Be empathetic, supportive, and reassuring
- Always remind users to consult their healthcare provider for medical advice

Guidelines:
- Avoid medical jargon - use simple, everyday words
- Be concise but thorough
- Use bullet points for clarity
- Include analogies when helpful
- Keep a warm, conversational tone
- Never diagnose or provide medical advice - only explain existing information";

#[derive(Debug, Error)]
pub enum ExplainerError {
    #[error("Gemini API key is required")]
    MissingKey,

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    #[error("AI service requires payment. Please contact support.")]
    PaymentRequired,

    #[error("AI service error")]
    Upstream { status: StatusCode },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct ExplainerClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ExplainerClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ExplainerError> {
        if config.api_key.trim().is_empty() {
            return Err(ExplainerError::MissingKey);
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ExplainerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Compose the user message, embedding record context when supplied.
    fn build_user_message(query: &str, context: Option<&Value>) -> String {
        match context {
            Some(context) => format!(
                "Context from medical records:\n{}\n\nQuestion: {}",
                serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string()),
                query
            ),
            None => query.to_string(),
        }
    }

    fn build_request(&self, query: &str, context: Option<&Value>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_user_message(query, context),
                },
            ],
            stream: false,
        }
    }

    /// Request a non-streaming explanation for one query.
    pub async fn explain(
        &self,
        query: &str,
        context: Option<&Value>,
    ) -> Result<String, ExplainerError> {
        info!("Processing health explanation query ({} chars)", query.len());

        let response = self
            .client
            .post(GEMINI_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(query, context))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ExplainerError::RateLimited);
            }
            if status == StatusCode::PAYMENT_REQUIRED {
                return Err(ExplainerError::PaymentRequired);
            }
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                "AI gateway error {}: {}",
                status,
                error_body.chars().take(200).collect::<String>()
            );
            return Err(ExplainerError::Upstream { status });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        Ok(Self::extract_content(parsed))
    }

    fn extract_content(response: ChatCompletionResponse) -> String {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_else(|| FALLBACK_EXPLANATION.to_string())
    }
}
