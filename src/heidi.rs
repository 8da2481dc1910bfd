//! Heidi clinical API client.
//!
//! Bearer-authenticated JSON calls against the Heidi REST surface, with a
//! locally minted token per request and a single retry on transient
//! failures. Every call returns a `Result`; substituting fallbacks on
//! failure is the caller's decision, never the client's.

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HeidiConfig;
use crate::jwt::{self, JwtError};
use crate::models::{
    Collection, Document, DocumentsPayload, Note, NotesPayload, PatientProfile, ProfilePayload,
    Session,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra attempts after the first on transient failures.
const MAX_RETRIES: u32 = 1;
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum HeidiError {
    #[error("Invalid Heidi API URL: {0}")]
    Url(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Failed to sign Heidi API token: {0}")]
    Token(#[from] JwtError),

    #[error("Heidi API rate limit exceeded")]
    RateLimited,

    #[error("Heidi API error: {status}")]
    Upstream { status: StatusCode },

    #[error("Heidi AI conversation response carried no id")]
    MissingConversationId,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Whether an HTTP status is worth one more attempt.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Whether a transport error is worth one more attempt.
fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Exponential backoff with jitter, capped.
fn calculate_backoff(attempt: u32) -> Duration {
    let base_delay = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let capped_delay = base_delay.min(MAX_BACKOFF_MS);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_millis() as u64)
        % 100;
    Duration::from_millis(capped_delay + jitter)
}

#[derive(Debug, Deserialize)]
struct ConversationCreated {
    id: Option<String>,
    #[serde(rename = "conversationId")]
    conversation_id: Option<String>,
}

impl ConversationCreated {
    fn into_id(self) -> Option<String> {
        self.id.or(self.conversation_id)
    }
}

#[derive(Debug, Default, Deserialize)]
struct MessageReply {
    response: Option<String>,
    content: Option<String>,
    message: Option<String>,
}

impl MessageReply {
    /// Candidate reply fields in priority order.
    fn into_text(self) -> String {
        self.response
            .or(self.content)
            .or(self.message)
            .unwrap_or_default()
    }
}

pub struct HeidiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    jwt_secret: String,
}

impl HeidiClient {
    pub fn new(config: &HeidiConfig) -> Result<Self, HeidiError> {
        let cleaned_url = config.api_url.trim_end_matches('/');

        let parsed = url::Url::parse(cleaned_url)
            .map_err(|e| HeidiError::Url(format!("'{}': {}", cleaned_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HeidiError::Url(format!(
                "must use http or https scheme, got: {}",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HeidiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: cleaned_url.to_string(),
            api_key: config.api_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, HeidiError> {
        let token = jwt::mint(&self.api_key, &self.jwt_secret)?;
        let url = format!("{}{}", self.base_url, path);

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = calculate_backoff(attempt - 1);
                warn!("Heidi {} {} failed, retrying in {:?}", method, path, delay);
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }
                    if is_retryable_status(status) && attempt < MAX_RETRIES {
                        attempt += 1;
                        continue;
                    }
                    let error_body = response.text().await.unwrap_or_default();
                    warn!(
                        "Heidi API error ({}): {} - {}",
                        path,
                        status,
                        truncate(&error_body)
                    );
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(HeidiError::RateLimited);
                    }
                    return Err(HeidiError::Upstream { status });
                }
                Err(err) if is_retryable_error(&err) && attempt < MAX_RETRIES => {
                    attempt += 1;
                }
                Err(err) => return Err(HeidiError::Network(err)),
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HeidiError> {
        debug!("Fetching from Heidi API: {}", path);
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, HeidiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Session metadata for one clinical encounter session.
    pub async fn session(&self, session_id: &str) -> Result<Session, HeidiError> {
        self.get(&format!("/patient-sessions/{}", session_id)).await
    }

    /// All notes belonging to a session, in upstream order.
    pub async fn session_notes(&self, session_id: &str) -> Result<Vec<Note>, HeidiError> {
        let payload: NotesPayload = self
            .get(&format!("/patient-sessions/{}/notes", session_id))
            .await?;
        Ok(payload.into_notes())
    }

    /// Patient document references.
    pub async fn documents(&self) -> Result<Vec<Document>, HeidiError> {
        let payload: DocumentsPayload = self.get("/documents").await?;
        Ok(payload.into_documents())
    }

    /// Patient demographics.
    pub async fn patient_profile(&self) -> Result<PatientProfile, HeidiError> {
        let payload: ProfilePayload = self.get("/patient/profile").await?;
        Ok(payload.into_profile())
    }

    /// One of the `/sessions/{name}` timeline collections.
    pub async fn session_collection<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Collection<T>, HeidiError> {
        self.get(&format!("/sessions/{}", name)).await
    }

    /// Ask the Heidi AI: open a conversation, post the prompt, return the
    /// reply text.
    pub async fn ask_ai(&self, title: &str, prompt: &str) -> Result<String, HeidiError> {
        let conversation: ConversationCreated = self
            .post("/conversations", &serde_json::json!({ "title": title }))
            .await?;
        let conversation_id = conversation
            .into_id()
            .ok_or(HeidiError::MissingConversationId)?;
        debug!("Heidi AI conversation created: {}", conversation_id);

        let reply: MessageReply = self
            .post(
                &format!("/conversations/{}/messages", conversation_id),
                &serde_json::json!({ "content": prompt }),
            )
            .await?;
        Ok(reply.into_text())
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config(api_url: &str) -> HeidiConfig {
        HeidiConfig {
            api_key: "test-key".to_string(),
            jwt_secret: "test-secret".to_string(),
            api_url: api_url.to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(HeidiClient::new(&test_config("https://api.heidi.health")).is_ok());
        assert!(HeidiClient::new(&test_config("http://localhost:8103/")).is_ok());
        assert!(HeidiClient::new(&test_config("not-a-url")).is_err());
        assert!(HeidiClient::new(&test_config("ftp://api.heidi.health")).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HeidiClient::new(&test_config("http://localhost:8103/")).unwrap();
        assert_eq!(client.base_url, "http://localhost:8103");
    }

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert!(calculate_backoff(0) >= Duration::from_millis(500));
        assert!(calculate_backoff(1) >= Duration::from_millis(1000));
        assert!(calculate_backoff(10) <= Duration::from_millis(MAX_BACKOFF_MS + 100));
    }

    #[test]
    fn test_conversation_id_priority() {
        let both: ConversationCreated =
            serde_json::from_value(json!({ "id": "a", "conversationId": "b" })).unwrap();
        assert_eq!(both.into_id().as_deref(), Some("a"));

        let alt: ConversationCreated =
            serde_json::from_value(json!({ "conversationId": "b" })).unwrap();
        assert_eq!(alt.into_id().as_deref(), Some("b"));

        let neither: ConversationCreated = serde_json::from_value(json!({})).unwrap();
        assert!(neither.into_id().is_none());
    }

    #[test]
    fn test_message_reply_field_priority() {
        let all: MessageReply = serde_json::from_value(json!({
            "response": "r", "content": "c", "message": "m"
        }))
        .unwrap();
        assert_eq!(all.into_text(), "r");

        let content: MessageReply =
            serde_json::from_value(json!({ "content": "c", "message": "m" })).unwrap();
        assert_eq!(content.into_text(), "c");

        let message: MessageReply = serde_json::from_value(json!({ "message": "m" })).unwrap();
        assert_eq!(message.into_text(), "m");

        let empty: MessageReply = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.into_text(), "");
    }

    #[test]
    fn test_truncate_handles_multibyte() {
        let long = "é".repeat(300);
        assert_eq!(truncate(&long).chars().count(), 200);
    }
}
