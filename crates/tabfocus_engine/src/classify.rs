use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tabfocus_core::{AiRunMeta, GroupSuggestion, Settings, Tab};
use tabfocus_logging::{focus_debug, focus_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::prompt::build_request;
use crate::response::parse_completion;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Hard limit for one request, response body included.
    pub request_timeout: Duration,
    pub retry_backoff: Duration,
    pub max_response_bytes: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            retry_backoff: Duration::from_millis(500),
            max_response_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOutput {
    pub groups: Vec<GroupSuggestion>,
    pub meta: AiRunMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyFailure {
    MissingApiKey,
    Timeout,
    HttpStatus(u16),
    Network,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Empty,
    InvalidJson,
    NoValidGroups,
}

impl ClassifyFailure {
    /// Stable code surfaced in hints and run metadata.
    pub fn code(&self) -> String {
        match self {
            ClassifyFailure::MissingApiKey => "MISSING_API_KEY".to_string(),
            ClassifyFailure::Timeout => "AI_TIMEOUT".to_string(),
            ClassifyFailure::HttpStatus(status) => format!("AI_HTTP_{status}"),
            ClassifyFailure::Network => "AI_NETWORK".to_string(),
            ClassifyFailure::TooLarge { .. } => "AI_RESPONSE_TOO_LARGE".to_string(),
            ClassifyFailure::Empty => "AI_RESPONSE_EMPTY".to_string(),
            ClassifyFailure::InvalidJson => "AI_RESPONSE_INVALID_JSON".to_string(),
            ClassifyFailure::NoValidGroups => "AI_RESPONSE_NO_VALID_GROUPS".to_string(),
        }
    }
}

impl fmt::Display for ClassifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyFailure::MissingApiKey => write!(f, "missing api key"),
            ClassifyFailure::Timeout => write!(f, "timeout"),
            ClassifyFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ClassifyFailure::Network => write!(f, "network error"),
            ClassifyFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            ClassifyFailure::Empty => write!(f, "empty response"),
            ClassifyFailure::InvalidJson => write!(f, "invalid json"),
            ClassifyFailure::NoValidGroups => write!(f, "no valid groups"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClassifyError {
    pub kind: ClassifyFailure,
    pub message: String,
}

impl ClassifyError {
    pub fn new(kind: ClassifyFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> String {
        self.kind.code()
    }
}

/// Turns a tab list into raw group suggestions.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, tabs: &[Tab], settings: &Settings)
        -> Result<ClassifyOutput, ClassifyError>;
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    settings: ClassifierSettings,
    shutdown: CancellationToken,
}

impl OpenAiClassifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self {
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token aborts any in-flight request as a timeout.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn build_client(&self) -> Result<reqwest::Client, ClassifyError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .build()
            .map_err(|err| ClassifyError::new(ClassifyFailure::Network, err.to_string()))
    }

    async fn request_once(
        &self,
        client: &reqwest::Client,
        tabs: &[Tab],
        settings: &Settings,
        model: &str,
    ) -> Result<Vec<GroupSuggestion>, ClassifyError> {
        let timeout = self.settings.request_timeout;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                Err(ClassifyError::new(ClassifyFailure::Timeout, "classifier shut down"))
            }
            _ = tokio::time::sleep(timeout) => {
                Err(ClassifyError::new(
                    ClassifyFailure::Timeout,
                    format!("no response within {}ms", timeout.as_millis()),
                ))
            }
            result = self.send(client, tabs, settings, model) => result,
        }
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        tabs: &[Tab],
        settings: &Settings,
        model: &str,
    ) -> Result<Vec<GroupSuggestion>, ClassifyError> {
        let payload = build_request(tabs, model, settings.include_full_url);
        let body = serde_json::to_vec(&payload)
            .map_err(|err| ClassifyError::new(ClassifyFailure::InvalidJson, err.to_string()))?;

        let response = client
            .post(&self.settings.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", settings.openai_api_key.trim()),
            )
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::new(
                ClassifyFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_response_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ClassifyError::new(
                    ClassifyFailure::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ClassifyError::new(
                    ClassifyFailure::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        focus_debug!("Classifier response: {} bytes from {}", bytes.len(), model);

        parse_completion(&bytes, tabs.len())
    }
}

impl Default for OpenAiClassifier {
    fn default() -> Self {
        Self::new(ClassifierSettings::default())
    }
}

#[async_trait::async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(
        &self,
        tabs: &[Tab],
        settings: &Settings,
    ) -> Result<ClassifyOutput, ClassifyError> {
        if !settings.has_api_key() {
            return Err(ClassifyError::new(
                ClassifyFailure::MissingApiKey,
                "no API key configured",
            ));
        }
        let client = self.build_client()?;

        let mut model = settings.model.trim().to_string();
        let mut used_fallback_model = false;
        let mut attempt = 0;
        loop {
            match self.request_once(&client, tabs, settings, &model).await {
                Ok(groups) => {
                    return Ok(ClassifyOutput {
                        groups,
                        meta: AiRunMeta {
                            primary_model: settings.model.clone(),
                            fallback_model: settings.fallback_model.clone(),
                            used_fallback_model,
                            ai_error_code: None,
                        },
                    });
                }
                Err(err) if attempt < MAX_RETRIES && !self.shutdown.is_cancelled() => {
                    focus_warn!("Classifier attempt {} with {} failed: {}", attempt + 1, model, err);
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                    if let Some(fallback) = settings.retry_model() {
                        model = fallback.to_string();
                        used_fallback_model = true;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ClassifyError {
    if err.is_timeout() {
        return ClassifyError::new(ClassifyFailure::Timeout, err.to_string());
    }
    ClassifyError::new(ClassifyFailure::Network, err.to_string())
}
