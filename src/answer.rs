use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::{ApiConfig, MessagesConfig};

#[derive(Debug, Serialize)]
struct QuestionRequest<'a> {
    question: &'a str,
}

/// Outcome of asking the answer API. Failures are already logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    /// The API answered with an empty result list
    NotUnderstood,
    /// The API could not be reached or returned something unusable
    Unavailable,
}

impl Answer {
    pub fn kind(&self) -> &'static str {
        match self {
            Answer::Text(_) => "answered",
            Answer::NotUnderstood => "not understood",
            Answer::Unavailable => "unavailable",
        }
    }

    pub fn into_text(self, messages: &MessagesConfig) -> String {
        match self {
            Answer::Text(text) => text,
            Answer::NotUnderstood => messages.not_understood.clone(),
            Answer::Unavailable => messages.server_error.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response has no `data` list")]
    MissingData,
    #[error("first result has no string `answer`")]
    MissingAnswer,
}

/// Client for the question-answering API
pub struct AnswerClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl AnswerClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Ask a question. Never fails: every error becomes [`Answer::Unavailable`].
    pub async fn ask(&self, question: &str) -> Answer {
        match self.fetch(question).await {
            Ok(Some(text)) => Answer::Text(text),
            Ok(None) => Answer::NotUnderstood,
            Err(e) => {
                error!("Error fetching answer: {}", e);
                Answer::Unavailable
            }
        }
    }

    /// Returns `Ok(None)` when the API answered with an empty list.
    async fn fetch(&self, question: &str) -> Result<Option<String>, FetchError> {
        debug!("Sending question to answer API: {}", self.config.url);

        let response = self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("Bearer {}", self.config.auth_token))
            .header("Content-Type", "application/json")
            .json(&QuestionRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let body = response.text().await?;
        extract_answer(&serde_json::from_str(&body)?)
    }
}

/// Pull `data[0].answer` out of an API response body.
fn extract_answer(body: &Value) -> Result<Option<String>, FetchError> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or(FetchError::MissingData)?;

    match data.first() {
        None => Ok(None),
        Some(first) => first
            .get("answer")
            .and_then(Value::as_str)
            .map(|answer| Some(answer.to_string()))
            .ok_or(FetchError::MissingAnswer),
    }
}
