//! HTTP oracle over an OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Oracle, OracleError, OracleErrorKind, OracleRequest};
use crate::config::SolverConfig;

/// Error bodies are cut to this many characters in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    referer: String,
    temperature: f32,
    max_tokens: u32,
    read_timeout: Duration,
}

impl HttpOracle {
    /// Build a client with separate connect and read timeouts. There is no
    /// overall deadline; a slow but steadily streaming reply is not cut off.
    pub fn from_config(config: &SolverConfig) -> Result<Self, OracleError> {
        let read_timeout = config.escalation.read_timeout();
        let client = reqwest::Client::builder()
            .connect_timeout(config.escalation.connect_timeout())
            .read_timeout(read_timeout)
            .build()
            .map_err(OracleError::from)?;

        Ok(Self {
            client,
            endpoint: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            temperature: config.escalation.temperature,
            max_tokens: config.escalation.max_tokens,
            read_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(OracleError::new(
                OracleErrorKind::from_status(status.as_u16()),
                preview,
            ));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| OracleError::new(OracleErrorKind::Malformed, "response carried no content"))?;

        debug!(chars = content.len(), "Oracle responded");
        Ok(content)
    }
}
