use std::env;
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const API_KEY_VAR: &str = "CHATGPT_API_KEY";

const ORGANIZE_INSTRUCTION: &str =
    "Sort these tasks by importance and necessity, in the same language, without adding any extra text:";

#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("CHATGPT_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("request to the chat completion API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat completion API answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode chat completion response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("chat completion response contained no choices")]
    EmptyResponse,
}

/// Something that can put a task list into a sensible order.
#[async_trait]
pub trait Organizer: Send + Sync {
    /// Returns the reordered list as text ready to show the user.
    async fn organize(&self, tasks: &[String]) -> Result<String, OrganizeError>;
}

pub struct OpenAiClient {
    api_key: Option<String>,
    api_url: Url,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, api_url: Url, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            api_url,
            model: model.into(),
            client,
        })
    }

    /// Build a client whose key comes from `CHATGPT_API_KEY`.
    ///
    /// A missing key is not an error here; every `organize` call reports it
    /// instead, so the rest of the bot keeps working without one.
    pub fn from_env(api_url: Url, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = env::var(API_KEY_VAR).ok().filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("{} is not set, /organize will fail", API_KEY_VAR);
        }

        Self::new(api_key, api_url, model, timeout)
    }
}

#[async_trait]
impl Organizer for OpenAiClient {
    async fn organize(&self, tasks: &[String]) -> Result<String, OrganizeError> {
        let api_key = self.api_key.as_deref().ok_or(OrganizeError::MissingApiKey)?;

        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": organize_prompt(tasks)
                }
            ]
        });

        debug!("Sending request to {}: {}", self.api_url, request_body);

        let response = self
            .client
            .post(self.api_url.clone())
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            error!("Chat completion request failed with {}: {}", status, body);
            return Err(OrganizeError::Status { status, body });
        }

        debug!("Received chat completion response: {}", body);

        extract_reply(&body)
    }
}

/// The instruction sent to the model: a fixed request followed by one task per line.
pub fn organize_prompt(tasks: &[String]) -> String {
    format!("{}\n{}", ORGANIZE_INSTRUCTION, tasks.join("\n"))
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Pull the first choice's message text out of a chat completion body.
fn extract_reply(body: &str) -> Result<String, OrganizeError> {
    let response: CompletionResponse = serde_json::from_str(body)?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(OrganizeError::EmptyResponse)
}
