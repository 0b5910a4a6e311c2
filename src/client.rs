use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_TEMPLATE: &str = "default";

#[derive(Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
    template: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub weaviate_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// HTTP client for the assistant backend. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct RagClient {
    client: Client,
    base_url: String,
}

impl RagClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one query and return the backend's answer.
    pub async fn chat(&self, query: &str, api_key: Option<&str>) -> ChatResult<String> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, chars = query.chars().count(), "sending chat query");

        let request = ChatRequest {
            query,
            template: DEFAULT_TEMPLATE,
        };

        let response = with_api_key(self.client.post(&url), api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }

        let body = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&body)?;
        Ok(chat_response.answer)
    }

    /// Ask the backend to drop its conversation history.
    ///
    /// Only a transport failure is an error here: any response that comes
    /// back, whatever its status, counts as cleared.
    pub async fn clear(&self, api_key: Option<&str>) -> ChatResult<()> {
        let url = format!("{}/clear", self.base_url);
        debug!(%url, "clearing backend history");

        let response = with_api_key(self.client.post(&url), api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "clear endpoint answered with a non-success status");
        }
        Ok(())
    }

    pub async fn health(&self) -> ChatResult<Health> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Attach the key header only when a key is present.
fn with_api_key(builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key.filter(|k| !k.is_empty()) {
        Some(key) => builder.header(API_KEY_HEADER, key),
        None => builder,
    }
}
