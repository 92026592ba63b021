use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AskRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    answer: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("server returned status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Seam between the chat controller and the answering service. Request
/// tasks are spawned against this trait, so tests can drive the controller
/// with a fake service and scripted latency.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn ask(&self, query: &str) -> Result<String, AskError>;
}

/// HTTP client for the answering service: `POST {base_url}/ask` with
/// `{"query": ...}`, answering `{"answer": ...}`. No timeout is set; a
/// request waits on the endpoint until it settles.
#[derive(Clone)]
pub struct AskClient {
    client: Client,
    base_url: String,
}

impl AskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QueryService for AskClient {
    async fn ask(&self, query: &str) -> Result<String, AskError> {
        let url = format!("{}/ask", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AskRequest { query })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AskError::Status(response.status()));
        }

        let body: AskResponse = response.json().await?;
        Ok(body.answer)
    }
}
