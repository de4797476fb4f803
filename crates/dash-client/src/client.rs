use dash_core::config::ClientConfig;
use dash_core::error::{DashError, Result};
use dash_core::types::{Analysis, Message, MessagePatch};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

/// HTTP client for the message store API.
#[derive(Clone)]
pub struct DashClient {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
}

impl DashClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.api_base).map_err(|e| {
            DashError::Config(format!("Invalid api_base '{}': {}", config.api_base, e))
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("convo-dash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Build an endpoint URL from path segments (each segment is percent-encoded).
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DashError::Config(format!("api_base cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        let url = self.endpoint(segments)?;
        tracing::debug!("GET {}", url);
        let resp = self.request(reqwest::Method::GET, url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status()?;
        Ok(Some(resp.json::<T>().await?))
    }

    async fn fetch_list(&self, segments: &[&str]) -> Vec<Message> {
        match self.get_json::<Vec<Message>>(segments).await {
            Ok(messages) => messages.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to fetch /{}: {}", segments.join("/"), e);
                Vec::new()
            }
        }
    }

    /// Every message. Empty when the API is unreachable.
    pub async fn fetch_all(&self) -> Vec<Message> {
        self.fetch_list(&["conversations"]).await
    }

    /// Latest message per conversation. Empty when the API is unreachable.
    pub async fn fetch_unique(&self) -> Vec<Message> {
        self.fetch_list(&["conversations", "unique"]).await
    }

    /// One conversation, oldest first. Empty when the API is unreachable.
    pub async fn fetch_group(&self, conversation_id: &str) -> Vec<Message> {
        self.fetch_list(&["conversations", "group", conversation_id])
            .await
    }

    /// Analysis text for a conversation, if any.
    pub async fn fetch_analysis(&self, conversation_id: &str) -> Option<Analysis> {
        match self
            .get_json::<Analysis>(&["analysis", conversation_id])
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Failed to fetch analysis for {}: {}", conversation_id, e);
                None
            }
        }
    }

    pub async fn create(&self, message: &Message) -> Result<Message> {
        let url = self.endpoint(&["conversations"])?;
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(message)
            .send()
            .await?;
        Ok(check(resp).await?.json::<Message>().await?)
    }

    pub async fn update(&self, id: &str, patch: &MessagePatch) -> Result<Message> {
        let url = self.endpoint(&["conversations", id])?;
        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(patch)
            .send()
            .await?;
        Ok(check(resp).await?.json::<Message>().await?)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["conversations", id])?;
        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        check(resp).await?;
        Ok(())
    }
}

/// Map API error statuses onto [`DashError`] variants.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    let message = body
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
        .to_string();
    Err(match status {
        StatusCode::NOT_FOUND => DashError::NotFound(message),
        StatusCode::CONFLICT => DashError::Conflict(message),
        StatusCode::BAD_REQUEST => DashError::InvalidInput(message),
        _ => DashError::Store(format!("{}: {}", status, message)),
    })
}
