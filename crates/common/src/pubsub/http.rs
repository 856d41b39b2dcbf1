use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use super::backend::{PubSubBackend, ReceivedMessage};
use super::PubSubError;

/// Source of the bearer token sent with every backend request
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    async fn token(&self) -> Result<String, PubSubError>;
}

/// A pre-issued access token, e.g. from `CAIRN_PUBSUB_TOKEN`
#[derive(Clone)]
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, PubSubError> {
        if self.0.is_empty() {
            return Err(PubSubError::Token("no pubsub access token configured".into()));
        }
        Ok(self.0.clone())
    }
}

/// Backend speaking the Google Cloud Pub/Sub v1 REST API
#[derive(Clone)]
pub struct HttpPubSubBackend {
    endpoint: Url,
    project: String,
    tokens: Arc<dyn TokenProvider>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateSubscriptionRequest {
    topic: String,
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: usize,
    return_immediately: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    message_id: String,
    #[serde(default)]
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest {
    ack_ids: Vec<String>,
}

impl HttpPubSubBackend {
    pub fn new(endpoint: Url, project: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            endpoint,
            project: project.into(),
            tokens,
            client: reqwest::Client::new(),
        }
    }

    /// `endpoint` with `segments` appended, keeping any path prefix it has.
    fn api_url(&self, segments: &[&str]) -> Result<Url, PubSubError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("pubsub endpoint {} cannot be a base", self.endpoint))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn topic_url(&self, topic: &str, verb: &str) -> Result<Url, PubSubError> {
        let topic = format!("{}{}", topic, verb);
        self.api_url(&["projects", self.project.as_str(), "topics", topic.as_str()])
    }

    fn subscription_url(&self, subscription_id: &str, verb: &str) -> Result<Url, PubSubError> {
        let subscription = format!("{}{}", subscription_id, verb);
        self.api_url(&[
            "projects",
            self.project.as_str(),
            "subscriptions",
            subscription.as_str(),
        ])
    }

    fn topic_path(&self, topic: &str) -> String {
        format!("projects/{}/topics/{}", self.project, topic)
    }

    async fn send<T: Serialize>(
        &self,
        method: reqwest::Method,
        url: Url,
        body: &T,
    ) -> Result<reqwest::Response, PubSubError> {
        let token = self.tokens.token().await?;
        let response = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PubSubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PubSubError::Backend(status.as_u16(), body))
    }
}

#[async_trait]
impl PubSubBackend for HttpPubSubBackend {
    async fn create_subscription(&self, subscription_id: &str, topic: &str) -> Result<(), PubSubError> {
        let url = self.subscription_url(subscription_id, "")?;
        let body = CreateSubscriptionRequest {
            topic: self.topic_path(topic),
        };
        let response = self.send(reqwest::Method::PUT, url, &body).await?;
        if response.status() == StatusCode::CONFLICT {
            tracing::debug!("subscription {} already exists", subscription_id);
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, data: String) -> Result<(), PubSubError> {
        let url = self.topic_url(topic, ":publish")?;
        let body = PublishRequest {
            messages: vec![OutgoingMessage { data }],
        };
        Self::check(self.send(reqwest::Method::POST, url, &body).await?).await?;
        Ok(())
    }

    async fn pull(
        &self,
        subscription_id: &str,
        max_messages: usize,
    ) -> Result<Vec<ReceivedMessage>, PubSubError> {
        let url = self.subscription_url(subscription_id, ":pull")?;
        let body = PullRequest {
            max_messages,
            return_immediately: true,
        };
        let response = Self::check(self.send(reqwest::Method::POST, url, &body).await?).await?;
        let pulled: PullResponse = response.json().await?;
        Ok(pulled
            .received_messages
            .into_iter()
            .map(|received| ReceivedMessage {
                ack_id: received.ack_id,
                message_id: received.message.message_id,
                data: received.message.data,
            })
            .collect())
    }

    async fn acknowledge(&self, subscription_id: &str, ack_ids: Vec<String>) -> Result<(), PubSubError> {
        let url = self.subscription_url(subscription_id, ":acknowledge")?;
        let body = AcknowledgeRequest { ack_ids };
        Self::check(self.send(reqwest::Method::POST, url, &body).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn backend(endpoint: &str) -> HttpPubSubBackend {
        HttpPubSubBackend::new(
            Url::parse(endpoint).unwrap(),
            "rentals",
            Arc::new(StaticTokenProvider::new("tok")),
        )
    }

    #[test]
    fn test_urls_keep_endpoint_prefix() {
        let proxied = backend("https://gateway.example/pubsub/");
        assert_eq!(
            proxied.subscription_url("sub-1", ":pull").unwrap().as_str(),
            "https://gateway.example/pubsub/v1/projects/rentals/subscriptions/sub-1:pull"
        );

        let direct = backend("https://pubsub.googleapis.com");
        assert_eq!(
            direct.topic_url("apt-42", ":publish").unwrap().as_str(),
            "https://pubsub.googleapis.com/v1/projects/rentals/topics/apt-42:publish"
        );
    }
}
