//! Platform publishing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{cancellable, parse_inputs, AdapterOutput, CapabilityAdapter};
use crate::{ActionConfig, AdapterError, AdapterErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub content: String,
    pub media: Vec<String>,
    pub account_credentials_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub platform_post_id: String,
    pub url: String,
}

/// Failures a platform publisher may report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishFailure {
    #[error("credentials expired: {0}")]
    AuthExpired(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("content rejected: {0}")]
    ContentRejected(String),
    #[error("network error: {0}")]
    Network(String),
}

impl From<PublishFailure> for AdapterError {
    fn from(failure: PublishFailure) -> Self {
        let kind = match &failure {
            PublishFailure::AuthExpired(_)     => AdapterErrorKind::AuthExpired,
            PublishFailure::RateLimited(_)     => AdapterErrorKind::RateLimited,
            PublishFailure::ContentRejected(_) => AdapterErrorKind::ContentRejected,
            PublishFailure::Network(_)         => AdapterErrorKind::ProviderUnavailable,
        };
        AdapterError::new(kind, failure.to_string())
    }
}

/// External per-platform publisher.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishFailure>;
}

/// Publishers keyed by platform name.
#[derive(Clone, Default)]
pub struct PublisherSet {
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl PublisherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, platform: impl Into<String>, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.insert(platform.into(), publisher);
        self
    }

    pub fn get(&self, platform: &str) -> Option<&Arc<dyn Publisher>> {
        self.publishers.get(platform)
    }
}

pub struct PublishAdapter {
    publishers: PublisherSet,
}

impl PublishAdapter {
    pub fn new(publishers: PublisherSet) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl CapabilityAdapter for PublishAdapter {
    async fn invoke(
        &self,
        _operation: &str,
        inputs: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, AdapterError> {
        let config: ActionConfig = parse_inputs(inputs)?;
        let publisher = self.publishers.get(&config.platform).ok_or_else(|| {
            AdapterError::invalid_input(format!("no publisher for platform '{}'", config.platform))
        })?;

        let media = media_urls(&config.media)?;
        if config.content.trim().is_empty() && media.is_empty() {
            return Err(AdapterError::invalid_input(
                "nothing to publish: content and media are empty",
            ));
        }

        let request = PublishRequest {
            content: config.content,
            media,
            account_credentials_ref: config.account,
        };

        let receipt = cancellable(cancel, async {
            publisher.publish(request).await.map_err(AdapterError::from)
        })
        .await?;

        info!(platform = %config.platform, post_id = %receipt.platform_post_id, "published");

        Ok(AdapterOutput::new(
            json!({
                "platform": config.platform,
                "platform_post_id": receipt.platform_post_id,
                "url": receipt.url,
            }),
            0.0,
        ))
    }
}

/// Accepts a URL, a list of URLs or asset objects, or a generation output
/// carrying `urls`.
fn media_urls(media: &Value) -> Result<Vec<String>, AdapterError> {
    match media {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Object(obj) => obj
                    .get("url")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| AdapterError::invalid_input("media object without url")),
                other => Err(AdapterError::invalid_input(format!(
                    "unsupported media entry: {other}"
                ))),
            })
            .collect(),
        Value::Object(obj) => match obj.get("urls") {
            Some(urls) => media_urls(urls),
            None => Err(AdapterError::invalid_input("media object without urls")),
        },
        other => Err(AdapterError::invalid_input(format!("unsupported media value: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPublisher;

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn publishes_and_returns_receipt() {
        let publisher = Arc::new(MockPublisher::new());
        let adapter = PublishAdapter::new(PublisherSet::new().with("linkedin", publisher.clone()));

        let out = adapter
            .invoke(
                "publish",
                &inputs(json!({
                    "platform": "linkedin",
                    "content": "Hello world",
                    "media": [{ "url": "https://cdn/a.png" }, "https://cdn/b.png"],
                    "account": "acct-42"
                })),
                &CancellationToken::new(),
            )
            .await
            .expect("publish succeeds");

        assert_eq!(out.output["platform"], "linkedin");
        assert!(out.output["platform_post_id"].as_str().is_some());
        assert_eq!(out.cost_estimate, 0.0);

        let seen = publisher.requests();
        assert_eq!(seen[0].media, vec!["https://cdn/a.png", "https://cdn/b.png"]);
        assert_eq!(seen[0].account_credentials_ref, "acct-42");
    }

    #[tokio::test]
    async fn platform_failures_are_normalized() {
        let cases = [
            (PublishFailure::AuthExpired("token".into()), AdapterErrorKind::AuthExpired),
            (PublishFailure::RateLimited("429".into()), AdapterErrorKind::RateLimited),
            (PublishFailure::ContentRejected("policy".into()), AdapterErrorKind::ContentRejected),
            (PublishFailure::Network("reset".into()), AdapterErrorKind::ProviderUnavailable),
        ];

        for (failure, expected) in cases {
            let publisher = Arc::new(MockPublisher::new());
            publisher.push_err(failure);
            let adapter = PublishAdapter::new(PublisherSet::new().with("x", publisher));
            let err = adapter
                .invoke(
                    "publish",
                    &inputs(json!({ "platform": "x", "content": "hi", "account": "a" })),
                    &CancellationToken::new(),
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind, expected);
        }
    }

    #[tokio::test]
    async fn unknown_platform_and_empty_post_are_invalid() {
        let adapter = PublishAdapter::new(PublisherSet::new().with("x", Arc::new(MockPublisher::new())));
        let cancel = CancellationToken::new();

        let err = adapter
            .invoke(
                "publish",
                &inputs(json!({ "platform": "myspace", "content": "hi", "account": "a" })),
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);

        let err = adapter
            .invoke("publish", &inputs(json!({ "platform": "x", "content": " ", "account": "a" })), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);
    }

    #[test]
    fn media_accepts_generation_output() {
        let media = json!({ "urls": ["https://cdn/v.mp4"], "assets": [] });
        assert_eq!(media_urls(&media).unwrap(), vec!["https://cdn/v.mp4"]);
        assert!(media_urls(&json!(42)).is_err());
    }
}
