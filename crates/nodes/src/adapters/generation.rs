//! Text / image / video generation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{cancellable, parse_inputs, AdapterOutput, CapabilityAdapter};
use crate::{AdapterError, AdapterErrorKind, GenerateConfig, Modality};

/// Request sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub modality: Modality,
    pub prompt: String,
    /// Target platform, used by providers to pick formats and lengths.
    pub platform_hint: Option<String>,
    pub aspect_ratio: Option<String>,
    pub count: u32,
    pub duration_seconds: Option<u32>,
    pub params: Map<String, Value>,
}

/// One generated artifact. Text generations fill `text`, media fill `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Asset {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn media(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            mime_type: Some(mime_type.into()),
            ..Self::default()
        }
    }
}

/// Provider-reported consumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    /// Images produced, or seconds of video.
    #[serde(default)]
    pub units: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub assets: Vec<Asset>,
    pub usage: Usage,
    #[serde(default)]
    pub safety_flags: Vec<String>,
}

/// External generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest)
        -> Result<GenerationResponse, AdapterError>;
}

/// Published per-unit prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRates {
    #[serde(default)]
    pub text_input_per_1k: f64,
    #[serde(default)]
    pub text_output_per_1k: f64,
    #[serde(default)]
    pub image_per_unit: f64,
    #[serde(default)]
    pub video_per_second: f64,
}

impl GenerationRates {
    pub fn cost(&self, modality: Modality, usage: &Usage) -> f64 {
        match modality {
            Modality::Text => {
                usage.input_tokens as f64 / 1000.0 * self.text_input_per_1k
                    + usage.output_tokens as f64 / 1000.0 * self.text_output_per_1k
            }
            Modality::Image => usage.units as f64 * self.image_per_unit,
            Modality::Video => usage.units as f64 * self.video_per_second,
        }
    }
}

pub struct GenerationAdapter {
    provider: Arc<dyn GenerationProvider>,
    rates: GenerationRates,
}

impl GenerationAdapter {
    pub fn new(provider: Arc<dyn GenerationProvider>, rates: GenerationRates) -> Self {
        Self { provider, rates }
    }
}

#[async_trait]
impl CapabilityAdapter for GenerationAdapter {
    async fn invoke(
        &self,
        operation: &str,
        inputs: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, AdapterError> {
        let modality: Modality = operation.parse().map_err(AdapterError::invalid_input)?;
        let config: GenerateConfig = parse_inputs(inputs)?;

        if config.prompt.trim().is_empty() {
            return Err(AdapterError::invalid_input("prompt is empty"));
        }

        let request = GenerationRequest {
            modality,
            prompt: config.prompt,
            platform_hint: config.platform,
            aspect_ratio: config.aspect_ratio,
            count: config.count.max(1),
            duration_seconds: config.duration_seconds,
            params: config.params,
        };

        let response = cancellable(cancel, self.provider.generate(request)).await?;

        if response.assets.is_empty() && !response.safety_flags.is_empty() {
            return Err(AdapterError::new(
                AdapterErrorKind::ContentRejected,
                format!("provider flagged content: {}", response.safety_flags.join(", ")),
            ));
        }

        let cost = self.rates.cost(modality, &response.usage);
        debug!(
            modality = modality.as_str(),
            cost,
            assets = response.assets.len(),
            "generation complete"
        );

        Ok(AdapterOutput::new(shape_output(modality, &response), cost))
    }
}

fn shape_output(modality: Modality, response: &GenerationResponse) -> Value {
    let mut out = Map::new();

    if modality == Modality::Text {
        let text = response
            .assets
            .iter()
            .filter_map(|a| a.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n\n");
        out.insert("text".into(), Value::String(text));
    } else {
        let urls: Vec<Value> = response
            .assets
            .iter()
            .filter_map(|a| a.url.clone().map(Value::String))
            .collect();
        out.insert("urls".into(), Value::Array(urls));
    }

    out.insert("assets".into(), json!(response.assets));
    out.insert("usage".into(), json!(response.usage));
    if !response.safety_flags.is_empty() {
        out.insert("safety_flags".into(), json!(response.safety_flags));
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerationProvider;

    fn rates() -> GenerationRates {
        GenerationRates {
            text_input_per_1k: 0.01,
            text_output_per_1k: 0.03,
            image_per_unit: 0.04,
            video_per_second: 0.5,
        }
    }

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn cost_uses_modality_specific_rates() {
        let usage = Usage { input_tokens: 2000, output_tokens: 1000, units: 3 };
        let r = rates();
        assert!((r.cost(Modality::Text, &usage) - 0.05).abs() < 1e-9);
        assert!((r.cost(Modality::Image, &usage) - 0.12).abs() < 1e-9);
        assert!((r.cost(Modality::Video, &usage) - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn text_generation_returns_text_and_cost() {
        let provider = Arc::new(MockGenerationProvider::new());
        provider.push_ok(GenerationResponse {
            assets: vec![Asset::text("An essay on AI")],
            usage: Usage { input_tokens: 1000, output_tokens: 1000, units: 0 },
            safety_flags: vec![],
        });
        let adapter = GenerationAdapter::new(provider.clone(), rates());

        let out = adapter
            .invoke(
                "text",
                &inputs(json!({ "modality": "text", "prompt": "Write about AI", "platform": "linkedin" })),
                &CancellationToken::new(),
            )
            .await
            .expect("generation succeeds");

        assert_eq!(out.output["text"], "An essay on AI");
        assert!((out.cost_estimate - 0.04).abs() < 1e-9);

        let seen = provider.requests();
        assert_eq!(seen[0].prompt, "Write about AI");
        assert_eq!(seen[0].platform_hint.as_deref(), Some("linkedin"));
    }

    #[tokio::test]
    async fn image_generation_lists_urls() {
        let provider = Arc::new(MockGenerationProvider::new());
        provider.push_ok(GenerationResponse {
            assets: vec![Asset::media("https://cdn/a.png", "image/png")],
            usage: Usage { units: 1, ..Usage::default() },
            safety_flags: vec![],
        });
        let adapter = GenerationAdapter::new(provider, rates());

        let out = adapter
            .invoke(
                "image",
                &inputs(json!({ "modality": "image", "prompt": "a cat" })),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.output["urls"], json!(["https://cdn/a.png"]));
        assert!((out.cost_estimate - 0.04).abs() < 1e-9);
    }

    #[tokio::test]
    async fn flagged_empty_response_is_content_rejected() {
        let provider = Arc::new(MockGenerationProvider::new());
        provider.push_ok(GenerationResponse {
            assets: vec![],
            usage: Usage::default(),
            safety_flags: vec!["violence".into()],
        });
        let adapter = GenerationAdapter::new(provider, rates());

        let err = adapter
            .invoke(
                "image",
                &inputs(json!({ "modality": "image", "prompt": "x" })),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::ContentRejected);
    }

    #[tokio::test]
    async fn unknown_operation_and_empty_prompt_are_invalid_input() {
        let adapter = GenerationAdapter::new(Arc::new(MockGenerationProvider::new()), rates());
        let cancel = CancellationToken::new();

        let err = adapter
            .invoke("audio", &inputs(json!({ "modality": "text", "prompt": "x" })), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);

        let err = adapter
            .invoke("text", &inputs(json!({ "modality": "text", "prompt": "  " })), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);
    }
}
