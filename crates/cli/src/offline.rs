//! Offline providers for local dry runs. Nothing leaves the machine: text is
//! echoed back, media gets placeholder URLs and posts get local receipts.
//! Usage is estimated from word counts so budgets still behave.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use engine::Settings;
use nodes::adapters::{
    Asset, CompletionRequest, CompletionResponse, GenerationProvider, GenerationRequest,
    GenerationResponse, LanguageModelProvider, PublishFailure, PublishReceipt, PublishRequest,
    Publisher, PublisherSet, TokenUsage, Usage,
};
use nodes::{AdapterError, Capabilities, Modality, NodeRegistry};

const PLATFORMS: [&str; 6] = ["twitter", "linkedin", "instagram", "facebook", "tiktok", "youtube"];

fn words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Built-in registry wired to offline providers and the settings' agents
/// and rates.
pub fn registry(settings: &Settings) -> NodeRegistry {
    let publishers = PLATFORMS.iter().fold(PublisherSet::new(), |set, platform| {
        set.with(*platform, Arc::new(EchoPublisher::new(platform)))
    });

    NodeRegistry::builtin(Capabilities {
        generation: Arc::new(EchoGeneration),
        language_model: Arc::new(EchoLanguageModel),
        publishers,
        agents: Arc::new(settings.agent_registry()),
        rates: settings.rates,
    })
}

struct EchoGeneration;

#[async_trait]
impl GenerationProvider for EchoGeneration {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, AdapterError> {
        let count = request.count.max(1);
        let response = match request.modality {
            Modality::Text => GenerationResponse {
                assets: vec![Asset::text(format!("[offline] {}", request.prompt))],
                usage: Usage {
                    input_tokens: words(&request.prompt),
                    output_tokens: words(&request.prompt) + 1,
                    units: 0,
                },
                safety_flags: vec![],
            },
            Modality::Image => GenerationResponse {
                assets: (1..=count)
                    .map(|n| Asset::media(format!("offline://image/{n}.png"), "image/png"))
                    .collect(),
                usage: Usage { units: count as u64, ..Usage::default() },
                safety_flags: vec![],
            },
            Modality::Video => {
                let seconds = request.duration_seconds.unwrap_or(15);
                GenerationResponse {
                    assets: vec![Asset::media("offline://video/1.mp4", "video/mp4")],
                    usage: Usage { units: seconds as u64, ..Usage::default() },
                    safety_flags: vec![],
                }
            }
        };
        Ok(response)
    }
}

struct EchoLanguageModel;

#[async_trait]
impl LanguageModelProvider for EchoLanguageModel {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AdapterError> {
        Ok(CompletionResponse {
            usage: TokenUsage {
                input_tokens: words(&request.system_prompt) + words(&request.user_prompt),
                output_tokens: words(&request.user_prompt),
            },
            text: request.user_prompt,
        })
    }
}

struct EchoPublisher {
    platform: String,
    posted: AtomicU64,
}

impl EchoPublisher {
    fn new(platform: &str) -> Self {
        Self { platform: platform.to_owned(), posted: AtomicU64::new(0) }
    }
}

#[async_trait]
impl Publisher for EchoPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishFailure> {
        if request.content.trim().is_empty() && request.media.is_empty() {
            return Err(PublishFailure::ContentRejected("nothing to publish".into()));
        }
        let n = self.posted.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PublishReceipt {
            platform_post_id: format!("offline-{n}"),
            url: format!("offline://{}/{n}", self.platform),
        })
    }
}
