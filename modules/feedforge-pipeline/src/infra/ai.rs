// AiService adapter over the OpenAI-compatible client.

use anyhow::Result;
use async_trait::async_trait;

use ai_client::OpenAi;
use feedforge_common::Config;

use crate::traits::AiService;

pub struct OpenAiService {
    client: OpenAi,
}

impl OpenAiService {
    pub fn new(config: &Config) -> Self {
        let mut client = OpenAi::new(&config.openai_api_key, &config.openai_model)
            .with_embedding_model(&config.embedding_model);
        if let Some(base_url) = &config.openai_base_url {
            client = client.with_base_url(base_url);
        }
        Self { client }
    }
}

#[async_trait]
impl AiService for OpenAiService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.client.complete(prompt).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}
