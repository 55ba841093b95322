//! OpenAI-compatible provider. Works against api.openai.com and any
//! compatible endpoint (Azure OpenAI, Voyage AI for embeddings) via
//! `with_base_url`.

mod client;
mod types;

use anyhow::Result;

use client::OpenAiClient;
use types::{ChatMessage, ChatRequest};

pub struct OpenAi {
    client: OpenAiClient,
    model: String,
    embedding_model: String,
}

impl OpenAi {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: OpenAiClient::new(api_key),
            model: model.to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.client = self.client.with_base_url(url);
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        self.client.chat(&request).await
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.embedding_model, text).await
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(&self.embedding_model, &texts).await
    }
}
