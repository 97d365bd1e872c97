use std::env;

use finlens_core::{Embedder, FinError, HashEmbedder, HashEmbedderConfig, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::info;

use crate::config::{EmbeddingProvider, EmbeddingSettings};

pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

#[derive(Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    /// Builds the configured backend. Fails when the model cannot be used,
    /// which callers treat as fatal.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let client = match settings.provider {
            EmbeddingProvider::OpenAi => {
                let model = settings
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
                Self {
                    backend: EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(&model)?),
                }
            }
            EmbeddingProvider::Hash => Self {
                backend: EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig {
                    dimensions: settings.dimensions,
                    seed: 1337,
                })),
            },
        };
        info!(
            model = client.model_name(),
            dimensions = client.dimensions(),
            "loaded embedding model"
        );
        Ok(client)
    }
}

impl Embedder for EmbeddingClient {
    fn dimensions(&self) -> usize {
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => embedder.dimensions(),
            EmbeddingBackend::OpenAi(client) => client.dimensions,
        }
    }

    fn model_name(&self) -> &str {
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => embedder.model_name(),
            EmbeddingBackend::OpenAi(client) => &client.model,
        }
    }

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => embedder.embed_batch(inputs),
            EmbeddingBackend::OpenAi(client) => client.embed_batch(inputs),
        }
    }
}

/// Output width of the OpenAI embedding models this client accepts.
pub fn openai_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http: Client,
    model: String,
    dimensions: usize,
    api_key: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str) -> Result<Self> {
        let dimensions = openai_dimensions(model)
            .ok_or_else(|| FinError::Embedding(format!("unknown openai embedding model {model}")))?;
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            FinError::Embedding("OPENAI_API_KEY is required for openai embeddings".to_string())
        })?;
        Ok(Self {
            http: Client::new(),
            model: model.to_string(),
            dimensions,
            api_key,
        })
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = "https://api.openai.com/v1/embeddings";
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| FinError::Embedding(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FinError::Embedding(format!(
                "openai embeddings request failed: {}",
                response.status()
            )));
        }
        let mut parsed: OpenAiEmbeddingResponse = response
            .json()
            .map_err(|e| FinError::Embedding(e.to_string()))?;
        parsed.data.sort_by_key(|data| data.index);
        Ok(parsed.data.into_iter().map(|data| data.embedding).collect())
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_settings_respect_dimensions() {
        let client = EmbeddingClient::from_settings(&EmbeddingSettings {
            provider: EmbeddingProvider::Hash,
            model: None,
            dimensions: 32,
        })
        .unwrap();
        assert_eq!(client.dimensions(), 32);
        assert_eq!(client.model_name(), "hash-32");
        assert_eq!(client.embed("net income").unwrap().len(), 32);
    }

    #[test]
    fn unknown_openai_model_fails_at_construction() {
        let err = OpenAiEmbeddingClient::new("all-MiniLM-L6-v2").err().unwrap();
        assert!(matches!(err, FinError::Embedding(_)));
    }

    #[test]
    fn known_openai_models_have_dimensions() {
        assert_eq!(openai_dimensions("text-embedding-3-small"), Some(1536));
        assert_eq!(openai_dimensions("text-embedding-3-large"), Some(3072));
    }
}
