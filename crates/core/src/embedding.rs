use crate::error::{FinError, Result};

/// Turns text into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, each of
/// length [`Embedder::dimensions`].
pub trait Embedder {
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = vec![text.to_string()];
        let mut output = self.embed_batch(&inputs)?;
        output
            .pop()
            .ok_or_else(|| FinError::Embedding("embedder returned no vector".to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedderConfig {
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self {
        Self {
            dimensions: 64,
            seed: 1337,
        }
    }
}

/// Offline bag-of-tokens embedder. Each lowercased whitespace token is hashed
/// into a bucket and the counts are L2-normalised.
///
/// Buckets come from BLAKE3 over the seed and the token bytes, so vectors
/// persisted by one build stay comparable with queries from another.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    config: HashEmbedderConfig,
    name: String,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Self {
        let dims = config.dimensions.max(1);
        Self {
            config: HashEmbedderConfig {
                dimensions: dims,
                seed: config.seed,
            },
            name: format!("hash-{dims}"),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.config.dimensions];
        for token in text.split_whitespace() {
            let bucket = self.bucket_for(token);
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    fn bucket_for(&self, token: &str) -> usize {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.config.seed.to_le_bytes());
        hasher.update(token.to_lowercase().as_bytes());
        let hash = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.config.dimensions as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HashEmbedderConfig::default())
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(inputs.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
