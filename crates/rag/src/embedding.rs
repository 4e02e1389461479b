use std::env;

use folio_index::EncoderFingerprint;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::tokenizer::{TokenBatch, TokenizerKind, DEFAULT_MAX_TOKENS};

pub const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Maps a padded token batch to one fixed-length vector per row. Padding must
/// not influence the output, so a text encodes the same in any batch.
pub trait TextEncoder {
    fn fingerprint(&self) -> &EncoderFingerprint;
    fn encode(&self, batch: &TokenBatch) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ModelConfig {
    Hash {
        #[serde(default = "default_hash_dimensions")]
        dimensions: usize,
        #[serde(default = "default_seed")]
        seed: u64,
    },
    #[serde(rename = "openai")]
    OpenAi {
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_openai_dimensions")]
        dimensions: usize,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Hash {
            dimensions: default_hash_dimensions(),
            seed: default_seed(),
        }
    }
}

impl ModelConfig {
    pub fn openai() -> Self {
        ModelConfig::OpenAi {
            model: default_openai_model(),
            dimensions: default_openai_dimensions(),
            endpoint: default_openai_endpoint(),
        }
    }
}

fn default_hash_dimensions() -> usize {
    256
}

fn default_seed() -> u64 {
    1337
}

fn default_openai_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_dimensions() -> usize {
    1536
}

fn default_openai_endpoint() -> String {
    OPENAI_EMBEDDINGS_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub tokenizer: TokenizerKind,
    pub max_tokens: usize,
    pub model: ModelConfig,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerKind::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            model: ModelConfig::default(),
        }
    }
}

impl EncoderConfig {
    fn fingerprint(&self, backend: &str, model: String, dimension: usize) -> EncoderFingerprint {
        EncoderFingerprint {
            backend: backend.to_string(),
            model,
            dimension,
            tokenizer: self.tokenizer.name().to_string(),
            max_tokens: self.max_tokens,
        }
    }
}

pub enum EncoderBackend {
    Hash(HashEncoder),
    OpenAi(OpenAiEncoder),
}

impl EncoderBackend {
    pub fn load(config: &EncoderConfig) -> Result<Self> {
        let backend = match &config.model {
            ModelConfig::Hash { dimensions, seed } => {
                EncoderBackend::Hash(HashEncoder::new(config, *dimensions, *seed)?)
            }
            ModelConfig::OpenAi {
                model,
                dimensions,
                endpoint,
            } => {
                let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
                    RagError::Config("OPENAI_API_KEY is required for openai embeddings".into())
                })?;
                EncoderBackend::OpenAi(OpenAiEncoder::new(
                    config,
                    model,
                    *dimensions,
                    endpoint,
                    api_key,
                )?)
            }
        };
        tracing::debug!(encoder = %backend.fingerprint(), "loaded encoder");
        Ok(backend)
    }
}

impl TextEncoder for EncoderBackend {
    fn fingerprint(&self) -> &EncoderFingerprint {
        match self {
            EncoderBackend::Hash(encoder) => encoder.fingerprint(),
            EncoderBackend::OpenAi(encoder) => encoder.fingerprint(),
        }
    }

    fn encode(&self, batch: &TokenBatch) -> Result<Vec<Vec<f32>>> {
        match self {
            EncoderBackend::Hash(encoder) => encoder.encode(batch),
            EncoderBackend::OpenAi(encoder) => encoder.encode(batch),
        }
    }
}

/// Offline encoder: bag of hashed token ids, L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEncoder {
    seed: u64,
    fingerprint: EncoderFingerprint,
}

impl HashEncoder {
    pub fn new(config: &EncoderConfig, dimensions: usize, seed: u64) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("hash encoder needs dimensions > 0".into()));
        }
        Ok(Self {
            seed,
            fingerprint: config.fingerprint("hash", format!("seed-{seed}"), dimensions),
        })
    }

    pub fn embed_tokens(&self, tokens: &[u32]) -> Vec<f32> {
        let mut vector = vec![0f32; self.fingerprint.dimension];
        for token in tokens {
            vector[self.bucket_for(*token)] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    /// Bucket assignment must not depend on the build, or persisted indexes
    /// would silently stop matching their queries.
    fn bucket_for(&self, token: u32) -> usize {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&token.to_le_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        (u64::from_le_bytes(word) % self.fingerprint.dimension as u64) as usize
    }
}

impl TextEncoder for HashEncoder {
    fn fingerprint(&self) -> &EncoderFingerprint {
        &self.fingerprint
    }

    fn encode(&self, batch: &TokenBatch) -> Result<Vec<Vec<f32>>> {
        Ok(batch.rows().map(|tokens| self.embed_tokens(&tokens)).collect())
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

/// Remote encoder backed by the OpenAI embeddings endpoint. Token ids are sent
/// directly, without padding, so the remote model sees exactly the truncated
/// document. The endpoint reads token arrays as cl100k_base ids.
pub struct OpenAiEncoder {
    http: Client,
    model: String,
    endpoint: String,
    api_key: String,
    fingerprint: EncoderFingerprint,
}

impl OpenAiEncoder {
    pub fn new(
        config: &EncoderConfig,
        model: &str,
        dimensions: usize,
        endpoint: &str,
        api_key: String,
    ) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("openai encoder needs dimensions > 0".into()));
        }
        if config.tokenizer != TokenizerKind::Cl100k {
            return Err(RagError::Config(format!(
                "openai encoder requires the cl100k tokenizer, got {}",
                config.tokenizer.name()
            )));
        }
        Ok(Self {
            http: Client::new(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            api_key,
            fingerprint: config.fingerprint("openai", model.to_string(), dimensions),
        })
    }

    fn request_body(&self, batch: &TokenBatch) -> serde_json::Value {
        let inputs: Vec<Vec<u32>> = batch.rows().collect();
        serde_json::json!({
            "model": self.model,
            "input": inputs,
            "dimensions": self.fingerprint.dimension,
            "encoding_format": "float",
        })
    }
}

impl TextEncoder for OpenAiEncoder {
    fn fingerprint(&self) -> &EncoderFingerprint {
        &self.fingerprint
    }

    fn encode(&self, batch: &TokenBatch) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(batch))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RagError::Encoder(format!(
                "openai embeddings request failed: {status}: {body}"
            )));
        }
        let parsed: OpenAiEmbeddingResponse = response.json()?;
        parse_embeddings(parsed, batch.len(), self.fingerprint.dimension)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn parse_embeddings(
    response: OpenAiEmbeddingResponse,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(RagError::Encoder(format!(
            "openai returned {} embeddings for {expected} inputs",
            data.len()
        )));
    }
    data.sort_by_key(|item| item.index);
    let mut out = Vec::with_capacity(data.len());
    for (position, item) in data.into_iter().enumerate() {
        if item.index != position {
            return Err(RagError::Encoder(format!(
                "openai response is missing embedding {position}"
            )));
        }
        if item.embedding.len() != dimension {
            return Err(RagError::Encoder(format!(
                "openai embedding {position} has dimension {}, expected {dimension}",
                item.embedding.len()
            )));
        }
        out.push(item.embedding);
    }
    Ok(out)
}
