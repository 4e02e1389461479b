use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};

pub const DEFAULT_MAX_TOKENS: usize = 512;
pub const PAD_TOKEN: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Cl100k,
    O200k,
    P50k,
}

impl TokenizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenizerKind::Cl100k => "cl100k_base",
            TokenizerKind::O200k => "o200k_base",
            TokenizerKind::P50k => "p50k_base",
        }
    }

    fn build(&self) -> Result<CoreBPE> {
        let bpe = match self {
            TokenizerKind::Cl100k => tiktoken_rs::cl100k_base(),
            TokenizerKind::O200k => tiktoken_rs::o200k_base(),
            TokenizerKind::P50k => tiktoken_rs::p50k_base(),
        };
        bpe.map_err(|e| RagError::Tokenizer(e.to_string()))
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenizerKind {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(TokenizerKind::Cl100k),
            "o200k" | "o200k_base" => Ok(TokenizerKind::O200k),
            "p50k" | "p50k_base" | "gpt2" => Ok(TokenizerKind::P50k),
            other => Err(RagError::Config(format!("unknown tokenizer '{other}'"))),
        }
    }
}

/// Token ids for a batch of texts, right-padded with [`PAD_TOKEN`] to the
/// longest row. `attention_mask[i][j]` is 1 for real tokens and 0 for padding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenBatch {
    pub input_ids: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u8>>,
}

impl TokenBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    pub fn width(&self) -> usize {
        self.input_ids.first().map_or(0, Vec::len)
    }

    /// The unpadded tokens of row `row`.
    pub fn tokens(&self, row: usize) -> Vec<u32> {
        match (self.input_ids.get(row), self.attention_mask.get(row)) {
            (Some(ids), Some(mask)) => ids
                .iter()
                .zip(mask)
                .filter(|(_, m)| **m != 0)
                .map(|(id, _)| *id)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<u32>> + '_ {
        (0..self.len()).map(|row| self.tokens(row))
    }
}

pub struct Tokenizer {
    kind: TokenizerKind,
    max_tokens: usize,
    bpe: CoreBPE,
}

impl Tokenizer {
    pub fn new(kind: TokenizerKind, max_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be positive".into()));
        }
        Ok(Self {
            kind,
            max_tokens,
            bpe: kind.build()?,
        })
    }

    pub fn kind(&self) -> TokenizerKind {
        self.kind
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Token ids of `text`, truncated to `max_tokens`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .take(self.max_tokens)
            .map(|id| id as u32)
            .collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    pub fn batch<I, S>(&self, texts: I) -> TokenBatch
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows: Vec<Vec<u32>> = texts
            .into_iter()
            .map(|text| self.encode(text.as_ref()))
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut batch = TokenBatch {
            input_ids: Vec::with_capacity(rows.len()),
            attention_mask: Vec::with_capacity(rows.len()),
        };
        for mut ids in rows {
            let mut mask = vec![1u8; ids.len()];
            mask.resize(width, 0);
            ids.resize(width, PAD_TOKEN);
            batch.input_ids.push(ids);
            batch.attention_mask.push(mask);
        }
        batch
    }
}
