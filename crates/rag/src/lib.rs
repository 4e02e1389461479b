pub mod batch;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod tokenizer;

pub use batch::{
    encode_query, BatchEncoder, EncodeOptions, Encoded, DEFAULT_BATCH_SIZE, DEFAULT_GLOBAL_LIMIT,
};
pub use embedding::{
    EncoderBackend, EncoderConfig, HashEncoder, ModelConfig, OpenAiEncoder, TextEncoder,
    OPENAI_EMBEDDINGS_URL,
};
pub use error::{RagError, Result};
pub use pipeline::{
    build_index, corpus_digest, open_index, query_index, BuildOutcome, BuildReport, BuildRequest,
};
pub use tokenizer::{TokenBatch, Tokenizer, TokenizerKind, DEFAULT_MAX_TOKENS, PAD_TOKEN};
