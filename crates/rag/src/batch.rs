use folio_core::Document;
use folio_index::EmbeddingMatrix;
use serde::{Deserialize, Serialize};

use crate::embedding::TextEncoder;
use crate::error::{RagError, Result};
use crate::tokenizer::Tokenizer;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_GLOBAL_LIMIT: usize = 13_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub batch_size: usize,
    /// Documents past this many are dropped before encoding starts.
    pub global_limit: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            global_limit: DEFAULT_GLOBAL_LIMIT,
        }
    }
}

impl EncodeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RagError::Config("batch_size must be positive".into()));
        }
        Ok(())
    }

    pub fn limit<'a>(&self, documents: &'a [Document]) -> &'a [Document] {
        &documents[..documents.len().min(self.global_limit)]
    }
}

/// Vectors in document order; `vectors.row(i)` belongs to `tickers[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub tickers: Vec<String>,
    pub vectors: EmbeddingMatrix,
}

pub struct BatchEncoder<'a, E: TextEncoder + ?Sized> {
    tokenizer: &'a Tokenizer,
    encoder: &'a E,
    options: EncodeOptions,
}

impl<'a, E: TextEncoder + ?Sized> BatchEncoder<'a, E> {
    pub fn new(tokenizer: &'a Tokenizer, encoder: &'a E, options: EncodeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            tokenizer,
            encoder,
            options,
        })
    }

    pub fn encode(&self, documents: &[Document]) -> Result<Encoded> {
        let documents = self.options.limit(documents);
        let dimension = self.encoder.fingerprint().dimension;
        let mut vectors = EmbeddingMatrix::with_capacity(dimension, documents.len())?;
        let mut tickers = Vec::with_capacity(documents.len());
        let total_batches = documents.len().div_ceil(self.options.batch_size);

        for (batch, chunk) in documents.chunks(self.options.batch_size).enumerate() {
            let first = chunk[0].ticker.clone();
            let tokens = self.tokenizer.batch(chunk.iter().map(|doc| doc.text.as_str()));
            let embedded = self
                .encoder
                .encode(&tokens)
                .map_err(|err| RagError::Batch {
                    batch,
                    ticker: first.clone(),
                    source: Box::new(err),
                })?;
            if embedded.len() != chunk.len() {
                return Err(RagError::CountMismatch {
                    batch,
                    ticker: first,
                    expected: chunk.len(),
                    actual: embedded.len(),
                });
            }
            for (document, vector) in chunk.iter().zip(embedded) {
                if vector.len() != dimension {
                    return Err(RagError::DimensionMismatch {
                        batch,
                        ticker: document.ticker.clone(),
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                vectors.push(&vector)?;
                tickers.push(document.ticker.clone());
            }
            tracing::debug!(
                batch = batch + 1,
                of = total_batches,
                size = chunk.len(),
                "encoded batch"
            );
        }
        Ok(Encoded { tickers, vectors })
    }
}

/// Encodes one free-text query exactly as documents are encoded.
pub fn encode_query<E: TextEncoder + ?Sized>(
    tokenizer: &Tokenizer,
    encoder: &E,
    text: &str,
) -> Result<Vec<f32>> {
    let mut vectors = encoder.encode(&tokenizer.batch([text]))?;
    let dimension = encoder.fingerprint().dimension;
    match vectors.pop() {
        Some(vector) if vectors.is_empty() && vector.len() == dimension => Ok(vector),
        Some(vector) if vectors.is_empty() => Err(RagError::Encoder(format!(
            "query vector has dimension {}, expected {dimension}",
            vector.len()
        ))),
        _ => Err(RagError::Encoder(
            "encoder did not return exactly one query vector".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EncoderConfig, HashEncoder};
    use crate::tokenizer::{TokenBatch, TokenizerKind};
    use folio_index::EncoderFingerprint;

    fn documents(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document {
                ticker: format!("T{i:02}"),
                text: format!("The ETF's ticker is T{i:02}. Fund number {i} tracks index {}.", i * 7),
            })
            .collect()
    }

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(TokenizerKind::Cl100k, 64).unwrap()
    }

    fn hash() -> HashEncoder {
        HashEncoder::new(&EncoderConfig::default(), 24, 1337).unwrap()
    }

    /// Returns vectors whose width depends on the row index.
    struct RaggedEncoder(EncoderFingerprint);

    impl TextEncoder for RaggedEncoder {
        fn fingerprint(&self) -> &EncoderFingerprint {
            &self.0
        }

        fn encode(&self, batch: &TokenBatch) -> Result<Vec<Vec<f32>>> {
            Ok((0..batch.len())
                .map(|row| vec![0.5; if row == 1 { 3 } else { 2 }])
                .collect())
        }
    }

    struct FailingEncoder(EncoderFingerprint);

    impl TextEncoder for FailingEncoder {
        fn fingerprint(&self) -> &EncoderFingerprint {
            &self.0
        }

        fn encode(&self, _: &TokenBatch) -> Result<Vec<Vec<f32>>> {
            Err(RagError::Encoder("out of memory".into()))
        }
    }

    fn fingerprint(dimension: usize) -> EncoderFingerprint {
        EncoderFingerprint {
            backend: "test".into(),
            model: "fixed".into(),
            dimension,
            tokenizer: "cl100k_base".into(),
            max_tokens: 64,
        }
    }

    #[test]
    fn batch_size_does_not_change_vectors() {
        let docs = documents(23);
        let tokenizer = tokenizer();
        let encoder = hash();
        let single = BatchEncoder::new(
            &tokenizer,
            &encoder,
            EncodeOptions {
                batch_size: 1,
                ..EncodeOptions::default()
            },
        )
        .unwrap()
        .encode(&docs)
        .unwrap();
        let tens = BatchEncoder::new(&tokenizer, &encoder, EncodeOptions::default())
            .unwrap()
            .encode(&docs)
            .unwrap();
        assert_eq!(single.tickers, tens.tickers);
        for (a, b) in single.vectors.iter_rows().zip(tens.vectors.iter_rows()) {
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn global_limit_truncates_before_encoding() {
        let docs = documents(12);
        let tokenizer = tokenizer();
        let encoder = hash();
        let options = EncodeOptions {
            batch_size: 5,
            global_limit: 7,
        };
        let encoded = BatchEncoder::new(&tokenizer, &encoder, options)
            .unwrap()
            .encode(&docs)
            .unwrap();
        assert_eq!(encoded.vectors.rows(), 7);
        assert_eq!(encoded.tickers.last().map(String::as_str), Some("T06"));
    }

    #[test]
    fn zero_batch_size_is_a_configuration_error() {
        let tokenizer = tokenizer();
        let encoder = hash();
        let options = EncodeOptions {
            batch_size: 0,
            ..EncodeOptions::default()
        };
        assert!(matches!(
            BatchEncoder::new(&tokenizer, &encoder, options),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn dimension_mismatch_names_the_ticker() {
        let tokenizer = tokenizer();
        let encoder = RaggedEncoder(fingerprint(2));
        let err = BatchEncoder::new(&tokenizer, &encoder, EncodeOptions::default())
            .unwrap()
            .encode(&documents(3))
            .unwrap_err();
        match err {
            RagError::DimensionMismatch {
                batch,
                ticker,
                expected,
                actual,
            } => {
                assert_eq!((batch, ticker.as_str(), expected, actual), (0, "T01", 2, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn encoder_failure_aborts_with_batch_context() {
        let tokenizer = tokenizer();
        let encoder = FailingEncoder(fingerprint(2));
        let options = EncodeOptions {
            batch_size: 2,
            ..EncodeOptions::default()
        };
        let err = BatchEncoder::new(&tokenizer, &encoder, options)
            .unwrap()
            .encode(&documents(4))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("batch 0 starting at T00"), "{message}");
        assert!(message.contains("out of memory"), "{message}");
    }

    #[test]
    fn query_encoding_matches_document_encoding() {
        let docs = documents(3);
        let tokenizer = tokenizer();
        let encoder = hash();
        let encoded = BatchEncoder::new(&tokenizer, &encoder, EncodeOptions::default())
            .unwrap()
            .encode(&docs)
            .unwrap();
        let query = encode_query(&tokenizer, &encoder, &docs[2].text).unwrap();
        assert_eq!(encoded.vectors.row(2), Some(query.as_slice()));
    }
}
