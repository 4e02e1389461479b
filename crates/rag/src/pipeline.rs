use folio_core::{render_all, Document, EtfRecord};
use folio_index::{ArtifactPaths, EncoderFingerprint, Hit, IndexBundle};

use crate::batch::{encode_query, BatchEncoder, EncodeOptions};
use crate::embedding::TextEncoder;
use crate::error::Result;
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildRequest {
    pub options: EncodeOptions,
    /// Rebuild even when the artifacts on disk already match the corpus.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub rendered: usize,
    pub indexed: usize,
    pub dimension: usize,
    pub corpus_digest: String,
}

/// Digest of exactly what would be encoded: every document in order plus the
/// encoder that would embed it.
pub fn corpus_digest(documents: &[Document], encoder: &EncoderFingerprint) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(encoder.to_string().as_bytes());
    hasher.update(b"\n");
    for document in documents {
        hasher.update(document.digest().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Renders `records`, encodes them in batches and writes the index and
/// embeddings files. Nothing is re-encoded when the artifacts at `paths`
/// already carry the same corpus digest, unless the request forces it.
pub fn build_index<E: TextEncoder + ?Sized>(
    records: &[EtfRecord],
    tokenizer: &Tokenizer,
    encoder: &E,
    paths: &ArtifactPaths,
    request: &BuildRequest,
) -> Result<BuildReport> {
    request.options.validate()?;
    let documents = render_all(records)?;
    let selected = request.options.limit(&documents);
    if selected.len() < documents.len() {
        tracing::warn!(
            rendered = documents.len(),
            limit = request.options.global_limit,
            "document count exceeds global limit; extra documents are not indexed"
        );
    }
    let fingerprint = encoder.fingerprint();
    let digest = corpus_digest(selected, fingerprint);

    if !request.force && paths.exist() {
        match IndexBundle::load_for(paths, fingerprint) {
            Ok(existing) if existing.manifest().corpus_digest == digest => {
                tracing::info!(
                    count = existing.len(),
                    index = %paths.index.display(),
                    "index is up to date; skipping encode"
                );
                return Ok(BuildReport {
                    outcome: BuildOutcome::Unchanged,
                    rendered: documents.len(),
                    indexed: existing.len(),
                    dimension: existing.manifest().dimension,
                    corpus_digest: digest,
                });
            }
            Ok(_) => tracing::info!("corpus changed since last build; rebuilding index"),
            Err(err) => tracing::warn!(error = %err, "existing index unusable; rebuilding"),
        }
    }

    tracing::info!(
        documents = selected.len(),
        batch_size = request.options.batch_size,
        encoder = %fingerprint,
        "encoding documents"
    );
    let encoded = BatchEncoder::new(tokenizer, encoder, request.options)?.encode(selected)?;
    let bundle = IndexBundle::build(
        encoded.tickers,
        encoded.vectors,
        fingerprint.clone(),
        digest.clone(),
    )?;
    bundle.save(paths)?;
    Ok(BuildReport {
        outcome: BuildOutcome::Built,
        rendered: documents.len(),
        indexed: bundle.len(),
        dimension: bundle.manifest().dimension,
        corpus_digest: digest,
    })
}

/// Loads the artifacts at `paths`, refusing them unless they were built by
/// `encoder`.
pub fn open_index<E: TextEncoder + ?Sized>(paths: &ArtifactPaths, encoder: &E) -> Result<IndexBundle> {
    Ok(IndexBundle::load_for(paths, encoder.fingerprint())?)
}

/// The `top_k` tickers nearest to free text `question`.
pub fn query_index<E: TextEncoder + ?Sized>(
    bundle: &IndexBundle,
    tokenizer: &Tokenizer,
    encoder: &E,
    question: &str,
    top_k: usize,
) -> Result<Vec<Hit>> {
    let vector = encode_query(tokenizer, encoder, question)?;
    let hits = bundle.query(&vector, top_k)?;
    tracing::debug!(hits = hits.len(), top_k, "queried index");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(model: &str) -> EncoderFingerprint {
        EncoderFingerprint {
            backend: "hash".into(),
            model: model.into(),
            dimension: 8,
            tokenizer: "cl100k_base".into(),
            max_tokens: 512,
        }
    }

    fn document(ticker: &str, text: &str) -> Document {
        Document {
            ticker: ticker.into(),
            text: text.into(),
        }
    }

    #[test]
    fn corpus_digest_tracks_text_order_and_encoder() {
        let docs = vec![document("AAA", "alpha"), document("BBB", "beta")];
        let base = corpus_digest(&docs, &fingerprint("seed-1"));
        assert_eq!(base, corpus_digest(&docs.clone(), &fingerprint("seed-1")));

        let reordered = vec![docs[1].clone(), docs[0].clone()];
        assert_ne!(base, corpus_digest(&reordered, &fingerprint("seed-1")));
        let edited = vec![docs[0].clone(), document("BBB", "beta!")];
        assert_ne!(base, corpus_digest(&edited, &fingerprint("seed-1")));
        assert_ne!(base, corpus_digest(&docs, &fingerprint("seed-2")));
    }
}
