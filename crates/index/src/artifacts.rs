use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{IndexError, Result};
use crate::flat::{FlatL2Index, Neighbor};
use crate::matrix::EmbeddingMatrix;

const FORMAT_VERSION: u32 = 1;

/// Identity of the encoder that produced a set of vectors. Two fingerprints
/// must be equal for vectors to be comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderFingerprint {
    pub backend: String,
    pub model: String,
    pub dimension: usize,
    pub tokenizer: String,
    pub max_tokens: usize,
}

impl fmt::Display for EncoderFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} (dim={}, tokenizer={}, max_tokens={})",
            self.backend, self.model, self.dimension, self.tokenizer, self.max_tokens
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub dimension: usize,
    pub count: usize,
    pub encoder: EncoderFingerprint,
    /// Digest of the rendered corpus plus encoder; equal digests mean a
    /// rebuild would produce the same artifacts.
    pub corpus_digest: String,
    pub embeddings_digest: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub embeddings: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, embeddings: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            embeddings: embeddings.into(),
        }
    }

    pub fn exist(&self) -> bool {
        self.index.is_file() && self.embeddings.is_file()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub ticker: String,
    pub position: usize,
    pub distance: f32,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    manifest: IndexManifest,
    tickers: Vec<String>,
    index: FlatL2Index,
}

/// Flat index, the ticker at each row, and the manifest tying them to the
/// encoder and the embeddings file. Row `i` always belongs to `tickers[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBundle {
    manifest: IndexManifest,
    tickers: Vec<String>,
    index: FlatL2Index,
}

impl IndexBundle {
    pub fn build(
        tickers: Vec<String>,
        vectors: EmbeddingMatrix,
        encoder: EncoderFingerprint,
        corpus_digest: String,
    ) -> Result<Self> {
        if vectors.rows() != tickers.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.rows(),
                tickers: tickers.len(),
            });
        }
        if vectors.dimension() != encoder.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: encoder.dimension,
                actual: vectors.dimension(),
            });
        }
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            dimension: vectors.dimension(),
            count: vectors.rows(),
            encoder,
            corpus_digest,
            embeddings_digest: vectors.digest(),
        };
        Ok(Self {
            manifest,
            tickers,
            index: FlatL2Index::from_matrix(vectors),
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit>> {
        let neighbors = self.index.search(vector, k)?;
        Ok(neighbors
            .into_iter()
            .map(|Neighbor { position, distance }| Hit {
                ticker: self.tickers[position].clone(),
                position,
                distance,
            })
            .collect())
    }

    /// Writes both files to temporaries beside their targets and renames them
    /// into place only once both are fully written and synced.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        let file = IndexFile {
            manifest: self.manifest.clone(),
            tickers: self.tickers.clone(),
            index: self.index.clone(),
        };
        let index_tmp = write_temp(&paths.index, |writer| {
            bincode::serialize_into(writer, &file)?;
            Ok(())
        })?;
        let embeddings_tmp = write_temp(&paths.embeddings, |writer| {
            self.index.vectors().write_to(writer)
        })?;
        embeddings_tmp
            .persist(&paths.embeddings)
            .map_err(|err| IndexError::Io(err.error))?;
        index_tmp
            .persist(&paths.index)
            .map_err(|err| IndexError::Io(err.error))?;
        tracing::info!(
            count = self.len(),
            dimension = self.manifest.dimension,
            index = %paths.index.display(),
            embeddings = %paths.embeddings.display(),
            "saved index artifacts"
        );
        Ok(())
    }

    /// Loads the index and embeddings files and refuses any pair whose counts,
    /// dimensions or payload digests disagree.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let reader = BufReader::new(File::open(&paths.index)?);
        let file: IndexFile = bincode::deserialize_from(reader)?;
        let mut reader = BufReader::new(File::open(&paths.embeddings)?);
        let embeddings = EmbeddingMatrix::read_from(&mut reader, &paths.embeddings)?;
        let bundle = Self {
            manifest: file.manifest,
            tickers: file.tickers,
            index: file.index,
        };
        bundle.verify(&embeddings)?;
        tracing::debug!(count = bundle.len(), "loaded index artifacts");
        Ok(bundle)
    }

    /// [`IndexBundle::load`] plus a check that the artifacts came from
    /// `encoder`.
    pub fn load_for(paths: &ArtifactPaths, encoder: &EncoderFingerprint) -> Result<Self> {
        let bundle = Self::load(paths)?;
        if &bundle.manifest.encoder != encoder {
            return Err(IndexError::EncoderMismatch {
                expected: encoder.to_string(),
                found: bundle.manifest.encoder.to_string(),
            });
        }
        Ok(bundle)
    }

    fn verify(&self, embeddings: &EmbeddingMatrix) -> Result<()> {
        let manifest = &self.manifest;
        let vectors = self.index.vectors();
        if manifest.format_version != FORMAT_VERSION {
            return Err(mismatch(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if !vectors.is_well_formed() {
            return Err(mismatch("index payload is not a whole number of rows".into()));
        }
        if manifest.count != self.tickers.len() || vectors.rows() != self.tickers.len() {
            return Err(mismatch(format!(
                "manifest count {} vs {} tickers vs {} index rows",
                manifest.count,
                self.tickers.len(),
                vectors.rows()
            )));
        }
        if embeddings.rows() != manifest.count {
            return Err(mismatch(format!(
                "embeddings file has {} rows, index has {}",
                embeddings.rows(),
                manifest.count
            )));
        }
        if embeddings.dimension() != manifest.dimension
            || vectors.dimension() != manifest.dimension
            || manifest.encoder.dimension != manifest.dimension
        {
            return Err(mismatch(format!(
                "dimension {} in manifest, {} in index, {} in embeddings file",
                manifest.dimension,
                vectors.dimension(),
                embeddings.dimension()
            )));
        }
        if embeddings.digest() != manifest.embeddings_digest
            || vectors.digest() != manifest.embeddings_digest
        {
            return Err(mismatch(
                "embeddings payload does not match the index manifest".into(),
            ));
        }
        Ok(())
    }
}

fn mismatch(reason: String) -> IndexError {
    IndexError::ArtifactMismatch(reason)
}

fn write_temp<F>(target: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let mut temp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    Ok(temp)
}
