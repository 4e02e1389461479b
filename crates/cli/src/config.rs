use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use folio_index::ArtifactPaths;
use folio_rag::{EncodeOptions, EncoderConfig, ModelConfig};
use serde::Deserialize;

use crate::cli::ArtifactArgs;

pub const DEFAULT_CONFIG: &str = "folio.toml";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub encoder: EncoderConfig,
    pub build: EncodeOptions,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub sheets: PathBuf,
    pub records: PathBuf,
    pub documents: PathBuf,
    pub index: PathBuf,
    pub embeddings: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sheets: PathBuf::from("data/sheets"),
            records: PathBuf::from("data/etf_records.json"),
            documents: PathBuf::from("data/etf_documents.jsonl"),
            index: PathBuf::from("artifacts/etfs.index"),
            embeddings: PathBuf::from("artifacts/etf_embeddings.bin"),
        }
    }
}

impl PathsConfig {
    pub fn artifacts(&self, args: &ArtifactArgs) -> ArtifactPaths {
        ArtifactPaths::new(
            args.index.clone().unwrap_or_else(|| self.index.clone()),
            args.embeddings
                .clone()
                .unwrap_or_else(|| self.embeddings.clone()),
        )
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| anyhow!("invalid config: {e}"))
}

impl AppConfig {
    /// Applies `FOLIO_ENCODER` and `FOLIO_EMBED_MODEL` on top of the file.
    pub fn apply_env(&mut self) -> Result<()> {
        let backend = env::var("FOLIO_ENCODER").ok();
        let model = env::var("FOLIO_EMBED_MODEL").ok();
        self.override_encoder(backend.as_deref(), model.as_deref())
    }

    fn override_encoder(&mut self, backend: Option<&str>, model: Option<&str>) -> Result<()> {
        if let Some(backend) = backend {
            match backend.trim().to_lowercase().as_str() {
                "hash" => {
                    if !matches!(self.encoder.model, ModelConfig::Hash { .. }) {
                        self.encoder.model = ModelConfig::default();
                    }
                }
                "openai" => {
                    if !matches!(self.encoder.model, ModelConfig::OpenAi { .. }) {
                        self.encoder.model = ModelConfig::openai();
                    }
                }
                other => bail!("unknown encoder backend '{other}' in FOLIO_ENCODER"),
            }
        }
        if let Some(name) = model {
            match &mut self.encoder.model {
                ModelConfig::OpenAi { model, .. } => *model = name.to_string(),
                ModelConfig::Hash { .. } => {
                    tracing::debug!(model = name, "FOLIO_EMBED_MODEL ignored by hash encoder")
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_rag::TokenizerKind;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("folio.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.build.batch_size, 10);
        assert_eq!(config.build.global_limit, 13_000);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [paths]
            records = "out/records.json"

            [encoder]
            tokenizer = "o200k"
            max_tokens = 256

            [encoder.model]
            backend = "hash"
            dimensions = 128

            [build]
            batch_size = 32
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.records, PathBuf::from("out/records.json"));
        assert_eq!(config.paths.index, PathBuf::from("artifacts/etfs.index"));
        assert_eq!(config.encoder.tokenizer, TokenizerKind::O200k);
        assert_eq!(config.encoder.max_tokens, 256);
        assert_eq!(
            config.encoder.model,
            ModelConfig::Hash {
                dimensions: 128,
                seed: 1337
            }
        );
        assert_eq!(config.build.batch_size, 32);
        assert_eq!(config.build.global_limit, 13_000);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(parse_config("[encoder.model]\nbackend = \"bert\"\n").is_err());
    }

    #[test]
    fn encoder_overrides_switch_backend_and_model() {
        let mut config = AppConfig::default();
        config
            .override_encoder(Some("openai"), Some("text-embedding-3-large"))
            .unwrap();
        match &config.encoder.model {
            ModelConfig::OpenAi {
                model, dimensions, ..
            } => {
                assert_eq!(model, "text-embedding-3-large");
                assert_eq!(*dimensions, 1536);
            }
            other => panic!("unexpected model {other:?}"),
        }
        assert!(config.override_encoder(Some("bert"), None).is_err());
    }

    #[test]
    fn cli_paths_win_over_file_paths() {
        let paths = PathsConfig::default();
        let args = ArtifactArgs {
            index: Some(PathBuf::from("tmp/a.index")),
            embeddings: None,
        };
        let resolved = paths.artifacts(&args);
        assert_eq!(resolved.index, PathBuf::from("tmp/a.index"));
        assert_eq!(resolved.embeddings, paths.embeddings);
    }
}
