use std::path::PathBuf;

use anyhow::{Context, Result};
use folio_core::{
    emit_all, export_documents, load_records, normalize_workbook, render_all, save_records,
    CsvWorkbook,
};
use folio_rag::{
    build_index, open_index, query_index, BuildOutcome, BuildRequest, EncoderBackend, Tokenizer,
};
use serde_json::json;

use crate::cli::ArtifactArgs;
use crate::config::AppConfig;

pub fn normalize(config: &AppConfig, sheets: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let sheets = sheets.unwrap_or_else(|| config.paths.sheets.clone());
    let out = out.unwrap_or_else(|| config.paths.records.clone());
    let workbook = CsvWorkbook::open(&sheets)
        .with_context(|| format!("failed to open sheets under {}", sheets.display()))?;
    let corpus = normalize_workbook(&workbook).context("normalization failed")?;
    emit_all(&corpus.diagnostics);
    let warnings = corpus.diagnostics.len();
    let records = corpus.into_records();
    save_records(&out, &records)
        .with_context(|| format!("failed to write records to {}", out.display()))?;
    println!(
        "normalized {} records ({} data-quality warnings) -> {}",
        records.len(),
        warnings,
        out.display()
    );
    Ok(())
}

pub fn export_docs(config: &AppConfig, records: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let records_path = records.unwrap_or_else(|| config.paths.records.clone());
    let out = out.unwrap_or_else(|| config.paths.documents.clone());
    let records = load_records(&records_path)
        .with_context(|| format!("failed to load records from {}", records_path.display()))?;
    let documents = render_all(&records).context("rendering failed")?;
    let written = export_documents(&out, &documents)
        .with_context(|| format!("failed to write documents to {}", out.display()))?;
    println!("exported {written} documents -> {}", out.display());
    Ok(())
}

pub struct BuildArgs {
    pub records: Option<PathBuf>,
    pub artifacts: ArtifactArgs,
    pub batch_size: Option<usize>,
    pub global_limit: Option<usize>,
    pub force: bool,
}

pub fn build(config: &AppConfig, args: BuildArgs) -> Result<()> {
    let records_path = args
        .records
        .unwrap_or_else(|| config.paths.records.clone());
    let paths = config.paths.artifacts(&args.artifacts);
    let mut options = config.build;
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if let Some(global_limit) = args.global_limit {
        options.global_limit = global_limit;
    }
    let request = BuildRequest {
        options,
        force: args.force,
    };

    let records = load_records(&records_path)
        .with_context(|| format!("failed to load records from {}", records_path.display()))?;
    let tokenizer = Tokenizer::new(config.encoder.tokenizer, config.encoder.max_tokens)
        .context("failed to build tokenizer")?;
    let encoder = EncoderBackend::load(&config.encoder).context("failed to load encoder")?;
    let report = build_index(&records, &tokenizer, &encoder, &paths, &request)
        .context("index build failed")?;
    match report.outcome {
        BuildOutcome::Built => println!(
            "indexed {} of {} documents (dim {}) -> {}",
            report.indexed,
            report.rendered,
            report.dimension,
            paths.index.display()
        ),
        BuildOutcome::Unchanged => println!(
            "index {} already up to date ({} documents); use --force to rebuild",
            paths.index.display(),
            report.indexed
        ),
    }
    Ok(())
}

pub fn query(
    config: &AppConfig,
    question: &str,
    top_k: usize,
    artifacts: &ArtifactArgs,
    as_json: bool,
) -> Result<()> {
    let paths = config.paths.artifacts(artifacts);
    let tokenizer = Tokenizer::new(config.encoder.tokenizer, config.encoder.max_tokens)
        .context("failed to build tokenizer")?;
    let encoder = EncoderBackend::load(&config.encoder).context("failed to load encoder")?;
    let bundle = open_index(&paths, &encoder)
        .with_context(|| format!("failed to open index {}", paths.index.display()))?;
    let hits = query_index(&bundle, &tokenizer, &encoder, question, top_k).context("query failed")?;
    if as_json {
        let rows: Vec<_> = hits
            .iter()
            .map(|hit| {
                json!({
                    "ticker": hit.ticker,
                    "position": hit.position,
                    "distance": hit.distance,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for (rank, hit) in hits.iter().enumerate() {
            println!("{:>3}. {:<12} {:.6}", rank + 1, hit.ticker, hit.distance);
        }
    }
    Ok(())
}
