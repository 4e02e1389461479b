use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    about = "Normalize ETF sheets, render fund documents and query a similarity index"
)]
pub struct Cli {
    /// Path to folio.toml; a missing file means built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge the primary and category sheets into the JSON record store.
    Normalize {
        /// Directory holding Main.csv and one file per category sheet.
        #[arg(long)]
        sheets: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render every record and write `{ticker, text}` JSONL for fine-tuning.
    ExportDocs {
        #[arg(long)]
        records: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render, encode and persist the flat L2 index.
    BuildIndex {
        #[arg(long)]
        records: Option<PathBuf>,
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
        #[arg(long = "global-limit")]
        global_limit: Option<usize>,
        /// Re-encode even when the index already matches the corpus.
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Print the tickers nearest to a free-text question.
    Query {
        question: String,
        #[arg(long = "top-k", default_value_t = 5)]
        top_k: usize,
        #[command(flatten)]
        artifacts: ArtifactArgs,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ArtifactArgs {
    #[arg(long)]
    pub index: Option<PathBuf>,
    #[arg(long)]
    pub embeddings: Option<PathBuf>,
}
