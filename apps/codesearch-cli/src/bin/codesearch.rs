use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use codesearch_core::config::{Config, IndexBackend, Settings};
use codesearch_core::corpus::merge_directory;
use codesearch_core::traits::PointIndex;
use codesearch_hybrid::CodeSearch;

#[derive(Parser)]
#[command(name = "codesearch", version, about = "Hybrid semantic search over a merged source corpus")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Concatenate a source tree into one corpus file.
    Merge {
        dir: PathBuf,
        out: PathBuf,
        /// File suffixes to include (repeatable); all files when omitted.
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
    /// Rebuild the index from a corpus file.
    Ingest { path: Option<PathBuf> },
    /// Run a hybrid search.
    Query {
        text: String,
        #[arg(short = 'k', long = "top-k", default_value_t = 0)]
        top_k: usize,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json { builder.json().init() } else { builder.init() }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<ExitCode> {
    let config = Config::load()?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;
    info!(env = config.env_name(), "configuration loaded");

    match command {
        Command::Merge { dir, out, extensions } => {
            let report = merge_directory(&dir, &out, &extensions)?;
            println!("Merged {} files ({} bytes) into {}", report.files, report.bytes, out.display());
        }
        Command::Ingest { path } => {
            let path = path.unwrap_or_else(|| settings.data.corpus_path(&base));
            let search = with_progress_bar(CodeSearch::from_settings(&settings, &base)?);
            let report = search.load_and_index_data(&path).with_context(|| format!("indexing {}", path.display()))?;
            println!("Indexed {} chunks (dimension {}) from {}", report.chunks, report.dimension, path.display());
            if settings.index.backend == IndexBackend::Memory {
                println!("note: the memory backend does not persist; `query` re-ingests the corpus");
            }
        }
        Command::Query { text, top_k, json } => {
            let search = CodeSearch::from_settings(&settings, &base)?;
            if settings.index.backend == IndexBackend::Memory {
                let corpus = settings.data.corpus_path(&base);
                search.load_and_index_data(&corpus).with_context(|| format!("indexing {}", corpus.display()))?;
            }
            return Ok(print_results(&search, &text, top_k, json, &settings));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn with_progress_bar(search: CodeSearch<Box<dyn PointIndex>>) -> CodeSearch<Box<dyn PointIndex>> {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    search.with_progress(move |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        if done == total { pb.finish_and_clear(); }
    })
}

/// A failed search and an empty result are reported differently.
fn print_results(search: &CodeSearch<Box<dyn PointIndex>>, query: &str, top_k: usize, json: bool, settings: &Settings) -> ExitCode {
    let results = match search.search_code(query, top_k) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("search failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("search failed: {e}");
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }
    if results.is_empty() {
        println!("no results");
        return ExitCode::SUCCESS;
    }
    let shown = if top_k == 0 { settings.search.top_k } else { top_k };
    println!("Top {} of {} requested for {:?}:", results.len(), shown, query);
    for (rank, r) in results.iter().enumerate() {
        let file = r.file.as_deref().unwrap_or(&r.source);
        println!("\n#{} score {:.3}  {}:{}-{}  [{}]", rank + 1, r.score, file, r.start_line, r.end_line, r.lang);
        println!("{}", r.text.trim_end());
    }
    ExitCode::SUCCESS
}
