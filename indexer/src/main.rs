use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qpsearch::{read_events, DuplicateQuery, EngineConfig, Exam, SearchEngine, SearchOptions};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Replay question-paper change feeds and query the resulting index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Input path (file or directory of .json/.jsonl feeds)
    #[arg(long)]
    input: String,
    /// Engine tunables as JSON
    #[arg(long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the feed and verify the token index against the records
    Check {
        #[command(flatten)]
        input: Input,
    },
    /// Run a fused search and print the hits
    Search {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        query: String,
        /// Only papers of this exam (or of unknown exam)
        #[arg(long)]
        exam: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List records a moderator should compare before approving
    Similar {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        course_code: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        exam: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        course_name: Option<String>,
    },
    /// List papers awaiting approval, oldest first
    Unapproved {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Serialize)]
struct CheckReport {
    records: usize,
    terms: usize,
    unapproved: usize,
    soft_deleted: usize,
    checked_at: String,
}

#[derive(Serialize)]
struct HitLine<'a> {
    rank: usize,
    score: f64,
    id: u64,
    course_code: &'a str,
    course_name: &'a str,
    year: i32,
    exam: Exam,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();
    let mut out = BufWriter::new(io::stdout().lock());

    match cli.command {
        Commands::Check { input } => {
            let engine = load(&input)?;
            engine.check_consistency()?;
            let report = CheckReport {
                records: engine.len(),
                terms: engine.num_terms(),
                unapproved: engine.unapproved_count(),
                soft_deleted: engine.soft_deleted().len(),
                checked_at: time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default(),
            };
            serde_json::to_writer_pretty(&mut out, &report)?;
            out.write_all(b"\n")?;
        }
        Commands::Search { input, query, exam, limit } => {
            let engine = load(&input)?;
            let exam = exam.as_deref().map(Exam::try_from).transpose()?;
            let hits = engine.search_records(&query, &SearchOptions { exam })?;
            for (i, (hit, rec)) in hits.iter().take(limit).enumerate() {
                let line = HitLine {
                    rank: i + 1,
                    score: hit.score,
                    id: rec.id,
                    course_code: &rec.course_code,
                    course_name: &rec.course_name,
                    year: rec.year,
                    exam: rec.exam,
                };
                write_line(&mut out, &line)?;
            }
            tracing::info!(total = hits.len(), shown = hits.len().min(limit), "search complete");
        }
        Commands::Similar { input, course_code, year, exam, semester, course_name } => {
            let engine = load(&input)?;
            let exam = exam.as_deref().map(Exam::try_from).transpose()?;
            let query = DuplicateQuery { course_code, year, exam, semester, course_name };
            for rec in engine.find_duplicates(&query) {
                write_line(&mut out, &rec)?;
            }
        }
        Commands::Unapproved { input } => {
            let engine = load(&input)?;
            for rec in engine.unapproved() {
                write_line(&mut out, &rec)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn write_line<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn load(input: &Input) -> Result<SearchEngine> {
    let config = match &input.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
            serde_json::from_str(&raw)?
        }
        None => EngineConfig::default(),
    };
    let engine = SearchEngine::new(config);

    let files = feed_files(Path::new(&input.input));
    if files.is_empty() {
        anyhow::bail!("no .json or .jsonl feeds under {}", input.input);
    }
    for file in files {
        let events = read_events(BufReader::new(File::open(&file)?))
            .with_context(|| format!("reading {}", file.display()))?;
        tracing::info!(file = %file.display(), events = events.len(), "replaying feed");
        engine.load(events);
    }
    Ok(engine)
}

/// Feed files under `input`, in path order so replays are deterministic.
fn feed_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

