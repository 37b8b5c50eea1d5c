use anyhow::{Context, Result};
use clap::Parser;
use qpsearch::EngineConfig;
use server::{build_app, load_engine};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Change feed (JSON or JSONL) replayed into the index at startup
    #[arg(long)]
    feed: Option<PathBuf>,
    /// Engine tunables as JSON; defaults apply to omitted fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config: EngineConfig = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw)?
        }
        None => EngineConfig::default(),
    };
    let engine = load_engine(args.feed.as_deref(), config)?;
    tracing::info!(records = engine.len(), terms = engine.num_terms(), "index ready");

    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app = build_app(Arc::new(engine), admin_token);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
