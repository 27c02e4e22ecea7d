//! Pontoon Compliance Server
//!
//! Evaluates engineering-drawing text for floating pontoon and marina
//! structures against Australian Standards. Provides REST API endpoints for:
//!
//! - Field and rule registry listing
//! - Document evaluation (single and batch)
//! - Audit trail inspection
//!
//! ## Architecture
//!
//! The server owns no PDF or OCR handling: callers send the text they
//! recovered from each page. Evaluation runs on the blocking pool, and every
//! evaluation is appended to a hash-linked audit chain.
//!
//! The same binary offers a `check` subcommand that evaluates a text file
//! and prints the report.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use compliance_engine::ComplianceEngine;
use pontoon_types::audit::AuditChain;
use pontoon_types::DesignDocument;
use tokio::sync::Mutex;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;

use api::{
    handle_audit, handle_evaluate, handle_evaluate_batch, handle_health, handle_list_fields,
    handle_list_rules,
};

/// Command-line arguments for the pontoon server
#[derive(Parser, Debug)]
#[command(name = "pontoon-server")]
#[command(about = "Pontoon drawing compliance server")]
struct Args {
    /// Replacement field registry (TOML)
    #[arg(long, global = true)]
    fields: Option<PathBuf>,

    /// Replacement rule registry (TOML)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Evaluate a text file and print the report
    Check {
        /// Drawing text; form feeds separate pages
        file: PathBuf,

        /// Output format: markdown or json
        #[arg(long, default_value = "markdown")]
        format: String,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Maximum documents per batch request
    #[arg(long, default_value = "32")]
    max_batch: usize,

    /// Maximum requests handled at once
    #[arg(long, default_value = "64")]
    max_concurrent: usize,

    /// Audit events kept in memory; older events are dropped
    #[arg(long, default_value = "10000")]
    max_audit_events: usize,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            max_batch: 32,
            max_concurrent: 64,
            max_audit_events: 10_000,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ComplianceEngine>,
    pub audit: Arc<Mutex<AuditChain>>,
    /// Maximum documents per batch request
    pub max_batch: usize,
}

impl AppState {
    pub fn new(engine: ComplianceEngine, max_batch: usize, max_audit_events: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            audit: Arc::new(Mutex::new(AuditChain::bounded(max_audit_events))),
            max_batch,
        }
    }
}

/// All routes, without transport middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Registry endpoints
        .route("/api/fields", get(handle_list_fields))
        .route("/api/rules", get(handle_list_rules))
        // Evaluation endpoints
        .route("/api/evaluate", post(handle_evaluate))
        .route("/api/evaluate/batch", post(handle_evaluate_batch))
        .route("/api/audit", get(handle_audit))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = ComplianceEngine::from_files(args.fields.as_deref(), args.rules.as_deref())
        .context("Failed to load registries")?;
    info!(
        "Loaded {} fields (v{}) and {} rules (v{})",
        engine.fields().fields().count(),
        engine.fields().version(),
        engine.rules().len(),
        engine.rules().version()
    );

    match args.command {
        Some(Command::Check { file, format }) => check(&engine, &file, &format),
        Some(Command::Serve(serve_args)) => serve(engine, serve_args).await,
        None => serve(engine, ServeArgs::default()).await,
    }
}

async fn serve(engine: ComplianceEngine, args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting pontoon server on {}:{}", args.host, args.port);

    // Create shared state
    let state = AppState::new(engine, args.max_batch, args.max_audit_events);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = build_router(state)
        .layer(ConcurrencyLimitLayer::new(args.max_concurrent))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Batch limit: {} documents", args.max_batch);
    info!("Concurrency limit: {} requests", args.max_concurrent);
    info!("Audit retention: {} events", args.max_audit_events);

    axum::serve(listener, app).await?;

    Ok(())
}

fn check(engine: &ComplianceEngine, file: &Path, format: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document = document_from_file(file, &text);
    let report = engine.evaluate_document(&document);

    match format.to_lowercase().as_str() {
        "markdown" | "md" => print!("{}", engine.render_markdown(&report)),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => anyhow::bail!("Invalid format '{}'. Must be 'markdown' or 'json'", other),
    }
    Ok(())
}

/// pdftotext separates pages with form feeds
fn document_from_file(file: &Path, text: &str) -> DesignDocument {
    let id = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    DesignDocument {
        id,
        filename: file.file_name().map(|s| s.to_string_lossy().into_owned()),
        text_content: text
            .split('\u{c}')
            .filter(|page| !page.trim().is_empty())
            .map(str::to_string)
            .collect(),
    }
}
