use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use urlrewrite::{MemoryLogger, RequestDescriptor, RewriteEngine, RewriteOptions};

#[derive(Parser, Debug)]
#[command(name = "urlrewrite")]
#[command(about = "Evaluate URL rewrite rules against request URLs")]
#[command(version)]
struct Args {
    /// Path to an IIS-style rewrite rule file
    #[arg(short, long)]
    rules: PathBuf,

    /// Request URLs to evaluate
    #[arg(required = true)]
    urls: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the per-rule log lines for each request
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loading rewrite rules from {:?}", args.rules);

    let options = RewriteOptions::new()
        .add_iis_url_rewrite_file(&args.rules)
        .with_context(|| format!("Failed to load rule file {:?}", args.rules))?;
    let engine = RewriteEngine::new(options.build());

    for raw in &args.urls {
        let url = Url::parse(raw).with_context(|| format!("Invalid request URL '{raw}'"))?;
        let request = RequestDescriptor::from_url(&url);

        let logger = MemoryLogger::new();
        let decision = engine.evaluate_with(&request, &logger);

        println!("{raw} => {decision}");
        if args.verbose {
            for line in logger.messages() {
                println!("  {line}");
            }
        }
    }

    Ok(())
}
