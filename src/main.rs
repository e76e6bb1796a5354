//! Adsight - Multi-Agent Facebook Ads Analyst
//!
//! Sequential LLM agent pipeline over an ad performance CSV: plan, summarize,
//! hypothesize, validate, and propose new creatives, ending in a markdown
//! report plus JSON artifacts.
//!
//! # Usage
//!
//! ```bash
//! # Analyze the bundled sample dataset
//! adsight run "Why did my ROAS drop last week?" --sample
//!
//! # Analyze your own export
//! adsight run "What should I optimize?" --data-path exports/fb_ads.csv
//!
//! # Check a config file without running anything
//! adsight validate-config --config config/config.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `GROQ_API_KEY`: Groq API key (preferred provider when set)
//! - `OPENAI_API_KEY`: OpenAI API key (used when Groq key is absent)
//! - `ADSIGHT_CONFIG`: Path to a config YAML overriding ./config/config.yaml
//! - `RUST_LOG`: Logging level (default: info)

use adsight::{AnalystConfig, DataLoader, OpenAiBackend, ReportWriter, Workflow};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "adsight")]
#[command(about = "Multi-agent Facebook Ads analyst")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the analysis pipeline for a natural language query
    Run {
        /// The question to answer, e.g. "Why did my ROAS drop last week?"
        query: String,

        /// Use the bundled sample dataset instead of a CSV file
        #[arg(long)]
        sample: bool,

        /// Path to a Facebook Ads performance CSV export
        #[arg(long, value_name = "PATH")]
        data_path: Option<PathBuf>,

        /// Path to a config YAML (overrides the standard search order)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Validate a config file and exit
    ValidateConfig {
        /// Path to the config YAML to check
        #[arg(long, value_name = "PATH", default_value = "config/config.yaml")]
        config: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    match args.command {
        SubCommand::Run {
            query,
            sample,
            data_path,
            config,
        } => run_analysis(&query, sample, data_path, config).await,
        SubCommand::ValidateConfig { config } => {
            AnalystConfig::load_from_file(&config)
                .with_context(|| format!("config {} is invalid", config.display()))?;
            println!("config {} is valid", config.display());
            Ok(())
        }
    }
}

async fn run_analysis(
    query: &str,
    sample: bool,
    data_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => AnalystConfig::load_from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AnalystConfig::load(),
    };
    let config = Arc::new(config);

    // Data is loaded and validated before the backend exists, so a broken
    // CSV can never cost an API call.
    let loader = DataLoader::new(&config);
    let records = if sample {
        info!("Using bundled sample dataset");
        loader.load_sample().context("sample dataset is invalid")?
    } else {
        let path = data_path.context("provide --data-path PATH or use --sample")?;
        info!(path = %path.display(), "Loading dataset");
        loader
            .load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?
    };

    let backend = Arc::new(
        OpenAiBackend::from_env(&config.model).context("no LLM provider available")?,
    );

    let workflow = Workflow::new(backend, config.clone());
    let ctx = workflow.run(query, &records).await;

    let paths = ReportWriter::new(config).write(&ctx)?;

    println!();
    println!("Analysis complete ({} LLM calls).", ctx.llm_calls);
    println!("  Report:    {}", paths.report.display());
    println!("  Insights:  {}", paths.insights.display());
    println!("  Creatives: {}", paths.creatives.display());
    println!("  Run log:   {}", paths.run_log.display());

    Ok(())
}
