//! Command-line driver: research one topic and stream both stages to stdout.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use research_pipeline::config::{
    BackendConfig, ModelCapabilities, ModelFamily, DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL,
    DEFAULT_MODEL,
};
use research_pipeline::prompt::{DEFAULT_TOPICS, PAPERS_PER_TOPIC};
use research_pipeline::research::{research_pipeline, search_backed_pipeline};
use research_pipeline::ArxivSearch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const SEPARATOR_WIDTH: usize = 80;

#[derive(Parser, Debug)]
#[command(name = "research", version, about = "Find papers on a topic and write a literature review")]
struct Cli {
    /// Research topic (defaults to the first suggested topic)
    topic: Option<String>,

    /// LLM model to use
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Environment variable holding the API key
    #[arg(long, default_value = DEFAULT_API_KEY_ENV)]
    api_key_env: String,

    /// Fetch papers from arXiv directly instead of asking the model
    #[arg(long)]
    search: bool,

    /// Papers to fetch with --search (1-20)
    #[arg(long, default_value_t = PAPERS_PER_TOPIC)]
    max_results: usize,

    /// Print the suggested topics and exit
    #[arg(long)]
    list_topics: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout carries only the streamed text.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.list_topics {
        for topic in DEFAULT_TOPICS {
            println!("{}", topic);
        }
        return Ok(());
    }

    let capabilities = ModelCapabilities::for_model(&cli.model)
        .unwrap_or_else(|| ModelCapabilities::text_only(ModelFamily::Unknown));
    let config = BackendConfig::from_env(&cli.api_key_env, &cli.base_url, &cli.model, capabilities)
        .context("invalid backend configuration")?;

    let pipeline = if cli.search {
        search_backed_pipeline(&config, Arc::new(ArxivSearch::new()), cli.max_results)?
    } else {
        research_pipeline(&config)?
    };

    let topic = cli
        .topic
        .clone()
        .unwrap_or_else(|| DEFAULT_TOPICS[0].to_string());

    let mut stream = pipeline.run(&topic)?;
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("research on '{}' failed", topic))?;
        write!(stdout, "{}", chunk.text)?;
        if chunk.is_final {
            writeln!(stdout)?;
            writeln!(stdout, "{}", "=".repeat(SEPARATOR_WIDTH))?;
        }
        stdout.flush()?;
    }

    let run = stream.into_run();
    match run.records() {
        Some(records) if !records.is_empty() => {
            let stats = records.stats();
            println!("{}", records);
            println!(
                "{} papers, {} author credits{}",
                stats.records,
                stats.authors,
                stats
                    .latest_year
                    .map(|y| format!(", latest from {}", y))
                    .unwrap_or_default()
            );
        }
        _ => println!("No papers found."),
    }

    Ok(())
}
