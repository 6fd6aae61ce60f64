//! Switchboard CLI: chat with a model that can call tools on local MCP servers.

mod shell;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use switchboard_api::{AnthropicProvider, RetryConfig};
use switchboard_config::{CliOverrides, SwitchboardConfig};
use switchboard_core::{Orchestrator, ToolRegistry, run_with_cleanup};
use switchboard_mcp::ServerPool;
use switchboard_types::Provider;

#[derive(Parser)]
#[command(
    name = "switchboard",
    version,
    about = "Chat with a model that can call tools on local MCP servers"
)]
struct Cli {
    /// MCP server scripts to launch (.py or .js)
    #[arg(value_name = "SERVER_SCRIPT")]
    servers: Vec<PathBuf>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in each response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(default_filter(cli.verbose))
                }),
        )
        .with_writer(io::stderr)
        .init();

    if cli.servers.is_empty() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let config = SwitchboardConfig::load(CliOverrides {
        model: cli.model,
        max_tokens: cli.max_tokens,
    })
    .context("Failed to load configuration")?;

    let provider = AnthropicProvider::new(&config.api_key, &config.api_base_url)
        .context("Failed to create API client")?
        .with_retry_config(RetryConfig {
            max_retries: config.max_retries,
            ..RetryConfig::default()
        });
    let provider: Arc<dyn Provider> = Arc::new(provider);

    let mut pool = ServerPool::stdio(config.servers.clone());
    let servers = cli.servers;
    let model = config.model.clone();
    let max_tokens = config.max_tokens;

    run_with_cleanup(&mut pool, move |pool| {
        Box::pin(session(pool, provider, servers, model, max_tokens))
    })
    .await
}

/// Status lines from the switchboard crates show by default; everything else
/// only from `warn` up.
fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn,switchboard=info" }
}

/// Connect every server, then hand the terminal to the query loop.
async fn session(
    pool: &mut ServerPool,
    provider: Arc<dyn Provider>,
    servers: Vec<PathBuf>,
    model: String,
    max_tokens: u32,
) -> Result<()> {
    let catalogs = pool
        .connect(servers.as_slice())
        .await
        .context("Failed to start MCP servers")?;
    let registry = ToolRegistry::from_catalogs(&catalogs);
    tracing::debug!("Registered tools: {}", registry.names().join(", "));

    let pool = &*pool;
    let orchestrator = Orchestrator::new(provider, &registry, pool, model, max_tokens);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    shell::run_shell(stdin.lock(), &mut stdout, &orchestrator, pool.len())
        .await
        .context("Terminal I/O failed")
}
