use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod client;

use client::{ApiClient, ApiError, Contract, RetryPolicy, DEFAULT_GENERATE_TIMEOUT};

/// Characters of the original contract shown when a refinement gives up
const PREVIEW_CHARS: usize = 100;

/// Contractgen CLI - generate and refine contracts through the HTTP API
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the contract generation API
    #[arg(long, env = "CONTRACTGEN_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = 5)]
    retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 2)]
    retry_delay_secs: u64,

    /// Seconds to wait for create/refine; keep above the server's generation bound
    #[arg(long, default_value_t = DEFAULT_GENERATE_TIMEOUT.as_secs())]
    generate_timeout_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health and backend reachability
    Health,

    /// Generate and store a new contract
    Create {
        /// Contract title
        #[arg(long)]
        title: String,

        /// What the contract should cover
        #[arg(long)]
        description: String,
    },

    /// Show one contract
    Get {
        /// Contract ID
        #[arg(long)]
        id: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Full)]
        output: OutputFormat,
    },

    /// List stored contracts
    List,

    /// Produce a refined version of a contract
    Refine {
        /// Contract ID to refine
        #[arg(long)]
        id: u64,

        /// Refinement instructions
        #[arg(long)]
        prompt: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Header and content
    Full,
    /// Content only
    Content,
    /// Raw JSON
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = ApiClient::new(
        &cli.api_url,
        RetryPolicy {
            attempts: cli.retries,
            delay: Duration::from_secs(cli.retry_delay_secs),
        },
    )
    .context("Failed to build HTTP client")?
    .with_generate_timeout(Duration::from_secs(cli.generate_timeout_secs));

    match cli.command {
        Commands::Health => {
            let health = client
                .health()
                .await
                .with_context(|| format!("API at {} is not responding", client.base_url()))?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Create { title, description } => match client.create(&title, &description).await {
            Ok(contract) => {
                println!("\n{}", "Contract created successfully:".green().bold());
                print_contract(&contract);
            }
            Err(e @ ApiError::Timeout(_)) => {
                warn_may_still_complete();
                return Err(e).context("Failed to create contract");
            }
            Err(e) => return Err(e).context("Failed to create contract"),
        },
        Commands::Get { id, output } => match client.get(id).await {
            Ok(contract) => match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&contract)?),
                OutputFormat::Content => println!("{}", contract.content),
                OutputFormat::Full => {
                    println!("\n{}", "Contract details:".bold());
                    print_contract(&contract);
                }
            },
            Err(ApiError::NotFound) => {
                anyhow::bail!("Contract with ID {} not found", id);
            }
            Err(e) => return Err(e).context("Failed to fetch contract"),
        },
        Commands::List => {
            let contracts = client.list().await.context("Failed to list contracts")?;
            if contracts.is_empty() {
                println!("No contracts stored yet.");
            } else {
                println!("\n{}", "Available contracts:".bold());
                for contract in &contracts {
                    println!("ID: {}, Title: {}", contract.id, contract.title);
                }
            }
        }
        Commands::Refine { id, prompt } => match client.refine(id, &prompt).await {
            Ok(contract) => {
                println!("\n{}", "Contract refined successfully:".green().bold());
                print_contract(&contract);
            }
            Err(ApiError::NotFound) => {
                anyhow::bail!("Contract with ID {} not found", id);
            }
            Err(e) => {
                if matches!(e, ApiError::Timeout(_)) {
                    warn_may_still_complete();
                }
                show_refine_source(&client, id).await;
                return Err(e).context("Failed to refine contract");
            }
        },
    }

    Ok(())
}

fn print_contract(contract: &Contract) {
    println!("ID: {}", contract.id);
    println!("Title: {}", contract.title);
    if contract.is_degraded() {
        let reason = contract
            .generation
            .as_ref()
            .and_then(|g| g.reason.as_deref())
            .unwrap_or("backend failure");
        println!(
            "{} {}",
            "Warning: fallback content, the model did not generate this contract:".yellow(),
            reason
        );
    }
    println!("\nContent:");
    println!("{}", contract.content);
}

fn warn_may_still_complete() {
    println!(
        "{}",
        "The server may still store this contract; run `contractgen list` before trying again."
            .yellow()
    );
}

/// Best-effort preview of the contract a failed refinement started from
async fn show_refine_source(client: &ApiClient, id: u64) {
    if let Ok(original) = client.get_once(id).await {
        println!("\n{}", "Original contract that was being refined:".yellow());
        println!("ID: {}", original.id);
        println!("Title: {}", original.title);
        println!("Content: {}...", preview(&original.content));
    }
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}
