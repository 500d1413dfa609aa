//! Contractgen Gateway Binary
//!
//! Serves the contract generation HTTP API.
//!
//! # Usage
//! ```bash
//! contractgen-gateway [--port 8000] [--host 127.0.0.1] [--config gateway.json] [--verbose]
//! ```
//!
//! Settings are layered: built-in defaults, then the optional JSON config
//! file, then environment variables (a `.env` file is honoured), then flags.

use anyhow::Context;
use clap::Parser;
use contractgen_gateway::{Gateway, GatewayConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Contractgen Gateway - contract generation HTTP API
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (default: 8000)
    #[arg(short, long, env = "CONTRACTGEN_PORT")]
    port: Option<u16>,

    /// Host to bind to (default: 127.0.0.1)
    #[arg(long, env = "CONTRACTGEN_HOST")]
    host: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail create/refine requests instead of returning fallback content
    #[arg(long)]
    strict: bool,

    /// Skip the startup warm-up generation
    #[arg(long)]
    no_warmup: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => GatewayConfig::default(),
    }
    .with_env_overrides()
    .context("Invalid environment configuration")?;

    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.strict {
        config.pipeline.strict = true;
    }
    if args.no_warmup {
        config.pipeline.warmup = false;
    }

    print_banner(&config);

    let gateway = Gateway::from_config(config)
        .await
        .context("Failed to build contract service")?;
    gateway.start().await.context("Gateway failed")?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn print_banner(config: &GatewayConfig) {
    println!();
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║                                                               ║");
    println!("║               CONTRACTGEN - CONTRACT GENERATION API           ║");
    println!("║                                                               ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("📡 HTTP Server");
    println!("   └─ http://{}:{}", config.host, config.port);
    println!();
    println!("🧠 Model Backend");
    println!("   ├─ {} @ {}", config.pipeline.provider, config.pipeline.ollama_host);
    println!("   └─ model {}", config.pipeline.model);
    println!();
    println!("🔗 HTTP Endpoints");
    println!("   ├─ GET  /                   - Liveness");
    println!("   ├─ GET  /health             - Backend reachability");
    println!("   ├─ POST /contracts/         - Generate a contract");
    println!("   ├─ GET  /contracts/         - List contracts");
    println!("   ├─ GET  /contracts/{{id}}     - Fetch a contract");
    println!("   └─ POST /contracts/refine/  - Refine into a new version");
    println!();
    println!("─────────────────────────────────────────────────────────────────");
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
