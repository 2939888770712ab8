use clap::Parser;
use oceanfront_core::config::RelayConfig;
use oceanfront_relay::config::AppConfig;
use oceanfront_relay::http_server;
use oceanfront_relay::llm_client::ProviderSetup;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-daemon", about = "OceanFront chat relay daemon")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(short, long)]
    bind: Option<String>,

    /// System prompt to use
    #[arg(short, long)]
    system_prompt: Option<String>,

    /// Provider API key (defaults to GROQ_API_KEY)
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Chat model to use
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Provider base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Seconds before an upstream stream is abandoned
    #[arg(long)]
    stream_timeout: Option<u64>,

    /// Write the effective configuration (without the API key) to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oceanfront_relay=info,tower_http=info".into()),
        )
        .init();

    info!("Starting OceanFront relay daemon");

    // Parse command line args
    let args = Args::parse();

    // Load config from file or use defaults
    let file_config = match &args.config {
        Some(path) => RelayConfig::load_from_file(path),
        None => RelayConfig::load_from_default(),
    };
    let file_config = match file_config {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    // Update config from CLI args
    let overrides = RelayConfig {
        api_key: args.api_key,
        bind_addr: args.bind,
        base_url: args.base_url,
        model: args.model,
        query_model: None,
        system_prompt: args.system_prompt,
        query_system_prompt: None,
        stream_timeout_secs: args.stream_timeout,
        connect_timeout_secs: None,
    };
    let relay_config = file_config.merge(&overrides);

    if let Some(path) = &args.write_config {
        relay_config
            .save_to_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let relay_config = relay_config.with_env_api_key();

    let config = AppConfig::from_relay_config(&relay_config)?;

    // A missing credential is reported per request, never at startup
    let provider = ProviderSetup::from_config(&relay_config);

    if let Err(e) = http_server::run_server(config, provider).await {
        error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    info!("Relay daemon shutting down");
    Ok(())
}
