use clap::Parser;
use colored::*;
use dotenvy::dotenv;
use log::{debug, LevelFilter};
use std::time::Duration;

use oceanfront_cli::app::{run_generate_query, run_interactive_chat, run_single_query};
use oceanfront_cli::cli::Args;
use oceanfront_cli::logging::{log_error, log_info};
use oceanfront_cli::output::print_usage_instructions;
use oceanfront_cli::RelayClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.to_string()),
    )
    .init();

    let client = match RelayClient::new(&args.relay_url, Duration::from_secs(args.timeout)) {
        Ok(client) => client,
        Err(e) => {
            log_error(&format!("Failed to initialize relay client: {}", e));
            return Err(e.into());
        }
    };

    let wants_relay = args.interactive || args.prompt.is_some() || args.sql.is_some();
    if !wants_relay {
        print_usage_instructions();
        return Ok(());
    }

    if client.test_connection().await {
        log_info("Successfully connected to the OceanFront relay.");
    } else {
        eprintln!(
            "{}",
            format!(
                "Could not reach the OceanFront relay at {}. Is relay-daemon running?",
                client.base_url()
            )
            .yellow()
        );
    }

    if let Some(question) = args.sql {
        if let Err(e) = run_generate_query(question, &client).await {
            log_error(&format!("Error generating query: {:#}", e));
            std::process::exit(1);
        }
    } else if args.interactive {
        if let Err(e) = run_interactive_chat(&client, args.raw).await {
            log_error(&format!("Error in interactive chat: {:#}", e));
            eprintln!("{}", format!("Interactive chat failed: {}", e).red());
            std::process::exit(1);
        }
    } else if let Some(prompt) = args.prompt {
        // The failure text was already printed with the reply
        if let Err(e) = run_single_query(prompt, &client, args.raw).await {
            debug!("Error processing prompt: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
