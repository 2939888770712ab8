use anyhow::{anyhow, Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use oceanfront_core::types::Role;
use std::io::{self, Write};
use std::time::Duration;

use crate::chat::{ChatController, ChatStatus, Message};
use crate::output::{
    print_assistant_reply, print_sql, print_suggestions, render_message,
};
use crate::relay_client::{ChatTransport, RelayClient};

pub const SUGGESTED_QUESTIONS: [&str; 6] = [
    "What data is available from the Indian Ocean Argo buoys?",
    "Show me temperature trends in the Arabian Sea",
    "What are the current buoy locations near India?",
    "Explain the seasonal patterns in ocean temperature",
    "How does the monsoon affect ocean conditions?",
    "What depth measurements are available?",
];

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// What one submitted exchange left in the conversation
#[derive(Debug)]
struct Exchange {
    reply: Option<Message>,
    errors: Vec<Message>,
}

/// Submits the pending input and follows the reply until it completes.
///
/// In raw mode reply text is written to stdout as it arrives; otherwise a
/// spinner runs until the stream ends.
async fn stream_exchange<T: ChatTransport>(
    controller: &ChatController<T>,
    raw: bool,
) -> Option<Exchange> {
    let start = controller.messages().len();
    let reply_index = start + 1;
    let mut updates = controller.subscribe();
    let progress = (!raw).then(|| spinner("Analyzing ocean data..."));
    let mut printed = 0;

    let submit = controller.submit();
    tokio::pin!(submit);
    let accepted = loop {
        tokio::select! {
            accepted = &mut submit => break accepted,
            Ok(()) = updates.changed() => {
                if !raw {
                    continue;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(reply) = snapshot.get(reply_index) {
                    if printed == 0 && !reply.content.is_empty() {
                        print!("{}: ", "OceanFront AI".blue().bold());
                    }
                    print!("{}", &reply.content[printed..]);
                    let _ = io::stdout().flush();
                    printed = reply.content.len();
                }
            }
        }
    };

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    if !accepted {
        return None;
    }

    let mut added = controller.messages().split_off(start);
    let errors = if added.len() > 2 { added.split_off(2) } else { Vec::new() };
    let reply = added.into_iter().nth(1);

    if raw {
        // Text already went out; flush whatever arrived after the last update
        if let Some(reply) = &reply {
            if printed < reply.content.len() {
                if printed == 0 {
                    print!("{}: ", "OceanFront AI".blue().bold());
                }
                print!("{}", &reply.content[printed..]);
            }
            if !reply.content.is_empty() {
                println!();
            }
        }
    } else if let Some(reply) = reply.as_ref().filter(|m| !m.content.is_empty()) {
        print_assistant_reply(&reply.content);
    }

    for message in &errors {
        eprintln!("{}", message.content.red());
    }

    Some(Exchange { reply, errors })
}

/// Sends one question to the relay and prints the streamed reply
pub async fn run_single_query(prompt: String, client: &RelayClient, raw: bool) -> Result<()> {
    info!("Running single query: {}", prompt);

    let controller = ChatController::new(client.clone());
    controller.set_input(prompt);

    let exchange = stream_exchange(&controller, raw)
        .await
        .ok_or_else(|| anyhow!("Prompt is empty"))?;

    if let Some(error) = exchange.errors.first() {
        return Err(anyhow!(error.content.clone()));
    }
    debug!(
        "Reply received ({} bytes)",
        exchange.reply.map(|m| m.content.len()).unwrap_or(0)
    );
    Ok(())
}

/// Turns a question into a SQL query and prints it
pub async fn run_generate_query(prompt: String, client: &RelayClient) -> Result<()> {
    info!("Generating SQL query for: {}", prompt);
    let progress = spinner("Generating SQL query...");
    let result = client.generate_query(&prompt).await;
    progress.finish_and_clear();

    let query = result.context("Failed to generate a query")?;
    print_sql(&query);
    Ok(())
}

fn print_transcript<T: ChatTransport>(controller: &ChatController<T>) {
    let status = controller.status();
    for message in controller.messages() {
        println!("{}", render_message(&message, status));
    }
}

/// Runs an interactive chat session against the relay
pub async fn run_interactive_chat(client: &RelayClient, raw: bool) -> Result<()> {
    println!("{}", "OceanFront AI: ask about Indian Ocean Argo data.".cyan().bold());
    println!("Type 'exit' or 'quit' to end the session, '/suggest' for ideas,");
    println!("'/history' to show the conversation and '/clear' to start over.");
    println!();

    let controller = ChatController::new(client.clone());

    loop {
        print!("{}: ", "You".green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            println!();
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Exiting chat session.");
            break;
        }

        let question = match input {
            "/suggest" => {
                print_suggestions(&SUGGESTED_QUESTIONS);
                continue;
            }
            "/clear" => {
                controller.reset();
                println!("{}", "Conversation cleared.".dimmed());
                continue;
            }
            "/history" => {
                print_transcript(&controller);
                continue;
            }
            _ => match suggestion(input) {
                Some(Ok(question)) => {
                    println!("{}: {}", "You".green().bold(), question);
                    question.to_string()
                }
                Some(Err(())) => {
                    eprintln!(
                        "{}",
                        format!("Pick a suggestion between 1 and {}.", SUGGESTED_QUESTIONS.len())
                            .yellow()
                    );
                    continue;
                }
                None => input.to_string(),
            },
        };

        controller.set_input(question);
        if stream_exchange(&controller, raw).await.is_none() {
            debug!("Input was not submitted");
        }
        debug_assert_eq!(controller.status(), ChatStatus::Idle);
        println!();
    }

    let turns = controller
        .messages()
        .iter()
        .filter(|m| m.role == Role::User)
        .count();
    info!("Chat session ended after {} questions", turns);
    Ok(())
}

/// Resolves `/N` to the Nth suggested question.
///
/// Returns `None` when the input is not of that form.
fn suggestion(input: &str) -> Option<Result<&'static str, ()>> {
    let number: usize = input.strip_prefix('/')?.parse().ok()?;
    Some(
        number
            .checked_sub(1)
            .and_then(|i| SUGGESTED_QUESTIONS.get(i).copied())
            .ok_or(()),
    )
}
