use clap::Parser;

use crate::relay_client::DEFAULT_RELAY_URL;

/// Command-line chat client for the OceanFront relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The question to send to the OceanFront assistant
    #[arg(index = 1)]
    pub prompt: Option<String>,

    /// Enter interactive chat mode
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Turn a question into a SQL query instead of chatting
    #[arg(long, value_name = "QUESTION")]
    pub sql: Option<String>,

    /// Base URL of the relay service
    #[arg(long, env = "OCEANFRONT_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    pub relay_url: String,

    /// Abort an exchange after this many seconds
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Print replies as they stream, without markdown rendering
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
