use colored::*;
use std::env;

/// Printed only when `OCEANFRONT_DEBUG` is set
pub fn log_info(message: &str) {
    if env::var("OCEANFRONT_DEBUG").is_ok() {
        eprintln!("{} {}", "[INFO]".cyan(), message);
    }
}

pub fn log_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
