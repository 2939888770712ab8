use colored::*;
use lazy_static::lazy_static;
use oceanfront_core::types::Role;
use pulldown_cmark::{
    CodeBlockKind, Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag,
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

use crate::chat::{ChatStatus, Message};

/// Shown in place of an assistant reply that has not produced text yet
pub const TYPING_PLACEHOLDER: &str = "...";

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref THEME: Theme = {
        let mut themes = ThemeSet::load_defaults().themes;
        themes.remove("base16-ocean.dark").unwrap_or_default()
    };
}

fn speaker_label(role: Role) -> ColoredString {
    match role {
        Role::User => "You".green().bold(),
        Role::Assistant => "OceanFront AI".blue().bold(),
        Role::System => "System".magenta().bold(),
    }
}

/// Renders one conversation entry for the terminal.
///
/// An empty assistant message is shown as a typing placeholder while a
/// reply is in flight.
pub fn render_message(message: &Message, status: ChatStatus) -> String {
    let body = match message.role {
        Role::Assistant if message.content.is_empty() && status == ChatStatus::InProgress => {
            TYPING_PLACEHOLDER.dimmed().to_string()
        }
        Role::Assistant => render_markdown(&message.content).trim().to_string(),
        _ => message.content.clone(),
    };
    format!("{}: {}", speaker_label(message.role), body)
}

pub fn print_assistant_reply(content: &str) {
    let rendered = render_markdown(content);
    println!("{}: {}", speaker_label(Role::Assistant), rendered.trim());
}

/// Prints a generated SQL query as a highlighted block
pub fn print_sql(query: &str) {
    let block = format!("```sql\n{}\n```", query.trim());
    println!("{}", render_markdown(&block).trim_end());
}

pub fn print_suggestions(questions: &[&str]) {
    println!("{}", "Suggested questions:".yellow().bold());
    for (i, question) in questions.iter().enumerate() {
        println!("  {} {}", format!("/{}", i + 1).cyan(), question);
    }
    println!();
}

/// Show usage instructions when no prompt or action is provided
pub fn print_usage_instructions() {
    println!("{}", "Usage:".yellow().bold());
    println!("  {}", "oceanfront \"your question\"".green().bold());
    println!("    Ask the OceanFront assistant a single question");
    println!();
    println!("  {}", "oceanfront -i".green().bold());
    println!("    Start an interactive chat session");
    println!();
    println!("  {}", "oceanfront --sql \"your question\"".green().bold());
    println!("    Turn a question into a SQL query over the ocean dataset");
    println!();
    println!("{}", "Options:".cyan());
    println!("  --relay-url <URL>  Relay address (env OCEANFRONT_RELAY_URL)");
    println!("  --timeout <SECS>   Abort an exchange after this many seconds");
    println!("  --raw              Print replies without markdown rendering");
    println!("  --help             Show this help message");
    println!();
}

/// Render markdown in the terminal with syntax highlighting
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = MdParser::new_ext(markdown, options);

    let mut in_code_block = false;
    let mut code_block_lang = String::new();
    let mut code_block_content = String::new();
    let mut output = String::new();

    // Numbering for each open list; None for bullets
    let mut list_stack: Vec<Option<u64>> = Vec::new();

    let mut in_table = false;
    let mut in_table_cell = false;
    let mut current_row: Vec<String> = Vec::new();
    let mut table_rows: Vec<Vec<String>> = Vec::new();

    for event in parser {
        match event {
            MdEvent::Start(Tag::Table(_)) => {
                in_table = true;
                table_rows.clear();
                output.push('\n');
            }
            MdEvent::End(Tag::Table(_)) => {
                output.push_str(&render_table(&table_rows));
                in_table = false;
            }
            MdEvent::Start(Tag::TableHead) | MdEvent::Start(Tag::TableRow) => {
                current_row.clear();
            }
            MdEvent::End(Tag::TableHead) | MdEvent::End(Tag::TableRow) => {
                table_rows.push(std::mem::take(&mut current_row));
            }
            MdEvent::Start(Tag::TableCell) => {
                in_table_cell = true;
                current_row.push(String::new());
            }
            MdEvent::End(Tag::TableCell) => {
                in_table_cell = false;
            }
            MdEvent::Start(Tag::Heading(level, ..)) => match level {
                HeadingLevel::H1 => output.push_str(&format!("\n{} ", "#".bright_cyan().bold())),
                HeadingLevel::H2 => output.push_str(&format!("\n{} ", "##".bright_cyan().bold())),
                _ => output.push('\n'),
            },
            MdEvent::End(Tag::Heading(..)) => {
                output.push('\n');
            }
            MdEvent::Start(Tag::Paragraph) => {
                if !in_table && list_stack.is_empty() && !output.is_empty() && !output.ends_with('\n') {
                    output.push_str("\n\n");
                }
            }
            MdEvent::End(Tag::Paragraph) => {
                if !in_table && list_stack.is_empty() {
                    output.push('\n');
                }
            }
            MdEvent::Start(Tag::BlockQuote) => {
                output.push_str(&format!("\n{} ", "│".dimmed()));
            }
            MdEvent::End(Tag::BlockQuote) => {
                output.push('\n');
            }
            MdEvent::Start(Tag::CodeBlock(info)) => {
                in_code_block = true;
                code_block_lang = match info {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code_block_content.clear();
                output.push('\n');
            }
            MdEvent::End(Tag::CodeBlock(_)) => {
                output.push_str(&highlight_code(&code_block_lang, &code_block_content));
                in_code_block = false;
            }
            MdEvent::Start(Tag::List(start)) => {
                if list_stack.is_empty() {
                    output.push('\n');
                }
                list_stack.push(start);
            }
            MdEvent::End(Tag::List(_)) => {
                list_stack.pop();
                if list_stack.is_empty() {
                    output.push('\n');
                }
            }
            MdEvent::Start(Tag::Item) => {
                let depth = list_stack.len().saturating_sub(1);
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str(&"  ".repeat(depth));
                match list_stack.last_mut() {
                    Some(Some(n)) => {
                        output.push_str(&format!("{} ", format!("{}.", n).yellow()));
                        *n += 1;
                    }
                    _ => output.push_str(&format!("{}  ", "•".yellow())),
                }
            }
            MdEvent::End(Tag::Item) => {
                if !output.ends_with('\n') {
                    output.push('\n');
                }
            }
            MdEvent::End(Tag::Link(_, dest, _)) => {
                if !in_table_cell {
                    output.push_str(&format!(" ({})", dest.underline()));
                }
            }
            MdEvent::Code(ref code) => {
                if in_table_cell {
                    if let Some(cell) = current_row.last_mut() {
                        cell.push_str(&format!("`{}`", code));
                    }
                } else {
                    output.push_str(&format!("`{}`", code.on_bright_black().white()));
                }
            }
            MdEvent::Text(ref text) => {
                if in_code_block {
                    code_block_content.push_str(text);
                } else if in_table_cell {
                    if let Some(cell) = current_row.last_mut() {
                        cell.push_str(text);
                    }
                } else {
                    output.push_str(text);
                }
            }
            MdEvent::Html(ref html) => {
                if !in_table_cell {
                    output.push_str(html);
                }
            }
            MdEvent::TaskListMarker(done) => {
                output.push_str(if done { "[x] " } else { "[ ] " });
            }
            MdEvent::SoftBreak => {
                if !in_table_cell {
                    output.push(' ');
                }
            }
            MdEvent::HardBreak => {
                if !in_table_cell {
                    output.push('\n');
                }
            }
            _ => {}
        }
    }

    output
}

fn highlight_code(lang: &str, content: &str) -> String {
    let syntax = if lang.is_empty() {
        SYNTAX_SET.find_syntax_plain_text()
    } else {
        SYNTAX_SET
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
    };
    let mut highlighter = HighlightLines::new(syntax, &THEME);

    let mut out = String::new();
    if !lang.is_empty() {
        out.push_str(&format!("{}:\n", lang.cyan()));
    }
    out.push_str(&"─".repeat(40).dimmed().to_string());
    out.push('\n');

    for line in LinesWithEndings::from(content) {
        match highlighter.highlight_line(line, &SYNTAX_SET) {
            Ok(ranges) if colored::control::SHOULD_COLORIZE.should_colorize() => {
                out.push_str(&as_24_bit_terminal_escaped(&ranges, false));
            }
            _ => out.push_str(line),
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if colored::control::SHOULD_COLORIZE.should_colorize() {
        out.push_str("\x1b[0m");
    }

    out.push_str(&"─".repeat(40).dimmed().to_string());
    out.push_str("\n\n");
    out
}

fn render_table(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let col_count = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    if col_count == 0 {
        return out;
    }

    let mut col_widths = vec![0; col_count];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            col_widths[i] = col_widths[i].max(cell.chars().count());
        }
    }

    for (i, row) in rows.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            let padding = " ".repeat(col_widths[j].saturating_sub(cell.chars().count()));
            if i == 0 {
                out.push_str(&format!("{}{} ", cell.bold(), padding));
            } else {
                out.push_str(&format!("{}{} ", cell, padding));
            }
        }
        out.push('\n');

        // Separator under the header row
        if i == 0 {
            let rule: Vec<String> = col_widths
                .iter()
                .map(|w| "─".repeat(*w).dimmed().to_string())
                .collect();
            out.push_str(&rule.join(" "));
            out.push('\n');
        }
    }
    out.push('\n');
    out
}
