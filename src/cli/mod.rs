//! Command line surface: arguments, title banner and the interactive selection prompt.

pub mod prompt;

use clap::Parser;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{stdout, Write};
use std::path::PathBuf;

pub use prompt::{select, PromptState};

#[derive(Parser, Debug, Clone)]
#[command(name = "traderup")]
#[command(author, version, about = "Automated furniture trading through G-Earth", long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and environment overrides
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,

    /// Interception host address
    #[arg(long, env = "TRADERUP_HOST")]
    pub host: Option<String>,

    /// Fixed bridge port; disables the sibling port shift
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Trade partner, skips the user prompt
    #[arg(short, long)]
    pub user: Option<String>,

    /// Furniture to trade, skips the furniture prompt
    #[arg(short, long)]
    pub furniture: Option<String>,

    /// Write a daily rolling log file into this directory
    #[arg(long, env = "TRADERUP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// `v<major>.<minor>` of the running build
pub fn version_label() -> String {
    label_for(env!("CARGO_PKG_VERSION"))
}

fn label_for(version: &str) -> String {
    let mut parts = version.split('.');
    let major = parts.next().unwrap_or("0");
    let minor = parts.next().unwrap_or("0");
    format!("v{}.{}", major, minor)
}

pub fn print_banner() -> std::io::Result<()> {
    let mut stdout = stdout();
    execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("╔══════════════════════════════════════╗\n"),
        Print(format!("║   TraderUp {:<26}║\n", version_label())),
        Print("╚══════════════════════════════════════╝\n"),
        ResetColor
    )?;
    stdout.flush()
}
