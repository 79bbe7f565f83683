use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};

use crate::data::parse_timestamp;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate, clean and profile tabular transaction data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a CSV file, split valid from invalid rows, clean the valid ones and compute statistics
    Validate(ValidateArgs),
    /// Produce a heuristic data-quality report for a CSV file
    Assess(AssessArgs),
    /// Print the default rule configuration as YAML
    Rules(RulesArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration with field rules, null tokens and quality thresholds
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Destination for cleaned valid rows
    #[arg(long = "valid")]
    pub valid: Option<PathBuf>,
    /// Destination for rejected rows with a rejection_reason column
    #[arg(long = "invalid")]
    pub invalid: Option<PathBuf>,
    /// Destination for the statistics JSON document
    #[arg(long = "stats")]
    pub stats: Option<PathBuf>,
    /// Reference instant for future-dated timestamps (defaults to the current UTC time)
    #[arg(long = "now", value_parser = parse_instant)]
    pub now: Option<NaiveDateTime>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for CSV outputs (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct AssessArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration supplying null tokens and quality thresholds
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Destination for the quality report JSON (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Write the configuration to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// Accepts the same ISO-8601 subset as timestamp fields.
pub fn parse_instant(value: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(value).map_err(|_| {
        format!("Invalid instant '{value}': expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS[Z]")
    })
}
