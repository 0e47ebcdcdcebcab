//! Configuration and CLI argument handling

use clap::Parser;

use crate::state::TimeUnit;

/// Initial hour/minute/second fields given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

/// Parse `HH:MM:SS`, `MM:SS` or `SS`, range-checking every field
pub fn parse_preset(raw: &str) -> Result<Preset, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(format!("Expected HH:MM:SS, got '{}'", raw));
    }

    let mut values = [0u32; 3];
    let offset = 3 - parts.len();
    for (i, part) in parts.iter().enumerate() {
        let unit = TimeUnit::ALL[offset + i];
        let value: u32 = part
            .trim()
            .parse()
            .map_err(|_| format!("Invalid {} '{}' in '{}'", unit, part, raw))?;
        if value > unit.max() {
            return Err(format!("{} must be at most {}, got {}", unit, unit.max(), value));
        }
        values[offset + i] = value;
    }

    Ok(Preset { hour: values[0], minute: values[1], second: values[2] })
}

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "countdown-timer")]
#[command(about = "A state-managed HTTP countdown timer")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Initial timer value as HH:MM:SS
    #[arg(long, value_parser = parse_preset)]
    pub preset: Option<Preset>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
