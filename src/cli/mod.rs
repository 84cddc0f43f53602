//! CLI interface using clap
//!
//! Provides the command-line interface for uast-extractor

mod commands;

pub use commands::*;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::contract::WireFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// uast-extractor - Repository to UAST extraction
#[derive(Parser, Debug)]
#[command(name = "uast-extractor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE, env = "UAST_EXTRACTOR_CONFIG")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Wire format of requests and responses (json, binary)
    #[arg(short = 'f', long, global = true, default_value = "json")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a repository at a commit
    Extract(ExtractArgs),

    /// Answer one encoded request (server stub)
    Handle(HandleArgs),

    /// Decode and validate a request or response
    Validate(ValidateArgs),

    /// Serve newline-delimited JSON requests from stdin
    Serve(ServeArgs),

    /// Inspect or clear the extraction cache
    Cache(CacheArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Binary,
}

impl From<OutputFormat> for WireFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => WireFormat::Json,
            OutputFormat::Binary => WireFormat::Binary,
        }
    }
}

/// Arguments for extract command
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Repository id from the catalog
    pub repository_id: String,

    /// Commit hash in hex
    pub commit: String,

    /// Branch or tag the commit was reached from
    #[arg(short, long, default_value = "")]
    pub reference: String,

    /// Output file (defaults to stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Bypass the extraction cache
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for handle command
#[derive(Parser, Debug)]
pub struct HandleArgs {
    /// Encoded request (defaults to stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Bypass the extraction cache
    #[arg(long)]
    pub no_cache: bool,
}

/// Message kinds accepted by validate
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MessageKind {
    Request,
    Response,
}

/// Arguments for validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// What the input contains
    #[arg(value_enum)]
    pub kind: MessageKind,

    /// Encoded message (defaults to stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Request the response must answer (response only)
    #[arg(long)]
    pub request: Option<PathBuf>,
}

/// Arguments for serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Override the concurrency limit from configuration
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

/// Cache actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CacheAction {
    Stats,
    Clear,
}

/// Arguments for cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[arg(value_enum, default_value = "stats")]
    pub action: CacheAction,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Write the default configuration to the config path
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "uast-extractor",
            "extract",
            "r1",
            "abcd1234",
            "--reference",
            "refs/heads/main",
        ]);

        if let Commands::Extract(args) = cli.command {
            assert_eq!(args.repository_id, "r1");
            assert_eq!(args.commit, "abcd1234");
            assert_eq!(args.reference, "refs/heads/main");
            assert!(!args.no_cache);
        } else {
            panic!("expected extract command");
        }
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_global_format() {
        let cli = Cli::parse_from(["uast-extractor", "handle", "--format", "binary"]);
        assert!(matches!(cli.command, Commands::Handle(_)));
        assert_eq!(WireFormat::from(cli.format), WireFormat::Binary);
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["uast-extractor", "validate", "response", "-i", "out.json"]);
        if let Commands::Validate(args) = cli.command {
            assert_eq!(args.kind, MessageKind::Response);
            assert_eq!(args.input, Some(PathBuf::from("out.json")));
        } else {
            panic!("expected validate command");
        }
    }

    #[test]
    fn test_cache_defaults_to_stats() {
        let cli = Cli::parse_from(["uast-extractor", "cache"]);
        if let Commands::Cache(args) = cli.command {
            assert_eq!(args.action, CacheAction::Stats);
        } else {
            panic!("expected cache command");
        }
    }
}
