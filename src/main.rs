//! uast-extractor - Repository to UAST extraction tool
//!
//! Extracts every analyzable source file of a repository commit into a
//! language tag, path, serialized syntax tree and content hash.

use anyhow::Result;
use clap::Parser;
use uast_extractor::cli::{
    cache_action, extract, handle, load_config, serve_stdio, show_config, validate, Cli,
    Commands,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging; stdout is reserved for encoded messages
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(&cli.config)?;
    let format = cli.format.into();

    // Execute command
    match cli.command {
        Commands::Extract(args) => {
            extract(
                config,
                &args.repository_id,
                &args.commit,
                &args.reference,
                args.output.as_deref(),
                args.no_cache,
                format,
            )?;
        }

        Commands::Handle(args) => {
            handle(
                config,
                args.input.as_deref(),
                args.output.as_deref(),
                args.no_cache,
                format,
            )?;
        }

        Commands::Validate(args) => {
            validate(
                args.kind,
                args.input.as_deref(),
                args.request.as_deref(),
                format,
            )?;
        }

        Commands::Serve(args) => {
            serve_stdio(config, args.jobs)?;
        }

        Commands::Cache(args) => {
            cache_action(&config, args.action)?;
        }

        Commands::Config(args) => {
            show_config(&cli.config, &config, args.init, args.force)?;
        }
    }

    Ok(())
}
