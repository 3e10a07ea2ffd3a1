//! Helios C-CDA command line converter.
//!
//! Reads a C-CDA XML document, extracts the requested component with
//! [`helios_ccda`], and writes the result as JSON. Document issues go to
//! stderr; they never change the exit status.

pub mod config;

use std::fs;

use anyhow::Context;
use helios_ccda::{Issue, parse_document};
use tracing::info;

pub use config::CliConfig;

/// What a conversion produced.
#[derive(Debug)]
pub struct Conversion {
    pub json: String,
    pub issues: Vec<Issue>,
}

/// Reads, parses and formats the configured input.
pub fn convert(config: &CliConfig) -> anyhow::Result<Conversion> {
    let xml = fs::read_to_string(&config.input)
        .with_context(|| format!("Failed to read {}", config.input.display()))?;
    let options = config.parse_options()?;
    let formatter = config.formatter()?;

    let parsed = parse_document(&xml, &options)
        .with_context(|| format!("Failed to parse {}", config.input.display()))?;
    let json = formatter.format(&parsed.data)?;

    info!(
        input = %config.input.display(),
        component = %options.component,
        issues = parsed.issues.len(),
        "Converted document"
    );

    Ok(Conversion {
        json,
        issues: parsed.issues,
    })
}

/// Converts and writes the output to the configured file or stdout.
pub fn run(config: &CliConfig) -> anyhow::Result<()> {
    let conversion = convert(config)?;

    for issue in &conversion.issues {
        eprintln!("warning: {}", issue);
    }

    match &config.output {
        Some(path) => fs::write(path, &conversion.json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", conversion.json),
    }
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_ccda={},helios_ccda_cli={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
