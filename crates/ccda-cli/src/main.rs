//! `ccda` - convert a C-CDA document to JSON.

use clap::Parser;
use helios_ccda_cli::{CliConfig, init_logging, run};

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    run(&config)
}
