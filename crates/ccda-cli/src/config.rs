//! Command line configuration.
//!
//! Every option can also be set from the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CCDA_OUTPUT` | stdout | Output file |
//! | `CCDA_COMPONENT` | ccd | Component to extract |
//! | `CCDA_FORMATTER` | stringify | Output formatter |
//! | `CCDA_PATIENT_ID` | 0 | Patient id used in identifiers |
//! | `CCDA_HIDE_FIELDS` | | Comma-separated field names to omit |
//! | `CCDA_LOG_LEVEL` | info | Log level |

use std::path::PathBuf;

use clap::Parser;
use helios_ccda::{Component, Formatter, ParseOptions};

/// Converts a C-CDA document to JSON.
#[derive(Debug, Clone, Parser)]
#[command(name = "ccda")]
#[command(about = "Convert a C-CDA document to JSON")]
pub struct CliConfig {
    /// C-CDA XML file to read.
    pub input: PathBuf,

    /// Write JSON here instead of stdout.
    #[arg(short, long, env = "CCDA_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Component to extract (ccd, demographics, vitals, results,
    /// medications, immunizations, problems, socialHistory).
    #[arg(short, long, env = "CCDA_COMPONENT", default_value = "ccd")]
    pub component: String,

    /// Output formatter (stringify, compact).
    #[arg(short, long, env = "CCDA_FORMATTER", default_value = "stringify")]
    pub formatter: String,

    /// Patient id used when building identifiers.
    #[arg(long, env = "CCDA_PATIENT_ID", default_value = "0")]
    pub patient_id: String,

    /// Field to omit from every object. May be repeated.
    #[arg(long = "hide-field", env = "CCDA_HIDE_FIELDS", value_delimiter = ',')]
    pub hide_fields: Vec<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "CCDA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            component: "ccd".to_string(),
            formatter: "stringify".to_string(),
            patient_id: "0".to_string(),
            hide_fields: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.input.as_os_str().is_empty() {
            errors.push("Input file is required".to_string());
        }

        if let Err(e) = self.component.parse::<Component>() {
            errors.push(e.to_string());
        }

        if let Err(e) = self.formatter.parse::<Formatter>() {
            errors.push(e.to_string());
        }

        if self.patient_id.trim().is_empty() {
            errors.push("Patient id cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parse options for the library. Call [`validate`](Self::validate) first.
    pub fn parse_options(&self) -> helios_ccda::Result<ParseOptions> {
        Ok(ParseOptions::new()
            .component(self.component.parse()?)
            .patient_id(self.patient_id.clone())
            .hide_fields(self.hide_fields.iter().cloned()))
    }

    pub fn formatter(&self) -> helios_ccda::Result<Formatter> {
        self.formatter.parse()
    }

    /// Creates a configuration for testing.
    pub fn for_testing(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            formatter: "compact".to_string(),
            log_level: "debug".to_string(),
            ..Default::default()
        }
    }
}
