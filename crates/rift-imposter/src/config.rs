//! Command-line and imposters-file configuration.
//!
//! Every flag can also be set through a `RIFT_*` environment variable.
//! The imposters file is YAML or JSON (`{ "imposters": [...] }`), the same
//! shape produced by saving the replayable view.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Rift imposter runner - serve imposters from a file until interrupted
#[derive(Parser, Debug, Clone)]
#[command(name = "rift-imposter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Imposters file to load at startup (YAML or JSON)
    #[arg(long, env = "RIFT_CONFIGFILE")]
    pub configfile: Option<PathBuf>,

    /// Record requests for every imposter that does not set recordRequests itself
    #[arg(long, env = "RIFT_RECORD_REQUESTS")]
    pub record_requests: bool,

    /// Host to bind imposters that do not declare one
    #[arg(long, env = "RIFT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Write the replayable view of all imposters here on shutdown
    #[arg(long, env = "RIFT_SAVE_FILE")]
    pub save_file: Option<PathBuf>,

    /// Strip proxy responses from the saved file
    #[arg(long, env = "RIFT_REMOVE_PROXIES")]
    pub remove_proxies: bool,

    /// Filter used when RUST_LOG is unset
    #[arg(long, env = "RIFT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "RIFT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Contents of an imposters file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ImpostersFile {
    #[serde(default)]
    pub imposters: Vec<Value>,
}

impl ImpostersFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    /// Parse YAML or JSON text (JSON is a subset of YAML)
    pub fn parse(contents: &str) -> Result<Self, anyhow::Error> {
        let file: ImpostersFile = serde_yaml::from_str(contents)?;
        for (index, imposter) in file.imposters.iter().enumerate() {
            if !imposter.is_object() {
                anyhow::bail!("imposters[{index}] must be an object");
            }
        }
        Ok(file)
    }

    /// Fill in `host` for imposters that leave it out
    pub fn apply_default_host(&mut self, host: &str) {
        for imposter in &mut self.imposters {
            if let Value::Object(fields) = imposter {
                fields
                    .entry("host")
                    .or_insert_with(|| Value::String(host.to_string()));
            }
        }
    }
}
