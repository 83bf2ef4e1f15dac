//! Optional YAML defaults for the command-line flags.
//!
//! ```yaml
//! backend: postgres
//! table: people
//! format: yaml
//! ```
//!
//! Every field is optional; flags given on the command line win.

use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use squril_postgres::PostgresBackend;
use squril_sql::Backend;
use squril_sqlite::SqliteBackend;

/// SQL dialect selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Postgres,
}

impl BackendKind {
    pub fn backend(self) -> &'static dyn Backend {
        match self {
            Self::Sqlite => &SqliteBackend,
            Self::Postgres => &PostgresBackend,
        }
    }
}

/// How compiled statements are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
    Text,
}

/// Defaults loaded from `--config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub backend: Option<BackendKind>,
    pub table: Option<String>,
    pub format: Option<OutputFormat>,
}

impl CliConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|err| format!("Failed to open config '{}': {err}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| format!("Failed to parse config '{}': {err}", path.display()))
    }
}
