//! Configuration management for pgxport.
//!
//! Loads the export job from a key/value file. Keys are dotted (`db.host`,
//! `query.sql`, `output.file`, ...). Two layouts are read:
//!
//! - `config.properties`: Java properties, one unquoted `key=value` per line.
//! - `config.toml`: TOML, as flat dotted keys or `[db]`/`[query]`/`[output]`
//!   tables.
//!
//! Missing `db.*` keys fall back to the libpq environment variables before
//! validation.

use crate::error::{ExportError, Result};
use crate::xlsx;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Properties config file, looked for first.
pub const CONFIG_FILE: &str = "config.properties";

/// TOML config file, used when no properties file exists.
pub const TOML_CONFIG_FILE: &str = "config.toml";

/// How a config file is laid out, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Properties,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; anything else is read as properties.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Properties,
        }
    }
}

/// Validated export job configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database connection settings.
    pub db: DatabaseConfig,
    /// The single statement to run.
    pub query: QueryConfig,
    /// Where the workbook goes.
    pub output: OutputConfig,
}

/// Database connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

/// Query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub sql: String,
}

/// Output workbook settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub file: PathBuf,
    pub sheet: String,
}

impl DatabaseConfig {
    /// Returns the connection target (`host:port/database`).
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.name)
    }

    /// Returns a display-safe string (no password) for status output.
    pub fn display_string(&self) -> String {
        format!("{} @ {}:{}", self.name, self.host, self.port)
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// File layout before validation; every key is optional here.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    db: RawDatabase,
    #[serde(default)]
    query: RawQuery,
    #[serde(default)]
    output: RawOutput,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    host: Option<String>,
    port: Option<RawPort>,
    name: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQuery {
    sql: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    file: Option<String>,
    sheet: Option<String>,
}

/// Port given either as a TOML integer or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(i64),
    Text(String),
}

impl RawPort {
    fn parse(&self) -> std::result::Result<u16, String> {
        let number = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("'db.port' must be a number, got '{s}'"))?,
        };
        match u16::try_from(number) {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(format!("'db.port' must be between 1 and 65535, got {number}")),
        }
    }
}

impl RawConfig {
    /// Picks the known keys out of a flat properties map. Unknown keys are
    /// ignored.
    fn from_properties(mut values: HashMap<String, String>) -> Self {
        let mut take = |key: &str| values.remove(key);
        Self {
            db: RawDatabase {
                host: take("db.host"),
                port: take("db.port").map(RawPort::Text),
                name: take("db.name"),
                user: take("db.user"),
                password: take("db.password"),
            },
            query: RawQuery {
                sql: take("query.sql"),
            },
            output: RawOutput {
                file: take("output.file"),
                sheet: take("output.sheet"),
            },
        }
    }
}

impl RawDatabase {
    /// Applies environment variables (PGHOST, PGPORT, etc.) as defaults.
    fn apply_env_defaults(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if self.host.is_none() {
            self.host = env("PGHOST");
        }
        if self.port.is_none() {
            self.port = env("PGPORT").map(RawPort::Text);
        }
        if self.name.is_none() {
            self.name = env("PGDATABASE");
        }
        if self.user.is_none() {
            self.user = env("PGUSER");
        }
        if self.password.is_none() {
            self.password = env("PGPASSWORD");
        }
    }
}

impl Config {
    /// Returns the config file path used by the binary.
    pub fn default_path() -> PathBuf {
        Self::default_path_in(Path::new(""))
    }

    /// `config.properties` in `dir`, or `config.toml` when only that exists.
    pub fn default_path_in(dir: &Path) -> PathBuf {
        let properties = dir.join(CONFIG_FILE);
        let toml = dir.join(TOML_CONFIG_FILE);
        if !properties.exists() && toml.exists() {
            toml
        } else {
            properties
        }
    }

    /// Loads configuration from a TOML file, using the process environment
    /// for missing database settings.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::load_with_env(path, &|key| std::env::var(key).ok())
    }

    /// Loads configuration from a TOML file with an explicit environment lookup.
    pub fn load_with_env(path: &Path, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        if !path.exists() {
            return Err(ExportError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let format = ConfigFormat::from_path(path);
        debug!(
            "Read {} bytes of {:?} from {}",
            content.len(),
            format,
            path.display()
        );
        match format {
            ConfigFormat::Properties => Self::parse_properties(&content, path, env),
            ConfigFormat::Toml => Self::parse_toml(&content, path, env),
        }
    }

    /// Parses and validates configuration from Java properties text.
    fn parse_properties(
        content: &str,
        path: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let values = java_properties::read(content.as_bytes())
            .map_err(|e| ExportError::config(format!("{}: {e}", path.display())))?;

        Self::finish(RawConfig::from_properties(values), path, env)
    }

    /// Parses and validates configuration from a TOML string.
    fn parse_toml(
        content: &str,
        path: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| ExportError::config(format!("{}: {e}", path.display())))?;

        Self::finish(raw, path, env)
    }

    fn finish(
        mut raw: RawConfig,
        path: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        raw.db.apply_env_defaults(env);
        Self::validate(raw).map_err(|problems| {
            ExportError::config(format!(
                "{}:\n  {}",
                path.display(),
                problems.join("\n  ")
            ))
        })
    }

    /// Checks every required key, collecting all problems instead of
    /// stopping at the first.
    fn validate(raw: RawConfig) -> std::result::Result<Self, Vec<String>> {
        let mut problems = Vec::new();

        let mut required = |key: &str, value: Option<String>| -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v,
                Some(_) => {
                    problems.push(format!("'{key}' must not be empty"));
                    String::new()
                }
                None => {
                    problems.push(format!("missing required key '{key}'"));
                    String::new()
                }
            }
        };

        let host = required("db.host", raw.db.host);
        let name = required("db.name", raw.db.name);
        let user = required("db.user", raw.db.user);
        let sql = required("query.sql", raw.query.sql);
        let file = required("output.file", raw.output.file);
        let sheet = required("output.sheet", raw.output.sheet);

        // An empty password is legitimate (trust auth); absence is not.
        let password = match raw.db.password {
            Some(p) => p,
            None => {
                problems.push("missing required key 'db.password'".to_string());
                String::new()
            }
        };

        let port = match raw.db.port {
            Some(port) => port.parse().unwrap_or_else(|e| {
                problems.push(e);
                0
            }),
            None => {
                problems.push("missing required key 'db.port'".to_string());
                0
            }
        };

        if !sheet.is_empty() {
            if let Err(e) = xlsx::validate_sheet_name(&sheet) {
                problems.push(format!("'output.sheet' {e}"));
            }
        }

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(Self {
            db: DatabaseConfig {
                host,
                port,
                name,
                user,
                password,
            },
            query: QueryConfig { sql },
            output: OutputConfig {
                file: PathBuf::from(file),
                sheet,
            },
        })
    }
}
