//! Command-line interface for pgxport.
//!
//! The export is driven entirely by `config.properties` (or `config.toml`) in
//! the working directory; the command line only offers `--help` and
//! `--version`.

use clap::Parser;

/// Run the SQL query from config.properties and save the rows as an Excel workbook.
#[derive(Parser, Debug)]
#[command(name = "pgxport")]
#[command(version, about, long_about = None)]
#[command(after_help = "Reads config.properties (key=value lines) from the current \
directory, or config.toml when no properties file exists. \
Required keys: db.host, db.port, db.name, db.user, db.password, \
query.sql, output.file, output.sheet. Set RUST_LOG=debug for diagnostics.")]
pub struct Cli {}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
