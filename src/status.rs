//! Console status output.
//!
//! Pipeline stages describe what happened as `Status` values; `Console`
//! renders them as the human-readable lines an operator sees. Progress goes to
//! the output stream, failures to the error stream.

use std::fmt;
use std::io::{self, Stderr, Stdout, Write};
use std::path::PathBuf;

/// Width of the `=` border around banners.
const BANNER_WIDTH: usize = 50;

/// Number of query characters shown before execution.
pub const QUERY_PREVIEW_CHARS: usize = 50;

/// Banner title printed at startup.
pub const TITLE: &str = "Database Query to Excel Exporter";

/// One status line (or block of lines) reported to the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// Bordered startup banner.
    Banner,
    /// Database session opened.
    Connected,
    /// Opening the session failed.
    ConnectFailed { message: String },
    /// About to run the query; carries the truncated preview.
    Executing { preview: String },
    /// Query finished and all rows are in memory.
    Retrieved { rows: usize },
    /// Workbook written.
    Saved {
        file: PathBuf,
        sheet: String,
        rows: usize,
        columns: usize,
    },
    /// Workbook could not be written.
    SaveFailed { message: String },
    /// Bordered success banner.
    Completed,
    /// The configuration could not be loaded.
    ConfigFailed { message: String },
    /// Any later stage failed.
    Failed { message: String },
}

impl Status {
    /// Builds the `Executing` status for a query.
    pub fn executing(sql: &str) -> Self {
        Self::Executing {
            preview: query_preview(sql),
        }
    }

    /// Failure statuses go to the error stream.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ConfigFailed { .. } | Self::Failed { .. })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "=".repeat(BANNER_WIDTH);
        match self {
            Self::Banner => write!(f, "{border}\n{TITLE}\n{border}"),
            Self::Connected => write!(f, "✓ Database connection established"),
            Self::ConnectFailed { message } => write!(f, "✗ Connection failed: {message}"),
            Self::Executing { preview } => write!(f, "Executing query: {preview}..."),
            Self::Retrieved { rows } => {
                write!(f, "✓ Query executed successfully. Rows retrieved: {rows}")
            }
            Self::Saved {
                file,
                sheet,
                rows,
                columns,
            } => write!(
                f,
                "✓ Results saved to: {}\n  Sheet name: {sheet}\n  Rows: {rows}, Columns: {columns}",
                file.display()
            ),
            Self::SaveFailed { message } => write!(f, "✗ Failed to save Excel file: {message}"),
            Self::Completed => {
                write!(f, "{border}\n✓ Process completed successfully!\n{border}")
            }
            Self::ConfigFailed { message } => {
                write!(f, "Failed to load configuration: {message}")
            }
            Self::Failed { message } => write!(f, "\n✗ Process failed: {message}"),
        }
    }
}

/// Returns the first `QUERY_PREVIEW_CHARS` characters of a query.
///
/// Only the printed preview is shortened; the full text is what runs.
pub fn query_preview(sql: &str) -> String {
    sql.chars().take(QUERY_PREVIEW_CHARS).collect()
}

/// Writes statuses to an output and an error stream.
pub struct Console<W: Write, E: Write> {
    out: W,
    err: E,
}

impl Console<Stdout, Stderr> {
    /// Console bound to the process stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> Console<W, E> {
    pub fn new(out: W, err: E) -> Self {
        Self { out, err }
    }

    /// Prints a status line. Console write failures are ignored.
    pub fn emit(&mut self, status: &Status) {
        let _ = if status.is_failure() {
            writeln!(self.err, "{status}")
        } else {
            writeln!(self.out, "{status}")
        };
    }

    /// Prints free-form diagnostic detail on the error stream.
    pub fn diagnostic(&mut self, detail: &str) {
        let _ = writeln!(self.err, "{detail}");
    }

    /// Returns the underlying streams.
    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }
}
