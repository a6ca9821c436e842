//! Export orchestration.
//!
//! Sequences configuration loading, connecting, querying and writing, and
//! reports each step on the console. Any failure ends the run; nothing is
//! retried.

use std::error::Error as _;
use std::io::Write;
use std::path::Path;

use tracing::{debug, error};

use crate::config::Config;
use crate::db::{self, Connector};
use crate::error::Result;
use crate::query::QueryExecutor;
use crate::status::{Console, Status};
use crate::xlsx::{self, SheetReport};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ConfigLoaded,
    Connected,
    QueryExecuted,
    SpreadsheetWritten,
    Success,
    Failed,
}

impl Stage {
    /// `Success` and `Failed` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// The stage a successful step leads to, if any.
    fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::ConfigLoaded),
            Self::ConfigLoaded => Some(Self::Connected),
            Self::Connected => Some(Self::QueryExecuted),
            Self::QueryExecuted => Some(Self::SpreadsheetWritten),
            Self::SpreadsheetWritten => Some(Self::Success),
            Self::Success | Self::Failed => None,
        }
    }
}

/// One export run.
pub struct Pipeline<'a> {
    connector: &'a dyn Connector,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(connector: &'a dyn Connector) -> Self {
        Self {
            connector,
            stage: Stage::Start,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the whole export using the configuration at `config_path`.
    ///
    /// Failures are reported on the console before being returned.
    pub async fn run<W: Write, E: Write>(
        &mut self,
        config_path: &Path,
        console: &mut Console<W, E>,
    ) -> Result<SheetReport> {
        let outcome = self.run_stages(config_path, console).await;

        match &outcome {
            Ok(_) => {
                self.advance();
                console.emit(&Status::Completed);
            }
            Err(e) => {
                let failed_at = self.stage;
                self.stage = Stage::Failed;
                error!("{} after stage {:?}: {}", e.category(), failed_at, e);

                let message = e.to_string();
                if e.is_config() {
                    console.emit(&Status::ConfigFailed { message });
                } else {
                    console.emit(&Status::Failed { message });
                }
                let mut cause = e.source();
                while let Some(inner) = cause {
                    console.diagnostic(&format!("  caused by: {inner}"));
                    cause = inner.source();
                }
            }
        }

        outcome
    }

    async fn run_stages<W: Write, E: Write>(
        &mut self,
        config_path: &Path,
        console: &mut Console<W, E>,
    ) -> Result<SheetReport> {
        let config = Config::load_from_file(config_path)?;
        self.advance();

        console.emit(&Status::Banner);

        let session = db::open_session(self.connector, &config.db, console).await?;
        self.advance();

        let table = QueryExecutor::new(&config.query.sql)
            .run(session, console)
            .await?;
        self.advance();

        let report = match xlsx::write_workbook(&table, &config.output.file, &config.output.sheet)
        {
            Ok(report) => report,
            Err(e) => {
                console.emit(&Status::SaveFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        self.advance();

        console.emit(&Status::Saved {
            file: report.file.clone(),
            sheet: report.sheet.clone(),
            rows: report.rows,
            columns: report.columns,
        });

        Ok(report)
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            debug!("Stage {:?} -> {:?}", self.stage, next);
            self.stage = next;
        }
    }
}

/// Maps a run outcome to the process exit status.
pub fn exit_code<T>(outcome: &Result<T>) -> i32 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
