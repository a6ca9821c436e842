//! Single-shot query execution.
//!
//! Runs the configured statement over a session it takes ownership of, and
//! closes that session before returning, whether the query succeeded or not.

use std::io::Write;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::db::{Session, TabularResult};
use crate::error::Result;
use crate::status::{Console, Status};

/// Runs one query and materializes its rows.
pub struct QueryExecutor<'a> {
    sql: &'a str,
}

impl<'a> QueryExecutor<'a> {
    /// Creates an executor for the given SQL text.
    pub fn new(sql: &'a str) -> Self {
        Self { sql }
    }

    /// Executes the query over `session`, then closes it.
    ///
    /// A close failure after a successful query is logged but does not
    /// discard the rows already retrieved.
    pub async fn run<W: Write, E: Write>(
        &self,
        mut session: Box<dyn Session>,
        console: &mut Console<W, E>,
    ) -> Result<TabularResult> {
        console.emit(&Status::executing(self.sql));
        debug!("Executing {} bytes of SQL", self.sql.len());

        let start = Instant::now();
        let result = session.fetch_all(self.sql).await;
        let execution_time = start.elapsed();

        if let Err(e) = session.close().await {
            warn!("Closing the database session failed: {e}");
        }
        drop(session);

        let table = result?;
        info!(
            "Query returned {} rows in {:?}",
            table.row_count(),
            execution_time
        );
        console.emit(&Status::Retrieved {
            rows: table.row_count(),
        });

        Ok(table)
    }
}
