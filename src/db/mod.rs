//! Database access layer for pgxport.
//!
//! A `Connector` opens a `Session`; a session runs one query and is then
//! closed. The PostgreSQL implementation lives in `postgres`, an in-memory one
//! for tests in `mock`.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnector, MockSession, SessionProbe};
pub use postgres::{PgSession, PostgresConnector};
pub use types::{TabularResult, Value};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::status::{Console, Status};
use async_trait::async_trait;
use std::io::Write;
use tracing::{info, warn};

/// An open database session.
#[async_trait]
pub trait Session: Send {
    /// Executes a SQL statement and materializes every row it returns.
    async fn fetch_all(&mut self, sql: &str) -> Result<TabularResult>;

    /// Closes the session. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions against a configured database.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens one authenticated session.
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Session>>;
}

/// Opens a session and reports the outcome on the console.
pub async fn open_session<W: Write, E: Write>(
    connector: &dyn Connector,
    config: &DatabaseConfig,
    console: &mut Console<W, E>,
) -> Result<Box<dyn Session>> {
    match connector.connect(config).await {
        Ok(session) => {
            info!("Connected to {}", config.display_string());
            console.emit(&Status::Connected);
            Ok(session)
        }
        Err(e) => {
            warn!("Connection to {} failed: {e}", config.display_string());
            console.emit(&Status::ConnectFailed {
                message: e.to_string(),
            });
            Err(e)
        }
    }
}
