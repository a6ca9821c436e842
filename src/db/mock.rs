//! Mock database sessions for testing.
//!
//! Provides in-memory `Session`/`Connector` implementations so the export
//! pipeline can run without a PostgreSQL server.

use super::{Connector, Session, TabularResult};
use crate::config::DatabaseConfig;
use crate::error::{ConnectFailure, ExportError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared view of what happened to a mock session.
#[derive(Debug, Clone, Default)]
pub struct SessionProbe {
    queries: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl SessionProbe {
    /// Number of queries the session received.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A session that returns a predefined result or query error.
pub struct MockSession {
    outcome: std::result::Result<TabularResult, String>,
    probe: SessionProbe,
}

impl MockSession {
    /// Creates a session that answers every query with `result`.
    pub fn returning(result: TabularResult) -> Self {
        Self {
            outcome: Ok(result),
            probe: SessionProbe::default(),
        }
    }

    /// Creates a session whose queries fail with the given database message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            probe: SessionProbe::default(),
        }
    }

    /// Returns a handle that observes this session after it is moved.
    pub fn probe(&self) -> SessionProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn fetch_all(&mut self, _sql: &str) -> Result<TabularResult> {
        if self.probe.is_closed() {
            return Err(ExportError::query("Session is already closed"));
        }
        self.probe.queries.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(ExportError::query)
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A connector that hands out mock sessions or refuses to connect.
pub struct MockConnector {
    outcome: std::result::Result<std::result::Result<TabularResult, String>, ConnectFailure>,
    probe: SessionProbe,
}

impl MockConnector {
    /// Sessions from this connector return `result`.
    pub fn returning(result: TabularResult) -> Self {
        Self {
            outcome: Ok(Ok(result)),
            probe: SessionProbe::default(),
        }
    }

    /// Sessions from this connector fail every query with `message`.
    pub fn failing_query(message: impl Into<String>) -> Self {
        Self {
            outcome: Ok(Err(message.into())),
            probe: SessionProbe::default(),
        }
    }

    /// Connecting fails with the given cause.
    pub fn refusing(failure: ConnectFailure) -> Self {
        Self {
            outcome: Err(failure),
            probe: SessionProbe::default(),
        }
    }

    /// Observes the most recent session this connector opened.
    pub fn probe(&self) -> SessionProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Session>> {
        match &self.outcome {
            Ok(outcome) => {
                self.probe.closed.store(false, Ordering::SeqCst);
                Ok(Box::new(MockSession {
                    outcome: outcome.clone(),
                    probe: self.probe.clone(),
                }))
            }
            Err(failure) => Err(ExportError::connection(
                *failure,
                format!("mock refused connection to {}", config.target()),
            )),
        }
    }
}
