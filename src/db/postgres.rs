//! PostgreSQL session implementation.
//!
//! Provides `PostgresConnector`, which opens a single `PgConnection` per
//! export, and `PgSession`, which runs the export query over it using sqlx.
//!
//! Rows are fetched over the simple-query protocol, so every value arrives in
//! PostgreSQL's text format. Numbers, booleans and dates are decoded into
//! typed values; any other type keeps the server's textual form.

use crate::config::DatabaseConfig;
use crate::db::{Connector, Session, TabularResult, Value};
use crate::error::{ConnectFailure, ExportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgValueRef};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, warn};

/// SQLSTATE codes for rejected credentials.
const AUTH_SQLSTATES: [&str; 2] = ["28P01", "28000"];

/// SQLSTATE for "database does not exist".
const UNKNOWN_DATABASE_SQLSTATE: &str = "3D000";

/// Opens PostgreSQL sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }

    /// Builds the connection target from host, port, database and credentials.
    pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .application_name(env!("CARGO_PKG_NAME"))
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Session>> {
        debug!("Opening connection to {}", config.target());

        let conn = Self::connect_options(config)
            .connect()
            .await
            .map_err(|e| map_connection_error(e, config))?;

        Ok(Box::new(PgSession::new(conn)))
    }
}

/// A single PostgreSQL connection used for one query.
#[derive(Debug)]
pub struct PgSession {
    conn: Option<PgConnection>,
}

impl PgSession {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn: Some(conn) }
    }
}

#[async_trait]
impl Session for PgSession {
    async fn fetch_all(&mut self, sql: &str) -> Result<TabularResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| ExportError::query("Session is already closed"))?;

        let start = Instant::now();

        // Preparing first gives column metadata even when no rows come back.
        let statement = (&mut *conn).prepare(sql).await.map_err(query_error)?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let pg_rows: Vec<PgRow> = conn
            .fetch_all(sqlx::raw_sql(sql))
            .await
            .map_err(query_error)?;

        debug!(
            "Fetched {} rows x {} columns in {:?}",
            pg_rows.len(),
            columns.len(),
            start.elapsed()
        );

        let rows = pg_rows.iter().map(convert_row).collect();
        TabularResult::new(columns, rows)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().await.map_err(|e| {
            ExportError::connection(
                ConnectFailure::Network,
                format!("Failed to close connection: {e}"),
            )
            .with_source(e)
        })
    }
}

/// Converts a sqlx PgRow to a row of values.
fn convert_row(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let raw = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw,
        Err(e) => {
            warn!("Cannot read column {index}: {e}");
            return Value::Null;
        }
    };

    let decoded = match type_name.to_uppercase().as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(index).map(|v| Value::Number(v as f64)),
        "INT4" => row.try_get::<i32, _>(index).map(|v| Value::Number(v as f64)),
        "INT8" => row.try_get::<i64, _>(index).map(|v| Value::Number(v as f64)),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::Number(v as f64)),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::Number),
        "NUMERIC" => row
            .try_get::<Decimal, _>(index)
            .map(|d| d.to_f64().map(Value::Number).unwrap_or_else(|| Value::Text(d.to_string()))),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(index).map(Value::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|ts| Value::Timestamp(ts.naive_utc())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| Value::Timestamp(d.and_time(NaiveTime::MIN))),
        _ => return text_value(&raw, type_name),
    };

    // NaN numerics and infinite timestamps have no typed form.
    decoded.unwrap_or_else(|e| {
        debug!("Keeping column {index} of type {type_name} as text: {e}");
        text_value(&raw, type_name)
    })
}

/// The value exactly as PostgreSQL rendered it.
fn text_value(raw: &PgValueRef<'_>, type_name: &str) -> Value {
    match raw.as_str() {
        Ok(text) => Value::Text(text.to_string()),
        Err(e) => {
            warn!("Cannot read {type_name} value as text: {e}");
            Value::Text(format!("<{type_name}>"))
        }
    }
}

/// Maps sqlx connection errors to user-facing messages.
fn map_connection_error(error: sqlx::Error, config: &DatabaseConfig) -> ExportError {
    let host = &config.host;
    let port = config.port;

    let mapped = match &error {
        sqlx::Error::Configuration(e) => ExportError::connection(
            ConnectFailure::Client,
            format!("Invalid connection settings: {e}"),
        ),
        sqlx::Error::Tls(e) => {
            ExportError::connection(ConnectFailure::Client, format!("TLS unavailable: {e}"))
        }
        sqlx::Error::Protocol(e) => {
            ExportError::connection(ConnectFailure::Client, format!("Protocol error: {e}"))
        }
        sqlx::Error::Database(db_error) => {
            let code = db_error.code().unwrap_or_default();
            if AUTH_SQLSTATES.contains(&code.as_ref()) {
                ExportError::connection(
                    ConnectFailure::Authentication,
                    format!(
                        "Authentication failed for user '{}': {}",
                        config.user,
                        db_error.message()
                    ),
                )
            } else if code == UNKNOWN_DATABASE_SQLSTATE {
                ExportError::connection(
                    ConnectFailure::Network,
                    format!("Database '{}' does not exist.", config.name),
                )
            } else {
                ExportError::connection(ConnectFailure::Network, db_error.message().to_string())
            }
        }
        sqlx::Error::Io(e) => ExportError::connection(
            ConnectFailure::Network,
            format!("Cannot connect to {host}:{port}: {e}"),
        ),
        _ => ExportError::connection(ConnectFailure::Network, error.to_string()),
    };
    mapped.with_source(error)
}

fn query_error(error: sqlx::Error) -> ExportError {
    ExportError::query(format_query_error(&error)).with_source(error)
}

/// Formats a query error, keeping the database message and any detail or hint.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
