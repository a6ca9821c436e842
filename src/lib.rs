//! pgxport - run one SQL query against PostgreSQL and save the rows as an
//! Excel workbook.
//!
//! This library exposes the core modules for use in integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod status;
pub mod xlsx;
