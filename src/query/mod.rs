//! Query execution for pgxport.
//!
//! Isolates running the export statement from connection handling and
//! spreadsheet output.

pub mod executor;

pub use executor::QueryExecutor;
