//! Integration tests for pgxport.

pub mod common;
pub mod export_test;
pub mod postgres_test;
