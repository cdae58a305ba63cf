//! Tests for the aggregation pipeline

pub mod file_errors;
