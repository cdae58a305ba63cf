//! Command-line interface components

pub mod args;
pub mod commands;
