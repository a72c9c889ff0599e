//! Command-line interface for leakscope
//!
//! This module contains CLI argument parsing and its mapping onto detection
//! options

pub mod args;

pub use args::{parse_duration, Args};
