//! Command implementations for the JSON-T CLI
//!
//! Each command module handles the CLI interface and delegates to
//! jsont-template for the actual work.

pub mod check;
pub mod render;

use anyhow::{Context, Result};
use jsont_template::Value;
use std::path::Path;

/// Read a text file, naming it in the error.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    let text = read_text(path)?;
    Value::from_json_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}
