/*
 * check.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Check command implementation.
//!
//! Compiles a template in safe mode and reports every syntax error instead
//! of stopping at the first one.

use std::path::PathBuf;

use anyhow::Result;
use jsont_template::{CompiledTemplate, Compiler, JsonTemplateEngine};
use tracing::debug;

use super::read_text;

/// Arguments for the check command
#[derive(Debug)]
pub struct CheckArgs {
    /// Template file
    pub template: PathBuf,
    /// Print the canonical form
    pub repr: bool,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let template = check(&args)?;

    if args.repr {
        println!("{}", template.repr());
    }
    for error in template.errors() {
        eprintln!("{}: {error}", args.template.display());
    }

    match template.errors().len() {
        0 => Ok(()),
        n => anyhow::bail!("{} has {n} syntax error(s)", args.template.display()),
    }
}

/// Compile the template, collecting all syntax errors.
pub fn check(args: &CheckArgs) -> Result<CompiledTemplate> {
    let source = read_text(&args.template)?;
    debug!("Checking {}", args.template.display());
    Ok(JsonTemplateEngine::new().compile_safe(&source))
}
