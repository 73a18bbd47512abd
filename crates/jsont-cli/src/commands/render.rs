/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Compiles a template file and renders it against a JSON data file,
//! optionally with a partials file. In safe mode every recorded error is
//! written to stderr as JSON after rendering.

use std::path::PathBuf;

use anyhow::{Context, Result};
use jsont_template::{Compiler, JsonTemplateEngine, Rendered, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{read_json, read_text};

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    /// Template file
    pub template: PathBuf,
    /// JSON data file
    pub data: Option<PathBuf>,
    /// JSON partials file
    pub partials: Option<PathBuf>,
    /// Record errors instead of stopping at the first
    pub safe: bool,
    /// Output file; stdout when absent
    pub output: Option<PathBuf>,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let rendered = render(&args)?;

    if !rendered.errors.is_empty() {
        warn!(errors = rendered.errors.len(), "Rendered with errors");
        eprintln!("{}", serde_json::to_string_pretty(&rendered.errors)?);
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered.output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Output written to {}", path.display());
        }
        None => print!("{}", rendered.output),
    }
    Ok(())
}

/// Compile and render, returning the output and any recorded errors.
pub fn render(args: &RenderArgs) -> Result<Rendered> {
    let engine = Arc::new(JsonTemplateEngine::new());

    let source = read_text(&args.template)?;
    let data = match &args.data {
        Some(path) => read_json(path)?,
        None => Value::object(Vec::<(String, Value)>::new()),
    };
    let partials = args.partials.as_deref().map(read_json).transpose()?;

    debug!("Compiling {}", args.template.display());
    if args.safe {
        // Syntax errors come first, ahead of anything recorded while rendering.
        let template = engine.compile_safe(&source);
        let mut rendered = engine.render_safe(&template, data, partials);
        let mut errors = template.errors().to_vec();
        errors.append(&mut rendered.errors);
        rendered.errors = errors;
        return Ok(rendered);
    }
    let template = engine
        .compile(&source)
        .with_context(|| format!("Failed to compile {}", args.template.display()))?;
    let output = engine
        .render(&template, data, partials)
        .with_context(|| format!("Failed to render {}", args.template.display()))?;
    Ok(Rendered {
        output,
        errors: Vec::new(),
    })
}
