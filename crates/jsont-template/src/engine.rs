/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! High-level entry point: compile templates and render them.

use crate::ast::{Instruction, RootInst};
use crate::compiler::{CompiledTemplate, Compiler, compile_source};
use crate::context::{Context, Rendered};
use crate::error::TemplateResult;
use crate::plugins::{Formatter, FormatterTable, Predicate, PredicateTable};
use crate::value::Value;
use std::sync::Arc;

/// Compiles templates against a set of formatters and predicates and
/// renders them.
///
/// The engine is immutable once shared. Wrap it in an `Arc` to render:
/// each [`Context`] it creates holds the engine as its partial compiler.
///
/// ```ignore
/// let engine = Arc::new(JsonTemplateEngine::new());
/// let template = engine.compile("Hello {name}!")?;
/// let output = engine.render(&template, Value::from_json_str(r#"{"name": "World"}"#)?, None)?;
/// assert_eq!(output, "Hello World!");
/// ```
#[derive(Debug, Clone)]
pub struct JsonTemplateEngine {
    formatters: FormatterTable,
    predicates: PredicateTable,
}

impl Default for JsonTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonTemplateEngine {
    /// An engine with the built-in formatters and predicates.
    pub fn new() -> Self {
        Self::with_tables(FormatterTable::standard(), PredicateTable::standard())
    }

    pub fn with_tables(formatters: FormatterTable, predicates: PredicateTable) -> Self {
        Self {
            formatters,
            predicates,
        }
    }

    pub fn register_formatter(&mut self, formatter: impl Formatter + 'static) -> &mut Self {
        self.formatters.register(formatter);
        self
    }

    pub fn register_predicate(&mut self, predicate: impl Predicate + 'static) -> &mut Self {
        self.predicates.register(predicate);
        self
    }

    pub fn formatters(&self) -> &FormatterTable {
        &self.formatters
    }

    pub fn predicates(&self) -> &PredicateTable {
        &self.predicates
    }

    /// A fresh context for rendering `data`, compiling partials with this
    /// engine.
    pub fn context(self: &Arc<Self>, data: Value, partials: Option<Value>) -> Context {
        let ctx = Context::new(data).with_compiler(Arc::clone(self) as Arc<dyn Compiler>);
        match partials {
            Some(partials) => ctx.with_partials(partials),
            None => ctx,
        }
    }

    /// Render `template`, failing on the first error.
    pub fn render(
        self: &Arc<Self>,
        template: &CompiledTemplate,
        data: Value,
        partials: Option<Value>,
    ) -> TemplateResult<String> {
        let mut ctx = self.context(data, partials);
        ctx.execute(template.code().as_ref())?;
        Ok(ctx.finish().output)
    }

    /// Render `template` in safe mode: failures are recorded and rendering
    /// continues.
    pub fn render_safe(
        self: &Arc<Self>,
        template: &CompiledTemplate,
        data: Value,
        partials: Option<Value>,
    ) -> Rendered {
        let mut ctx = self
            .context(data, partials)
            .with_safe_execution(true);
        if let Err(err) = ctx.execute(template.code().as_ref()) {
            // Safe execution records instead of failing; keep anything that
            // still escapes.
            if let Some(info) = err.info() {
                ctx.add_error(info.clone());
            }
        }
        ctx.finish()
    }
}

impl Compiler for JsonTemplateEngine {
    fn compile(&self, source: &str) -> TemplateResult<CompiledTemplate> {
        compile_source(source, &self.formatters, &self.predicates, false)
    }

    fn compile_safe(&self, source: &str) -> CompiledTemplate {
        match compile_source(source, &self.formatters, &self.predicates, true) {
            Ok(template) => template,
            Err(err) => CompiledTemplate::new(
                Instruction::Root(RootInst::default()),
                err.info().cloned().into_iter().collect(),
            ),
        }
    }
}
