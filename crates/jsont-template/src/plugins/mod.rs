/*
 * plugins/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Formatters and predicates.
//!
//! Both are named, pluggable operations looked up by identifier at compile
//! time and invoked at execution time with the [`Context`] and the
//! call's [`Arguments`]. A formatter transforms the current node in place
//! (`{name|html}`); a predicate decides which branch of a block runs
//! (`{.plural?}...{.or}...{.end}`).

use crate::ast::Arguments;
use crate::context::Context;
use crate::error::TemplateResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod formatters;
pub mod predicates;

/// Transforms the current node of a variable's formatter chain.
pub trait Formatter: Send + Sync + fmt::Debug {
    fn identifier(&self) -> &str;

    /// Read the current node and replace it with [`Context::set_node`].
    fn apply(&self, ctx: &mut Context, args: &Arguments) -> TemplateResult<()>;
}

/// Decides whether a predicate block's consequent runs.
pub trait Predicate: Send + Sync + fmt::Debug {
    fn identifier(&self) -> &str;

    fn apply(&self, ctx: &mut Context, args: &Arguments) -> TemplateResult<bool>;
}

/// Formatters available to the compiler, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct FormatterTable {
    entries: HashMap<String, Arc<dyn Formatter>>,
}

impl FormatterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in formatters.
    pub fn standard() -> Self {
        let mut table = Self::new();
        formatters::register_all(&mut table);
        table
    }

    /// Add a formatter, replacing any existing one with the same identifier.
    pub fn register(&mut self, formatter: impl Formatter + 'static) -> &mut Self {
        self.entries
            .insert(formatter.identifier().to_string(), Arc::new(formatter));
        self
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Formatter>> {
        self.entries.get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }
}

/// Predicates available to the compiler, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct PredicateTable {
    entries: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in predicates.
    pub fn standard() -> Self {
        let mut table = Self::new();
        predicates::register_all(&mut table);
        table
    }

    /// Add a predicate, replacing any existing one with the same identifier.
    pub fn register(&mut self, predicate: impl Predicate + 'static) -> &mut Self {
        self.entries
            .insert(predicate.identifier().to_string(), Arc::new(predicate));
        self
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Predicate>> {
        self.entries.get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tables() {
        let formatters = FormatterTable::standard();
        for name in ["html", "htmlattr", "json", "json-pretty", "pluralize", "count", "apply"] {
            assert!(formatters.contains(name), "missing formatter {name}");
        }

        let predicates = PredicateTable::standard();
        for name in ["equal?", "plural?", "singular?", "even?", "odd?"] {
            assert!(predicates.contains(name), "missing predicate {name}");
        }
    }

    #[test]
    fn test_register_replaces() {
        #[derive(Debug)]
        struct Shout;

        impl Formatter for Shout {
            fn identifier(&self) -> &str {
                "html"
            }

            fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<()> {
                let text = ctx.node().to_text().to_uppercase();
                ctx.set_node(text);
                Ok(())
            }
        }

        let mut table = FormatterTable::standard();
        table.register(Shout);
        let formatter = table.get("html").unwrap();

        let mut ctx = Context::new("<b>".into());
        formatter.apply(&mut ctx, &Arguments::empty()).unwrap();
        assert_eq!(ctx.node().to_text(), "<B>");
    }
}
