/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Execution engine for JSON-T templates.
//!
//! JSON-T is a logic-light template language that renders a JSON data tree
//! to text. It supports:
//!
//! - Variables: `{name}`, `{person.address.city}`, `{items.0}`, `{@}`
//! - Formatter chains: `{name|html}`, `{count|pluralize/y/ies}`
//! - Sections: `{.section person}...{.or}...{.end}`
//! - Loops: `{.repeated section items}...{.alternates with}...{.end}`
//! - Conditionals: `{.if a && b}...{.end}`, `{.if equal? a 1}...{.end}`
//! - Predicates: `{.plural?}...{.or singular?}...{.or}...{.end}`
//! - Partials: `{@|apply header}`
//! - Local bindings: `{.var @name person.name}`
//! - Comments: `{# note}` and `{## multi-line ##}`
//!
//! # Architecture
//!
//! Compilation ([`compiler`]) produces an immutable [`Instruction`] tree
//! shared through `Arc`. Each render creates a [`Context`] holding the
//! scope stack, output buffer, error list and partial cache, and the tree
//! is executed against it. The canonical form of instructions ([`repr`])
//! is used in error records.
//!
//! Name resolution walks the scope stack for the first segment of a path
//! only; a section's own path is resolved against the current frame only.
//!
//! # Example
//!
//! ```ignore
//! use jsont_template::{Compiler, JsonTemplateEngine, Value};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(JsonTemplateEngine::new());
//! let template = engine.compile("{.repeated section items}{@}{.alternates with},{.end}")?;
//! let data = Value::from_json_str(r#"{"items": [1, 2, 3]}"#)?;
//! assert_eq!(engine.render(&template, data, None)?, "1,2,3");
//! ```

pub mod ast;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
mod executor;
pub mod plugins;
pub mod repr;
mod tokenizer;
pub mod value;

// Re-export main types at crate root
pub use ast::{Arguments, Instruction, NamePath, Position, Segment, parse_name_path};
pub use compiler::{CompiledTemplate, Compiler, compile_source};
pub use context::{Context, DEFAULT_MAX_PARTIAL_DEPTH, LoggingHook, Rendered};
pub use engine::JsonTemplateEngine;
pub use error::{ErrorInfo, ErrorKind, TemplateError, TemplateResult};
pub use plugins::{Formatter, FormatterTable, Predicate, PredicateTable};
pub use value::Value;
