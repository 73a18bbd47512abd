/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and execution.
//!
//! There are two layers:
//!
//! - [`ErrorInfo`] is the structured, serializable record of a single
//!   problem, tagged with an [`ErrorKind`] and the source position of the
//!   instruction (or tag) that caused it. Safe-mode renders and safe
//!   compiles accumulate these instead of failing.
//! - [`TemplateError`] is the `Result` error type. Its
//!   [`TemplateError::Execute`] and [`TemplateError::Syntax`] variants wrap
//!   an `ErrorInfo`; the remaining variants describe raw failures raised by
//!   formatters, predicates and partial expansion, which the execution
//!   boundary converts into `UNEXPECTED_ERROR` records.

use crate::ast::Position;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Category of an [`ErrorInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Execution
    /// A formatter, predicate or partial expansion failed while executing.
    UnexpectedError,
    /// A partial compiled with syntax errors (safe mode only).
    CompilePartialSyntax,

    // Compilation
    /// Unknown `{.keyword}`.
    InvalidInstruction,
    /// `{.repeated}` without the `section` keyword.
    MissingSectionKeyword,
    /// Section, repeated or var tag with a missing or malformed path.
    MissingVariableName,
    /// Formatter name not found in the formatter table.
    FormatterUnknown,
    /// Predicate name not found in the predicate table.
    PredicateUnknown,
    /// Malformed `{.if}` expression.
    IfExpression,
    /// `{.var}` whose name does not start with `@`.
    BindvarExpectsName,
    /// `{.end}`, `{.or}` or `{.alternates with}` outside any block.
    NotAllowedAtRootBlock,
    /// `{.alternates with}` outside a repeated section.
    NotAllowedInBlock,
    /// Template ended before a block was closed.
    EofInBlock,
    /// Template ended inside a `{## ... ##}` comment.
    EofInComment,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnexpectedError => "UNEXPECTED_ERROR",
            ErrorKind::CompilePartialSyntax => "COMPILE_PARTIAL_SYNTAX",
            ErrorKind::InvalidInstruction => "INVALID_INSTRUCTION",
            ErrorKind::MissingSectionKeyword => "MISSING_SECTION_KEYWORD",
            ErrorKind::MissingVariableName => "MISSING_VARIABLE_NAME",
            ErrorKind::FormatterUnknown => "FORMATTER_UNKNOWN",
            ErrorKind::PredicateUnknown => "PREDICATE_UNKNOWN",
            ErrorKind::IfExpression => "IF_EXPRESSION",
            ErrorKind::BindvarExpectsName => "BINDVAR_EXPECTS_NAME",
            ErrorKind::NotAllowedAtRootBlock => "NOT_ALLOWED_AT_ROOT_BLOCK",
            ErrorKind::NotAllowedInBlock => "NOT_ALLOWED_IN_BLOCK",
            ErrorKind::EofInBlock => "EOF_IN_BLOCK",
            ErrorKind::EofInComment => "EOF_IN_COMMENT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error record.
///
/// Built once with the `with_*` methods and never modified after it has
/// been added to an error list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    kind: ErrorKind,
    line: usize,
    offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repr: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ErrorInfo>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, pos: Position) -> Self {
        Self {
            kind,
            line: pos.line,
            offset: pos.offset,
            name: None,
            data: None,
            repr: None,
            children: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_repr(mut self, repr: impl Into<String>) -> Self {
        self.repr = Some(repr.into());
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ErrorInfo>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn repr(&self) -> Option<&str> {
        self.repr.as_deref()
    }

    pub fn children(&self) -> &[ErrorInfo] {
        &self.children
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {} character {}",
            self.kind, self.line, self.offset
        )?;
        if let Some(name) = &self.name {
            write!(f, ": {name}")?;
        }
        if let Some(data) = &self.data {
            write!(f, ": {data}")?;
        }
        if let Some(repr) = &self.repr {
            write!(f, " in {repr}")?;
        }
        for child in &self.children {
            write!(f, "\n  {child}")?;
        }
        Ok(())
    }
}

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A structured execution error that halted a normal-mode render.
    #[error("{info}")]
    Execute {
        info: Box<ErrorInfo>,
        #[source]
        source: Option<Box<TemplateError>>,
    },

    /// The template (or a partial) failed to compile.
    #[error("{0}")]
    Syntax(Box<ErrorInfo>),

    /// A formatter rejected its input or arguments.
    #[error("Formatter '{name}' failed: {message}")]
    Formatter { name: String, message: String },

    /// A predicate rejected its input or arguments.
    #[error("Predicate '{name}' failed: {message}")]
    Predicate { name: String, message: String },

    /// Partials applied inside partials beyond the configured depth.
    #[error("Partial nesting exceeded depth {max_depth}: {name}")]
    RecursivePartial { name: String, max_depth: usize },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplateError {
    pub fn formatter(name: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Formatter {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn predicate(name: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Predicate {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Short class name recorded in `UNEXPECTED_ERROR` records.
    pub fn class_name(&self) -> &'static str {
        match self {
            TemplateError::Execute { .. } => "ExecuteError",
            TemplateError::Syntax(_) => "SyntaxError",
            TemplateError::Formatter { .. } => "FormatterError",
            TemplateError::Predicate { .. } => "PredicateError",
            TemplateError::RecursivePartial { .. } => "RecursivePartialError",
            TemplateError::Json(_) => "JsonError",
        }
    }

    /// The structured record, for execution and syntax errors.
    pub fn info(&self) -> Option<&ErrorInfo> {
        match self {
            TemplateError::Execute { info, .. } | TemplateError::Syntax(info) => Some(info),
            _ => None,
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
