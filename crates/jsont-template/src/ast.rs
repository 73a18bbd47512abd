/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled instruction tree.
//!
//! A template compiles to a tree of [`Instruction`]s rooted at
//! [`Instruction::Root`]. The tree is immutable once built and carries no
//! per-render state, so a single compiled template can be shared (via
//! `Arc`) across any number of concurrent renders. Each instruction records
//! the position of its tag for error reporting.

use crate::plugins::{Formatter, Predicate};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Location of an instruction's tag in its template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based character column within the line.
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, offset: usize) -> Self {
        Self { line, offset }
    }

    /// The position of the first character of a template.
    pub fn start() -> Self {
        Self::new(1, 1)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// One segment of a dotted name path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key (also used for `@index` and `{.var}` bound names).
    Key(String),
    /// Array position.
    Index(usize),
}

impl Segment {
    pub fn key(name: impl Into<String>) -> Self {
        Segment::Key(name.into())
    }
}

/// A dotted name path. `None` refers to the whole current scope (`@`).
pub type NamePath = Option<Vec<Segment>>;

/// Reserved name resolving to the 1-based position of an iterating frame.
pub const INDEX_VARIABLE: &str = "@index";

/// Parse a variable reference such as `a.b.0.c`, `@` or `@index`.
///
/// Returns `None` when `text` is not a well-formed name path.
pub fn parse_name_path(text: &str) -> Option<NamePath> {
    if text == "@" {
        return Some(None);
    }
    if text.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    for part in text.split('.') {
        if part.is_empty() || !part.chars().all(is_name_char) {
            return None;
        }
        if part.bytes().all(|b| b.is_ascii_digit()) {
            segments.push(Segment::Index(part.parse().ok()?));
        } else {
            segments.push(Segment::Key(part.to_string()));
        }
    }
    Some(Some(segments))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '@' | '$')
}

/// Arguments attached to a formatter or predicate call.
///
/// The first character after the identifier is the delimiter, and the rest
/// is split on it: `pluralize/y/ies` has delimiter `/` and arguments
/// `["y", "ies"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arguments {
    delimiter: char,
    args: Vec<String>,
}

impl Arguments {
    pub fn new(delimiter: char, args: Vec<String>) -> Self {
        Self { delimiter, args }
    }

    /// An empty argument list. Serializes to nothing.
    pub fn empty() -> Self {
        Self::new(' ', Vec::new())
    }

    /// Parse the raw text following an identifier.
    pub fn parse(raw: &str) -> Self {
        let mut chars = raw.chars();
        match chars.next() {
            None => Self::empty(),
            Some(delimiter) => Self::new(
                delimiter,
                chars.as_str().split(delimiter).map(str::to_string).collect(),
            ),
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self::empty()
    }
}

/// A formatter applied to a variable: `{name|formatter args}`.
#[derive(Clone)]
pub struct FormatterCall {
    pub formatter: Arc<dyn Formatter>,
    pub args: Arguments,
}

impl FormatterCall {
    pub fn new(formatter: Arc<dyn Formatter>, args: Arguments) -> Self {
        Self { formatter, args }
    }
}

impl fmt::Debug for FormatterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterCall")
            .field("formatter", &self.formatter.identifier())
            .field("args", &self.args)
            .finish()
    }
}

/// A predicate invocation: `{.equal? a b}`.
#[derive(Clone)]
pub struct PredicateCall {
    pub predicate: Arc<dyn Predicate>,
    pub args: Arguments,
}

impl PredicateCall {
    pub fn new(predicate: Arc<dyn Predicate>, args: Arguments) -> Self {
        Self { predicate, args }
    }
}

impl fmt::Debug for PredicateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateCall")
            .field("predicate", &self.predicate.identifier())
            .field("args", &self.args)
            .finish()
    }
}

/// An ordered list of instructions.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// A node in the compiled instruction tree.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Top of every compiled template.
    Root(RootInst),

    /// Literal text copied to the output.
    Text(TextInst),

    /// Variable reference: `{a.b|formatter}`
    Variable(VariableInst),

    /// Scoped block: `{.section a}...{.end}`
    Section(SectionInst),

    /// Loop: `{.repeated section a}...{.alternates with}...{.end}`
    Repeated(RepeatedInst),

    /// Separator block executed between loop iterations.
    AlternatesWith(AlternatesWithInst),

    /// Boolean expression block: `{.if a && b}`
    If(IfInst),

    /// Predicate-driven conditional: `{.if equal? a b}`
    IfPredicate(IfPredicateInst),

    /// Predicate block `{.plural?}` or chained `{.or}` / `{.or plural?}`
    Predicate(PredicateInst),

    /// Block terminator: `{.end}`
    End(EndInst),

    /// Literal delimiter: `{.meta-left}` / `{.meta-right}`
    Meta(MetaInst),

    /// Comment (not rendered): `{# ... }` / `{## ... ##}`
    Comment(CommentInst),

    /// Local binding: `{.var @name a.b}`
    BindVar(BindVarInst),

    /// Named literal: `{.space}`, `{.tab}`, `{.newline}`
    Literal(LiteralInst),
}

impl Instruction {
    /// Position of this instruction's tag in the template source.
    pub fn position(&self) -> Position {
        match self {
            Instruction::Root(_) => Position::start(),
            Instruction::Text(i) => i.pos,
            Instruction::Variable(i) => i.pos,
            Instruction::Section(i) => i.pos,
            Instruction::Repeated(i) => i.pos,
            Instruction::AlternatesWith(i) => i.pos,
            Instruction::If(i) => i.pos,
            Instruction::IfPredicate(i) => i.pos,
            Instruction::Predicate(i) => i.pos,
            Instruction::End(i) => i.pos,
            Instruction::Meta(i) => i.pos,
            Instruction::Comment(i) => i.pos,
            Instruction::BindVar(i) => i.pos,
            Instruction::Literal(i) => i.pos,
        }
    }

    /// Canonical textual form, optionally including children.
    pub fn repr(&self, recurse: bool) -> String {
        crate::repr::emit(self, recurse)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RootInst {
    pub consequent: Block,
    pub alternative: Option<Box<Instruction>>,
}

#[derive(Debug, Clone)]
pub struct TextInst {
    pub text: String,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct VariableInst {
    pub variable: NamePath,
    pub formatters: Vec<FormatterCall>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct SectionInst {
    pub variable: NamePath,
    pub consequent: Block,
    pub alternative: Option<Box<Instruction>>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct RepeatedInst {
    pub variable: NamePath,
    pub consequent: Block,
    pub alternates_with: Option<AlternatesWithInst>,
    pub alternative: Option<Box<Instruction>>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct AlternatesWithInst {
    pub consequent: Block,
    pub pos: Position,
}

/// Logical operator joining the terms of an `{.if}` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
        }
    }
}

/// `{.if a && b || c}`. There is always one more variable than operators.
#[derive(Debug, Clone)]
pub struct IfInst {
    pub variables: Vec<NamePath>,
    pub operators: Vec<Operator>,
    pub consequent: Block,
    pub alternative: Option<Box<Instruction>>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct IfPredicateInst {
    pub call: PredicateCall,
    pub consequent: Block,
    pub alternative: Option<Box<Instruction>>,
    pub pos: Position,
}

/// Whether a [`PredicateInst`] opens a block or continues an `{.or}` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    Predicate,
    Or,
}

/// `{.plural?}`, `{.or}` or `{.or equal? a b}`.
///
/// A bare `{.or}` has no call and always takes its consequent.
#[derive(Debug, Clone)]
pub struct PredicateInst {
    pub kind: PredicateKind,
    pub call: Option<PredicateCall>,
    pub consequent: Block,
    pub alternative: Option<Box<Instruction>>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct EndInst {
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaSide {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct MetaInst {
    pub side: MetaSide,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct CommentInst {
    pub text: String,
    pub multi_line: bool,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct BindVarInst {
    /// Bound name, including its leading `@`.
    pub name: String,
    pub variable: NamePath,
    pub pos: Position,
}

/// Built-in literal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Space,
    Tab,
    Newline,
}

impl LiteralKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "space" => Some(LiteralKind::Space),
            "tab" => Some(LiteralKind::Tab),
            "newline" => Some(LiteralKind::Newline),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LiteralKind::Space => "space",
            LiteralKind::Tab => "tab",
            LiteralKind::Newline => "newline",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            LiteralKind::Space => " ",
            LiteralKind::Tab => "\t",
            LiteralKind::Newline => "\n",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralInst {
    pub kind: LiteralKind,
    pub pos: Position,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_name_path() {
        assert_eq!(parse_name_path("@"), Some(None));
        assert_eq!(
            parse_name_path("a.b.0"),
            Some(Some(vec![
                Segment::key("a"),
                Segment::key("b"),
                Segment::Index(0)
            ]))
        );
        assert_eq!(
            parse_name_path("@index"),
            Some(Some(vec![Segment::key(INDEX_VARIABLE)]))
        );
    }

    #[test]
    fn test_parse_name_path_rejects_malformed() {
        assert_eq!(parse_name_path(""), None);
        assert_eq!(parse_name_path("a..b"), None);
        assert_eq!(parse_name_path("a."), None);
        assert_eq!(parse_name_path("a b"), None);
        assert_eq!(parse_name_path("\"a\""), None);
    }

    #[test]
    fn test_arguments_parse() {
        let args = Arguments::parse("/y/ies");
        assert_eq!(args.delimiter(), '/');
        assert_eq!(args.args(), &["y".to_string(), "ies".to_string()]);

        let args = Arguments::parse(" a  b");
        assert_eq!(args.delimiter(), ' ');
        assert_eq!(args.len(), 3);
        assert_eq!(args.get(1), Some(""));

        assert!(Arguments::parse("").is_empty());
    }

    #[test]
    fn test_literal_kind_names() {
        for kind in [LiteralKind::Space, LiteralKind::Tab, LiteralKind::Newline] {
            assert_eq!(LiteralKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(LiteralKind::from_name("bogus"), None);
    }
}
