/*
 * tokenizer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template tokenizer.
//!
//! Splits template text into a flat stream of instructions. Block-opening
//! instructions come out with empty blocks; [`crate::compiler`] folds the
//! stream into a tree.
//!
//! A `{` starts a tag only when a `}` follows on the same line with no
//! other `{` in between, and the tag body is non-empty and does not start
//! with whitespace. Everything else, including tags whose body is not a
//! well-formed variable reference, is literal text.

use crate::ast::{
    AlternatesWithInst, Arguments, BindVarInst, Block, CommentInst, EndInst, FormatterCall,
    IfInst, IfPredicateInst, Instruction, LiteralInst, LiteralKind, MetaInst, MetaSide, Operator,
    Position, PredicateCall, PredicateInst, PredicateKind, RepeatedInst, SectionInst, TextInst,
    VariableInst, parse_name_path,
};
use crate::error::{ErrorInfo, ErrorKind, TemplateError, TemplateResult};
use crate::plugins::{FormatterTable, PredicateTable};

/// Instructions and (safe mode) errors produced from one template.
#[derive(Debug, Default)]
pub(crate) struct Tokens {
    pub instructions: Vec<Instruction>,
    pub errors: Vec<ErrorInfo>,
}

/// What a `{...}` tag turned out to be.
enum Tag {
    Instruction(Instruction),
    Text,
}

pub(crate) struct Tokenizer<'a> {
    source: &'a str,
    /// Byte index of the first character of each line.
    line_starts: Vec<usize>,
    formatters: &'a FormatterTable,
    predicates: &'a PredicateTable,
    safe: bool,
    tokens: Tokens,
    text: String,
    text_start: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(
        source: &'a str,
        formatters: &'a FormatterTable,
        predicates: &'a PredicateTable,
        safe: bool,
    ) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
            formatters,
            predicates,
            safe,
            tokens: Tokens::default(),
            text: String::new(),
            text_start: 0,
        }
    }

    /// Tokenize the whole template. In strict mode the first syntax error
    /// is returned; in safe mode errors are collected and the offending tags
    /// dropped.
    pub fn run(mut self) -> TemplateResult<Tokens> {
        let mut index = 0;
        while let Some(found) = self.source[index..].find('{') {
            let start = index + found;
            self.push_text(index, start);
            index = self.scan_tag(start)?;
        }
        self.push_text(index, self.source.len());
        self.flush_text();
        Ok(self.tokens)
    }

    /// 1-based line and character column of byte `index`.
    fn position(&self, index: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= index);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let offset = self.source[line_start..index].chars().count() + 1;
        Position::new(line, offset)
    }

    fn push_text(&mut self, from: usize, to: usize) {
        if from >= to {
            return;
        }
        if self.text.is_empty() {
            self.text_start = from;
        }
        self.text.push_str(&self.source[from..to]);
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let pos = self.position(self.text_start);
        let text = std::mem::take(&mut self.text);
        self.tokens
            .instructions
            .push(Instruction::Text(TextInst { text, pos }));
    }

    fn emit(&mut self, instruction: Instruction) {
        self.flush_text();
        self.tokens.instructions.push(instruction);
    }

    fn fail(&mut self, info: ErrorInfo) -> TemplateResult<()> {
        if self.safe {
            self.tokens.errors.push(info);
            Ok(())
        } else {
            Err(TemplateError::Syntax(Box::new(info)))
        }
    }

    /// Handle the `{` at byte `start`, returning where scanning resumes.
    fn scan_tag(&mut self, start: usize) -> TemplateResult<usize> {
        let source = self.source;
        let pos = self.position(start);

        if source[start..].starts_with("{##") {
            let body_start = start + 3;
            let Some(len) = source[body_start..].find("##}") else {
                self.fail(ErrorInfo::new(ErrorKind::EofInComment, pos))?;
                return Ok(source.len());
            };
            self.emit(Instruction::Comment(CommentInst {
                text: source[body_start..body_start + len].to_string(),
                multi_line: true,
                pos,
            }));
            return Ok(body_start + len + 3);
        }

        let body_start = start + 1;
        let close = source[body_start..]
            .find(|c: char| matches!(c, '{' | '}' | '\n'))
            .map(|i| body_start + i)
            .filter(|&i| source.as_bytes()[i] == b'}');
        let Some(close) = close else {
            self.push_text(start, body_start);
            return Ok(body_start);
        };
        let end = close + 1;
        let body = &source[body_start..close];

        if let Some(text) = body.strip_prefix('#') {
            self.emit(Instruction::Comment(CommentInst {
                text: text.to_string(),
                multi_line: false,
                pos,
            }));
            return Ok(end);
        }
        if body.is_empty() || body.starts_with(char::is_whitespace) {
            self.push_text(start, end);
            return Ok(end);
        }

        match self.parse_tag(body, pos) {
            Ok(Tag::Instruction(inst)) => self.emit(inst),
            Ok(Tag::Text) => self.push_text(start, end),
            Err(info) => self.fail(info.with_repr(format!("{{{body}}}")))?,
        }
        Ok(end)
    }

    fn parse_tag(&self, body: &str, pos: Position) -> Result<Tag, ErrorInfo> {
        match body.strip_prefix('.') {
            Some(keyword) => self.parse_instruction(keyword, pos).map(Tag::Instruction),
            None => self.parse_variable(body, pos),
        }
    }

    /// `{path|formatter args|...}`. A malformed path makes the whole tag
    /// literal text.
    fn parse_variable(&self, body: &str, pos: Position) -> Result<Tag, ErrorInfo> {
        let mut parts = body.split('|');
        let Some(variable) = parts.next().and_then(parse_name_path) else {
            return Ok(Tag::Text);
        };

        let mut formatters = Vec::new();
        for part in parts {
            let (identifier, args) = split_identifier(part, false);
            let Some(formatter) = self.formatters.get(identifier) else {
                return Err(ErrorInfo::new(ErrorKind::FormatterUnknown, pos).with_name(identifier));
            };
            formatters.push(FormatterCall::new(formatter, Arguments::parse(args)));
        }

        Ok(Tag::Instruction(Instruction::Variable(VariableInst {
            variable,
            formatters,
            pos,
        })))
    }

    fn parse_instruction(&self, keyword: &str, pos: Position) -> Result<Instruction, ErrorInfo> {
        let (identifier, rest) = split_identifier(keyword, true);
        let error = |kind| ErrorInfo::new(kind, pos);

        let inst = match identifier {
            "end" | "meta-left" | "meta-right" | "space" | "tab" | "newline"
                if !rest.is_empty() =>
            {
                return Err(error(ErrorKind::InvalidInstruction));
            }
            "end" => Instruction::End(EndInst { pos }),
            "meta-left" => Instruction::Meta(MetaInst {
                side: MetaSide::Left,
                pos,
            }),
            "meta-right" => Instruction::Meta(MetaInst {
                side: MetaSide::Right,
                pos,
            }),
            "space" | "tab" | "newline" => {
                let kind = LiteralKind::from_name(identifier)
                    .ok_or_else(|| error(ErrorKind::InvalidInstruction))?;
                Instruction::Literal(LiteralInst { kind, pos })
            }

            "alternates" if rest == " with" => Instruction::AlternatesWith(AlternatesWithInst {
                consequent: Block::default(),
                pos,
            }),

            "section" => Instruction::Section(SectionInst {
                variable: parse_path(rest).ok_or_else(|| error(ErrorKind::MissingVariableName))?,
                consequent: Block::default(),
                alternative: None,
                pos,
            }),

            "repeated" => {
                let rest = rest.trim_start();
                let Some(path) = rest.strip_prefix("section") else {
                    return Err(error(ErrorKind::MissingSectionKeyword));
                };
                if !path.is_empty() && !path.starts_with(char::is_whitespace) {
                    return Err(error(ErrorKind::MissingSectionKeyword));
                }
                Instruction::Repeated(RepeatedInst {
                    variable: parse_path(path)
                        .ok_or_else(|| error(ErrorKind::MissingVariableName))?,
                    consequent: Block::default(),
                    alternates_with: None,
                    alternative: None,
                    pos,
                })
            }

            "or" => {
                let rest = rest.trim_start();
                let call = if rest.is_empty() {
                    None
                } else {
                    Some(self.predicate_call(rest, pos)?)
                };
                Instruction::Predicate(PredicateInst {
                    kind: PredicateKind::Or,
                    call,
                    consequent: Block::default(),
                    alternative: None,
                    pos,
                })
            }

            "if" => self.parse_if(rest.trim_start(), pos)?,

            "var" => {
                let mut words = rest.split_whitespace();
                let name = words.next().unwrap_or_default();
                if name.len() < 2 || !name.starts_with('@') {
                    return Err(error(ErrorKind::BindvarExpectsName).with_name(name));
                }
                let variable = match (words.next().and_then(parse_name_path), words.next()) {
                    (Some(variable), None) => variable,
                    _ => return Err(error(ErrorKind::MissingVariableName)),
                };
                Instruction::BindVar(BindVarInst {
                    name: name.to_string(),
                    variable,
                    pos,
                })
            }

            _ if identifier.ends_with('?') => Instruction::Predicate(PredicateInst {
                kind: PredicateKind::Predicate,
                call: Some(self.predicate_call(keyword, pos)?),
                consequent: Block::default(),
                alternative: None,
                pos,
            }),

            _ => return Err(error(ErrorKind::InvalidInstruction).with_name(identifier)),
        };
        Ok(inst)
    }

    /// `{.if equal? a b}` or `{.if a && b || c}`.
    fn parse_if(&self, expr: &str, pos: Position) -> Result<Instruction, ErrorInfo> {
        let error = || ErrorInfo::new(ErrorKind::IfExpression, pos);
        if expr.is_empty() {
            return Err(error());
        }

        let (identifier, _) = split_identifier(expr, true);
        if identifier.ends_with('?') || self.predicates.contains(identifier) {
            return Ok(Instruction::IfPredicate(IfPredicateInst {
                call: self.predicate_call(expr, pos)?,
                consequent: Block::default(),
                alternative: None,
                pos,
            }));
        }

        let mut variables = Vec::new();
        let mut operators = Vec::new();
        for (i, word) in expr.split_whitespace().enumerate() {
            if i % 2 == 0 {
                variables.push(parse_name_path(word).ok_or_else(error)?);
            } else {
                operators.push(match word {
                    "&&" => Operator::And,
                    "||" => Operator::Or,
                    _ => return Err(error()),
                });
            }
        }
        if variables.len() != operators.len() + 1 {
            return Err(error());
        }

        Ok(Instruction::If(IfInst {
            variables,
            operators,
            consequent: Block::default(),
            alternative: None,
            pos,
        }))
    }

    /// Look up `name args` as a predicate call.
    fn predicate_call(&self, text: &str, pos: Position) -> Result<PredicateCall, ErrorInfo> {
        let (identifier, args) = split_identifier(text, true);
        match self.predicates.get(identifier) {
            Some(predicate) => Ok(PredicateCall::new(predicate, Arguments::parse(args))),
            None => Err(ErrorInfo::new(ErrorKind::PredicateUnknown, pos).with_name(identifier)),
        }
    }
}

/// Split a leading identifier from its raw argument text. Predicate
/// identifiers may end with `?`.
fn split_identifier(text: &str, predicate: bool) -> (&str, &str) {
    let mut end = 0;
    for (i, c) in text.char_indices() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            end = i + c.len_utf8();
        } else {
            if predicate && c == '?' {
                end = i + 1;
            }
            break;
        }
    }
    text.split_at(end)
}

fn parse_path(text: &str) -> Option<crate::ast::NamePath> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    parse_name_path(text)
}
