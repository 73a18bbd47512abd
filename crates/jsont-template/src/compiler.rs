/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template compilation.
//!
//! The tokenizer produces a flat instruction stream; the builder here
//! folds it into a tree by recursive descent. Each block opener (section,
//! repeated section, if, predicate) owns the instructions up to its
//! terminator. `{.or}` terminators chain into the opener's alternative,
//! and `{.end}` closes the chain.
//!
//! Two modes:
//!
//! - **strict** ([`Compiler::compile`]): the first syntax error fails the
//!   compile.
//! - **safe** ([`Compiler::compile_safe`]): errors are collected, offending
//!   tags are dropped and unterminated blocks are closed at end of input,
//!   yielding a partially valid tree.

use crate::ast::{
    AlternatesWithInst, Block, EndInst, Instruction, Position, PredicateInst, PredicateKind,
    RootInst,
};
use crate::error::{ErrorInfo, ErrorKind, TemplateError, TemplateResult};
use crate::plugins::{FormatterTable, PredicateTable};
use crate::repr;
use crate::tokenizer::Tokenizer;
use std::sync::Arc;

/// Turns template text into an instruction tree.
///
/// [`crate::Context`] holds one of these to compile partials on first use.
pub trait Compiler: Send + Sync {
    /// Compile `source`, failing on the first syntax error.
    fn compile(&self, source: &str) -> TemplateResult<CompiledTemplate>;

    /// Compile `source`, recording syntax errors instead of failing.
    fn compile_safe(&self, source: &str) -> CompiledTemplate;
}

/// A compiled instruction tree plus the syntax errors found while building
/// it (always empty for a strict compile).
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    code: Arc<Instruction>,
    errors: Vec<ErrorInfo>,
}

impl CompiledTemplate {
    pub fn new(code: Instruction, errors: Vec<ErrorInfo>) -> Self {
        Self {
            code: Arc::new(code),
            errors,
        }
    }

    /// The root instruction.
    pub fn code(&self) -> &Arc<Instruction> {
        &self.code
    }

    pub fn errors(&self) -> &[ErrorInfo] {
        &self.errors
    }

    /// Canonical form of the whole tree.
    pub fn repr(&self) -> String {
        self.code.repr(true)
    }
}

/// Compile `source` against the given formatter and predicate tables.
pub fn compile_source(
    source: &str,
    formatters: &FormatterTable,
    predicates: &PredicateTable,
    safe: bool,
) -> TemplateResult<CompiledTemplate> {
    let tokens = Tokenizer::new(source, formatters, predicates, safe).run()?;
    let mut builder = Builder {
        tokens: tokens.instructions.into_iter(),
        safe,
        errors: tokens.errors,
    };
    let root = builder.build_root()?;

    let mut errors = builder.errors;
    errors.sort_by_key(|e| (e.line(), e.offset()));
    tracing::debug!(safe, errors = errors.len(), "Compiled template");
    Ok(CompiledTemplate::new(root, errors))
}

/// Where a body is being parsed; decides which terminators are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Root,
    Block,
    Repeated,
}

/// The instruction that ended a block body.
enum Terminator {
    End(EndInst),
    Or(PredicateInst),
    AlternatesWith(AlternatesWithInst),
    Eof,
}

impl Terminator {
    /// Split terminators from ordinary instructions.
    fn classify(inst: Instruction) -> Result<Self, Instruction> {
        match inst {
            Instruction::End(end) => Ok(Terminator::End(end)),
            Instruction::AlternatesWith(alternates) => Ok(Terminator::AlternatesWith(alternates)),
            Instruction::Predicate(pred) if pred.kind == PredicateKind::Or => {
                Ok(Terminator::Or(pred))
            }
            other => Err(other),
        }
    }

    fn into_instruction(self) -> Option<Instruction> {
        match self {
            Terminator::End(end) => Some(Instruction::End(end)),
            Terminator::Or(pred) => Some(Instruction::Predicate(pred)),
            Terminator::AlternatesWith(alternates) => Some(Instruction::AlternatesWith(alternates)),
            Terminator::Eof => None,
        }
    }
}

struct Builder {
    tokens: std::vec::IntoIter<Instruction>,
    safe: bool,
    errors: Vec<ErrorInfo>,
}

impl Builder {
    fn fail(&mut self, info: ErrorInfo) -> TemplateResult<()> {
        if self.safe {
            self.errors.push(info);
            Ok(())
        } else {
            Err(TemplateError::Syntax(Box::new(info)))
        }
    }

    /// Report a terminator that is not allowed where it appeared.
    fn misplaced(&mut self, kind: ErrorKind, terminator: Terminator) -> TemplateResult<()> {
        let Some(inst) = terminator.into_instruction() else {
            return Ok(());
        };
        let info = ErrorInfo::new(kind, inst.position()).with_repr(repr::emit(&inst, false));
        self.fail(info)
    }

    fn build_root(&mut self) -> TemplateResult<Instruction> {
        let (consequent, _) = self.parse_body(Scope::Root)?;
        Ok(Instruction::Root(RootInst {
            consequent,
            alternative: None,
        }))
    }

    /// Collect instructions until a terminator legal in `scope`, building
    /// nested blocks along the way.
    fn parse_body(&mut self, scope: Scope) -> TemplateResult<(Block, Terminator)> {
        let mut block = Block::default();
        while let Some(inst) = self.tokens.next() {
            let terminator = match Terminator::classify(inst) {
                Ok(terminator) => terminator,
                Err(inst) => {
                    let inst = self.parse_nested(inst)?;
                    block.push(inst);
                    continue;
                }
            };

            let misplaced = match (scope, &terminator) {
                (Scope::Root, _) => Some(ErrorKind::NotAllowedAtRootBlock),
                (Scope::Block, Terminator::AlternatesWith(_)) => Some(ErrorKind::NotAllowedInBlock),
                _ => None,
            };
            match misplaced {
                Some(kind) => self.misplaced(kind, terminator)?,
                None => return Ok((block, terminator)),
            }
        }
        Ok((block, Terminator::Eof))
    }

    /// Fill in the blocks of an opener; other instructions pass through.
    fn parse_nested(&mut self, inst: Instruction) -> TemplateResult<Instruction> {
        let inst = match inst {
            Instruction::Section(mut section) => {
                let (consequent, terminator) = self.parse_body(Scope::Block)?;
                section.consequent = consequent;
                section.alternative = self.parse_tail(terminator, section.pos)?;
                Instruction::Section(section)
            }

            Instruction::Repeated(mut repeated) => {
                let (consequent, terminator) = self.parse_body(Scope::Repeated)?;
                repeated.consequent = consequent;
                let terminator = match terminator {
                    Terminator::AlternatesWith(mut alternates) => {
                        let (consequent, next) = self.parse_body(Scope::Block)?;
                        alternates.consequent = consequent;
                        repeated.alternates_with = Some(alternates);
                        next
                    }
                    other => other,
                };
                repeated.alternative = self.parse_tail(terminator, repeated.pos)?;
                Instruction::Repeated(repeated)
            }

            Instruction::If(mut inst) => {
                let (consequent, terminator) = self.parse_body(Scope::Block)?;
                inst.consequent = consequent;
                inst.alternative = self.parse_tail(terminator, inst.pos)?;
                Instruction::If(inst)
            }

            Instruction::IfPredicate(mut inst) => {
                let (consequent, terminator) = self.parse_body(Scope::Block)?;
                inst.consequent = consequent;
                inst.alternative = self.parse_tail(terminator, inst.pos)?;
                Instruction::IfPredicate(inst)
            }

            Instruction::Predicate(mut inst) => {
                let (consequent, terminator) = self.parse_body(Scope::Block)?;
                inst.consequent = consequent;
                inst.alternative = self.parse_tail(terminator, inst.pos)?;
                Instruction::Predicate(inst)
            }

            other => other,
        };
        Ok(inst)
    }

    /// Build an opener's alternative from the terminator of its consequent.
    fn parse_tail(
        &mut self,
        terminator: Terminator,
        opener: Position,
    ) -> TemplateResult<Option<Box<Instruction>>> {
        match terminator {
            Terminator::End(end) => Ok(Some(Box::new(Instruction::End(end)))),

            Terminator::Or(mut or) => {
                let (consequent, next) = self.parse_body(Scope::Block)?;
                or.consequent = consequent;
                or.alternative = self.parse_tail(next, opener)?;
                Ok(Some(Box::new(Instruction::Predicate(or))))
            }

            Terminator::AlternatesWith(alternates) => {
                let terminator = Terminator::AlternatesWith(alternates);
                self.misplaced(ErrorKind::NotAllowedInBlock, terminator)?;
                Ok(None)
            }

            Terminator::Eof => {
                self.fail(ErrorInfo::new(ErrorKind::EofInBlock, opener))?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> TemplateResult<CompiledTemplate> {
        compile_source(
            source,
            &FormatterTable::standard(),
            &PredicateTable::standard(),
            false,
        )
    }

    fn compile_safe(source: &str) -> CompiledTemplate {
        compile_source(
            source,
            &FormatterTable::standard(),
            &PredicateTable::standard(),
            true,
        )
        .expect("safe compile does not fail")
    }

    fn root_block(template: &CompiledTemplate) -> &Block {
        match template.code().as_ref() {
            Instruction::Root(root) => &root.consequent,
            other => panic!("expected root, got {other:?}"),
        }
    }

    #[test]
    fn test_section_with_or_chain() {
        let err = compile("{.section a}A{.or b?}B{.or}C{.end}").unwrap_err();
        // b? is not a registered predicate.
        assert_eq!(
            err.info().map(ErrorInfo::kind),
            Some(ErrorKind::PredicateUnknown)
        );

        let template = compile("{.section a}A{.or plural?}B{.or}C{.end}").unwrap();
        let block = root_block(&template);
        assert_eq!(block.instructions.len(), 1);

        let Instruction::Section(section) = &block.instructions[0] else {
            panic!("expected section");
        };
        let Some(Instruction::Predicate(first)) = section.alternative.as_deref() else {
            panic!("expected or chain");
        };
        assert!(first.call.is_some());
        let Some(Instruction::Predicate(second)) = first.alternative.as_deref() else {
            panic!("expected bare or");
        };
        assert!(second.call.is_none());
        assert!(matches!(
            second.alternative.as_deref(),
            Some(Instruction::End(_))
        ));
    }

    #[test]
    fn test_repeated_with_alternates() {
        let template = compile("{.repeated section items}{@}{.alternates with}, {.or}none{.end}")
            .unwrap();
        let Instruction::Repeated(repeated) = &root_block(&template).instructions[0] else {
            panic!("expected repeated");
        };
        assert_eq!(repeated.consequent.instructions.len(), 1);
        let alternates = repeated.alternates_with.as_ref().expect("alternates block");
        assert_eq!(alternates.consequent.instructions.len(), 1);
        assert!(matches!(
            repeated.alternative.as_deref(),
            Some(Instruction::Predicate(_))
        ));
    }

    #[test]
    fn test_canonical_form() {
        let template = compile(
            "{.section a}{b|html}{.or}x{.end}{.repeated section c}{@}{.alternates with},{.end}\
             {.if a  &&  b}y{.end}{.equal? a 1}z{.end}",
        )
        .unwrap();
        assert_eq!(
            template.repr(),
            "{.section a}{b|html}{.or}x{.end}{.repeated section c}{@}{.alternates with},{.end}\
             {.if a && b}y{.end}{.equal? a 1}z{.end}"
        );
    }

    #[test]
    fn test_strict_errors() {
        let err = compile("a{.end}").unwrap_err();
        assert_eq!(
            err.info().map(ErrorInfo::kind),
            Some(ErrorKind::NotAllowedAtRootBlock)
        );

        let err = compile("{.section a}{.alternates with}{.end}").unwrap_err();
        assert_eq!(
            err.info().map(ErrorInfo::kind),
            Some(ErrorKind::NotAllowedInBlock)
        );

        let err = compile("\n{.section a}open").unwrap_err();
        let info = err.info().expect("syntax error");
        assert_eq!(info.kind(), ErrorKind::EofInBlock);
        assert_eq!((info.line(), info.offset()), (2, 1));
    }

    #[test]
    fn test_safe_mode_recovers() {
        let template = compile_safe("x{.end}{.bogus}{.section a}{b}{.or}{.alternates with}");
        let kinds: Vec<_> = template.errors().iter().map(ErrorInfo::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::NotAllowedAtRootBlock,
                ErrorKind::InvalidInstruction,
                ErrorKind::EofInBlock,
                ErrorKind::NotAllowedInBlock,
            ]
        );
        // Unterminated blocks are closed without an {.end}.
        assert_eq!(template.repr(), "x{.section a}{b}{.or}");
    }

    #[test]
    fn test_empty_template() {
        let template = compile("").unwrap();
        assert!(root_block(&template).is_empty());
        assert_eq!(template.repr(), "");
    }
}
