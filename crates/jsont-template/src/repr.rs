/*
 * repr.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Canonical textual form of compiled instructions.
//!
//! Every instruction serializes back to the tag syntax it was compiled
//! from, normalized (e.g. `{.if a  &&  b}` becomes `{.if a && b}`). The
//! non-recursive form of a single instruction is what error records carry
//! in their `repr` field; the recursive form of a whole tree is a fixed
//! point under recompilation.

use crate::ast::{Arguments, Block, Instruction, MetaSide, NamePath, PredicateKind, Segment};

/// Canonical form of `inst`, optionally including its children.
pub fn emit(inst: &Instruction, recurse: bool) -> String {
    let mut buf = String::new();
    emit_into(inst, &mut buf, recurse);
    buf
}

/// Canonical form of an argument list. When `include_delimiter` is false
/// the leading delimiter is dropped.
pub fn arguments(args: &Arguments, include_delimiter: bool) -> String {
    let mut buf = String::new();
    emit_arguments(args, include_delimiter, &mut buf);
    buf
}

/// Canonical form of a name path: `@` for the whole scope, otherwise
/// segments joined with `.`.
pub fn names(path: &NamePath) -> String {
    let mut buf = String::new();
    emit_names(path, &mut buf);
    buf
}

pub fn emit_into(inst: &Instruction, buf: &mut String, recurse: bool) {
    match inst {
        Instruction::Root(root) => {
            if recurse {
                emit_block(&root.consequent, buf);
                emit_alternative(root.alternative.as_deref(), buf);
            }
        }

        Instruction::Text(text) => buf.push_str(&text.text),

        Instruction::Variable(var) => {
            buf.push('{');
            emit_names(&var.variable, buf);
            for call in &var.formatters {
                buf.push('|');
                buf.push_str(call.formatter.identifier());
                emit_arguments(&call.args, true, buf);
            }
            buf.push('}');
        }

        Instruction::Section(section) => {
            buf.push_str("{.section ");
            emit_names(&section.variable, buf);
            buf.push('}');
            if recurse {
                emit_block(&section.consequent, buf);
                emit_alternative(section.alternative.as_deref(), buf);
            }
        }

        Instruction::Repeated(repeated) => {
            buf.push_str("{.repeated section ");
            emit_names(&repeated.variable, buf);
            buf.push('}');
            if recurse {
                // The alternates-with block sits between the consequent and
                // the alternative.
                emit_block(&repeated.consequent, buf);
                if let Some(alternates) = &repeated.alternates_with {
                    buf.push_str("{.alternates with}");
                    emit_block(&alternates.consequent, buf);
                }
                emit_alternative(repeated.alternative.as_deref(), buf);
            }
        }

        Instruction::AlternatesWith(alternates) => {
            buf.push_str("{.alternates with}");
            if recurse {
                emit_block(&alternates.consequent, buf);
            }
        }

        Instruction::If(inst) => {
            buf.push_str("{.if ");
            let mut variables = inst.variables.iter();
            if let Some(first) = variables.next() {
                emit_names(first, buf);
            }
            for (op, variable) in inst.operators.iter().zip(variables) {
                buf.push(' ');
                buf.push_str(op.as_str());
                buf.push(' ');
                emit_names(variable, buf);
            }
            buf.push('}');
            if recurse {
                emit_block(&inst.consequent, buf);
                emit_alternative(inst.alternative.as_deref(), buf);
            }
        }

        Instruction::IfPredicate(inst) => {
            buf.push_str("{.if ");
            buf.push_str(inst.call.predicate.identifier());
            emit_arguments(&inst.call.args, true, buf);
            buf.push('}');
            if recurse {
                emit_block(&inst.consequent, buf);
                emit_alternative(inst.alternative.as_deref(), buf);
            }
        }

        Instruction::Predicate(inst) => {
            buf.push_str("{.");
            match inst.kind {
                PredicateKind::Predicate => {
                    if let Some(call) = &inst.call {
                        buf.push_str(call.predicate.identifier());
                    }
                }
                PredicateKind::Or => {
                    buf.push_str("or");
                    if let Some(call) = &inst.call {
                        buf.push(' ');
                        buf.push_str(call.predicate.identifier());
                    }
                }
            }
            if let Some(call) = &inst.call {
                emit_arguments(&call.args, true, buf);
            }
            buf.push('}');
            if recurse {
                emit_block(&inst.consequent, buf);
                emit_alternative(inst.alternative.as_deref(), buf);
            }
        }

        Instruction::End(_) => buf.push_str("{.end}"),

        Instruction::Meta(meta) => buf.push_str(match meta.side {
            MetaSide::Left => "{.meta-left}",
            MetaSide::Right => "{.meta-right}",
        }),

        Instruction::Comment(comment) => {
            buf.push_str("{#");
            if comment.multi_line {
                buf.push('#');
            }
            buf.push_str(&comment.text);
            if comment.multi_line {
                buf.push_str("##");
            }
            buf.push('}');
        }

        Instruction::BindVar(bind) => {
            buf.push_str("{.var ");
            buf.push_str(&bind.name);
            buf.push(' ');
            emit_names(&bind.variable, buf);
            buf.push('}');
        }

        Instruction::Literal(literal) => {
            buf.push_str("{.");
            buf.push_str(literal.kind.name());
            buf.push('}');
        }
    }
}

pub fn emit_arguments(args: &Arguments, include_delimiter: bool, buf: &mut String) {
    for (i, arg) in args.args().iter().enumerate() {
        if include_delimiter || i > 0 {
            buf.push(args.delimiter());
        }
        buf.push_str(arg);
    }
}

pub fn emit_names(path: &NamePath, buf: &mut String) {
    let Some(segments) = path else {
        buf.push('@');
        return;
    };
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            buf.push('.');
        }
        match segment {
            Segment::Key(key) => buf.push_str(key),
            Segment::Index(index) => buf.push_str(&index.to_string()),
        }
    }
}

fn emit_block(block: &Block, buf: &mut String) {
    for inst in &block.instructions {
        emit_into(inst, buf, true);
    }
}

fn emit_alternative(alternative: Option<&Instruction>, buf: &mut String) {
    if let Some(alt) = alternative {
        emit_into(alt, buf, true);
    }
}
