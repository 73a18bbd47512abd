/*
 * executor.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Instruction execution.
//!
//! Each instruction variant reads and updates the [`Context`] and appends
//! to its output buffer. This module holds the per-variant behavior; error
//! tagging and safe-mode handling live in [`Context::execute`], which is
//! the only caller of [`Instruction::invoke`].

use crate::ast::{
    IfInst, Instruction, MetaSide, Operator, PredicateCall, RepeatedInst, SectionInst,
    VariableInst,
};
use crate::context::Context;
use crate::error::TemplateResult;

impl Instruction {
    /// Run this instruction's own behavior against `ctx`.
    pub(crate) fn invoke(&self, ctx: &mut Context) -> TemplateResult<()> {
        match self {
            Instruction::Root(root) => {
                ctx.execute_block(&root.consequent)?;
                ctx.execute(root.alternative.as_deref())
            }

            Instruction::Text(text) => {
                ctx.append(&text.text);
                Ok(())
            }

            Instruction::Variable(var) => execute_variable(var, ctx),

            Instruction::Section(section) => execute_section(section, ctx),

            Instruction::Repeated(repeated) => execute_repeated(repeated, ctx),

            Instruction::AlternatesWith(alternates) => ctx.execute_block(&alternates.consequent),

            Instruction::If(inst) => {
                if evaluate_if(inst, ctx) {
                    ctx.execute_block(&inst.consequent)
                } else {
                    ctx.execute(inst.alternative.as_deref())
                }
            }

            Instruction::IfPredicate(inst) => {
                if apply_predicate(&inst.call, ctx)? {
                    ctx.execute_block(&inst.consequent)
                } else {
                    ctx.execute(inst.alternative.as_deref())
                }
            }

            Instruction::Predicate(inst) => {
                // A bare {.or} always matches.
                let matched = match &inst.call {
                    Some(call) => apply_predicate(call, ctx)?,
                    None => true,
                };
                if matched {
                    ctx.execute_block(&inst.consequent)
                } else {
                    ctx.execute(inst.alternative.as_deref())
                }
            }

            Instruction::BindVar(bind) => {
                let value = ctx.resolve(&bind.variable);
                ctx.bind_variable(&bind.name, value);
                Ok(())
            }

            Instruction::Literal(literal) => {
                ctx.append(literal.kind.text());
                Ok(())
            }

            Instruction::Meta(meta) => {
                let text = match meta.side {
                    MetaSide::Left => ctx.meta_left(),
                    MetaSide::Right => ctx.meta_right(),
                };
                ctx.append(text);
                Ok(())
            }

            // Structural or documentation only.
            Instruction::End(_) | Instruction::Comment(_) => Ok(()),
        }
    }
}

/// Resolve the variable and pipe it through its formatters.
///
/// Formatters run with the resolved value pushed as the current node, each
/// one replacing it via [`Context::set_node`].
fn execute_variable(var: &VariableInst, ctx: &mut Context) -> TemplateResult<()> {
    let value = ctx.resolve(&var.variable);
    if var.formatters.is_empty() {
        ctx.append(&value.to_text());
        return Ok(());
    }

    ctx.with_scope(value, |ctx| {
        for call in &var.formatters {
            call.formatter.apply(ctx, &call.args)?;
        }
        let text = ctx.node().to_text();
        ctx.append(&text);
        Ok(())
    })
}

fn execute_section(section: &SectionInst, ctx: &mut Context) -> TemplateResult<()> {
    let node = ctx.resolve_section(&section.variable);
    ctx.with_scope(node, |ctx| {
        if ctx.node().is_truthy() {
            ctx.execute_block(&section.consequent)
        } else {
            ctx.execute(section.alternative.as_deref())
        }
    })
}

fn execute_repeated(repeated: &RepeatedInst, ctx: &mut Context) -> TemplateResult<()> {
    let node = ctx.resolve_section(&repeated.variable);
    ctx.with_scope(node, |ctx| {
        if ctx.node().size() == 0 || !ctx.init_iteration() {
            return ctx.execute(repeated.alternative.as_deref());
        }

        while ctx.has_next() {
            if ctx.current_index() != Some(0) {
                if let Some(alternates) = &repeated.alternates_with {
                    ctx.execute_block(&alternates.consequent)?;
                }
            }

            ctx.push_next();
            let result = ctx.execute_block(&repeated.consequent);
            ctx.pop();
            result?;

            ctx.increment();
        }
        Ok(())
    })
}

/// Evaluate `a && b || c` strictly left to right.
fn evaluate_if(inst: &IfInst, ctx: &Context) -> bool {
    let mut terms = inst.variables.iter().map(|var| ctx.resolve(var).is_truthy());
    let Some(mut result) = terms.next() else {
        return false;
    };
    for (op, term) in inst.operators.iter().zip(terms) {
        result = match op {
            Operator::And => result && term,
            Operator::Or => result || term,
        };
    }
    result
}

fn apply_predicate(call: &PredicateCall, ctx: &mut Context) -> TemplateResult<bool> {
    call.predicate.apply(ctx, &call.args)
}
