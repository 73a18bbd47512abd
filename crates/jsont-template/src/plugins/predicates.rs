/*
 * plugins/predicates.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in predicates.

use super::{Predicate, PredicateTable};
use crate::ast::{Arguments, parse_name_path};
use crate::context::Context;
use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

pub(crate) fn register_all(table: &mut PredicateTable) {
    table
        .register(EqualPredicate)
        .register(PluralPredicate)
        .register(SingularPredicate)
        .register(EvenPredicate)
        .register(OddPredicate);
}

/// Interpret a predicate argument: a JSON literal if it parses as one,
/// otherwise a variable path resolved against the context.
fn resolve_arg(ctx: &Context, arg: &str) -> Value {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(arg) {
        return Value::from(json);
    }
    match parse_name_path(arg) {
        Some(path) => ctx.resolve(&path),
        None => Value::Missing,
    }
}

/// Numeric equality across int and float, structural equality otherwise.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// `{.equal? a b}` compares two arguments; `{.equal? a}` compares the
/// current node with one argument.
#[derive(Debug, Clone, Copy)]
pub struct EqualPredicate;

impl Predicate for EqualPredicate {
    fn identifier(&self) -> &str {
        "equal?"
    }

    fn apply(&self, ctx: &mut Context, args: &Arguments) -> TemplateResult<bool> {
        let (left, right) = match args.args() {
            [arg] => (ctx.node().clone(), resolve_arg(ctx, arg)),
            [a, b] => (resolve_arg(ctx, a), resolve_arg(ctx, b)),
            _ => {
                return Err(TemplateError::predicate(
                    self.identifier(),
                    format!("expected 1 or 2 arguments, got {}", args.len()),
                ));
            }
        };
        Ok(values_equal(&left, &right))
    }
}

/// `{.plural?}`: the current node is a number greater than 1.
#[derive(Debug, Clone, Copy)]
pub struct PluralPredicate;

impl Predicate for PluralPredicate {
    fn identifier(&self) -> &str {
        "plural?"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<bool> {
        Ok(ctx.node().as_f64().is_some_and(|n| n > 1.0))
    }
}

/// `{.singular?}`: the current node is the number 1.
#[derive(Debug, Clone, Copy)]
pub struct SingularPredicate;

impl Predicate for SingularPredicate {
    fn identifier(&self) -> &str {
        "singular?"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<bool> {
        Ok(ctx.node().as_f64().is_some_and(|n| n == 1.0))
    }
}

/// `{.even?}`: the current node is an even integer.
#[derive(Debug, Clone, Copy)]
pub struct EvenPredicate;

impl Predicate for EvenPredicate {
    fn identifier(&self) -> &str {
        "even?"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<bool> {
        Ok(ctx.node().as_i64().is_some_and(|n| n % 2 == 0))
    }
}

/// `{.odd?}`: the current node is an odd integer.
#[derive(Debug, Clone, Copy)]
pub struct OddPredicate;

impl Predicate for OddPredicate {
    fn identifier(&self) -> &str {
        "odd?"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<bool> {
        Ok(ctx.node().as_i64().is_some_and(|n| n % 2 != 0))
    }
}
