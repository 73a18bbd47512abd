/*
 * plugins/formatters.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in formatters.

use super::{Formatter, FormatterTable};
use crate::ast::Arguments;
use crate::context::Context;
use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

pub(crate) fn register_all(table: &mut FormatterTable) {
    table
        .register(HtmlFormatter)
        .register(HtmlAttrFormatter)
        .register(JsonFormatter)
        .register(JsonPrettyFormatter)
        .register(PluralizeFormatter)
        .register(CountFormatter)
        .register(ApplyFormatter);
}

fn escape_html(text: &str, escape_quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if escape_quotes => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `{x|html}`: escape `&`, `<` and `>`.
#[derive(Debug, Clone, Copy)]
pub struct HtmlFormatter;

impl Formatter for HtmlFormatter {
    fn identifier(&self) -> &str {
        "html"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<()> {
        let escaped = escape_html(&ctx.node().to_text(), false);
        ctx.set_node(escaped);
        Ok(())
    }
}

/// `{x|htmlattr}`: like `html`, also escaping double quotes.
#[derive(Debug, Clone, Copy)]
pub struct HtmlAttrFormatter;

impl Formatter for HtmlAttrFormatter {
    fn identifier(&self) -> &str {
        "htmlattr"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<()> {
        let escaped = escape_html(&ctx.node().to_text(), true);
        ctx.set_node(escaped);
        Ok(())
    }
}

/// `{x|json}`: compact JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn identifier(&self) -> &str {
        "json"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<()> {
        let json = serde_json::to_string(ctx.node())?;
        ctx.set_node(json);
        Ok(())
    }
}

/// `{x|json-pretty}`: indented JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonPrettyFormatter;

impl Formatter for JsonPrettyFormatter {
    fn identifier(&self) -> &str {
        "json-pretty"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<()> {
        let json = serde_json::to_string_pretty(ctx.node())?;
        ctx.set_node(json);
        Ok(())
    }
}

/// `{n|pluralize}`, `{n|pluralize/es}`, `{n|pluralize/y/ies}`.
///
/// Emits the singular suffix when the number is exactly 1 and the plural
/// suffix otherwise. Defaults are `""` and `"s"`.
#[derive(Debug, Clone, Copy)]
pub struct PluralizeFormatter;

impl Formatter for PluralizeFormatter {
    fn identifier(&self) -> &str {
        "pluralize"
    }

    fn apply(&self, ctx: &mut Context, args: &Arguments) -> TemplateResult<()> {
        let (singular, plural) = match args.args() {
            [] => ("", "s"),
            [plural] => ("", plural.as_str()),
            [singular, plural] => (singular.as_str(), plural.as_str()),
            _ => {
                return Err(TemplateError::formatter(
                    self.identifier(),
                    format!("expected at most 2 arguments, got {}", args.len()),
                ));
            }
        };
        let Some(n) = ctx.node().as_f64() else {
            return Err(TemplateError::formatter(
                self.identifier(),
                format!("expected a number, got '{}'", ctx.node()),
            ));
        };
        let suffix = if n == 1.0 { singular } else { plural };
        ctx.set_node(suffix.to_string());
        Ok(())
    }
}

/// `{items|count}`: number of children of an array or object.
#[derive(Debug, Clone, Copy)]
pub struct CountFormatter;

impl Formatter for CountFormatter {
    fn identifier(&self) -> &str {
        "count"
    }

    fn apply(&self, ctx: &mut Context, _args: &Arguments) -> TemplateResult<()> {
        let count = ctx.node().size() as i64;
        ctx.set_node(Value::Int(count));
        Ok(())
    }
}

/// `{@|apply name}`: render partial `name` against the current node.
///
/// A partial that cannot be found renders as nothing.
#[derive(Debug, Clone, Copy)]
pub struct ApplyFormatter;

impl Formatter for ApplyFormatter {
    fn identifier(&self) -> &str {
        "apply"
    }

    fn apply(&self, ctx: &mut Context, args: &Arguments) -> TemplateResult<()> {
        let Some(name) = args.get(0) else {
            return Err(TemplateError::formatter(
                self.identifier(),
                "expected a partial name",
            ));
        };
        let output = ctx.apply_partial(name)?.unwrap_or_default();
        ctx.set_node(output);
        Ok(())
    }
}
