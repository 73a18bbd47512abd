/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for jsont-template: compile, render, partials.
 */

use jsont_template::{
    Compiler, Context, ErrorKind, JsonTemplateEngine, LoggingHook, TemplateError, Value,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", name))
}

fn json(text: &str) -> Value {
    Value::from_json_str(text).expect("valid JSON")
}

fn engine() -> Arc<JsonTemplateEngine> {
    Arc::new(JsonTemplateEngine::new())
}

fn render(template: &str, data: &str) -> String {
    render_with_partials(template, data, None)
}

fn render_with_partials(template: &str, data: &str, partials: Option<&str>) -> String {
    let engine = engine();
    let compiled = engine.compile(template).expect("template compiles");
    engine
        .render(&compiled, json(data), partials.map(json))
        .expect("render succeeds")
}

#[derive(Debug, Default)]
struct CountingHook(AtomicUsize);

impl LoggingHook for CountingHook {
    fn log(&self, _error: &TemplateError) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ----------------------------------------------------------------------
// Variables and resolution
// ----------------------------------------------------------------------

#[test]
fn test_dotted_variable() {
    assert_eq!(render("{a.b}", r#"{"a": {"b": 5}}"#), "5");
}

#[test]
fn test_missing_variable_renders_nothing() {
    assert_eq!(render("[{nope}][{a.nope.deeper}]", r#"{"a": {}}"#), "[][]");
}

#[test]
fn test_null_mid_path() {
    assert_eq!(
        render("{a.b}", r#"{"a": null}"#),
        "[JSONT: Can't resolve 'a.b'.]"
    );
}

#[test]
fn test_scalars_and_containers() {
    assert_eq!(
        render(
            "{s}|{i}|{f}|{t}|{n}|{arr}|{obj}",
            r#"{"s": "x", "i": 3, "f": 1.5, "t": true, "n": null, "arr": [1, "a"], "obj": {"k": 1}}"#
        ),
        r#"x|3|1.5|true||[1,"a"]|{"k":1}"#
    );
}

#[test]
fn test_data_keys_starting_with_at() {
    let data = r#"{"@type": "Person", "@context": {"a": 1}, "x": {"@id": 7}}"#;
    assert_eq!(
        render("[{@type}][{.section @context}in{.or}out{.end}][{x.@id}]", data),
        "[Person][in][7]"
    );
    // Found by walking out of the section's scope.
    assert_eq!(render("{.section x}{@id}:{@type}{.end}", data), "7:Person");
}

#[test]
fn test_variable_sees_enclosing_scopes() {
    let template = "{.section inner}{title}/{x}{.end}";
    assert_eq!(
        render(template, r#"{"title": "T", "inner": {"x": 1}}"#),
        "T/1"
    );
}

#[test]
fn test_section_does_not_match_ancestor_field() {
    let template = "{.section inner}{.section title}yes{.or}no{.end}{.end}";
    assert_eq!(render(template, r#"{"title": "T", "inner": {"x": 1}}"#), "no");
}

// ----------------------------------------------------------------------
// Blocks
// ----------------------------------------------------------------------

#[test]
fn test_repeated_with_alternates() {
    assert_eq!(
        render(
            "{.repeated section items}{@}{.alternates with},{.end}",
            r#"{"items": [1, 2, 3]}"#
        ),
        "1,2,3"
    );
}

#[test]
fn test_repeated_index_is_one_based() {
    assert_eq!(
        render(
            "{.repeated section items}{@index}:{@}{.alternates with} {.end}",
            r#"{"items": ["a", "b", "c"]}"#
        ),
        "1:a 2:b 3:c"
    );
}

#[test]
fn test_repeated_empty_or_non_array_takes_alternative() {
    let template = "{.repeated section items}{@}{.or}none{.end}";
    assert_eq!(render(template, r#"{"items": []}"#), "none");
    assert_eq!(render(template, r#"{"items": {"a": 1}}"#), "none");
    assert_eq!(render(template, "{}"), "none");
}

#[test]
fn test_repeated_null_element() {
    assert_eq!(
        render(
            "{.repeated section items}<{@}>{.end}",
            r#"{"items": ["a", null, "c"]}"#
        ),
        "<a><><c>"
    );
}

#[test]
fn test_section_falsy_values() {
    let template = "{.section v}yes{.or}no{.end}";
    for data in [
        r#"{"v": 0}"#,
        r#"{"v": ""}"#,
        r#"{"v": []}"#,
        r#"{"v": {}}"#,
        r#"{"v": false}"#,
        r#"{"v": null}"#,
        "{}",
    ] {
        assert_eq!(render(template, data), "no", "data: {data}");
    }
    assert_eq!(render(template, r#"{"v": 1}"#), "yes");
}

#[test]
fn test_if_expressions() {
    let template = "{.if a && b}both{.or}not both{.end}";
    assert_eq!(render(template, r#"{"a": 1}"#), "not both");
    assert_eq!(render(template, r#"{"a": 1, "b": 2}"#), "both");

    // Strict left to right: (a || b) && c
    let template = "{.if a || b && c}yes{.or}no{.end}";
    assert_eq!(render(template, r#"{"a": 1}"#), "no");
    assert_eq!(render(template, r#"{"b": 1, "c": 1}"#), "yes");
}

#[test]
fn test_if_does_not_push_scope() {
    assert_eq!(
        render("{.if person}{person.name}{.end}", r#"{"person": {"name": "P"}}"#),
        "P"
    );
}

#[test]
fn test_predicate_chain() {
    assert_eq!(
        render(
            "{.repeated section n}{.plural?}many{.or singular?}one{.or}none{.end}{.alternates with},{.end}",
            r#"{"n": [0, 1, 2]}"#
        ),
        "none,one,many"
    );
}

#[test]
fn test_if_predicate() {
    let template = "{.if equal? a 1}one{.or}other{.end}";
    assert_eq!(render(template, r#"{"a": 1}"#), "one");
    assert_eq!(render(template, r#"{"a": 2}"#), "other");
}

#[test]
fn test_formatters_in_templates() {
    assert_eq!(
        render(
            "{.repeated section counts}{@} item{@|pluralize}{.alternates with}, {.end}",
            r#"{"counts": [1, 2]}"#
        ),
        "1 item, 2 items"
    );
    assert_eq!(
        render("<a title=\"{t|htmlattr}\">{t|html}</a>", r#"{"t": "<\"x\">"}"#),
        "<a title=\"&lt;&quot;x&quot;&gt;\">&lt;\"x\"&gt;</a>"
    );
}

#[test]
fn test_literals_meta_and_comments() {
    assert_eq!(
        render(
            "{.meta-left}x{.meta-right}{.space}{.tab}{.newline}{# hidden }{## also\nhidden ##}end",
            "{}"
        ),
        "{x} \t\nend"
    );
}

#[test]
fn test_bound_variable_visible_in_nested_scopes() {
    assert_eq!(
        render(
            "{.var @city person.city}{.repeated section items}{@}@{@city}{.alternates with} {.end}",
            r#"{"person": {"city": "Paris"}, "items": ["a", "b"]}"#
        ),
        "a@Paris b@Paris"
    );
}

#[test]
fn test_text_that_is_not_a_tag() {
    assert_eq!(
        render("function() { return {a b}; }", "{}"),
        "function() { return {a b}; }"
    );
}

// ----------------------------------------------------------------------
// Partials
// ----------------------------------------------------------------------

#[test]
fn test_apply_partial() {
    assert_eq!(
        render_with_partials(
            "{.repeated section people}{@|apply item}{.end}",
            r#"{"people": [{"name": "a"}, {"name": "b"}]}"#,
            Some(r#"{"item": "<{name}>"}"#),
        ),
        "<a><b>"
    );
}

#[test]
fn test_partial_runs_in_isolated_scope() {
    assert_eq!(
        render_with_partials(
            "{p|apply x}",
            r#"{"title": "T", "p": {"name": "n"}}"#,
            Some(r#"{"x": "[{title}]{name}"}"#),
        ),
        "[]n"
    );
}

#[test]
fn test_no_partials_configured() {
    assert_eq!(render("[{@|apply anything}]", "{}"), "[]");
}

#[test]
fn test_missing_or_non_text_partial() {
    assert_eq!(
        render_with_partials(
            "[{@|apply nope}][{@|apply number}]",
            "{}",
            Some(r#"{"number": 5}"#),
        ),
        "[][]"
    );
}

#[test]
fn test_partial_cache_is_idempotent() {
    let engine = engine();
    let mut ctx = engine.context(json("{}"), Some(json(r#"{"p": "{x}"}"#)));

    let first = ctx.get_partial("p").unwrap().expect("partial exists");
    let second = ctx.get_partial("p").unwrap().expect("partial exists");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_safe_partial_compile_errors_are_nested_and_cached() {
    let engine = engine();
    let template = engine.compile("{@|apply bad}{@|apply bad}").unwrap();
    let rendered = engine.render_safe(
        &template,
        json(r#"{"a": 1}"#),
        Some(json(r#"{"bad": "{.section a}x"}"#)),
    );

    // The partially-compiled tree still renders.
    assert_eq!(rendered.output, "xx");
    // Compiled once, so reported once.
    insta::assert_json_snapshot!(rendered.errors, @r#"
    [
      {
        "kind": "COMPILE_PARTIAL_SYNTAX",
        "line": 1,
        "offset": 1,
        "name": "bad",
        "children": [
          {
            "kind": "EOF_IN_BLOCK",
            "line": 1,
            "offset": 1
          }
        ]
      }
    ]
    "#);
}

#[test]
fn test_strict_partial_compile_error_halts() {
    let engine = engine();
    let template = engine.compile("before{@|apply bad}").unwrap();
    let err = engine
        .render(
            &template,
            json("{}"),
            Some(json(r#"{"bad": "{.section a}x"}"#)),
        )
        .unwrap_err();

    let info = err.info().expect("structured error");
    assert_eq!(info.kind(), ErrorKind::UnexpectedError);
    assert_eq!(info.name(), Some("SyntaxError"));
    assert_eq!(info.repr(), Some("{@|apply bad}"));
}

#[test]
fn test_recursive_partial_is_bounded() {
    let engine = engine();
    let template = engine.compile("{@|apply loop}").unwrap();
    let partials = json(r#"{"loop": "x{@|apply loop}"}"#);

    let err = engine
        .render(&template, json("{}"), Some(partials.clone()))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Execute { .. }));

    let rendered = engine.render_safe(&template, json("{}"), Some(partials));
    assert_eq!(rendered.errors.len(), 1);
    assert_eq!(rendered.errors[0].name(), Some("RecursivePartialError"));
    assert_eq!(rendered.output, "x".repeat(16));
}

// ----------------------------------------------------------------------
// Error handling
// ----------------------------------------------------------------------

#[test]
fn test_safe_mode_error_record() {
    let engine = engine();
    let template = engine
        .compile("{.section a}\n  {b|pluralize} after\n{.end}")
        .unwrap();
    let rendered = engine.render_safe(&template, json(r#"{"a": {"b": "x"}}"#), None);

    assert_eq!(rendered.output, "\n   after\n");
    insta::assert_json_snapshot!(rendered.errors, @r#"
    [
      {
        "kind": "UNEXPECTED_ERROR",
        "line": 2,
        "offset": 3,
        "name": "FormatterError",
        "data": "Formatter 'pluralize' failed: expected a number, got 'x'",
        "repr": "{b|pluralize}"
      }
    ]
    "#);
}

#[test]
fn test_logging_hook_called_in_both_modes() {
    let engine = engine();
    let template = engine.compile("{a|pluralize}{a|pluralize}").unwrap();
    let hook = Arc::new(CountingHook::default());

    let mut ctx = engine
        .context(json(r#"{"a": "x"}"#), None)
        .with_safe_execution(true)
        .with_logging_hook(hook.clone());
    ctx.execute(template.code().as_ref()).unwrap();
    assert_eq!(ctx.errors().len(), 2);
    assert_eq!(hook.0.load(Ordering::SeqCst), 2);

    let mut ctx = Context::new(json(r#"{"a": "x"}"#)).with_logging_hook(hook.clone());
    assert!(ctx.execute(template.code().as_ref()).is_err());
    // Normal mode halts at the first failure; the wrapped error passes
    // through enclosing instructions without being logged again.
    assert_eq!(hook.0.load(Ordering::SeqCst), 3);
}

#[test]
fn test_syntax_error_display() {
    let err = engine().compile("ok\n{.section a}{.bogus}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "INVALID_INSTRUCTION at line 2 character 13: bogus in {.bogus}"
    );
}

// ----------------------------------------------------------------------
// Canonical form
// ----------------------------------------------------------------------

#[test]
fn test_canonical_form_is_a_fixed_point() {
    let engine = engine();
    for source in [
        "Hello {name|html}!",
        "{.section a}{b}{.or plural?}p{.or}x{.end}",
        "{.repeated section items}{@index}{.alternates with}, {.or}none{.end}",
        "{.if a || b && c}y{.end}{.if equal?/a/b}z{.or}w{.end}",
        "{.var @x a.b}{@x}{# c }{##\nm\n##}{.meta-left}{.space}",
        "text { not a tag } {a b} {x|pluralize/y/ies|json}",
    ] {
        let first = engine.compile(source).unwrap().repr();
        let second = engine.compile(&first).unwrap().repr();
        assert_eq!(first, second, "source: {source}");
    }
}

#[test]
fn test_canonical_form_normalizes() {
    let template = engine()
        .compile("{.if   a  &&  b}x{.end}{.repeated   section items}{.end}")
        .unwrap();
    insta::assert_snapshot!(
        template.repr(),
        @"{.if a && b}x{.end}{.repeated section items}{.end}"
    );
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

#[test]
fn test_roster_fixture() {
    let engine = engine();
    let template = engine.compile(&load_fixture("roster.jsont")).unwrap();
    let partials = json(&load_fixture("partials.json"));

    let output = engine
        .render(
            &template,
            json(&load_fixture("roster.json")),
            Some(partials.clone()),
        )
        .unwrap();
    assert_eq!(output, "A&amp;B (2 members):\n1. Ann (lead)\n2. Bo\n");

    let output = engine
        .render(&template, json("{}"), Some(partials))
        .unwrap();
    assert_eq!(output, "No team.\n");
}
