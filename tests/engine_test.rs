use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use hipoengine::{value, Context, Engine, Error, Map, Parser, RenderOptions, Value};
use serde_json::json;
use tempfile::TempDir;

fn ctx(v: Value) -> Map {
    match v {
        Value::Object(m) => m,
        _ => panic!("context must be a JSON object"),
    }
}

#[test]
fn test_render_simple_text() {
    let engine = Engine::new();
    let out = engine
        .render("Hello {{ name }}!", ctx(json!({"name": "Emre"})))
        .unwrap();
    assert_eq!(out, "Hello Emre!");
}

#[test]
fn test_render_for_loop() {
    let engine = Engine::new();
    let out = engine
        .render(
            "{{ for item in items }}{{ item }}{{ endfor }}",
            ctx(json!({"items": ["a", "b", "c"]})),
        )
        .unwrap();
    assert_eq!(out, "a\nb\nc");
}

#[test]
fn test_for_over_non_sequence_is_fatal() {
    let engine = Engine::new();
    let err = engine
        .render(
            "{{ for item in items }}{{ item }}{{ endfor }}",
            ctx(json!({"items": "not_a_sequence"})),
        )
        .unwrap_err();
    match err {
        Error::Eval(msg) => assert!(msg.contains("items"), "message should name the collection: {msg}"),
        other => panic!("expected evaluation error, got {other:?}"),
    }
}

#[test]
fn test_missing_variable_renders_empty() {
    let engine = Engine::new();
    let out = engine.render("{{ notfound }}", Map::new()).unwrap();
    assert_eq!(out, "");
}

#[test]
fn test_unknown_filter_visible_marker() {
    let engine = Engine::new();
    let out = engine
        .render("{{ name|notafilter }}", ctx(json!({"name": "Emre"})))
        .unwrap();
    assert_eq!(out, "Emre [filter notafilter not found]");
}

#[test]
fn test_unknown_function_renders_empty() {
    let engine = Engine::new();
    let out = engine.render("{{ NotAFunction() }}", Map::new()).unwrap();
    assert_eq!(out, "");
}

#[test]
fn test_html_escape_by_default() {
    let engine = Engine::new();
    let out = engine
        .render("{{ html }}", ctx(json!({"html": "<b>test</b>"})))
        .unwrap();
    assert_eq!(out, "&lt;b&gt;test&lt;/b&gt;");
}

#[test]
fn test_safe_filter_disables_escaping() {
    let engine = Engine::new();
    let out = engine
        .render("{{ html|safe }}", ctx(json!({"html": "<b>test</b>"})))
        .unwrap();
    assert_eq!(out, "<b>test</b>");
}

#[test]
fn test_map_value_renders_empty() {
    let engine = Engine::new();
    let out = engine
        .render("{{ user }}", ctx(json!({"user": {"name": "Emre"}})))
        .unwrap();
    assert_eq!(out, "");
}

#[test]
fn test_if_elif_else_branches() {
    let engine = Engine::new();
    let tpl = "{{ if a > 1 }}big{{ elif a == 1 }}one{{ else }}small{{ endif }}";
    assert_eq!(engine.render(tpl, ctx(json!({"a": 2}))).unwrap(), "big");
    assert_eq!(engine.render(tpl, ctx(json!({"a": 1}))).unwrap(), "one");
    assert_eq!(engine.render(tpl, ctx(json!({"a": 0}))).unwrap(), "small");
}

#[test]
fn test_zero_is_falsy() {
    let engine = Engine::new();
    let tpl = "{{ if n }}y{{ else }}n{{ endif }}";
    assert_eq!(engine.render(tpl, ctx(json!({"n": 0}))).unwrap(), "n");
    assert_eq!(engine.render(tpl, ctx(json!({"n": 7}))).unwrap(), "y");
}

#[test]
fn test_condition_against_quoted_literal() {
    let engine = Engine::new();
    let tpl = "{{ if name == \"Emre\" }}hit{{ else }}miss{{ endif }}";
    assert_eq!(engine.render(tpl, ctx(json!({"name": "Emre"}))).unwrap(), "hit");
    assert_eq!(engine.render(tpl, ctx(json!({"name": "Ali"}))).unwrap(), "miss");
}

#[test]
fn test_with_binding() {
    let engine = Engine::new();
    let out = engine
        .render(
            "{{ with user.name as n }}{{ n }}{{ endwith }}",
            ctx(json!({"user": {"name": "Emre"}})),
        )
        .unwrap();
    assert_eq!(out, "Emre");
}

#[test]
fn test_set_chain_propagates_raw_values() {
    let engine = Engine::new();
    let out = engine
        .render("{{ set x = 1 }}{{ set y = x }}{{ y }}", Map::new())
        .unwrap();
    assert_eq!(out, "1");
}

#[test]
fn test_set_with_filter_chain() {
    let engine = Engine::new();
    let out = engine
        .render("{{ set s = name|upper }}{{ s }}", ctx(json!({"name": "emre"})))
        .unwrap();
    assert_eq!(out, "EMRE");
}

#[test]
fn test_set_quoted_literal() {
    let engine = Engine::new();
    let out = engine
        .render("{{ set who = \"Emre\" }}{{ who }}", Map::new())
        .unwrap();
    assert_eq!(out, "Emre");
}

#[test]
fn test_negative_indexing() {
    let engine = Engine::new();
    let out = engine
        .render("{{ items[-1] }}", ctx(json!({"items": [10, 20, 30]})))
        .unwrap();
    assert_eq!(out, "30");
    let out = engine
        .render("{{ word[0] }}{{ word[-1] }}", ctx(json!({"word": "abc"})))
        .unwrap();
    assert_eq!(out, "ac");
}

#[test]
fn test_bracket_and_dot_paths() {
    let engine = Engine::new();
    let data = ctx(json!({"products": [{"name": "apple"}, {"name": "pear"}]}));
    let out = engine.render("{{ products[1].name }}", data).unwrap();
    assert_eq!(out, "pear");
}

#[test]
fn test_register_function() {
    let engine = Engine::new();
    engine.register_function(
        "shout",
        Arc::new(|args: &[Value]| {
            let s = args.first().map(value::display).unwrap_or_default();
            Value::String(format!("{}!", s.to_uppercase()))
        }),
    );
    let out = engine.render("{{ shout(\"hey\") }}", Map::new()).unwrap();
    assert_eq!(out, "HEY!");
}

#[test]
fn test_register_filter() {
    let engine = Engine::new();
    engine.register_filter(
        "exclaim",
        Arc::new(|val: &Value, _: &[Value]| Value::String(format!("{}!", value::display(val)))),
    );
    let out = engine
        .render("{{ name|exclaim }}", ctx(json!({"name": "Emre"})))
        .unwrap();
    assert_eq!(out, "Emre!");
}

#[test]
fn test_function_argument_resolution() {
    let engine = Engine::new();
    engine.register_function(
        "concat",
        Arc::new(|args: &[Value]| {
            Value::String(args.iter().map(value::display).collect::<Vec<_>>().join("-"))
        }),
    );
    // Quoted arguments stay literal, bare names resolve through the scope.
    let out = engine
        .render("{{ concat(\"a\", name, 3) }}", ctx(json!({"name": "b"})))
        .unwrap();
    assert_eq!(out, "a-b-3");
}

#[test]
fn test_global_context_and_processor() {
    let mut engine = Engine::new();
    engine.set_global_context(ctx(json!({"site": "hipo", "name": "global"})));
    engine.add_context_processor(Box::new(|data: &mut Map| {
        data.insert("injected".to_string(), json!("yes"));
    }));
    // Whitespace-only runs between tags are dropped, so the separators
    // must be visible text.
    let out = engine
        .render(
            "{{ site }}-{{ name }}-{{ injected }}",
            ctx(json!({"name": "local"})),
        )
        .unwrap();
    assert_eq!(out, "hipo-local-yes");
}

#[test]
fn test_include_sees_caller_scope() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("partial.html"),
        "<template>Hello {{ who }}</template>",
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.add_template_path(dir.path());
    let out = engine
        .render("{{ set who = \"Emre\" }}{{ include \"partial.html\" }}", Map::new())
        .unwrap();
    assert_eq!(out, "Hello Emre");
}

#[test]
fn test_extends_block_override() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("base.html"),
        "<h1>{{ block title }}Default{{ endblock }}</h1>",
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.add_template_path(dir.path());

    let child = "{{ extends \"base.html\" }}\n{{ block title }}Custom{{ endblock }}";
    assert_eq!(engine.render(child, Map::new()).unwrap(), "<h1>Custom</h1>");

    // No override keeps the base's own body.
    let bare = "{{ extends \"base.html\" }}";
    assert_eq!(engine.render(bare, Map::new()).unwrap(), "<h1>Default</h1>");
}

#[test]
fn test_render_file_wraps_regions() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("page.html"),
        "<template>\n<p>{{ name }}</p>\n</template>\n<script>\nconsole.log(1);\n</script>\n<style>\np {}\n</style>",
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.add_template_path(dir.path());
    let out = engine
        .render_file("page.html", ctx(json!({"name": "Emre"})))
        .unwrap();
    assert_eq!(
        out,
        "<script>\nconsole.log(1);\n</script>\n<p>Emre</p>\n<style>\np {}\n</style>"
    );
}

#[test]
fn test_render_with_layout_embeds_view() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("layout.html"),
        "<template><header></header>\n{{ embed }}\n<footer></footer></template>\n<style>\nbody {}\n</style>",
    )
    .unwrap();
    fs::write(
        dir.path().join("view.html"),
        "<template>{{ block main }}Hi {{ name }}{{ endblock }}</template>\n<script>\nlet a = 1;\n</script>",
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.add_template_path(dir.path());
    let out = engine
        .render_with_layout("view.html", "layout.html", ctx(json!({"name": "Emre"})))
        .unwrap();
    assert_eq!(
        out,
        "<script>\nlet a = 1;\n</script>\n<header></header>\nHi Emre\n<footer></footer>\n<style>\nbody {}\n</style>"
    );
}

#[test]
fn test_i18n_trans_interpolation() {
    let mut engine = Engine::new();
    engine.set_translations(ctx(json!({
        "tr": {"greeting": "Merhaba, {{ name }}!"},
        "en": {"greeting": "Hello, {{ name }}!"}
    })));
    engine.set_lang("tr");
    let data = ctx(json!({"name": "Emre"}));
    let out = engine.render("{{ trans(\"greeting\", ctx) }}", data.clone()).unwrap();
    assert_eq!(out, "Merhaba, Emre!");

    engine.set_lang("en");
    let out = engine.render("{{ trans('greeting', ctx) }}", data).unwrap();
    assert_eq!(out, "Hello, Emre!");
}

#[test]
fn test_i18n_pluralization_and_fallback() {
    let mut engine = Engine::new();
    engine.set_fallback_lang("en");
    engine.set_translations(ctx(json!({
        "tr": {
            "cart": {"items": {"one": "1 item", "other": "{{ count }} items"}}
        },
        "en": {
            "user": {"profile": {"name": "Name (EN)"}}
        }
    })));
    engine.set_lang("tr");

    let tpl = "{{ trans(\"cart.items\", ctx, count) }}";
    let out = engine.render(tpl, ctx(json!({"count": 1}))).unwrap();
    assert_eq!(out, "1 item");
    let out = engine.render(tpl, ctx(json!({"count": 3}))).unwrap();
    assert_eq!(out, "3 items");

    // Key missing in tr falls back to en.
    let out = engine
        .render("{{ trans(\"user.profile.name\", ctx) }}", Map::new())
        .unwrap();
    assert_eq!(out, "Name (EN)");

    // Key missing everywhere comes back verbatim.
    let out = engine.render("{{ trans(\"no.such.key\") }}", Map::new()).unwrap();
    assert_eq!(out, "no.such.key");
}

#[test]
fn test_i18n_explicit_language_argument() {
    let mut engine = Engine::new();
    engine.set_translations(ctx(json!({
        "tr": {"bye": "Hoşça kal"},
        "en": {"bye": "Goodbye"}
    })));
    engine.set_lang("tr");
    let out = engine.render("{{ trans(\"bye\", \"en\") }}", Map::new()).unwrap();
    assert_eq!(out, "Goodbye");
}

#[test]
fn test_scope_locale_overrides_engine_lang() {
    let mut engine = Engine::new();
    engine.set_translations(ctx(json!({
        "tr": {"hello": "Merhaba"},
        "en": {"hello": "Hello"}
    })));
    engine.set_lang("en");

    let ast = Parser::new("{{ trans(\"hello\") }}").parse().unwrap();
    let mut scope = Context::new(Map::new(), &engine);
    scope.set_locale("tr");
    assert_eq!(ast.render(&scope).unwrap(), "Merhaba");
}

#[test]
fn test_i18n_translations_from_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tr.json"), r#"{"hello": "Merhaba"}"#).unwrap();
    fs::write(dir.path().join("en.json"), r#"{"hello": "Hello"}"#).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut engine = Engine::new();
    engine.set_translations_from_dir(dir.path()).unwrap();
    engine.set_lang("tr");
    let out = engine.render("{{ trans(\"hello\") }}", Map::new()).unwrap();
    assert_eq!(out, "Merhaba");
}

#[test]
fn test_step_limit_aborts_render() {
    let engine = Engine::new();
    let items: Vec<i64> = (0..1000).collect();
    let err = engine
        .render_with_options(
            "{{ for x in items }}{{ x }}{{ endfor }}",
            ctx(json!({"items": items})),
            &RenderOptions { max_steps: 50, timeout: None },
        )
        .unwrap_err();
    assert!(matches!(err, Error::StepLimitExceeded));
}

#[test]
fn test_step_limit_covers_translation_interpolation() {
    let mut engine = Engine::new();
    engine.set_translations(ctx(json!({
        "en": {"big": "{{ for x in xs }}{{ x }}{{ endfor }}"}
    })));
    let xs: Vec<i64> = (0..1000).collect();
    let err = engine
        .render_with_options(
            "{{ trans(\"big\", ctx) }}",
            ctx(json!({"xs": xs})),
            &RenderOptions { max_steps: 50, timeout: None },
        )
        .unwrap_err();
    assert!(matches!(err, Error::StepLimitExceeded));
}

#[test]
fn test_step_limit_allows_small_renders() {
    let engine = Engine::new();
    let out = engine
        .render_with_options(
            "{{ name }}",
            ctx(json!({"name": "ok"})),
            &RenderOptions { max_steps: 50, timeout: Some(Duration::from_secs(5)) },
        )
        .unwrap();
    assert_eq!(out, "ok");
}

#[test]
fn test_template_not_found() {
    let engine = Engine::new();
    let err = engine.render_file("no-such-template.html", Map::new()).unwrap_err();
    assert!(matches!(err, Error::TemplateNotFound(_)));
}

#[test]
fn test_template_alias_resolution() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("deep-name.html");
    fs::write(&real, "<template>aliased</template>").unwrap();

    let mut engine = Engine::new();
    engine.set_template_alias("short.html", &real);
    let out = engine.render_file("short.html", Map::new()).unwrap();
    assert_eq!(out, "aliased");
}

#[test]
fn test_file_cache_invalidates_on_modification() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("page.html");
    fs::write(&path, "<template>v1</template>").unwrap();

    let mut engine = Engine::new();
    engine.add_template_path(dir.path());
    assert_eq!(engine.render_file("page.html", Map::new()).unwrap(), "v1");

    fs::write(&path, "<template>v2</template>").unwrap();
    let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5)).unwrap();
    assert_eq!(engine.render_file("page.html", Map::new()).unwrap(), "v2");
}

#[test]
fn test_minify_collapses_blank_lines() {
    let engine = Engine::new();
    let out = engine.render("a\n\n\n\nb", Map::new()).unwrap();
    assert_eq!(out, "a\n\nb");
}

#[test]
fn test_whitespace_only_runs_between_tags_are_dropped() {
    let engine = Engine::new();
    let out = engine
        .render("{{ a }}\n   \n{{ b }}", ctx(json!({"a": 1, "b": 2})))
        .unwrap();
    assert_eq!(out, "12");
}

#[test]
fn test_reregistration_overwrites() {
    let engine = Engine::new();
    engine.register_filter(
        "upper",
        Arc::new(|val: &Value, _: &[Value]| {
            Value::String(format!("^{}", value::display(val)))
        }),
    );
    let out = engine
        .render("{{ name|upper }}", ctx(json!({"name": "emre"})))
        .unwrap();
    assert_eq!(out, "^emre");
}

#[test]
fn test_set_from_function_call() {
    let engine = Engine::new();
    engine.register_function("answer", Arc::new(|_: &[Value]| json!(42)));
    let out = engine.render("{{ set v = answer() }}{{ v }}", Map::new()).unwrap();
    assert_eq!(out, "42");
}

#[test]
fn test_bracket_quoted_keys() {
    let engine = Engine::new();
    let out = engine
        .render(
            "{{ user[\"first name\"] }}",
            ctx(json!({"user": {"first name": "Emre"}})),
        )
        .unwrap();
    assert_eq!(out, "Emre");
}

#[test]
fn test_legacy_with_ordering() {
    let engine = Engine::new();
    let out = engine
        .render(
            "{{ with user.name n }}{{ n }}{{ endwith }}",
            ctx(json!({"user": {"name": "Emre"}})),
        )
        .unwrap();
    assert_eq!(out, "Emre");
}

#[test]
fn test_i18n_plural_zero_form() {
    let mut engine = Engine::new();
    engine.set_translations(ctx(json!({
        "en": {"cart": {"items": {"zero": "empty", "one": "1 item", "other": "{{ count }} items"}}}
    })));
    let out = engine
        .render("{{ trans(\"cart.items\", ctx, count) }}", ctx(json!({"count": 0})))
        .unwrap();
    assert_eq!(out, "empty");
}

#[test]
fn test_concurrent_renders_share_one_engine() {
    let engine = Engine::new();
    std::thread::scope(|s| {
        for i in 0..8 {
            let engine = &engine;
            s.spawn(move || {
                let out = engine
                    .render("{{ n }}", ctx(json!({"n": i})))
                    .unwrap();
                assert_eq!(out, i.to_string());
            });
        }
    });
}
