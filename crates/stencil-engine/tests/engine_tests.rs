//! Engine tests: precache, render, clear, includes, raw mode and change
//! watches.
//!
//! Most tests run against [`MemoryResolver`] so change notifications can be
//! delivered deterministically; the filesystem section uses real files in a
//! temporary directory.

use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stencil_engine::{
    Bindings, ChangeKind, Engine, EngineConfig, EvalError, FsResolver, MemoryResolver,
    TemplateError, TemplateSource,
};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bindings(value: Value) -> Bindings {
    match value {
        Value::Object(map) => map,
        other => panic!("bindings must be an object, got {other}"),
    }
}

fn no_imports() -> Bindings {
    Bindings::new()
}

/// Engine over an in-memory resolver preloaded with `files`.
fn engine_with(config: EngineConfig, files: &[(&str, &str)]) -> (Engine, Arc<MemoryResolver>) {
    init_logging();
    let resolver = Arc::new(MemoryResolver::new());
    for (path, content) in files {
        resolver.insert(*path, *content);
    }
    let engine = Engine::with_resolver(config, resolver.clone()).expect("valid config");
    (engine, resolver)
}

fn engine(files: &[(&str, &str)]) -> (Engine, Arc<MemoryResolver>) {
    engine_with(EngineConfig::default(), files)
}

/// Poll `condition` until it holds or ten seconds pass.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}

// ─────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_render_inline_hello_world() {
    let (engine, _) = engine(&[]);
    let out = engine
        .render(
            TemplateSource::anonymous("Hello <%= name %>!"),
            &bindings(json!({"name": "World"})),
        )
        .unwrap();
    assert_eq!(out, "Hello World!");
}

#[test]
fn test_text_without_delimiters_is_unchanged() {
    let (engine, _) = engine(&[("plain.txt", "line one\r\nline two  \n\n")]);
    let out = engine.render("plain.txt", &no_imports()).unwrap();
    assert_eq!(out, "line one\nline two  \n\n");
}

#[test]
fn test_print_escapes_markup() {
    let (engine, _) = engine(&[]);
    let out = engine
        .render(TemplateSource::anonymous(r#"<%= "<b>" %>"#), &no_imports())
        .unwrap();
    assert_eq!(out, "&#60;b&#62;");

    let out = engine
        .render(
            TemplateSource::anonymous("<%= q %>"),
            &bindings(json!({"q": "'\"!?;:"})),
        )
        .unwrap();
    assert_eq!(out, "'\"!?;:");
}

#[test]
fn test_close_delimiter_inside_string() {
    let (engine, _) = engine(&[]);
    let out = engine
        .render(TemplateSource::anonymous("<%= 'a%>b' %>!"), &no_imports())
        .unwrap();
    assert_eq!(out, "a%&#62;b!");
}

#[test]
fn test_custom_delimiters_from_json_config() {
    let config = EngineConfig::from_json(r#"{"open": "{{", "close": "}}"}"#).unwrap();
    let (engine, _) = engine_with(config, &[]);
    let out = engine
        .render(
            TemplateSource::anonymous("<%= x %> {{= x }}"),
            &bindings(json!({"x": 1})),
        )
        .unwrap();
    assert_eq!(out, "<%= x %> 1");
}

#[test]
fn test_globals_and_imports() {
    let config = EngineConfig::default()
        .with_global("site", "example.org")
        .with_global("n", 1);
    let (engine, _) = engine_with(config, &[]);
    let source = TemplateSource::anonymous("<%= site %>/<%= n %>");
    assert_eq!(engine.render(source.clone(), &no_imports()).unwrap(), "example.org/1");
    assert_eq!(
        engine.render(source, &bindings(json!({"n": 2}))).unwrap(),
        "example.org/2"
    );
}

#[test]
fn test_same_template_different_imports() {
    let (engine, _) = engine(&[("greet", "Hi <%= who %>")]);
    let a = engine.render("greet", &bindings(json!({"who": "a"}))).unwrap();
    let b = engine.render("greet", &bindings(json!({"who": "b"}))).unwrap();
    assert_eq!((a.as_str(), b.as_str()), ("Hi a", "Hi b"));
}

// ─────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_render_caches_path_templates() {
    let (engine, resolver) = engine(&[("page", "v1")]);
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v1");
    assert!(engine.cache().contains("page"));

    // Served from cache without re-reading the source.
    resolver.insert("page", "v2");
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v1");
}

#[test]
fn test_inline_with_id_is_cached_and_cache_wins() {
    let (engine, _) = engine(&[]);
    let first = TemplateSource::inline("snippet", "first");
    let second = TemplateSource::inline("snippet", "second");
    assert_eq!(engine.render(first, &no_imports()).unwrap(), "first");
    assert_eq!(engine.render(second, &no_imports()).unwrap(), "first");
}

#[test]
fn test_anonymous_inline_is_never_cached() {
    let (engine, _) = engine(&[]);
    engine.precache(&TemplateSource::anonymous("x")).unwrap();
    assert!(engine.cache().is_empty());
}

#[test]
fn test_inline_with_empty_id_is_never_cached() {
    let (engine, _) = engine(&[]);
    let first = TemplateSource::inline("", "first");
    let second = TemplateSource::inline("", "second");
    assert_eq!(engine.render(first, &no_imports()).unwrap(), "first");
    assert_eq!(engine.render(second, &no_imports()).unwrap(), "second");
    assert!(engine.cache().is_empty());
}

#[test]
fn test_precache_returns_scanned_template() {
    let (engine, resolver) = engine(&[("a", "x<% y %>")]);
    let template = engine.precache(&TemplateSource::path("a")).unwrap();
    assert_eq!(template.nodes.len(), 2);
    assert!(resolver.is_watched("a"));
}

#[test]
fn test_clear_single_entry() {
    let (engine, _) = engine(&[("a", "A"), ("b", "B")]);
    engine.render("a", &no_imports()).unwrap();
    engine.render("b", &no_imports()).unwrap();

    engine.clear(Some("a"));
    assert!(!engine.cache().contains("a"));
    assert!(engine.cache().contains("b"));

    // Clearing an absent id is a no-op.
    engine.clear(Some("missing"));
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn test_clear_all_entries() {
    let (engine, _) = engine(&[("a", "A"), ("b", "B")]);
    engine.render("a", &no_imports()).unwrap();
    engine.render("b", &no_imports()).unwrap();
    engine.clear(None);
    assert!(engine.cache().is_empty());
}

#[test]
fn test_clear_then_render_rereads_source() {
    let (engine, resolver) = engine(&[("page", "v1")]);
    engine.render("page", &no_imports()).unwrap();
    resolver.insert("page", "v2");
    engine.clear(Some("page"));
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v2");
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unterminated_tag_is_syntax_error_and_not_cached() {
    let (engine, resolver) = engine(&[("broken", "ok\n  <% oops")]);
    let err = engine.render("broken", &no_imports()).unwrap_err();
    let TemplateError::Syntax(syntax) = &err else {
        panic!("expected syntax error, got {err:?}");
    };
    assert_eq!(syntax.id.as_deref(), Some("broken"));
    assert_eq!((syntax.span.start_line, syntax.span.start_col), (2, 3));
    assert_eq!(syntax.source_line, "  <% oops");
    assert!(!engine.cache().contains("broken"));
    assert!(!resolver.is_watched("broken"));
}

#[test]
fn test_missing_source_is_read_error() {
    let (engine, _) = engine(&[]);
    let err = engine.render("nope.html", &no_imports()).unwrap_err();
    assert!(matches!(err, TemplateError::SourceRead { ref path, .. } if path == "nope.html"));
    assert!(engine.cache().is_empty());
}

#[test]
fn test_runtime_error_names_template() {
    let (engine, _) = engine(&[("page", "<%= missing %>")]);
    let err = engine.render("page", &no_imports()).unwrap_err();
    let TemplateError::Execution { id, source } = err else {
        panic!("expected execution error");
    };
    assert_eq!(id, "page");
    assert!(matches!(source, EvalError::UndefinedVariable(_)));
}

#[test]
fn test_anonymous_runtime_error_uses_placeholder_id() {
    let (engine, _) = engine(&[]);
    let err = engine
        .render(TemplateSource::anonymous("<%= 1 / 0 %>"), &no_imports())
        .unwrap_err();
    assert!(matches!(err, TemplateError::Execution { ref id, .. } if id == "<inline>"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let resolver = Arc::new(MemoryResolver::new());
    let config = EngineConfig::default().with_delimiters("<%", "");
    let err = Engine::with_resolver(config, resolver).unwrap_err();
    assert!(matches!(err, TemplateError::InvalidConfig(_)));
}

// ─────────────────────────────────────────────────────────────────────
// Includes
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_include_resolves_relative_to_including_template() {
    let (engine, _) = engine(&[("dir/a", "A<%# 'b' %>A"), ("dir/b", "B")]);
    assert_eq!(engine.render("dir/a", &no_imports()).unwrap(), "ABA");
    assert!(engine.cache().contains("dir/b"));
}

#[test]
fn test_include_parent_directory() {
    let (engine, _) = engine(&[
        ("views/pages/home", "<%# '../partials/nav' %>home"),
        ("views/partials/nav", "nav|"),
    ]);
    assert_eq!(
        engine.render("views/pages/home", &no_imports()).unwrap(),
        "nav|home"
    );
}

#[test]
fn test_include_with_imports_and_globals() {
    let config = EngineConfig::default().with_global("sep", "/");
    let (engine, _) = engine_with(
        config,
        &[
            ("list", "<% for (i of items) { include('item', {i: i}) } %>"),
            ("item", "<%= i %><%= sep %>"),
        ],
    );
    let out = engine
        .render("list", &bindings(json!({"items": [1, 2]})))
        .unwrap();
    assert_eq!(out, "1/2/");
}

#[test]
fn test_included_template_does_not_see_caller_imports() {
    let (engine, _) = engine(&[("outer", "<%# 'inner' %>"), ("inner", "<%= secret %>")]);
    let err = engine
        .render("outer", &bindings(json!({"secret": 1})))
        .unwrap_err();
    assert!(matches!(err, TemplateError::Execution { ref id, .. } if id == "inner"));
}

#[test]
fn test_anonymous_template_includes_from_base_dir() {
    let config = EngineConfig::default().with_base_dir("views");
    let (engine, _) = engine_with(config, &[("views/footer", "(c)")]);
    let out = engine
        .render(TemplateSource::anonymous("page <%# 'footer' %>"), &no_imports())
        .unwrap();
    assert_eq!(out, "page (c)");
}

#[test]
fn test_cyclic_include_is_bounded() {
    let config = EngineConfig::default().with_max_include_depth(8);
    let (engine, _) = engine_with(config, &[("loop", "x<%# 'loop' %>")]);
    let err = engine.render("loop", &no_imports()).unwrap_err();
    let TemplateError::CyclicInclude { id, depth } = err else {
        panic!("expected cyclic include, got {err:?}");
    };
    assert_eq!(id, "loop");
    assert_eq!(depth, 9);
}

#[test]
fn test_include_depth_at_limit_succeeds() {
    let config = EngineConfig::default().with_max_include_depth(2);
    let (engine, _) = engine_with(
        config,
        &[("a", "a<%# 'b' %>"), ("b", "b<%# 'c' %>"), ("c", "c")],
    );
    assert_eq!(engine.render("a", &no_imports()).unwrap(), "abc");
}

#[test]
fn test_missing_include_reports_read_error() {
    let (engine, _) = engine(&[("page", "<%# 'gone' %>")]);
    let err = engine.render("page", &no_imports()).unwrap_err();
    assert!(matches!(err, TemplateError::SourceRead { ref path, .. } if path == "gone"));
}

// ─────────────────────────────────────────────────────────────────────
// Raw mode
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_raw_mode_returns_program_text() {
    let config = EngineConfig::default().with_raw(true);
    let (engine, _) = engine_with(config, &[("dir/a", "Hi <%= missing %>")]);
    let out = engine.render("dir/a", &no_imports()).unwrap();
    assert!(out.starts_with("var _result='',include=bind_include('dir'),print=escape_print;\n"));
    assert!(out.contains("_result+='Hi';"));
    assert!(out.contains("print( missing )"));
    assert!(out.ends_with("\nreturn _result"));
}

#[test]
fn test_raw_mode_never_executes() {
    let config = EngineConfig::default().with_raw(true);
    let (engine, _) = engine_with(config, &[("loop", "<%# 'loop' %><%= 1 / 0 %>")]);
    assert!(engine.render("loop", &no_imports()).is_ok());
}

// ─────────────────────────────────────────────────────────────────────
// Change watches
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_modify_refreshes_entry() {
    let (engine, resolver) = engine(&[("page", "v1")]);
    engine.render("page", &no_imports()).unwrap();

    resolver.insert("page", "v2");
    assert!(resolver.notify_change("page", ChangeKind::Modify));
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v2");
    assert!(resolver.is_watched("page"));
}

#[test]
fn test_failed_refresh_keeps_previous_entry() {
    let (engine, resolver) = engine(&[("page", "v1")]);
    engine.render("page", &no_imports()).unwrap();

    resolver.insert("page", "v2 <% unterminated");
    resolver.notify_change("page", ChangeKind::Modify);
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v1");

    resolver.remove("page");
    resolver.notify_change("page", ChangeKind::Modify);
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v1");

    // The watch survives failed refreshes.
    resolver.insert("page", "v3");
    resolver.notify_change("page", ChangeKind::Modify);
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v3");
}

#[test]
fn test_rename_drops_entry_and_ends_watch() {
    let (engine, resolver) = engine(&[("page", "v1")]);
    engine.render("page", &no_imports()).unwrap();

    resolver.notify_change("page", ChangeKind::Rename);
    assert!(!engine.cache().contains("page"));
    assert!(!resolver.is_watched("page"));

    // The next render reads the source again and watches it anew.
    resolver.insert("page", "v2");
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v2");
    assert!(resolver.is_watched("page"));
}

#[test]
fn test_modify_after_clear_recreates_entry() {
    let (engine, resolver) = engine(&[("page", "v1")]);
    engine.render("page", &no_imports()).unwrap();
    engine.clear(None);

    resolver.insert("page", "v2");
    resolver.notify_change("page", ChangeKind::Modify);
    assert!(engine.cache().contains("page"));
    assert_eq!(engine.render("page", &no_imports()).unwrap(), "v2");
}

#[test]
fn test_included_template_is_watched() {
    let (engine, resolver) = engine(&[("a", "<%# 'b' %>"), ("b", "old")]);
    assert_eq!(engine.render("a", &no_imports()).unwrap(), "old");
    resolver.insert("b", "new");
    resolver.notify_change("b", ChangeKind::Modify);
    assert_eq!(engine.render("a", &no_imports()).unwrap(), "new");
}

// ─────────────────────────────────────────────────────────────────────
// Concurrency and determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_renders_share_cache() {
    let (engine, _) = engine(&[("page", "<%= n * 2 %>")]);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let engine = engine.clone();
                scope.spawn(move || engine.render("page", &bindings(json!({"n": n}))))
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            let out = handle.join().expect("render thread panicked").unwrap();
            assert_eq!(out, (n * 2).to_string());
        }
    });
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn test_rendering_is_deterministic_100_iterations() {
    let (engine, _) = engine(&[(
        "list",
        "<ul>\n<% for (let i of items) { %>\n  <li><%= i %></li>\n<% } %>\n</ul>\n",
    )]);
    let imports = bindings(json!({"items": ["a", "<b>"]}));
    let first = engine.render("list", &imports).unwrap();
    assert_eq!(first, "<ul>\n  <li>a</li>\n  <li>&#60;b&#62;</li>\n</ul>\n");
    for _ in 0..100 {
        assert_eq!(engine.render("list", &imports).unwrap(), first);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Filesystem
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_filesystem_render_and_include() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("page.html"),
        "<h1><%= title %></h1>\n<%# 'footer.html' %>",
    )
    .unwrap();
    std::fs::write(dir.path().join("footer.html"), "<footer/>").unwrap();

    let engine = Engine::new(EngineConfig::default()).unwrap();
    let page = dir.path().join("page.html");
    let out = engine
        .render(page.as_path(), &bindings(json!({"title": "Home"})))
        .unwrap();
    assert_eq!(out, "<h1>Home</h1>\n<footer/>");

    let footer = dir.path().join("footer.html");
    assert!(engine.cache().contains(&footer.to_string_lossy()));
}

#[test]
fn test_filesystem_base_dir_for_anonymous_templates() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("part.txt"), "part").unwrap();

    let config = EngineConfig::default().with_base_dir(dir.path());
    let engine = Engine::new(config).unwrap();
    let out = engine
        .render(TemplateSource::anonymous("<%# 'part.txt' %>!"), &no_imports())
        .unwrap();
    assert_eq!(out, "part!");
}

#[test]
fn test_filesystem_missing_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let missing = dir.path().join("missing.html");
    let err = engine.render(missing.as_path(), &no_imports()).unwrap_err();
    assert!(matches!(err, TemplateError::SourceRead { .. }));
}

#[test]
fn test_filesystem_watch_refreshes_and_drops_entry() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("page.txt");
    std::fs::write(&page, "v1").unwrap();

    let resolver = Arc::new(FsResolver::new());
    let engine = Engine::with_resolver(EngineConfig::default(), resolver.clone()).unwrap();
    let id = page.to_string_lossy().into_owned();
    assert_eq!(engine.render(page.as_path(), &no_imports()).unwrap(), "v1");
    assert_eq!(resolver.active_watches(), 1);

    std::fs::write(&page, "v2").unwrap();
    assert!(
        wait_until(|| engine.render(page.as_path(), &no_imports()).unwrap() == "v2"),
        "modified file was never refreshed"
    );

    std::fs::remove_file(&page).unwrap();
    assert!(
        wait_until(|| !engine.cache().contains(&id) && resolver.active_watches() == 0),
        "removed file still cached or watched"
    );
}
