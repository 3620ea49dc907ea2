//! Generated code executed end to end: escaping, built-in functions,
//! phrases and include expansion.


use test_harness::*;
use vellum::{
    ArtifactKey, DefaultHost, Engine, EngineConfig, EngineError, MemoryStore, RenderError, Value,
};

fn thread(id: i64, title: &str, replies: i64, sticky: bool) -> Value {
    data(&[
        ("id", Value::from(id)),
        ("title", Value::from(title)),
        ("replies", Value::from(replies)),
        ("sticky", Value::from(sticky)),
    ])
}

fn forum_store() -> MemoryStore {
    TemplateFixtures::new()
        .store(&["header", "footer", "page"])
        .with_phrase(ROOT, "tagline", "Talk about anything")
        .with_phrase(ROOT, "copyright", "\u{a9} {year} Vellum")
        .with_phrase(ROOT, "no_threads", "No threads yet.")
}

fn single(name: &str, source: &str) -> Engine<MemoryStore> {
    open(MemoryStore::new().with_template(ROOT, name, source))
}

#[test]
fn page_expands_includes_and_phrases() {
    let engine = open(forum_store());
    let page = data(&[
        ("site", data(&[("title", Value::from("Forum & Co"))])),
        ("year", Value::from(2024)),
        (
            "threads",
            Value::from(vec![
                thread(5, "<Hello>", 1234, true),
                thread(6, "Second", 2, false),
            ]),
        ),
    ]);

    let out = render(&engine, ROOT, "page", &page);
    assert!(out.starts_with("<header><h1>Forum &amp; Co</h1><p>Talk about anything</p></header>"));
    assert!(
        out.contains("<li class=\"sticky\"><a href=\"/threads/5\">&lt;Hello&gt;</a> (1,234)</li>")
    );
    assert!(out.contains("<li><a href=\"/threads/6\">Second</a> (2)</li>"));
    assert!(out.ends_with("<footer>\u{a9} 2024 Vellum</footer>"));
    assert!(!out.contains("Thread listing"));
    assert!(!out.contains("No threads yet."));

    let artifact = engine
        .get_compiled(&ArtifactKey::template(ROOT, ROOT, "page"))
        .unwrap();
    assert_eq!(
        artifact
            .includes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        vec!["footer", "header"]
    );
    assert!(artifact.phrases.contains("no_threads"));
    assert!(artifact.phrases.contains("copyright"));
}

#[test]
fn empty_listing_falls_back_to_the_else_branch() {
    let engine = open(forum_store());
    let page = data(&[
        ("site", data(&[("title", Value::from("Forum"))])),
        ("year", Value::from(2024)),
        ("threads", Value::List(vec![])),
    ]);
    let out = render(&engine, ROOT, "page", &page);
    assert!(out.contains("No threads yet."));
    assert!(!out.contains("<li"));
}

#[test]
fn escaping_follows_the_output_context() {
    let engine = single(
        "search",
        "{$q}|{raw({$html})}|{urlencode({$q})}|{jsescape({$quote})}|{escape({$q}, url)}",
    );
    let values = data(&[
        ("q", Value::from("a b&c")),
        ("html", Value::from("<em>hi</em>")),
        ("quote", Value::from("it's")),
    ]);
    assert_eq!(
        render(&engine, ROOT, "search", &values),
        "a b&amp;c|<em>hi</em>|a%20b%26c|it\\'s|a%20b%26c"
    );
}

#[test]
fn calc_folds_and_counts() {
    let fixtures = TemplateFixtures::new();
    let engine = open(fixtures.store(&["stats"]));
    let members = data(&[(
        "members",
        Value::from(vec!["ada", "grace", "linus"]),
    )]);
    assert_eq!(
        render(&engine, ROOT, "stats", &members),
        "Total: 11; pages: 3; members: 3"
    );
}

#[test]
fn calc_over_data_is_evaluated_at_render_time() {
    let engine = single("pages", "{calc(({$total} + {$per} - 1) / {$per})}");
    let values = data(&[("total", Value::from(40)), ("per", Value::from(20))]);
    assert_eq!(render(&engine, ROOT, "pages", &values), "2.95");

    let zero = data(&[("total", Value::from(1)), ("per", Value::from(0))]);
    let err = engine
        .render_template(ROOT, ROOT, "pages", &zero, &DefaultHost::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::Render(RenderError::Arith(_))));
}

#[test]
fn malformed_sources_are_diagnosed() {
    let engine = single("blank", "");
    let cases = [
        ("{calc(\"2 +\")}", "malformed expression"),
        ("{phrase({$name})}", "phrase name must be a literal"),
        ("{shout(x)}", "unknown function 'shout'"),
        ("<tpl:include template=\"nowhere\" />", "does not exist"),
        ("<tpl:if is=\"{$a}\">open", "unclosed"),
    ];
    for (source, expected) in cases {
        let diagnostics = engine.validate_template("edited", source, ROOT);
        assert!(!diagnostics.is_empty(), "{source}");
        assert!(
            diagnostics[0].message.to_lowercase().contains(expected),
            "{source}: {}",
            diagnostics[0].message
        );
        assert_eq!(diagnostics[0].template, "edited");
        assert!(diagnostics[0].line >= 1);
    }
    assert!(
        engine
            .validate_template("edited", "Hi {$name}", ROOT)
            .is_empty()
    );
}

#[test]
fn include_cycles_fail_every_member() {
    let fixtures = TemplateFixtures::new();
    let engine = Engine::open(
        fixtures.store(&["cycle_a", "cycle_b"]),
        EngineConfig::default(),
    )
    .unwrap();
    let report = engine.rebuild_all().unwrap();

    for name in ["cycle_a", "cycle_b"] {
        let failure = report
            .failure(&ArtifactKey::template(ROOT, ROOT, name))
            .unwrap_or_else(|| panic!("{name} should fail"));
        assert!(failure.diagnostic.message.contains("circular include"));
    }
    assert!(engine.artifact_keys().is_empty());

    // validation does not follow includes, so each side looks fine alone
    let source = fixtures.source("cycle_a");
    assert!(
        engine
            .validate_template("cycle_a", &source, ROOT)
            .is_empty()
    );
    // a template naming itself is caught without following anything
    let diagnostics =
        engine.validate_template("cycle_a", "<tpl:include template=\"cycle_a\" />", ROOT);
    assert!(diagnostics[0].message.contains("circular include"));
}

#[test]
fn links_and_page_navigation_use_the_host() {
    let engine = single(
        "nav",
        concat!(
            "<a href=\"{link(forums, {$forum}, order=new)}\">go</a>",
            "{pagenav(forums, {$forum}, page={$page}, per_page=10, total={$total})}",
        ),
    );
    let host = DefaultHost::default().with_base_url("https://example.org");
    let values = data(&[
        ("forum", data(&[("id", Value::from(3))])),
        ("page", Value::from(2)),
        ("total", Value::from(25)),
    ]);
    let out = engine
        .render_template(ROOT, ROOT, "nav", &values, &host)
        .unwrap();

    assert!(out.starts_with("<a href=\"https://example.org/forums/3?order=new\">go</a>"));
    assert!(out.contains("<nav class=\"pagenav\">"));
    assert!(out.contains("<span class=\"current\">2</span>"));
    assert!(out.contains("href=\"https://example.org/forums/3?page=3\""));
    assert!(out.contains("href=\"https://example.org/forums/3\""));
}

#[test]
fn helpers_are_called_with_raw_arguments() {
    let engine = single("avatar", "{helper(avatar, {$user.name}, small)}");
    let host = DefaultHost::default().with_helper(
        "avatar",
        |args: &[Value]| {
            let names: Vec<String> = args.iter().map(Value::to_string).collect();
            format!("<img alt=\"{}\">", names.join(" "))
        },
    );
    let values = data(&[("user", data(&[("name", Value::from("<Ada>"))]))]);
    assert_eq!(
        engine
            .render_template(ROOT, ROOT, "avatar", &values, &host)
            .unwrap(),
        "<img alt=\"<Ada> small\">"
    );

    // unknown helpers render nothing
    assert_eq!(
        engine
            .render_template(ROOT, ROOT, "avatar", &values, &DefaultHost::default())
            .unwrap(),
        ""
    );
}
