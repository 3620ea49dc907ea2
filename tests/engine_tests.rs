//! Resolution, cascade and administrative edits through the engine facade.


use test_harness::*;
use vellum::{
    ArtifactKey, DefaultHost, Engine, EngineConfig, EngineError, EntityKind, FailurePolicy,
    MemoryStore, RenderError, Resolution, Store, StoreError, TreeError, TreeKind, Value,
};

/// Styles: root <- 1 <- 2, with `greeting` defined at the root.
fn greeting_store() -> MemoryStore {
    MemoryStore::new()
        .with_position(TreeKind::Style, p(1), ROOT)
        .with_position(TreeKind::Style, p(2), p(1))
        .with_template(ROOT, "greeting", "Hello {$name}!")
}

fn key(style: u32, name: &str) -> ArtifactKey {
    ArtifactKey::template(p(style), ROOT, name)
}

fn name(value: &str) -> Value {
    data(&[("name", Value::from(value))])
}

fn defined_at(engine: &Engine<MemoryStore>, name: &str, position: u32) -> vellum::DefinitionId {
    engine
        .store()
        .definition_at(EntityKind::Template, name, p(position))
        .unwrap()
        .expect("definition exists")
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn descendants_inherit_the_nearest_definition() {
    let engine = open(greeting_store());
    let root = defined_at(&engine, "greeting", 0);

    for style in [0, 1, 2] {
        assert_eq!(
            engine.resolve(EntityKind::Template, "greeting", p(style)),
            Resolution::Found(root)
        );
        assert_eq!(
            render(&engine, p(style), "greeting", &name("<b>")),
            "Hello &lt;b&gt;!"
        );
    }
    assert_eq!(
        engine
            .get_effective_text(EntityKind::Template, "greeting", p(2))
            .unwrap()
            .as_deref(),
        Some("Hello {$name}!")
    );
}

#[test]
fn unknown_names_are_unresolved() {
    let engine = open(greeting_store());
    assert_eq!(
        engine.resolve(EntityKind::Template, "missing", p(2)),
        Resolution::Unresolved
    );
    assert!(
        engine
            .get_compiled_template(p(2), ROOT, "missing")
            .is_none()
    );
    assert!(
        engine
            .get_effective_text(EntityKind::Phrase, "missing", ROOT)
            .unwrap()
            .is_none()
    );

    let err = engine
        .render_template(p(2), ROOT, "missing", &Value::Null, &DefaultHost::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::Render(RenderError::MissingArtifact(_))));
}

#[test]
fn rebuild_is_idempotent() {
    let engine = open(greeting_store());
    let keys = engine.artifact_keys();
    let first = render(&engine, p(2), "greeting", &name("Ada"));

    let report = engine.rebuild_all().unwrap();
    assert!(report.is_clean());
    assert!(report.removed.is_empty());
    assert_eq!(recompiled_keys(&report), keys);
    assert_eq!(engine.artifact_keys(), keys);
    assert_eq!(render(&engine, p(2), "greeting", &name("Ada")), first);
}

// ============================================================================
// Cascades
// ============================================================================

#[test]
fn override_recompiles_exactly_the_overridden_subtree() {
    let engine = open(greeting_store());
    let before = generations(&engine);

    let report = engine
        .save_template(p(1), "greeting", "Hi {$name}")
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(
        recompiled_keys(&report),
        vec![key(1, "greeting"), key(2, "greeting")]
    );
    assert_eq!(
        changed(&before, &generations(&engine)),
        vec![key(1, "greeting"), key(2, "greeting")]
    );

    let s1 = defined_at(&engine, "greeting", 1);
    assert_eq!(
        engine.resolve(EntityKind::Template, "greeting", p(2)),
        Resolution::Found(s1)
    );
    assert_eq!(
        render(&engine, p(2), "greeting", &name("<b>")),
        "Hi &lt;b&gt;"
    );
    assert_eq!(
        render(&engine, ROOT, "greeting", &name("<b>")),
        "Hello &lt;b&gt;!"
    );
}

#[test]
fn editing_a_shadowed_definition_leaves_overrides_alone() {
    let engine = open(greeting_store());
    engine
        .save_template(p(1), "greeting", "Hi {$name}")
        .unwrap();
    let before = generations(&engine);

    let report = engine
        .save_template(ROOT, "greeting", "Hey {$name}")
        .unwrap();
    assert_eq!(recompiled_keys(&report), vec![key(0, "greeting")]);
    assert_eq!(
        changed(&before, &generations(&engine)),
        vec![key(0, "greeting")]
    );
    assert_eq!(render(&engine, p(2), "greeting", &name("x")), "Hi x");
    assert_eq!(render(&engine, ROOT, "greeting", &name("x")), "Hey x");
}

#[test]
fn include_edits_reach_includers_at_affected_styles() {
    let store = MemoryStore::new()
        .with_position(TreeKind::Style, p(1), ROOT)
        .with_template(ROOT, "header", "<h1>{$title}</h1>")
        .with_template(
            ROOT,
            "page",
            "<tpl:include template=\"header\" /><main>body</main>",
        )
        .with_template(ROOT, "about", "about us");
    let engine = open(store);
    let before = generations(&engine);

    let report = engine
        .save_template(p(1), "header", "<h2>{$title}</h2>")
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(
        recompiled_keys(&report),
        vec![key(1, "header"), key(1, "page")]
    );
    assert_eq!(
        changed(&before, &generations(&engine)),
        vec![key(1, "header"), key(1, "page")]
    );

    let title = data(&[("title", Value::from("Forum"))]);
    assert_eq!(
        render(&engine, p(1), "page", &title),
        "<h2>Forum</h2><main>body</main>"
    );
    assert_eq!(
        render(&engine, ROOT, "page", &title),
        "<h1>Forum</h1><main>body</main>"
    );
}

#[test]
fn phrase_edits_reach_templates_in_that_language() {
    let de = p(7);
    let store = MemoryStore::new()
        .with_position(TreeKind::Language, de, ROOT)
        .with_phrase(ROOT, "welcome", "Welcome")
        .with_template(ROOT, "home", "<p>{phrase(welcome)}</p>");
    let engine = open(store);
    let host = DefaultHost::default();

    let report = engine.save_phrase(de, "welcome", "Willkommen").unwrap();
    assert!(report.is_clean());
    assert_eq!(
        recompiled_keys(&report),
        vec![
            ArtifactKey::template(ROOT, de, "home"),
            ArtifactKey::phrase(de, "welcome"),
        ]
    );

    let render_home = |language| {
        engine
            .render_template(ROOT, language, "home", &Value::Null, &host)
            .unwrap()
    };
    assert_eq!(render_home(de), "<p>Willkommen</p>");
    assert_eq!(render_home(ROOT), "<p>Welcome</p>");
    assert_eq!(
        engine
            .render(&ArtifactKey::phrase(de, "welcome"), &Value::Null, &host)
            .unwrap(),
        "Willkommen"
    );
}

#[test]
fn missing_include_is_retried_when_created() {
    let store =
        MemoryStore::new().with_template(ROOT, "page", "A<tpl:include template=\"sidebar\" />B");
    let engine = Engine::open(store, EngineConfig::default()).unwrap();

    let report = engine.rebuild_all().unwrap();
    let failure = report.failure(&key(0, "page")).expect("page fails");
    assert!(failure.diagnostic.message.contains("sidebar"));
    assert!(engine.get_compiled(&key(0, "page")).is_none());

    let report = engine.save_template(ROOT, "sidebar", "[side]").unwrap();
    assert!(report.is_clean());
    assert_eq!(
        recompiled_keys(&report),
        vec![key(0, "page"), key(0, "sidebar")]
    );
    assert_eq!(render(&engine, ROOT, "page", &Value::Null), "A[side]B");
}

#[test]
fn dependency_failures_keep_the_last_good_output() {
    let store = MemoryStore::new()
        .with_template(ROOT, "header", "H")
        .with_template(ROOT, "page", "<tpl:include template=\"header\" />P");
    let config = EngineConfig {
        validate_on_save: false,
        ..EngineConfig::default()
    };
    let engine = open_with(store, config);
    let before = generations(&engine);

    let report = engine.save_template(ROOT, "header", "{nope(x)}").unwrap();
    assert!(report.recompiled.is_empty());
    assert!(report.failure(&key(0, "header")).unwrap().direct);
    let page = report.failure(&key(0, "page")).unwrap();
    assert!(!page.direct);
    assert_eq!(page.diagnostic.template, "header");
    assert!(page.diagnostic.message.contains("unknown function 'nope'"));

    let artifact = engine.get_compiled(&key(0, "page")).unwrap();
    assert!(artifact.is_stale());
    assert_eq!(generations(&engine), before);
    assert_eq!(render(&engine, ROOT, "page", &Value::Null), "HP");

    // fixing the include recovers both artifacts
    let report = engine.save_template(ROOT, "header", "H2").unwrap();
    assert!(report.is_clean());
    assert!(!engine.get_compiled(&key(0, "page")).unwrap().is_stale());
    assert_eq!(render(&engine, ROOT, "page", &Value::Null), "H2P");
}

#[test]
fn stale_artifacts_still_track_every_include() {
    let store = MemoryStore::new()
        .with_template(ROOT, "a", "A")
        .with_template(ROOT, "b", "B")
        .with_template(
            ROOT,
            "page",
            "<tpl:include template=\"a\" /><tpl:include template=\"b\" />",
        );
    let config = EngineConfig {
        validate_on_save: false,
        ..EngineConfig::default()
    };
    let engine = open_with(store, config);

    // the failed compile stops at `a` but the kept code still reads `b`
    engine.save_template(ROOT, "a", "{nope(x)}").unwrap();
    let page = engine.get_compiled(&key(0, "page")).unwrap();
    assert!(page.is_stale());
    assert!(page.includes.contains("a") && page.includes.contains("b"));
    let persisted = engine
        .store()
        .artifacts()
        .unwrap()
        .into_iter()
        .find(|artifact| artifact.key == key(0, "page"))
        .unwrap();
    assert_eq!(persisted.includes, page.includes);

    let report = engine.save_template(ROOT, "b", "B2").unwrap();
    assert!(report.was_recompiled(&key(0, "b")));
    let failure = report.failure(&key(0, "page")).expect("page is revisited");
    assert!(!failure.direct);
    assert_eq!(render(&engine, ROOT, "page", &Value::Null), "AB");

    let report = engine.save_template(ROOT, "a", "A2").unwrap();
    assert!(report.is_clean());
    assert!(!engine.get_compiled(&key(0, "page")).unwrap().is_stale());
    assert_eq!(render(&engine, ROOT, "page", &Value::Null), "A2B2");
}

#[test]
fn invalidate_policy_drops_failed_dependents() {
    let store = MemoryStore::new()
        .with_template(ROOT, "header", "H")
        .with_template(ROOT, "page", "<tpl:include template=\"header\" />P");
    let config = EngineConfig {
        validate_on_save: false,
        failure_policy: FailurePolicy::Invalidate,
        ..EngineConfig::default()
    };
    let engine = open_with(store, config);

    let report = engine.save_template(ROOT, "header", "{nope(x)}").unwrap();
    assert_eq!(report.failures.len(), 2);
    assert!(engine.get_compiled(&key(0, "page")).is_none());
    assert!(engine.get_compiled(&key(0, "header")).is_none());
    assert_eq!(engine.store().artifact_count(), 0);
    assert_eq!(engine.stats().failed, 2);
}

#[test]
fn parallel_and_serial_cascades_agree() {
    let store = (1..=40).fold(
        MemoryStore::new().with_template(ROOT, "greeting", "Hello {$name}!"),
        |store, id| {
            let parent = if id % 5 == 1 { ROOT } else { p(id - 1) };
            let store = store.with_position(TreeKind::Style, p(id), parent);
            if id % 3 == 0 {
                store.with_template(p(id), "greeting", &format!("Hi #{id} {{$name}}"))
            } else {
                store
            }
        },
    );
    let snapshot = |config: EngineConfig| {
        let engine = open_with(store_clone(&store), config);
        engine
            .save_template(ROOT, "greeting", "Hey {$name}")
            .unwrap();
        let keys = engine.artifact_keys();
        let outputs: Vec<String> = (0..=40)
            .map(|id| render(&engine, p(id), "greeting", &name("Ada")))
            .collect();
        (keys, outputs)
    };

    let parallel = snapshot(EngineConfig {
        parallel: true,
        parallel_threshold: 1,
        ..EngineConfig::default()
    });
    let serial = snapshot(EngineConfig {
        parallel: false,
        ..EngineConfig::default()
    });
    assert_eq!(parallel, serial);
    assert_eq!(parallel.1[2], "Hey Ada");
    assert_eq!(parallel.1[5], "Hi #3 Ada");
    assert_eq!(parallel.1[7], "Hi #6 Ada");
}

#[test]
fn concurrent_edits_leave_every_artifact_current() {
    let styles = [ROOT, p(1), p(2), p(3)];
    let languages = [ROOT, p(7), p(8)];
    let store = MemoryStore::new()
        .with_position(TreeKind::Style, p(1), ROOT)
        .with_position(TreeKind::Style, p(2), p(1))
        .with_position(TreeKind::Style, p(3), ROOT)
        .with_position(TreeKind::Language, p(7), ROOT)
        .with_position(TreeKind::Language, p(8), p(7))
        .with_template(ROOT, "greeting", "{phrase(hello)} there")
        .with_template(ROOT, "page", "<tpl:include template=\"greeting\" />!")
        .with_phrase(ROOT, "hello", "Hello");
    let engine = open_with(
        store,
        EngineConfig {
            parallel: true,
            parallel_threshold: 2,
            ..EngineConfig::default()
        },
    );

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let engine = &engine;
            scope.spawn(move || {
                for round in 0..12 {
                    let style = styles[(worker + round) % styles.len()];
                    let language = languages[(worker * 2 + round) % languages.len()];
                    let source = format!("{{phrase(hello)}} from {worker}.{round}");
                    engine.save_template(style, "greeting", &source).unwrap();
                    let text = format!("Hi {worker}.{round}");
                    engine.save_phrase(language, "hello", &text).unwrap();
                }
            });
        }
    });

    let host = DefaultHost::default();
    let effective = |kind, name, position| {
        engine
            .get_effective_text(kind, name, position)
            .unwrap()
            .expect("defined at the root")
    };
    for language in engine.positions(TreeKind::Language) {
        let text = effective(EntityKind::Phrase, "hello", language);
        let phrase = ArtifactKey::phrase(language, "hello");
        assert_eq!(engine.render(&phrase, &Value::Null, &host).unwrap(), text);

        for style in engine.positions(TreeKind::Style) {
            let source = effective(EntityKind::Template, "greeting", style);
            let expected = source.replace("{phrase(hello)}", &text);
            for (name, suffix) in [("greeting", ""), ("page", "!")] {
                let artifact = engine.get_compiled_template(style, language, name).unwrap();
                assert!(!artifact.is_stale(), "{}", artifact.key);
                let out = engine.render(&artifact.key, &Value::Null, &host).unwrap();
                assert_eq!(out, format!("{expected}{suffix}"), "{}", artifact.key);
            }
        }
    }
}

/// A fresh store with the same trees and definitions.
fn store_clone(store: &MemoryStore) -> MemoryStore {
    let mut copy = MemoryStore::new();
    for tree in [TreeKind::Style, TreeKind::Language] {
        for node in store.load_tree(tree).unwrap() {
            if let Some(parent) = node.parent {
                copy = copy.with_position(tree, node.id, parent);
            }
        }
    }
    for (name, position, id) in store.all_definitions(EntityKind::Template).unwrap() {
        let source = store.load_template(id).unwrap().source;
        copy = copy.with_template(position, &name, &source);
    }
    copy
}

// ============================================================================
// Definition and position edits
// ============================================================================

#[test]
fn deleting_falls_back_then_unresolves() {
    let engine = open(greeting_store());
    engine
        .save_template(p(1), "greeting", "Hi {$name}")
        .unwrap();

    let report = engine
        .delete_definition(EntityKind::Template, "greeting", p(1))
        .unwrap();
    assert_eq!(
        recompiled_keys(&report),
        vec![key(1, "greeting"), key(2, "greeting")]
    );
    assert_eq!(render(&engine, p(2), "greeting", &name("x")), "Hello x!");

    let report = engine
        .delete_definition(EntityKind::Template, "greeting", ROOT)
        .unwrap();
    assert!(report.recompiled.is_empty());
    for style in [0, 1, 2] {
        assert!(report.was_removed(&key(style, "greeting")));
    }
    assert!(engine.artifact_keys().is_empty());
    assert_eq!(
        engine.resolve(EntityKind::Template, "greeting", p(2)),
        Resolution::Unresolved
    );

    let err = engine
        .delete_definition(EntityKind::Template, "greeting", ROOT)
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::NotDefinedAt { .. })));
}

#[test]
fn rejected_sources_are_not_persisted() {
    let engine = open(greeting_store());
    let err = engine
        .save_template(ROOT, "greeting", "{phrase({$which})}")
        .unwrap_err();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(
        diagnostics[0]
            .message
            .contains("phrase name must be a literal")
    );
    assert_eq!(
        engine
            .get_effective_text(EntityKind::Template, "greeting", ROOT)
            .unwrap()
            .as_deref(),
        Some("Hello {$name}!")
    );
}

#[test]
fn reparenting_changes_what_a_subtree_inherits() {
    let store = MemoryStore::new()
        .with_position(TreeKind::Style, p(1), ROOT)
        .with_position(TreeKind::Style, p(2), ROOT)
        .with_template(ROOT, "greeting", "Hello {$name}!")
        .with_template(p(1), "greeting", "Hi {$name}");
    let engine = open(store);

    let report = engine
        .reparent_position(TreeKind::Style, p(2), p(1))
        .unwrap();
    assert_eq!(recompiled_keys(&report), vec![key(2, "greeting")]);
    assert_eq!(render(&engine, p(2), "greeting", &name("x")), "Hi x");
    assert_eq!(
        engine.chain(TreeKind::Style, p(2)).unwrap(),
        vec![ROOT, p(1), p(2)]
    );

    let node = engine
        .store()
        .load_tree(TreeKind::Style)
        .unwrap()
        .into_iter()
        .find(|node| node.id == p(2))
        .unwrap();
    assert_eq!(node.parent, Some(p(1)));
}

#[test]
fn reparenting_under_a_descendant_is_refused() {
    let engine = open(greeting_store());
    let err = engine
        .reparent_position(TreeKind::Style, p(1), p(2))
        .unwrap_err();
    assert!(matches!(err, EngineError::Tree(TreeError::Cycle { .. })));
    assert_eq!(
        engine.chain(TreeKind::Style, p(2)).unwrap(),
        vec![ROOT, p(1), p(2)]
    );

    let err = engine
        .add_position(TreeKind::Style, p(1), ROOT)
        .unwrap_err();
    assert!(matches!(err, EngineError::Tree(TreeError::DuplicatePosition { .. })));
}

#[test]
fn removing_a_position_promotes_its_children() {
    let engine = open(greeting_store());
    engine
        .save_template(p(1), "greeting", "Hi {$name}")
        .unwrap();

    let report = engine.remove_position(TreeKind::Style, p(1)).unwrap();
    assert!(report.was_removed(&key(1, "greeting")));
    assert_eq!(recompiled_keys(&report), vec![key(2, "greeting")]);
    assert_eq!(render(&engine, p(2), "greeting", &name("x")), "Hello x!");
    assert_eq!(
        engine.chain(TreeKind::Style, p(2)).unwrap(),
        vec![ROOT, p(2)]
    );

    let store = engine.store();
    assert!(
        store
            .definition_at(EntityKind::Template, "greeting", p(1))
            .unwrap()
            .is_none()
    );
    let nodes = store.load_tree(TreeKind::Style).unwrap();
    assert!(nodes.iter().all(|node| node.id != p(1)));
    assert_eq!(
        nodes.iter().find(|node| node.id == p(2)).unwrap().parent,
        Some(ROOT)
    );
}

#[test]
fn languages_come_and_go_with_their_artifacts() {
    let engine = open(greeting_store());
    let fr = p(3);

    engine.add_position(TreeKind::Language, fr, ROOT).unwrap();
    for style in [0, 1, 2] {
        assert!(
            engine
                .get_compiled_template(p(style), fr, "greeting")
                .is_some()
        );
    }

    let report = engine.remove_position(TreeKind::Language, fr).unwrap();
    assert_eq!(report.removed.len(), 3);
    assert!(engine.get_compiled_template(ROOT, fr, "greeting").is_none());
    assert!(
        engine
            .get_compiled_template(ROOT, ROOT, "greeting")
            .is_some()
    );
}
