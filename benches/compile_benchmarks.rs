//! Performance benchmarks for template parsing and cascade recompilation.
//!
//! - Parsing: the fixture templates, one at a time
//! - Rebuild: every artifact over a wide style tree
//! - Cascade: one root edit reaching every style, serial and parallel

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use vellum::{Engine, EngineConfig, MemoryStore, PositionId, TreeKind};
use vellum_parser::Parser;

const STYLES: u32 = 64;

fn parse_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/fixtures");

    let fixtures = [
        ("header", include_str!("../test_templates/header.tpl")),
        ("page", include_str!("../test_templates/page.tpl")),
        ("stats", include_str!("../test_templates/stats.tpl")),
    ];
    for (name, source) in fixtures {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let template = Parser::parse(black_box(source)).expect("fixture parses");
                black_box(template.segments.len())
            });
        });
    }

    group.finish();
}

/// A flat style tree with the forum fixtures at the root and an override of
/// `header` at every fourth style.
fn forum_store() -> MemoryStore {
    let store = MemoryStore::new()
        .with_template(
            PositionId::ROOT,
            "header",
            include_str!("../test_templates/header.tpl"),
        )
        .with_template(
            PositionId::ROOT,
            "footer",
            include_str!("../test_templates/footer.tpl"),
        )
        .with_template(
            PositionId::ROOT,
            "page",
            include_str!("../test_templates/page.tpl"),
        )
        .with_phrase(PositionId::ROOT, "tagline", "Talk about anything")
        .with_phrase(PositionId::ROOT, "copyright", "{year} Vellum")
        .with_phrase(PositionId::ROOT, "no_threads", "No threads yet.");
    (1..=STYLES).fold(store, |store, id| {
        let store = store.with_position(TreeKind::Style, PositionId(id), PositionId::ROOT);
        if id % 4 == 0 {
            store.with_template(PositionId(id), "header", "<header>{$site.title}</header>")
        } else {
            store
        }
    })
}

fn open(config: EngineConfig) -> Engine<MemoryStore> {
    let engine = Engine::open(forum_store(), config).expect("engine opens");
    engine.rebuild_all().expect("rebuild succeeds");
    engine
}

fn rebuild_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/rebuild");
    group.sample_size(20);

    for (label, parallel) in [("serial", false), ("parallel", true)] {
        let engine = open(EngineConfig {
            parallel,
            ..EngineConfig::default()
        });
        group.bench_function(label, |b| {
            b.iter(|| black_box(engine.rebuild_all().expect("rebuild succeeds").recompiled.len()));
        });
    }

    group.finish();
}

fn cascade_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/cascade");

    for (label, parallel) in [("serial", false), ("parallel", true)] {
        let engine = open(EngineConfig {
            parallel,
            parallel_threshold: 8,
            ..EngineConfig::default()
        });
        let sources = [
            "<footer>{$year}</footer>",
            "<footer>{phrase(copyright, year={$year})}</footer>",
        ];
        let mut flip = 0;
        group.bench_function(label, |b| {
            b.iter(|| {
                flip ^= 1;
                let report = engine
                    .save_template(PositionId::ROOT, "footer", sources[flip])
                    .expect("edit applies");
                black_box(report.recompiled.len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    parse_benchmarks,
    rebuild_benchmarks,
    cascade_benchmarks
);
criterion_main!(benches);
