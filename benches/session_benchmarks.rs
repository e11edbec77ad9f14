//! Benchmarks for session reducers and selection handling.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use neoscribe_core::export::{ExportIntent, ExportPolicy};
use neoscribe_core::{Collaborators, EngineEvent, SessionConfig, SessionController, SessionEvent};
use neoscribe_tabs::{LineSelection, Session, TabDescriptor, TabPatch};

/// Builds a session holding `tabs` file tabs.
fn session_with(tabs: usize) -> Session {
    let mut session = Session::with_capacity(TabDescriptor::file("/data/0.log", "0.log"), tabs);
    for i in 1..tabs {
        let (next, _) = session
            .open(TabDescriptor::file(format!("/data/{}.log", i), format!("{}.log", i)))
            .unwrap();
        session = next;
    }
    session
}

/// Benchmarks open, including the duplicate-path lookup.
fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("open");

    for size in [1, 5, 10].iter() {
        let session = session_with(*size);
        let capacity = Session::with_capacity(TabDescriptor::file("/x", "x"), size + 1);

        group.bench_with_input(BenchmarkId::new("existing_path", size), &session, |b, session| {
            b.iter(|| {
                let result = session.open(black_box(TabDescriptor::file("/data/0.log", "0.log")));
                black_box(result)
            })
        });

        group.bench_with_input(BenchmarkId::new("new_path", size), &capacity, |b, session| {
            b.iter(|| {
                let result = session.open(black_box(TabDescriptor::file("/data/new.log", "new.log")));
                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmarks patch and close on a full session.
fn bench_patch_close(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch_close");

    let session = session_with(10);
    let active = session.active_tab_id();
    let first = session.tabs()[0].id;

    group.bench_function("patch_selection", |b| {
        let selection = LineSelection {
            mode: true,
            count: 3,
            ..LineSelection::default()
        };
        b.iter(|| {
            let next = session.patch(active, black_box(TabPatch::selection(selection.clone())));
            black_box(next)
        })
    });

    group.bench_function("close_first", |b| {
        b.iter(|| black_box(session.close(black_box(first))))
    });

    group.finish();
}

/// Benchmarks export sizing decisions.
fn bench_export_policy(c: &mut Criterion) {
    let policy = ExportPolicy::default();

    c.bench_function("export_decide", |b| {
        b.iter(|| {
            for chars in [500usize, 300_000, 3_000_001] {
                black_box(policy.decide(ExportIntent::Share, black_box(chars)));
            }
        })
    });
}

/// Benchmarks a selection report travelling through the controller.
fn bench_selection_events(c: &mut Criterion) {
    let dir = std::env::temp_dir().join("neoscribe-bench");
    let (collaborators, _log) = Collaborators::headless(&dir);
    let mut controller = SessionController::new(
        SessionConfig::default(),
        TabDescriptor::file("/data/bench.log", "bench.log"),
        collaborators,
    );
    let tab = controller.snapshot().active_tab_id();

    c.bench_function("selection_changed", |b| {
        let mut count = 0usize;
        b.iter(|| {
            count = count % 5000 + 1;
            controller.handle(SessionEvent::Engine {
                tab,
                event: EngineEvent::SelectionChanged {
                    count,
                    total_line_count: 100_000,
                    indices: None,
                    range_start: Some(0),
                    range_count: Some(count),
                },
            });
        })
    });
}

criterion_group!(
    benches,
    bench_open,
    bench_patch_close,
    bench_export_policy,
    bench_selection_events,
);
criterion_main!(benches);
