//! Reconciliation Performance Benchmarks
//!
//! Measures the pure planning path and one full reconcile call:
//! - Normalizing a raw grant list
//! - Diffing desired against current state (with and without bundle privileges)
//! - Check-mode reconcile against an in-memory dictionary

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use privsync::normalize::privilege_set;
use privsync::{compute_diff, converge_plan, normalize_list, Principal, PrincipalKind};

fn bench_normalize(c: &mut Criterion) {
    let raw = vec![
        "['connect', 'resource']".to_string(),
        "create session, create table, create view".to_string(),
        "  unlimited   tablespace ".to_string(),
    ];

    c.bench_function("normalize_grant_list", |b| {
        b.iter(|| normalize_list(black_box(&raw)).unwrap());
    });
}

fn bench_diff(c: &mut Criterion) {
    let desired = privilege_set(["CREATE SESSION", "CREATE TABLE", "CREATE VIEW", "APP_READER"]);
    let roles = privilege_set(["APP_READER", "APP_WRITER"]);
    let sys = privilege_set(["CREATE SESSION", "CREATE SEQUENCE", "UNLIMITED TABLESPACE"]);
    let scott = Principal::new(PrincipalKind::Schema, "scott").unwrap();

    c.bench_function("diff_and_plan", |b| {
        b.iter(|| {
            let diff = compute_diff(black_box(&desired), black_box(&roles), black_box(&sys));
            converge_plan(&scott, diff).sql()
        });
    });

    let bundle = privilege_set(["CONNECT", "RESOURCE"]);
    c.bench_function("diff_bundle", |b| {
        b.iter(|| compute_diff(black_box(&bundle), black_box(&roles), black_box(&sys)));
    });
}

#[cfg(feature = "sqlite")]
fn bench_check_mode_reconcile(c: &mut Criterion) {
    use privsync::{Capabilities, DesiredState, ReconcileRequest, Reconciler, SqliteSession};

    let mut session = SqliteSession::in_memory().unwrap();
    session.init_catalog().unwrap();
    session.create_user("scott").unwrap();
    session.execute_sql("GRANT CONNECT, CREATE VIEW TO SCOTT").unwrap();

    let request = ReconcileRequest::new(
        Principal::new(PrincipalKind::Schema, "scott").unwrap(),
        Some(vec!["create session".into(), "create table".into()]),
        DesiredState::Present,
    );

    // Create tokio runtime for async operations
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("sqlite_reconcile_check_mode", |b| {
        b.iter(|| {
            let outcome = runtime.block_on(
                Reconciler::new(&mut session, Capabilities::check_only()).run(black_box(&request)),
            );
            assert!(outcome.is_changed());
            outcome
        });
    });
}

#[cfg(feature = "sqlite")]
criterion_group!(benches, bench_normalize, bench_diff, bench_check_mode_reconcile);

#[cfg(not(feature = "sqlite"))]
criterion_group!(benches, bench_normalize, bench_diff);

criterion_main!(benches);
