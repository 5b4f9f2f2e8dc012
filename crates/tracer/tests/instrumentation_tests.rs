// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! End-to-end tests: application → Database → instrumented driver → mock

use std::path::Path;
use std::sync::Arc;

use isutrace::{ManualClock, Tracer, TracerConfig, register_instrumentation};
use isutrace_driver::{Database, DriverError, DriverRegistry, NamedValue};
use isutrace_test_utils::{MockCall, MockDriver};

const LIST_USERS: &str = "SELECT   *\nFROM users  /* list-users */ WHERE id = ?";

fn sql_lines(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("sql.log"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// A registry holding `mock`, already instrumented for `tracer`
fn instrumented(mock: MockDriver, tracer: &Arc<Tracer>) -> DriverRegistry {
    let registry = DriverRegistry::new();
    registry.register("mock", Arc::new(mock)).unwrap();
    assert_eq!(register_instrumentation(&registry, tracer), vec!["mock:logger"]);
    registry
}

fn manual_tracer(dir: &Path, clock: &Arc<ManualClock>) -> Arc<Tracer> {
    Tracer::builder()
        .with_config(TracerConfig::default().with_output_dir(dir))
        .with_clock(clock.clone())
        .build()
}

#[tokio::test]
async fn test_query_through_instrumented_driver() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1000));
    let tracer = manual_tracer(dir.path(), &clock);

    let driver_clock = clock.clone();
    let mock = MockDriver::builder()
        .with_call_hook(move |_| driver_clock.advance(1_500_000))
        .build();
    let registry = instrumented(mock, &tracer);

    tracer.start();
    let mut db = Database::open(&registry, "mock:logger", "mem://")
        .await
        .unwrap();
    db.query(LIST_USERS, &NamedValue::from_values([7])).await.unwrap();
    db.close().await.unwrap();
    tracer.stop();

    assert_eq!(
        sql_lines(dir.path()),
        vec!["1000\t1500000\tlist-users\tSELECT * FROM users"]
    );
}

#[tokio::test]
async fn test_uninstrumented_name_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1));
    let tracer = manual_tracer(dir.path(), &clock);
    let registry = instrumented(MockDriver::new(), &tracer);

    tracer.start();
    let mut db = Database::open(&registry, "mock", "").await.unwrap();
    db.exec("DELETE FROM sessions", &[]).await.unwrap();
    tracer.stop();

    assert!(sql_lines(dir.path()).is_empty());
}

#[tokio::test]
async fn test_skip_fallback_records_once() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(50));
    let tracer = manual_tracer(dir.path(), &clock);
    let mock = MockDriver::builder().skip_fast_path().build();
    let registry = instrumented(mock.clone(), &tracer);

    tracer.start();
    let mut db = Database::open(&registry, "mock:logger", "").await.unwrap();
    db.exec("UPDATE /* bump */ users SET score = score + 1", &[])
        .await
        .unwrap();
    tracer.stop();

    assert_eq!(sql_lines(dir.path()), vec!["50\t0\tbump\tUPDATE"]);
    assert_eq!(
        mock.calls()[1..],
        [
            MockCall::FastPathSkipped("UPDATE /* bump */ users SET score = score + 1".to_string()),
            MockCall::Prepare("UPDATE /* bump */ users SET score = score + 1".to_string()),
            MockCall::StatementExec("UPDATE /* bump */ users SET score = score + 1".to_string()),
            MockCall::StatementClose("UPDATE /* bump */ users SET score = score + 1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_driver_error_is_returned_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(5));
    let tracer = manual_tracer(dir.path(), &clock);
    let err = DriverError::Execution("Duplicate entry '1' for key 'PRIMARY'".to_string());
    let mock = MockDriver::builder()
        .with_exec_outcome(Err(err.clone()))
        .build();
    let registry = instrumented(mock, &tracer);

    tracer.start();
    let mut db = Database::open(&registry, "mock:logger", "").await.unwrap();
    let result = db.exec("INSERT INTO users (id) VALUES (1)", &[]).await;
    tracer.stop();

    assert_eq!(result, Err(err));
    assert_eq!(
        sql_lines(dir.path()),
        vec!["5\t0\t\tINSERT INTO users (id) VALUES (1)"]
    );
}

#[tokio::test]
async fn test_idle_tracer_is_transparent() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1));
    let tracer = manual_tracer(dir.path(), &clock);
    let mock = MockDriver::new();
    let registry = instrumented(mock.clone(), &tracer);

    let mut db = Database::open(&registry, "mock:logger", "dsn").await.unwrap();
    db.begin().await.unwrap();
    db.exec("DELETE FROM t", &[]).await.unwrap();
    db.commit().await.unwrap();
    db.ping().await.unwrap();
    db.close().await.unwrap();

    assert!(!dir.path().join("sql.log").exists());
    assert_eq!(
        mock.calls(),
        vec![
            MockCall::Open("dsn".to_string()),
            MockCall::Begin,
            MockCall::Exec("DELETE FROM t".to_string()),
            MockCall::Commit,
            MockCall::Ping,
            MockCall::Close,
        ]
    );
}

#[tokio::test]
async fn test_sessions_split_records() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000_000_000));
    let tracer = Tracer::builder()
        .with_config(
            TracerConfig::default()
                .with_output_dir(dir.path())
                .with_session_dirs(true),
        )
        .with_clock(clock.clone())
        .build();
    let registry = instrumented(MockDriver::new(), &tracer);
    let mut db = Database::open(&registry, "mock:logger", "").await.unwrap();

    let first = tracer.start();
    db.query("SELECT /* one */ 1", &[]).await.unwrap();
    clock.advance(2_000_000_000);
    let second = tracer.start();
    db.query("SELECT /* two */ 2", &[]).await.unwrap();
    tracer.stop();
    db.query("SELECT /* three */ 3", &[]).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(
        sql_lines(&dir.path().join(&first)),
        vec!["1700000000000000000\t0\tone\tSELECT"]
    );
    assert_eq!(
        sql_lines(&dir.path().join(&second)),
        vec!["1700000002000000000\t0\ttwo\tSELECT"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_queries_while_toggling() {
    let dir = tempfile::tempdir().unwrap();
    let tracer = Tracer::new(TracerConfig::default().with_output_dir(dir.path()));
    let registry = Arc::new(instrumented(MockDriver::new(), &tracer));

    let mut workers = Vec::new();
    for worker in 0..8 {
        let registry = registry.clone();
        workers.push(tokio::spawn(async move {
            let mut db = Database::open(&registry, "mock:logger", "").await.unwrap();
            for i in 0..200 {
                let query = format!("SELECT /* worker-{worker} */ {i}\n FROM\tdual");
                db.query(&query, &[]).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }

    let toggler = {
        let tracer = tracer.clone();
        tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                tracer.start();
                std::thread::yield_now();
                tracer.stop();
            }
            tracer.start();
        })
    };

    for worker in workers {
        worker.await.unwrap();
    }
    toggler.await.unwrap();
    tracer.stop();

    for line in sql_lines(dir.path()) {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 4, "malformed line: {line:?}");
        assert!(fields[0].parse::<i64>().is_ok());
        assert!(fields[1].parse::<i64>().unwrap() >= 0);
        assert!(fields[2].starts_with("worker-"));
        assert_eq!(fields[3], "SELECT");
    }
}
