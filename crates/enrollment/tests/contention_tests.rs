//! Many students racing for a handful of seats.
//!
//! Every racer is a distinct, eligible student, so the only reasons to fail
//! are a full course or an exhausted retry budget. The retry budget used here
//! is larger than the number of seats, and a racer can only lose a commit to
//! someone who took a seat, so nobody should run out of attempts.

mod common;

use std::sync::Arc;

use registrar_enrollment::{
    ConflictKind, EnrollRequest, EnrollmentEngine, EnrollmentError, EnrollmentStore,
};
use registrar_persistence::backends::memory::{MemoryAuditSink, MemoryStore};
use registrar_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
use registrar_persistence::core::{AuditSink, RecordStorage};
use registrar_persistence::types::TenantScoped;

use common::{Campus, add_course, add_students, contention_config, seed_campus};

#[derive(Debug, Default)]
struct Tally {
    created: usize,
    full: usize,
    exhausted: usize,
}

async fn race<S>(store: Arc<S>, audit: Arc<dyn AuditSink>, racers: usize, seats: u32) -> Tally
where
    S: EnrollmentStore + RecordStorage + 'static,
{
    let campus = seed_campus(store.as_ref()).await;
    add_course(store.as_ref(), &campus.inst_a, "popular", 3, seats).await;
    let principals = add_students(store.as_ref(), &campus.inst_a, "racer", racers).await;

    let engine = EnrollmentEngine::new(store.clone(), audit, contention_config(10));
    let mut handles = Vec::with_capacity(racers);
    for principal in principals {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let request =
                EnrollRequest::new(principal, "inst-a", "popular", Campus::SEMESTER, Campus::YEAR);
            engine.enroll(&request).await
        }));
    }

    let mut tally = Tally::default();
    for handle in handles {
        match handle.await.expect("racer panicked") {
            Ok(_) => tally.created += 1,
            Err(e) if e.conflict_kind() == Some(ConflictKind::CourseFull) => tally.full += 1,
            Err(EnrollmentError::ConcurrencyExhausted { .. }) => tally.exhausted += 1,
            Err(other) => panic!("unexpected outcome: {:?}", other),
        }
    }

    let course = store
        .read_course(&campus.inst_a, "popular")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.enrolled_count(), tally.created);
    assert!(course.enrolled_count() <= seats as usize);

    let rows = store
        .enrollments_for_course(&campus.inst_a, "popular")
        .await
        .unwrap();
    assert_eq!(rows.len(), tally.created);
    for row in &rows {
        assert!(row.is_enrolled());
        let student = store
            .read_student(&campus.inst_a, row.student_id())
            .await
            .unwrap()
            .expect("enrolled student exists");
        assert_eq!(student.institution_id(), row.institution_id());
        assert_eq!(student.total_credits(), row.credits());
    }

    tally
}

fn assert_exact(tally: &Tally, racers: usize, seats: u32) {
    assert_eq!(tally.exhausted, 0, "{:?}", tally);
    assert_eq!(tally.created, racers.min(seats as usize), "{:?}", tally);
    assert_eq!(tally.created + tally.full, racers, "{:?}", tally);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_no_overbooking() {
    let store = Arc::new(MemoryStore::new());
    let tally = race(store, Arc::new(MemoryAuditSink::new()), 24, 5).await;
    assert_exact(&tally, 24, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_more_seats_than_racers() {
    let store = Arc::new(MemoryStore::new());
    let tally = race(store, Arc::new(MemoryAuditSink::new()), 6, 10).await;
    assert_exact(&tally, 6, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_file_no_overbooking() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteBackendConfig {
        max_connections: 4,
        ..Default::default()
    };
    let backend = SqliteBackend::with_config(dir.path().join("race.db"), config).unwrap();
    backend.init_schema().unwrap();
    let store = Arc::new(backend);

    let tally = race(store.clone(), store.clone(), 12, 4).await;
    assert_exact(&tally, 12, 4);
}
