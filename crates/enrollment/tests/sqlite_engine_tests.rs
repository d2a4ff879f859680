//! Enrollment engine against the SQLite backend, which also serves as the
//! durable audit sink.

mod common;

use std::sync::Arc;

use registrar_enrollment::{
    AdminEnrollRequest, ConflictKind, DropRequest, EnrollRequest, EnrollmentEngine,
    EnrollmentError, TenantContextManager,
};
use registrar_persistence::backends::sqlite::SqliteBackend;
use registrar_persistence::core::RecordStorage;
use registrar_persistence::types::EnrollmentStatus;

use common::{Campus, add_course, immediate_config, seed_campus};

async fn setup() -> (EnrollmentEngine<SqliteBackend>, Arc<SqliteBackend>, Campus) {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    let store = Arc::new(backend);
    let campus = seed_campus(store.as_ref()).await;
    let engine = EnrollmentEngine::new(store.clone(), store.clone(), immediate_config(3));
    (engine, store, campus)
}

#[tokio::test]
async fn test_enroll_drop_reenroll() {
    let (engine, store, campus) = setup().await;
    let request = EnrollRequest::new(
        campus.alice.clone(),
        "inst-a",
        Campus::CS101,
        Campus::SEMESTER,
        Campus::YEAR,
    );

    let first = engine.enroll(&request).await.unwrap();
    assert_eq!(first.version(), 1);
    assert_eq!(first.course_snapshot().code, "CS101");

    let duplicate = engine.enroll(&request).await.unwrap_err();
    assert_eq!(duplicate.conflict_kind(), Some(ConflictKind::AlreadyEnrolled));

    engine
        .drop_enrollment(&DropRequest::new(campus.alice.clone(), "inst-a", Campus::CS101))
        .await
        .unwrap();
    engine.enroll(&request).await.unwrap();

    let rows = store
        .enrollments_for_student(&campus.inst_a, Campus::ALICE_STUDENT)
        .await
        .unwrap();
    let statuses: Vec<_> = rows.iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![EnrollmentStatus::Dropped, EnrollmentStatus::Enrolled]
    );

    let student = store
        .read_student(&campus.inst_a, Campus::ALICE_STUDENT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.total_credits(), 4);

    // Enroll, drop, enroll: three committed roster changes after creation
    let course = store
        .read_course(&campus.inst_a, Campus::CS101)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.version(), 4);
    assert_eq!(course.enrolled_count(), 1);
}

#[tokio::test]
async fn test_course_snapshot_survives_course_edits() {
    let (engine, store, campus) = setup().await;
    let enrollment = engine
        .enroll(&EnrollRequest::new(
            campus.alice.clone(),
            "inst-a",
            Campus::CS101,
            Campus::SEMESTER,
            Campus::YEAR,
        ))
        .await
        .unwrap();

    let rows = store
        .enrollments_for_course(&campus.inst_a, Campus::CS101)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id(), enrollment.id());
    assert_eq!(rows[0].course_snapshot(), enrollment.course_snapshot());
    assert_eq!(rows[0].credits(), 4);
}

#[tokio::test]
async fn test_audit_channels_are_persisted() {
    let (engine, store, campus) = setup().await;
    add_course(store.as_ref(), &campus.inst_a, "tiny", 1, 0).await;

    // Denied: Bob is not a member of A
    let err = engine
        .enroll(&EnrollRequest::new(
            campus.bob.clone(),
            "inst-a",
            Campus::CS101,
            Campus::SEMESTER,
            Campus::YEAR,
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EnrollmentError::AccessDenied);
    assert_eq!(store.access_audit_count().unwrap(), 1);

    // A zero-seat course can only be filled by an override
    let outcome = engine
        .admin_enroll(&AdminEnrollRequest::new(
            campus.registrar.clone(),
            "inst-a",
            Campus::ALICE_STUDENT,
            "tiny",
            Campus::SEMESTER,
            Campus::YEAR,
        ))
        .await
        .unwrap();
    assert!(outcome.was_over_capacity);
    assert_eq!(store.override_audit_count().unwrap(), 1);
    // The denial plus the gate decision for the override
    assert_eq!(store.access_audit_count().unwrap(), 2);
}

#[tokio::test]
async fn test_context_switch_against_sqlite_directory() {
    let (engine, store, campus) = setup().await;
    store
        .put_membership(registrar_persistence::tenant::Membership::active(
            campus.alice.clone(),
            campus.inst_b.clone(),
            registrar_persistence::tenant::MembershipRole::Student,
        ))
        .await
        .unwrap();
    let manager = TenantContextManager::new(engine.validator().clone());

    manager
        .establish_context(&campus.alice, &campus.inst_a)
        .await
        .unwrap();
    manager
        .switch_context(&campus.alice, &campus.inst_b)
        .await
        .unwrap();

    assert!(
        manager
            .get_current_context(&campus.alice, &campus.inst_a)
            .await
            .is_none()
    );
    let ctx = manager
        .require_context(&campus.alice, &campus.inst_b)
        .await
        .unwrap();
    assert_eq!(ctx.institution_id(), &campus.inst_b);
}
