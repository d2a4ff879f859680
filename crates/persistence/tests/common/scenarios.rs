//! Backend-independent scenarios.
//!
//! Each function seeds its own data and panics on the first failed assertion.

use std::sync::Arc;

use registrar_persistence::core::{DirectoryStorage, RecordStorage, Transaction, TransactionProvider};
use registrar_persistence::error::{StorageError, TenantError};
use registrar_persistence::types::{Enrollment, TenantScoped};

use super::fixtures::{Campus, seed_campus};

/// Reads never cross institutions, even when IDs collide.
pub async fn scoped_reads<S>(store: &S)
where
    S: DirectoryStorage + RecordStorage + TransactionProvider,
{
    let campus = seed_campus(store).await;

    let a = store
        .read_course(&campus.inst_a, Campus::COURSE)
        .await
        .unwrap()
        .unwrap();
    let b = store
        .read_course(&campus.inst_b, Campus::COURSE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.institution_id(), &campus.inst_a);
    assert_eq!(b.institution_id(), &campus.inst_b);
    assert_ne!(a.title(), b.title());

    assert!(
        store
            .read_student(&campus.inst_b, Campus::ALICE_STUDENT)
            .await
            .unwrap()
            .is_none()
    );

    let mut tx = store.begin_transaction(&campus.inst_b).await.unwrap();
    assert!(
        tx.read_student_for_principal(&campus.alice)
            .await
            .unwrap()
            .is_none()
    );
    let bob = tx
        .read_student_for_principal(&campus.bob)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.id(), Campus::BOB_STUDENT);

    assert!(
        store
            .membership(&campus.alice, &campus.inst_b)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .membership(&campus.alice, &campus.inst_a)
            .await
            .unwrap()
            .is_some_and(|m| m.is_active())
    );
}

/// Enroll then drop through transactions; totals and rosters follow.
pub async fn enroll_and_drop_cycle<S>(store: &S)
where
    S: DirectoryStorage + RecordStorage + TransactionProvider,
{
    let campus = seed_campus(store).await;
    let inst = &campus.inst_a;

    let mut tx = store.begin_transaction(inst).await.unwrap();
    let mut student = tx.read_student(Campus::ALICE_STUDENT).await.unwrap().unwrap();
    let mut course = tx.read_course(Campus::COURSE).await.unwrap().unwrap();
    let enrollment = Enrollment::enrolled(&student, &course, "fall", "2026-2027");
    student.add_course(course.id(), enrollment.credits());
    course.add_student(student.id());
    let staged = tx.stage_new_enrollment(&enrollment).await.unwrap();
    tx.stage_student(&student).await.unwrap();
    tx.stage_course(&course).await.unwrap();
    Box::new(tx).commit().await.unwrap();
    assert_eq!(staged.version(), 1);

    let student = store
        .read_student(inst, Campus::ALICE_STUDENT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.total_credits(), 4);
    assert!(student.enrolled_courses().contains(Campus::COURSE));

    let mut tx = store.begin_transaction(inst).await.unwrap();
    let mut active = tx
        .find_active_enrollment(Campus::ALICE_STUDENT, Campus::COURSE, Some("fall"))
        .await
        .unwrap()
        .unwrap();
    let mut student = tx.read_student(Campus::ALICE_STUDENT).await.unwrap().unwrap();
    let mut course = tx.read_course(Campus::COURSE).await.unwrap().unwrap();
    active.mark_dropped();
    student.remove_course(course.id(), active.credits());
    course.remove_student(student.id());
    tx.stage_enrollment(&active).await.unwrap();
    tx.stage_student(&student).await.unwrap();
    tx.stage_course(&course).await.unwrap();
    Box::new(tx).commit().await.unwrap();

    let student = store
        .read_student(inst, Campus::ALICE_STUDENT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.total_credits(), 0);
    let course = store.read_course(inst, Campus::COURSE).await.unwrap().unwrap();
    assert_eq!(course.enrolled_count(), 0);
    assert_eq!(course.version(), 3);

    let rows = store
        .enrollments_for_student(inst, Campus::ALICE_STUDENT)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_enrolled());
    assert!(rows[0].dropped_at().is_some());
    assert_eq!(rows[0].version(), 2);
}

/// Many writers race on one course; exactly the committed ones are visible.
pub async fn racing_writers<S>(store: Arc<S>, writers: usize)
where
    S: DirectoryStorage + RecordStorage + TransactionProvider + 'static,
{
    let campus = seed_campus(store.as_ref()).await;
    let inst = campus.inst_a.clone();

    let mut handles = Vec::new();
    for i in 0..writers {
        let store = Arc::clone(&store);
        let inst = inst.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin_transaction(&inst).await.unwrap();
            let mut course = tx.read_course(Campus::COURSE).await.unwrap().unwrap();
            tokio::task::yield_now().await;
            course.add_student(&format!("writer-{}", i));
            tx.stage_course(&course).await.unwrap();
            Box::new(tx).commit().await
        }));
    }

    let mut committed = 0u64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => committed += 1,
            Err(e) => assert!(e.is_version_conflict(), "unexpected error: {}", e),
        }
    }

    assert!(committed >= 1);
    let course = store.read_course(&inst, Campus::COURSE).await.unwrap().unwrap();
    assert_eq!(course.enrolled_count() as u64, committed);
    assert_eq!(course.version(), 1 + committed);
}

/// A transaction cannot stage records of another institution.
pub async fn cross_tenant_write_rejected<S>(store: &S)
where
    S: DirectoryStorage + RecordStorage + TransactionProvider,
{
    let campus = seed_campus(store).await;
    let foreign = store
        .read_course(&campus.inst_b, Campus::COURSE)
        .await
        .unwrap()
        .unwrap();

    let mut tx = store.begin_transaction(&campus.inst_a).await.unwrap();
    let err = tx.stage_course(&foreign).await.unwrap_err();
    match err {
        StorageError::Tenant(TenantError::CrossTenantWrite {
            transaction_institution,
            record_institution,
            ..
        }) => {
            assert_eq!(transaction_institution, campus.inst_a);
            assert_eq!(record_institution, campus.inst_b);
        }
        other => panic!("expected CrossTenantWrite, got {:?}", other),
    }
}

/// Course ownership lookups find the owner without exposing the record.
pub async fn course_owner_lookup<S>(store: &S)
where
    S: DirectoryStorage + RecordStorage + TransactionProvider,
{
    let campus = seed_campus(store).await;
    store
        .create_course(registrar_persistence::types::Course::new(
            "bio200",
            campus.inst_b.clone(),
            "BIO200",
            "Genetics",
            3,
            20,
        ))
        .await
        .unwrap();

    assert_eq!(
        store.course_owner("bio200").await.unwrap(),
        Some(campus.inst_b.clone())
    );
    assert_eq!(store.course_owner("nope").await.unwrap(), None);
}
