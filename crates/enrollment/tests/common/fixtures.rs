//! Seed data and engine builders shared by the suites.

use std::sync::Arc;
use std::time::Duration;

use registrar_enrollment::{EngineConfig, EnrollmentEngine, RetryConfig};
use registrar_persistence::backends::memory::{MemoryAuditSink, MemoryStore};
use registrar_persistence::core::RecordStorage;
use registrar_persistence::tenant::{InstitutionId, Membership, MembershipRole, PrincipalId};
use registrar_persistence::types::{Course, Institution, Student};

use super::fakes::{ConflictInjectingStore, RecordingSleeper};

/// Two institutions. Alice studies at A, Bob at B, and `registrar` administers A.
///
/// `cs101` exists only at A and `bio200` only at B.
#[derive(Debug, Clone)]
pub struct Campus {
    pub inst_a: InstitutionId,
    pub inst_b: InstitutionId,
    pub alice: PrincipalId,
    pub bob: PrincipalId,
    pub registrar: PrincipalId,
}

impl Campus {
    pub const CS101: &'static str = "cs101";
    pub const BIO200: &'static str = "bio200";
    pub const ALICE_STUDENT: &'static str = "stu-alice";
    pub const BOB_STUDENT: &'static str = "stu-bob";
    pub const SEMESTER: &'static str = "fall";
    pub const YEAR: &'static str = "2026";
}

/// Seeds the campus into `store`.
pub async fn seed_campus<S: RecordStorage>(store: &S) -> Campus {
    let campus = Campus {
        inst_a: InstitutionId::new("inst-a"),
        inst_b: InstitutionId::new("inst-b"),
        alice: PrincipalId::new("alice"),
        bob: PrincipalId::new("bob"),
        registrar: PrincipalId::new("registrar"),
    };

    for (inst, name) in [(&campus.inst_a, "Institution A"), (&campus.inst_b, "Institution B")] {
        store
            .put_institution(Institution::active(inst.clone(), name))
            .await
            .expect("seed institution");
    }
    store
        .put_membership(Membership::active(
            campus.registrar.clone(),
            campus.inst_a.clone(),
            MembershipRole::Admin,
        ))
        .await
        .expect("seed registrar membership");

    add_student(store, &campus.inst_a, &campus.alice, Campus::ALICE_STUDENT, 18).await;
    add_student(store, &campus.inst_b, &campus.bob, Campus::BOB_STUDENT, 18).await;
    add_course(store, &campus.inst_a, Campus::CS101, 4, 30).await;
    add_course(store, &campus.inst_b, Campus::BIO200, 3, 30).await;

    campus
}

/// Creates an active student membership and profile.
pub async fn add_student<S: RecordStorage>(
    store: &S,
    inst: &InstitutionId,
    principal: &PrincipalId,
    student_id: &str,
    max_credits: u32,
) -> Student {
    store
        .put_membership(Membership::active(
            principal.clone(),
            inst.clone(),
            MembershipRole::Student,
        ))
        .await
        .expect("seed membership");
    store
        .create_student(Student::new(
            student_id,
            inst.clone(),
            principal.clone(),
            max_credits,
        ))
        .await
        .expect("seed student")
}

/// Creates `n` students named `<prefix>-<i>` with profiles `stu-<prefix>-<i>`.
pub async fn add_students<S: RecordStorage>(
    store: &S,
    inst: &InstitutionId,
    prefix: &str,
    n: usize,
) -> Vec<PrincipalId> {
    let mut principals = Vec::with_capacity(n);
    for i in 0..n {
        let principal = PrincipalId::new(format!("{}-{}", prefix, i));
        add_student(store, inst, &principal, &format!("stu-{}-{}", prefix, i), 18).await;
        principals.push(principal);
    }
    principals
}

pub async fn add_course<S: RecordStorage>(
    store: &S,
    inst: &InstitutionId,
    course_id: &str,
    credits: u32,
    max_students: u32,
) -> Course {
    store
        .create_course(Course::new(
            course_id,
            inst.clone(),
            course_id.to_uppercase(),
            format!("{} at {}", course_id, inst),
            credits,
            max_students,
        ))
        .await
        .expect("seed course")
}

/// Retries without waiting.
pub fn immediate_config(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        retry: RetryConfig::immediate(max_attempts),
    }
}

/// Retries with short real delays, for contention tests.
pub fn contention_config(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        retry: RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::from_millis(3),
            max_delay: Duration::from_millis(10),
        },
    }
}

/// An engine over a seeded memory store.
pub struct Harness {
    pub engine: EnrollmentEngine<MemoryStore>,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub campus: Campus,
}

pub async fn memory_harness() -> Harness {
    memory_harness_with(immediate_config(3)).await
}

pub async fn memory_harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let campus = seed_campus(store.as_ref()).await;
    let audit = Arc::new(MemoryAuditSink::new());
    let engine = EnrollmentEngine::new(store.clone(), audit.clone(), config);
    Harness {
        engine,
        store,
        audit,
        campus,
    }
}

/// An engine whose commits can be made to fail on demand.
pub struct InjectingHarness {
    pub engine: EnrollmentEngine<ConflictInjectingStore<MemoryStore>>,
    pub store: Arc<ConflictInjectingStore<MemoryStore>>,
    pub audit: Arc<MemoryAuditSink>,
    pub sleeper: Arc<RecordingSleeper>,
    pub campus: Campus,
}

impl InjectingHarness {
    pub fn inner(&self) -> &Arc<MemoryStore> {
        self.store.inner()
    }
}

/// Uses the default retry policy (three attempts, 100ms base) with a
/// recording sleeper, so the requested delays can be checked.
pub async fn injecting_harness() -> InjectingHarness {
    let inner = Arc::new(MemoryStore::new());
    let campus = seed_campus(inner.as_ref()).await;
    let store = Arc::new(ConflictInjectingStore::new(inner));
    let audit = Arc::new(MemoryAuditSink::new());
    let sleeper = RecordingSleeper::new();
    let engine = EnrollmentEngine::new(store.clone(), audit.clone(), EngineConfig::default())
        .with_sleeper(sleeper.clone());
    InjectingHarness {
        engine,
        store,
        audit,
        sleeper,
        campus,
    }
}
