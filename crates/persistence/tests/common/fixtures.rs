//! Seed data shared by the backend suites.

use registrar_persistence::core::RecordStorage;
use registrar_persistence::tenant::{InstitutionId, Membership, MembershipRole, PrincipalId};
use registrar_persistence::types::{Course, Institution, Student};

/// Two institutions, each with one student and one course.
///
/// Both institutions use the course ID `cs101` so cross-tenant lookups by ID
/// are meaningful.
#[derive(Debug, Clone)]
pub struct Campus {
    pub inst_a: InstitutionId,
    pub inst_b: InstitutionId,
    pub alice: PrincipalId,
    pub bob: PrincipalId,
}

impl Campus {
    pub const COURSE: &'static str = "cs101";
    pub const ALICE_STUDENT: &'static str = "stu-alice";
    pub const BOB_STUDENT: &'static str = "stu-bob";
}

/// Seeds the campus into `store`.
pub async fn seed_campus<S: RecordStorage>(store: &S) -> Campus {
    let campus = Campus {
        inst_a: InstitutionId::new("inst-a"),
        inst_b: InstitutionId::new("inst-b"),
        alice: PrincipalId::new("alice"),
        bob: PrincipalId::new("bob"),
    };

    store
        .put_institution(Institution::active(campus.inst_a.clone(), "Institution A"))
        .await
        .expect("seed institution a");
    store
        .put_institution(Institution::active(campus.inst_b.clone(), "Institution B"))
        .await
        .expect("seed institution b");
    store
        .put_membership(Membership::active(
            campus.alice.clone(),
            campus.inst_a.clone(),
            MembershipRole::Student,
        ))
        .await
        .expect("seed alice membership");
    store
        .put_membership(Membership::active(
            campus.bob.clone(),
            campus.inst_b.clone(),
            MembershipRole::Student,
        ))
        .await
        .expect("seed bob membership");

    store
        .create_student(Student::new(
            Campus::ALICE_STUDENT,
            campus.inst_a.clone(),
            campus.alice.clone(),
            18,
        ))
        .await
        .expect("seed alice");
    store
        .create_student(Student::new(
            Campus::BOB_STUDENT,
            campus.inst_b.clone(),
            campus.bob.clone(),
            18,
        ))
        .await
        .expect("seed bob");

    for inst in [&campus.inst_a, &campus.inst_b] {
        store
            .create_course(Course::new(
                Campus::COURSE,
                inst.clone(),
                "CS101",
                format!("Intro to CS ({})", inst),
                4,
                30,
            ))
            .await
            .expect("seed course");
    }

    campus
}
