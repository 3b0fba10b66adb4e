use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use schoolseed_core::{Division, EntitySet, Level, Phase, PhasePlan, Role, Shift, Weekday};
use schoolseed_generate::output::{write_dataset, write_report};
use schoolseed_generate::schedule::find_overlaps;
use schoolseed_generate::{
    Bootstrap, BootstrapError, DirectBootstrap, GenerateOptions, GenerationEngine,
    GenerationError, MemoryStore, Store,
};

fn create_all_plan() -> PhasePlan {
    PhasePlan::new(
        &[
            Phase::FixtureCourses,
            Phase::FixtureUsers,
            Phase::FixturePreceptors,
            Phase::FixtureTimetables,
        ],
        &[],
    )
    .expect("fixture plan")
}

async fn run_fixtures() -> MemoryStore {
    let engine = GenerationEngine::new(GenerateOptions::default()).unwrap();
    let mut store = MemoryStore::new();
    engine
        .run(&create_all_plan(), &mut store, &DirectBootstrap)
        .await
        .expect("fixture run succeeds");
    store
}

#[tokio::test]
async fn fixture_courses_cover_twelve_years() {
    let store = run_fixtures().await;
    let courses = &store.dataset().courses;
    assert_eq!(courses.len(), 36);

    let year7 = courses.iter().find(|c| c.year == 7).unwrap();
    let year8 = courses.iter().find(|c| c.year == 8).unwrap();
    assert_eq!(year7.level, Level::Primary);
    assert_eq!(year8.level, Level::Secondary);

    for course in courses {
        let expected = match (course.level, course.division) {
            (Level::Primary, Division::C) => Shift::Morning,
            (Level::Primary, _) => Shift::Afternoon,
            (Level::Secondary, _) => Shift::Morning,
        };
        assert_eq!(course.shift, expected, "{}", course.name);
    }
    assert_eq!(courses[0].name, "Primer grado Mar");
    assert_eq!(courses[35].name, "Quinto año Humanidades");
}

#[tokio::test]
async fn testing_accounts_are_wired_into_the_last_year() {
    let store = run_fixtures().await;
    let data = store.dataset();

    let id = |email: &str| data.user_by_email(email).unwrap().id;
    let last_a = data
        .courses
        .iter()
        .find(|c| c.year == 12 && c.division == Division::A)
        .unwrap();

    assert_eq!(data.families.len(), 1);
    assert_eq!(data.families[0].student_id, id("student"));
    assert_eq!(data.families[0].father_id, id("father"));

    for email in ["student", "valentinogrande972@gmail.com"] {
        assert_eq!(data.user_by_email(email).unwrap().course_id, Some(last_a.id));
    }

    let teacher_row = data
        .personal_data
        .iter()
        .find(|row| row.user_id == id("teacher"))
        .unwrap();
    assert_eq!(teacher_row.full_name, "teacher");
    assert_eq!(teacher_row.address, "mi casa");
    assert_eq!(data.personal_data.len(), 6);

    let mut subjects: Vec<(u8, Division, &str)> = data
        .subjects
        .iter()
        .map(|s| {
            let course = data.course(s.course_id).unwrap();
            assert_eq!(s.teacher_id, Some(id("teacher")));
            (course.year, course.division, s.name.as_str())
        })
        .collect();
    subjects.sort();
    assert_eq!(
        subjects,
        vec![
            (12, Division::A, "historia"),
            (12, Division::A, "lengua"),
            (12, Division::A, "matematica"),
            (12, Division::B, "matematica"),
        ]
    );

    for course in &data.courses {
        let expected = (course.year == 12).then(|| id("preceptor"));
        assert_eq!(course.preceptor_id, expected, "{}", course.name);
    }
}

#[tokio::test]
async fn fixture_timetable_uses_subjects_of_the_first_division() {
    let store = run_fixtures().await;
    let data = store.dataset();
    assert_eq!(data.timetables.len(), 6);
    assert!(find_overlaps(&data.timetables).is_empty());

    let friday: Vec<_> = data
        .timetables
        .iter()
        .filter(|row| row.day == Weekday::Friday)
        .collect();
    assert_eq!(friday.len(), 2);
    for row in &data.timetables {
        let subject = data.subject(row.subject_id).unwrap();
        let course = data.course(row.course_id).unwrap();
        assert_eq!(subject.course_id, course.id);
        assert_eq!((course.year, course.division), (12, Division::A));
    }
}

struct RejectingBootstrap;

#[async_trait]
impl Bootstrap for RejectingBootstrap {
    async fn register_testing_users(&self, _store: &mut dyn Store) -> Result<(), BootstrapError> {
        Err(BootstrapError::Status { status: 500 })
    }
}

#[tokio::test]
async fn failed_bootstrap_stops_before_wiring() {
    let engine = GenerationEngine::new(GenerateOptions::default()).unwrap();
    let mut store = MemoryStore::new();
    let err = engine
        .run(&create_all_plan(), &mut store, &RejectingBootstrap)
        .await
        .unwrap_err();

    match &err {
        GenerationError::PhaseFailed { phase, source, report } => {
            assert_eq!(*phase, Phase::FixtureUsers);
            assert!(matches!(
                source.as_ref(),
                GenerationError::Bootstrap(BootstrapError::Status { status: 500 })
            ));
            assert!(report.phase(Phase::FixtureCourses).is_some());
            assert!(report.phase(Phase::FixturePreceptors).is_none());
        }
        other => panic!("unexpected error {other}"),
    }
    let data = store.dataset();
    assert_eq!(data.courses.len(), 36);
    assert!(data.users.is_empty());
    assert!(data.families.is_empty());
    assert_eq!(store.committed_phases(), &[Phase::FixtureCourses]);
}

#[tokio::test]
async fn single_fixture_phases_run_against_earlier_commits() {
    let engine = GenerationEngine::new(GenerateOptions::default()).unwrap();
    let mut store = MemoryStore::new();
    let courses = PhasePlan::new(&[Phase::FixtureCourses], &[]).unwrap();
    engine.run(&courses, &mut store, &DirectBootstrap).await.unwrap();

    assert!(PhasePlan::new(&[Phase::FixturePreceptors], &[EntitySet::Courses]).is_err());
    let users = PhasePlan::new(&[Phase::FixtureUsers], &[EntitySet::Courses]).unwrap();
    engine.run(&users, &mut store, &DirectBootstrap).await.unwrap();

    let preceptors = PhasePlan::new(
        &[Phase::FixturePreceptors],
        &[EntitySet::Courses, EntitySet::TestingAccounts],
    )
    .unwrap();
    engine.run(&preceptors, &mut store, &DirectBootstrap).await.unwrap();
    let assigned = store
        .dataset()
        .courses
        .iter()
        .filter(|c| c.preceptor_id.is_some())
        .count();
    assert_eq!(assigned, 3);
}

#[tokio::test]
async fn preceptor_wiring_needs_registered_accounts() {
    let engine = GenerationEngine::new(GenerateOptions::default()).unwrap();
    let mut store = MemoryStore::new();
    let plan = PhasePlan::new(
        &[Phase::FixtureCourses, Phase::FixturePreceptors],
        &[EntitySet::TestingAccounts],
    )
    .unwrap();
    let err = engine
        .run(&plan, &mut store, &DirectBootstrap)
        .await
        .unwrap_err();
    match err {
        GenerationError::PhaseFailed { source, .. } => {
            assert!(matches!(*source, GenerationError::InvalidFixture(_)));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn dry_run_artifacts_are_written() {
    let store = run_fixtures().await;
    let dir = temp_out_dir("fixtures");
    let files = write_dataset(&dir, store.dataset()).expect("write csv");
    assert_eq!(files.tables.len(), 12);
    assert!(files.bytes_written() > 0);

    let users = fs::read_to_string(dir.join("users.csv")).unwrap();
    let mut lines = users.lines();
    assert_eq!(lines.next(), Some("id,email,password_hash,role,course_id"));
    assert_eq!(lines.count(), 6);
    let roles = fs::read_to_string(dir.join("roles.csv")).unwrap();
    assert!(roles.contains(&format!("{},father", store.dataset().user_by_email("father").unwrap().id)));

    let engine = GenerationEngine::new(GenerateOptions::default()).unwrap();
    let mut store = MemoryStore::new();
    let result = engine
        .run(&create_all_plan(), &mut store, &DirectBootstrap)
        .await
        .unwrap();
    write_report(&dir, &result.report).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("generation_report.json")).unwrap())
            .unwrap();
    assert_eq!(report["phases"].as_array().unwrap().len(), 4);
    assert_eq!(report["phases"][0]["phase"], "fixture_courses");
    assert_eq!(report["phases"][0]["created"]["courses"], 36);
    assert!(store.dataset().users_with_role(Role::Student).count() == 2);
}

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("schoolseed_generate_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}
