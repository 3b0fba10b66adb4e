use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use schoolseed_core::{CourseLayout, Level, Phase, PhasePlan, Role, ShiftPolicy};
use schoolseed_generate::factory::age_on;
use schoolseed_generate::grading::graded_count;
use schoolseed_generate::schedule::find_overlaps;
use schoolseed_generate::{
    DirectBootstrap, GenerateOptions, GenerationEngine, GenerationError, MemoryStore, PhaseStatus,
};

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).expect("valid date")
}

fn small_options(seed: u64) -> GenerateOptions {
    GenerateOptions {
        seed,
        layout: CourseLayout {
            years: 3,
            divisions: 2,
            primary_limit: 2,
        },
        teachers: 4,
        preceptors: 2,
        students_min: 3,
        students_max: 6,
        broadcast_messages: 5,
        reference_date: Some(reference_date()),
        ..GenerateOptions::default()
    }
}

async fn run(options: GenerateOptions) -> (MemoryStore, schoolseed_generate::GenerationResult) {
    let engine = GenerationEngine::new(options).expect("valid options");
    let plan = PhasePlan::synthetic().expect("synthetic plan");
    let mut store = MemoryStore::new();
    let result = engine
        .run(&plan, &mut store, &DirectBootstrap)
        .await
        .expect("generation succeeds");
    (store, result)
}

#[tokio::test]
async fn same_seed_produces_the_same_dataset() {
    let (a, _) = run(small_options(7)).await;
    let (b, _) = run(small_options(7)).await;
    assert_eq!(a.dataset(), b.dataset());

    let (c, _) = run(small_options(8)).await;
    assert_ne!(a.dataset().users, c.dataset().users);
}

#[tokio::test]
async fn every_phase_commits_in_order() {
    let (store, result) = run(small_options(1)).await;
    let expected: Vec<Phase> = PhasePlan::synthetic().unwrap().phases().collect();
    assert_eq!(store.committed_phases(), expected.as_slice());
    assert!(result
        .report
        .phases
        .iter()
        .all(|phase| phase.status == PhaseStatus::Committed));
    assert_eq!(result.report.failed_phase(), None);
    assert_eq!(result.report.reference_date, reference_date());
}

#[tokio::test]
async fn emails_are_unique_and_roles_are_counted() {
    let (store, result) = run(small_options(2)).await;
    let data = store.dataset();

    let emails: HashSet<&str> = data.users.iter().map(|user| user.email.as_str()).collect();
    assert_eq!(emails.len(), data.users.len());

    assert_eq!(data.users_with_role(Role::Admin).count(), 1);
    assert_eq!(data.users_with_role(Role::Teacher).count(), 4);
    assert_eq!(data.users_with_role(Role::Preceptor).count(), 2);
    let students = data.users_with_role(Role::Student).count();
    assert_eq!(data.users_with_role(Role::Father).count(), students);
    assert_eq!(data.families.len(), students);
    assert_eq!(data.personal_data.len(), data.users.len());

    assert_eq!(result.summary.students, students as u64);
    assert_eq!(result.summary.teachers, 4);
    assert_eq!(result.summary.courses, 6);
    assert!(data.users.iter().all(|user| user.password_hash.starts_with("$2b$12$")));
}

#[tokio::test]
async fn courses_follow_the_layout_and_preceptor_cohorts() {
    let (store, result) = run(small_options(3)).await;
    let data = store.dataset();
    assert_eq!(data.courses.len(), 6);

    let preceptors: Vec<i64> = data.users_with_role(Role::Preceptor).map(|u| u.id).collect();
    for year in 1..=3_u8 {
        let cohort: Vec<_> = data.courses.iter().filter(|c| c.year == year).collect();
        assert_eq!(cohort.len(), 2);
        for course in cohort {
            let expected_level = if year <= 2 { Level::Primary } else { Level::Secondary };
            assert_eq!(course.level, expected_level);
            assert_eq!(course.preceptor_id, preceptors.get(usize::from(year) - 1).copied());
        }
    }

    // Year 3 is beyond a pool of two preceptors.
    assert_eq!(result.report.warnings_by_code.get("course_without_preceptor"), Some(&1));
    let courses_phase = result.report.phase(Phase::Courses).unwrap();
    assert_eq!(courses_phase.created("preceptor_assignments"), 4);
    assert_eq!(courses_phase.skipped.get("preceptor_assignments"), Some(&2));
}

#[tokio::test]
async fn students_belong_to_their_course_and_have_matching_ages() {
    let (store, _) = run(small_options(4)).await;
    let data = store.dataset();
    let births: HashMap<i64, NaiveDate> = data
        .personal_data
        .iter()
        .map(|row| (row.user_id, row.birth_date))
        .collect();

    for student in data.users_with_role(Role::Student) {
        let course = data
            .course(student.course_id.expect("student has a course"))
            .expect("course exists");
        assert_eq!(age_on(births[&student.id], reference_date()), 6 + u32::from(course.year));
        let cohort = format!("{}{}", course.year, course.division).to_lowercase();
        assert!(student.email.starts_with("est."), "{}", student.email);
        assert!(student.email.contains(&cohort), "{}", student.email);
    }
    for father in data.users_with_role(Role::Father) {
        let age = age_on(births[&father.id], reference_date());
        assert!((30..=60).contains(&age));
        assert!(father.email.ends_with("@gmail.com"));
    }
    for role in [Role::Admin, Role::Teacher, Role::Preceptor] {
        for user in data.users_with_role(role) {
            let age = age_on(births[&user.id], reference_date());
            assert!((18..=30).contains(&age), "{role} aged {age}");
        }
    }
    for course in &data.courses {
        let roster = data.roster(course.id).len();
        assert!((3..=6).contains(&roster));
    }
}

#[tokio::test]
async fn timetables_never_overlap() {
    let (store, result) = run(small_options(5)).await;
    let data = store.dataset();
    assert!(!data.timetables.is_empty());
    assert!(find_overlaps(&data.timetables).is_empty());

    for course in &data.courses {
        let per_day = data
            .timetables
            .iter()
            .filter(|row| row.course_id == course.id)
            .count();
        // Every curriculum has more subjects than slots, so each day is full.
        let slots = schoolseed_generate::catalog::slots_for(course.shift).len();
        assert_eq!(per_day, slots * 5);
    }
    assert_eq!(result.summary.timetables, data.timetables.len() as u64);
}

#[tokio::test]
async fn each_assessment_grades_four_fifths_of_the_roster() {
    let (store, result) = run(small_options(6)).await;
    let data = store.dataset();
    let reference = reference_date();

    for assessment in &data.assessments {
        let subject = data.subject(assessment.subject_id).unwrap();
        let roster = data.roster(subject.course_id);
        let grades: Vec<_> = data
            .grades
            .iter()
            .filter(|grade| grade.assessment_id == assessment.id)
            .collect();
        assert_eq!(grades.len(), graded_count(roster.len()));
        let graded: HashSet<i64> = grades.iter().map(|g| g.student_id).collect();
        assert_eq!(graded.len(), grades.len());
        assert!(graded.iter().all(|id| roster.contains(id)));

        let delta = (assessment.due_date - reference).num_days();
        assert!((-60..=30).contains(&delta));
    }

    let per_subject: HashMap<i64, usize> =
        data.assessments.iter().fold(HashMap::new(), |mut acc, row| {
            *acc.entry(row.subject_id).or_insert(0) += 1;
            acc
        });
    assert!(per_subject.values().all(|count| (3..=8).contains(count)));
    assert_eq!(result.summary.grades, data.grades.len() as u64);
}

#[tokio::test]
async fn messages_fan_out_from_staff() {
    let (store, _) = run(small_options(9)).await;
    let data = store.dataset();
    assert_eq!(data.messages.len(), 5);

    for message in &data.messages {
        let sender = data.user(message.sender_id).unwrap();
        assert!(matches!(sender.role, Role::Admin | Role::Teacher | Role::Preceptor));
        let links: Vec<_> = data
            .message_courses
            .iter()
            .filter(|link| link.message_id == message.id)
            .collect();
        assert!((1..=3).contains(&links.len()));
    }

    for message in &data.subject_messages {
        let subject = data.subject(message.subject_id).unwrap();
        assert_eq!(message.sender_id, subject.teacher_id);
        assert_eq!(message.title, format!("Información sobre {}", subject.name));
    }
}

#[tokio::test]
async fn empty_teacher_pool_is_a_warning_not_an_error() {
    let mut options = small_options(10);
    options.teachers = 0;
    let (store, result) = run(options).await;
    let data = store.dataset();

    assert!(data.subjects.iter().all(|subject| subject.teacher_id.is_none()));
    assert!(data.subject_messages.iter().all(|m| m.sender_id.is_none()));
    assert!(result.report.warnings_by_code.contains_key("subject_without_teacher"));
    assert!(result
        .report
        .warnings_by_code
        .contains_key("subject_message_without_sender"));
    // Preceptors and the admin still send broadcasts.
    assert_eq!(data.messages.len(), 5);
}

#[tokio::test]
async fn courses_without_students_get_no_grades() {
    let mut options = small_options(11);
    options.students_min = 0;
    options.students_max = 0;
    let (store, result) = run(options).await;
    let data = store.dataset();
    assert!(data.grades.is_empty());
    assert!(!data.assessments.is_empty());
    let grades = result.report.phase(Phase::Grades).unwrap();
    assert_eq!(grades.skipped.get("ungraded_assessments"), Some(&(data.assessments.len() as u64)));
}

#[tokio::test]
async fn fixed_shift_policy_is_honored() {
    let mut options = small_options(12);
    options.shift_policy = ShiftPolicy::Fixed;
    let (store, _) = run(options).await;
    for course in &store.dataset().courses {
        let expected = ShiftPolicy::Fixed.fixed_shift(course.level, course.division);
        assert_eq!(Some(course.shift), expected);
    }
}

#[tokio::test]
async fn rerun_without_teardown_fails_on_duplicate_email() {
    let options = small_options(13);
    let engine = GenerationEngine::new(options).unwrap();
    let plan = PhasePlan::synthetic().unwrap();
    let mut store = MemoryStore::new();
    engine.run(&plan, &mut store, &DirectBootstrap).await.unwrap();
    let users_before = store.dataset().users.len();

    let err = engine
        .run(&plan, &mut store, &DirectBootstrap)
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "{err}");
    match &err {
        GenerationError::PhaseFailed { phase, report, .. } => {
            assert_eq!(*phase, Phase::Admin);
            assert_eq!(report.failed_phase(), Some(Phase::Admin));
            assert!(report.phase(Phase::Teachers).is_none());
        }
        other => panic!("unexpected error {other}"),
    }
    // The failed phase left nothing behind.
    assert_eq!(store.dataset().users.len(), users_before);
    assert_eq!(store.open_phase(), None);
}

#[tokio::test]
async fn rerun_with_another_seed_still_hits_the_admin_email() {
    let plan = PhasePlan::synthetic().unwrap();
    let mut store = MemoryStore::new();
    GenerationEngine::new(small_options(13))
        .unwrap()
        .run(&plan, &mut store, &DirectBootstrap)
        .await
        .unwrap();
    let users_before = store.dataset().users.len();
    let teachers_before = store.dataset().users_with_role(Role::Teacher).count();

    let err = GenerationEngine::new(small_options(43))
        .unwrap()
        .run(&plan, &mut store, &DirectBootstrap)
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "{err}");
    assert!(err.to_string().contains("admin@"), "{err}");
    assert!(matches!(
        err,
        GenerationError::PhaseFailed {
            phase: Phase::Admin,
            ..
        }
    ));
    assert_eq!(store.dataset().users.len(), users_before);
    assert_eq!(
        store.dataset().users_with_role(Role::Teacher).count(),
        teachers_before
    );
}

#[tokio::test]
async fn invalid_options_are_rejected_before_any_write() {
    let mut options = small_options(14);
    options.students_min = 9;
    options.students_max = 2;
    assert!(matches!(
        GenerationEngine::new(options),
        Err(GenerationError::InvalidOptions(_))
    ));

    let mut options = small_options(14);
    options.layout.divisions = 4;
    assert!(matches!(GenerationEngine::new(options), Err(GenerationError::Core(_))));
}

#[tokio::test]
async fn reference_date_defaults_to_today() {
    let mut options = small_options(15);
    options.reference_date = None;
    let engine = GenerationEngine::new(options).unwrap();
    let today = chrono::Utc::now().date_naive();
    assert!((engine.reference_date() - today).num_days().abs() <= 1);
    assert!(engine.reference_date().year() >= 2024);
}
