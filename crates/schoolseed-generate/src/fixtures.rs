//! Small fixed dataset wired around the testing accounts.
//!
//! Every reference is resolved at run time: accounts by email, courses by
//! (year, division), subjects by (course, name). Nothing assumes the ids a
//! fresh database would hand out.

use chrono::{NaiveDate, NaiveTime};

use schoolseed_core::{
    CourseLayout, CourseRecord, Division, NewCourse, NewSubject, PersonalData, ShiftPolicy,
    Shift, TimetableEntry, UserId, Weekday, course_name,
};

use crate::bootstrap::{
    ADMIN_ACCOUNT, Bootstrap, FATHER_ACCOUNT, PRECEPTOR_ACCOUNT, SECOND_STUDENT_ACCOUNT,
    STUDENT_ACCOUNT, TEACHER_ACCOUNT, TestingAccount,
};
use crate::catalog::hm;
use crate::errors::GenerationError;
use crate::model::PhaseReport;
use crate::schedule::find_overlaps;
use crate::store::Store;

/// Subjects taught by the testing teacher in the last year.
pub const FIXTURE_SUBJECTS: &[(Division, &str)] = &[
    (Division::A, "matematica"),
    (Division::A, "lengua"),
    (Division::A, "historia"),
    (Division::B, "matematica"),
];

/// Weekly rows for the last year's first division.
pub const FIXTURE_TIMETABLE: &[(Weekday, &str, NaiveTime, NaiveTime)] = &[
    (Weekday::Monday, "matematica", hm(7, 0), hm(13, 0)),
    (Weekday::Tuesday, "historia", hm(7, 0), hm(13, 0)),
    (Weekday::Wednesday, "matematica", hm(7, 0), hm(13, 0)),
    (Weekday::Thursday, "lengua", hm(7, 0), hm(13, 0)),
    (Weekday::Friday, "matematica", hm(7, 0), hm(8, 0)),
    (Weekday::Friday, "lengua", hm(8, 15), hm(9, 30)),
];

/// Accounts that get the fixed personal data below.
const NAMED_ACCOUNTS: [TestingAccount; 5] = [
    ADMIN_ACCOUNT,
    STUDENT_ACCOUNT,
    PRECEPTOR_ACCOUNT,
    FATHER_ACCOUNT,
    TEACHER_ACCOUNT,
];

pub fn fixture_person(label: &str) -> PersonalData {
    PersonalData {
        full_name: label.to_string(),
        birth_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
        address: "mi casa".to_string(),
        phone_number: "123456789".to_string(),
    }
}

/// Every (year, division) of `layout`, with the fixed shift rule.
pub async fn create_courses(
    store: &mut dyn Store,
    layout: &CourseLayout,
    report: &mut PhaseReport,
) -> Result<(), GenerationError> {
    for slot in layout.slots() {
        let shift = ShiftPolicy::Fixed
            .fixed_shift(slot.level, slot.division)
            .unwrap_or(Shift::Morning);
        let course = NewCourse {
            year: slot.year,
            division: slot.division,
            level: slot.level,
            shift,
            name: course_name(slot.year, slot.level, slot.division),
        };
        store.insert_course(&course).await?;
    }
    report.record_created("courses", layout.course_count() as u64);
    Ok(())
}

/// Registers the testing accounts, then links them into the last year.
pub async fn create_users(
    store: &mut dyn Store,
    layout: &CourseLayout,
    bootstrap: &dyn Bootstrap,
    report: &mut PhaseReport,
) -> Result<(), GenerationError> {
    bootstrap.register_testing_users(store).await?;

    let student = account_id(store, STUDENT_ACCOUNT).await?;
    let second_student = account_id(store, SECOND_STUDENT_ACCOUNT).await?;
    let father = account_id(store, FATHER_ACCOUNT).await?;
    let teacher = account_id(store, TEACHER_ACCOUNT).await?;

    store.insert_family(student, father).await?;
    report.record_created("families", 1);

    for account in NAMED_ACCOUNTS {
        let user_id = account_id(store, account).await?;
        store
            .upsert_personal_data(user_id, &fixture_person(account.email))
            .await?;
    }
    report.record_created("personal_data", NAMED_ACCOUNTS.len() as u64);

    for (division, name) in FIXTURE_SUBJECTS {
        let course = last_year_course(store, layout, *division).await?;
        let subject = NewSubject {
            name: name.to_string(),
            course_id: course.id,
            teacher_id: Some(teacher),
        };
        store.insert_subject(&subject).await?;
    }
    report.record_created("subjects", FIXTURE_SUBJECTS.len() as u64);

    let home = last_year_course(store, layout, Division::A).await?;
    for student_id in [student, second_student] {
        store.assign_course(student_id, home.id).await?;
    }
    report.record_created("enrollments", 2);
    Ok(())
}

/// The testing preceptor oversees every division of the last year.
pub async fn create_preceptors(
    store: &mut dyn Store,
    layout: &CourseLayout,
    report: &mut PhaseReport,
) -> Result<(), GenerationError> {
    let preceptor = account_id(store, PRECEPTOR_ACCOUNT).await?;
    let divisions = &Division::ALL[..usize::from(layout.divisions).min(Division::ALL.len())];
    for division in divisions {
        let course = last_year_course(store, layout, *division).await?;
        store.assign_preceptor(course.id, preceptor).await?;
    }
    report.record_created("preceptor_assignments", divisions.len() as u64);
    Ok(())
}

pub async fn create_timetables(
    store: &mut dyn Store,
    layout: &CourseLayout,
    report: &mut PhaseReport,
) -> Result<(), GenerationError> {
    let course = last_year_course(store, layout, Division::A).await?;
    let mut entries = Vec::with_capacity(FIXTURE_TIMETABLE.len());
    for (day, name, start_time, end_time) in FIXTURE_TIMETABLE {
        let subject = store.find_subject(course.id, name).await?.ok_or_else(|| {
            GenerationError::InvalidFixture(format!(
                "subject '{name}' not found in course {}",
                course.name
            ))
        })?;
        entries.push(TimetableEntry {
            course_id: course.id,
            subject_id: subject.id,
            day: *day,
            start_time: *start_time,
            end_time: *end_time,
        });
    }

    if let Some((left, right)) = find_overlaps(&entries).first() {
        return Err(GenerationError::InvalidFixture(format!(
            "timetable rows {left} and {right} overlap on {}",
            entries[*left].day
        )));
    }

    for entry in &entries {
        store.insert_timetable(entry).await?;
    }
    report.record_created("timetables", entries.len() as u64);
    Ok(())
}

async fn account_id(
    store: &mut dyn Store,
    account: TestingAccount,
) -> Result<UserId, GenerationError> {
    store
        .find_user_by_email(account.email)
        .await?
        .ok_or_else(|| {
            GenerationError::InvalidFixture(format!(
                "testing account '{}' is not registered",
                account.email
            ))
        })
}

async fn last_year_course(
    store: &mut dyn Store,
    layout: &CourseLayout,
    division: Division,
) -> Result<CourseRecord, GenerationError> {
    store
        .find_course(layout.years, division)
        .await?
        .ok_or_else(|| {
            GenerationError::InvalidFixture(format!(
                "course {}{} does not exist",
                layout.years, division
            ))
        })
}
