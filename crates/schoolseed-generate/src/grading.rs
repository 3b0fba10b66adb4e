use chrono::{Days, NaiveDate};
use rand::Rng;
use rand::seq::{IndexedRandom, index};

use schoolseed_core::{
    AssessmentRecord, AssessmentType, GradeType, NewAssessment, NewGrade, SubjectId, UserId,
};

use crate::catalog::ASSESSMENT_TASKS;

pub const MIN_ASSESSMENTS: usize = 3;
pub const MAX_ASSESSMENTS: usize = 8;
/// Due dates fall within this many days before the reference date...
pub const DUE_DAYS_BEFORE: u64 = 60;
/// ...or this many days after it.
pub const DUE_DAYS_AFTER: u64 = 30;

/// Assessments for one subject.
pub fn generate_assessments<R: Rng + ?Sized>(
    subject_id: SubjectId,
    reference_date: NaiveDate,
    rng: &mut R,
) -> Vec<NewAssessment> {
    let count = rng.random_range(MIN_ASSESSMENTS..=MAX_ASSESSMENTS);
    (0..count)
        .map(|_| NewAssessment {
            assessment_type: *AssessmentType::ALL
                .choose(rng)
                .unwrap_or(&AssessmentType::Exam),
            due_date: due_date(reference_date, rng),
            task: ASSESSMENT_TASKS
                .choose(rng)
                .copied()
                .unwrap_or("Evaluación")
                .to_string(),
            subject_id,
        })
        .collect()
}

fn due_date<R: Rng + ?Sized>(reference_date: NaiveDate, rng: &mut R) -> NaiveDate {
    let offset = rng.random_range(0..=DUE_DAYS_BEFORE + DUE_DAYS_AFTER);
    let earliest = reference_date
        .checked_sub_days(Days::new(DUE_DAYS_BEFORE))
        .unwrap_or(reference_date);
    earliest.checked_add_days(Days::new(offset)).unwrap_or(earliest)
}

/// Students graded per assessment: four out of five, rounded down.
pub fn graded_count(roster_size: usize) -> usize {
    roster_size * 4 / 5
}

/// Grades for a sample of `roster` on one assessment.
pub fn generate_grades<R: Rng + ?Sized>(
    assessment: &AssessmentRecord,
    roster: &[UserId],
    rng: &mut R,
) -> Vec<NewGrade> {
    let amount = graded_count(roster.len());
    if amount == 0 {
        return Vec::new();
    }
    let description = format!("Calificación de {}", assessment.assessment_type);
    index::sample(rng, roster.len(), amount)
        .into_iter()
        .map(|idx| NewGrade {
            description: description.clone(),
            grade: grade_value(rng),
            student_id: roster[idx],
            subject_id: assessment.subject_id,
            assessment_id: assessment.id,
            grade_type: GradeType::Numerical,
        })
        .collect()
}

/// Uniform in `[1, 10]`, two decimals.
fn grade_value<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let raw: f64 = rng.random_range(1.0..=10.0);
    (raw * 100.0).round() / 100.0
}
