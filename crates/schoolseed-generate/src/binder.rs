//! Links between entities that can only be written once both ends exist.

use std::collections::BTreeSet;

use schoolseed_core::{CourseId, CourseRecord, UserId};

/// Preceptor chosen for every course of a year cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreceptorAssignment {
    pub course_id: CourseId,
    pub preceptor_id: UserId,
}

/// Outcome of matching preceptors to course years.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreceptorPlan {
    pub assignments: Vec<PreceptorAssignment>,
    /// Years left without a preceptor because the pool ran out.
    pub uncovered_years: BTreeSet<u8>,
}

/// Preceptor `year - 1` oversees every division of `year`.
pub fn preceptor_for_year(preceptors: &[UserId], year: u8) -> Option<UserId> {
    usize::from(year)
        .checked_sub(1)
        .and_then(|idx| preceptors.get(idx))
        .copied()
}

pub fn plan_preceptors(courses: &[CourseRecord], preceptors: &[UserId]) -> PreceptorPlan {
    let mut plan = PreceptorPlan::default();
    for course in courses {
        match preceptor_for_year(preceptors, course.year) {
            Some(preceptor_id) => plan.assignments.push(PreceptorAssignment {
                course_id: course.id,
                preceptor_id,
            }),
            None => {
                plan.uncovered_years.insert(course.year);
            }
        }
    }
    plan
}
