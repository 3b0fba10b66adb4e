use rand::Rng;
use rand::seq::index;

use schoolseed_core::{CourseRecord, SubjectRecord, TimetableEntry, Weekday};

use crate::catalog::slots_for;

/// Fills each weekday of a course with distinct subjects, one per slot.
///
/// Slots of a shift never overlap, and every slot of a day receives at most
/// one subject, so the rows produced for one (course, day) cannot overlap.
/// Days are drawn independently: a subject may appear on several days or on
/// none.
pub fn allocate<R: Rng + ?Sized>(
    course: &CourseRecord,
    subjects: &[SubjectRecord],
    rng: &mut R,
) -> Vec<TimetableEntry> {
    let slots = slots_for(course.shift);
    let per_day = slots.len().min(subjects.len());
    let mut entries = Vec::with_capacity(per_day * Weekday::ALL.len());

    for day in Weekday::ALL {
        let picked = index::sample(rng, subjects.len(), per_day);
        for (slot, subject_idx) in slots.iter().zip(picked) {
            entries.push(TimetableEntry {
                course_id: course.id,
                subject_id: subjects[subject_idx].id,
                day: *day,
                start_time: slot.start,
                end_time: slot.end,
            });
        }
    }

    entries
}

/// Index pairs of rows that share a (course, day) and overlap in time.
pub fn find_overlaps(entries: &[TimetableEntry]) -> Vec<(usize, usize)> {
    let mut clashes = Vec::new();
    for (i, left) in entries.iter().enumerate() {
        for (j, right) in entries.iter().enumerate().skip(i + 1) {
            if left.overlaps(right) {
                clashes.push((i, j));
            }
        }
    }
    clashes
}
