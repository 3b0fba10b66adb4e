use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Entity sets that phases require and produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySet {
    Admin,
    Teachers,
    Preceptors,
    TestingAccounts,
    Courses,
    PreceptorAssignments,
    Students,
    Parents,
    Families,
    Subjects,
    Timetables,
    Assessments,
    Grades,
    Messages,
    MessageCourses,
    SubjectMessages,
}

/// A unit of work committed as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Admin,
    Teachers,
    Preceptors,
    Courses,
    StudentsAndParents,
    Subjects,
    Timetables,
    Assessments,
    Grades,
    Messages,
    SubjectMessages,
    FixtureCourses,
    FixtureUsers,
    FixturePreceptors,
    FixtureTimetables,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Admin => "admin",
            Phase::Teachers => "teachers",
            Phase::Preceptors => "preceptors",
            Phase::Courses => "courses",
            Phase::StudentsAndParents => "students_and_parents",
            Phase::Subjects => "subjects",
            Phase::Timetables => "timetables",
            Phase::Assessments => "assessments",
            Phase::Grades => "grades",
            Phase::Messages => "messages",
            Phase::SubjectMessages => "subject_messages",
            Phase::FixtureCourses => "fixture_courses",
            Phase::FixtureUsers => "fixture_users",
            Phase::FixturePreceptors => "fixture_preceptors",
            Phase::FixtureTimetables => "fixture_timetables",
        }
    }

    pub fn descriptor(self) -> PhaseDescriptor {
        use EntitySet as E;
        let (requires, produces): (&'static [EntitySet], &'static [EntitySet]) = match self {
            Phase::Admin => (&[], &[E::Admin]),
            Phase::Teachers => (&[], &[E::Teachers]),
            Phase::Preceptors => (&[], &[E::Preceptors]),
            Phase::Courses => (&[E::Preceptors], &[E::Courses, E::PreceptorAssignments]),
            Phase::StudentsAndParents => (&[E::Courses], &[E::Students, E::Parents, E::Families]),
            Phase::Subjects => (&[E::Courses, E::Teachers], &[E::Subjects]),
            Phase::Timetables => (&[E::Courses, E::Subjects], &[E::Timetables]),
            Phase::Assessments => (&[E::Subjects], &[E::Assessments]),
            Phase::Grades => (&[E::Assessments, E::Students], &[E::Grades]),
            Phase::Messages => (
                &[E::Admin, E::Teachers, E::Preceptors, E::Courses],
                &[E::Messages, E::MessageCourses],
            ),
            Phase::SubjectMessages => (&[E::Subjects], &[E::SubjectMessages]),
            Phase::FixtureCourses => (&[], &[E::Courses]),
            Phase::FixtureUsers => (&[E::Courses], &[E::TestingAccounts, E::Families, E::Subjects]),
            Phase::FixturePreceptors => {
                (&[E::Courses, E::TestingAccounts], &[E::PreceptorAssignments])
            }
            Phase::FixtureTimetables => (&[E::Courses, E::Subjects], &[E::Timetables]),
        };
        PhaseDescriptor {
            phase: self,
            requires,
            produces,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares what a phase needs before it starts and what it leaves committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDescriptor {
    pub phase: Phase,
    pub requires: &'static [EntitySet],
    pub produces: &'static [EntitySet],
}

/// Ordered list of phases, validated before any write happens.
#[derive(Debug, Clone)]
pub struct PhasePlan {
    descriptors: Vec<PhaseDescriptor>,
}

impl PhasePlan {
    /// Full synthetic generation sequence.
    pub fn synthetic() -> Result<Self> {
        Self::new(
            &[
                Phase::Admin,
                Phase::Teachers,
                Phase::Preceptors,
                Phase::Courses,
                Phase::StudentsAndParents,
                Phase::Subjects,
                Phase::Timetables,
                Phase::Assessments,
                Phase::Grades,
                Phase::Messages,
                Phase::SubjectMessages,
            ],
            &[],
        )
    }

    /// Build a plan; `available` lists entity sets committed by earlier runs.
    pub fn new(phases: &[Phase], available: &[EntitySet]) -> Result<Self> {
        let descriptors: Vec<PhaseDescriptor> = phases.iter().map(|p| p.descriptor()).collect();
        validate_phase_order(&descriptors, available)?;
        Ok(Self { descriptors })
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.descriptors.iter().map(|d| d.phase)
    }

    pub fn descriptors(&self) -> &[PhaseDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Check that every requirement is produced by a strictly earlier phase and
/// that no entity set is produced twice.
pub fn validate_phase_order(
    descriptors: &[PhaseDescriptor],
    available: &[EntitySet],
) -> Result<()> {
    let mut produced: BTreeSet<EntitySet> = available.iter().copied().collect();
    let mut seen_phases = BTreeSet::new();

    for descriptor in descriptors {
        if !seen_phases.insert(descriptor.phase) {
            return Err(Error::InvalidPhaseOrder(format!(
                "phase '{}' appears more than once",
                descriptor.phase
            )));
        }

        let missing: Vec<String> = descriptor
            .requires
            .iter()
            .filter(|set| !produced.contains(set))
            .map(|set| format!("{set:?}"))
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidPhaseOrder(format!(
                "phase '{}' requires {} before it runs",
                descriptor.phase,
                missing.join(", ")
            )));
        }

        for set in descriptor.produces {
            if !produced.insert(*set) && !available.contains(set) {
                return Err(Error::InvalidPhaseOrder(format!(
                    "{set:?} produced twice (again by '{}')",
                    descriptor.phase
                )));
            }
        }
    }

    Ok(())
}
