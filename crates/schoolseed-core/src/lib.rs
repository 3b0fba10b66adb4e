//! Core contracts for schoolseed.
//!
//! Defines the school domain enums and entity records, the course layout
//! rules shared by the synthetic and fixture paths, and the phase
//! descriptors that fix the order in which entities are produced.

pub mod error;
pub mod layout;
pub mod model;
pub mod phases;

pub use error::{Error, Result};
pub use layout::{CourseLayout, CourseSlot, ShiftPolicy, course_name, division_name, ordinal_name};
pub use model::{
    AssessmentId, AssessmentRecord, AssessmentType, CourseId, CourseRecord, Division, GradeType,
    Level, MessageId, NewAssessment, NewCourse, NewGrade, NewMessage, NewSubject,
    NewSubjectMessage, NewUser, PersonalData, Role, Shift, SubjectId, SubjectMessageType,
    SubjectRecord, TimetableEntry, UserId, Weekday,
};
pub use phases::{EntitySet, Phase, PhaseDescriptor, PhasePlan, validate_phase_order};
