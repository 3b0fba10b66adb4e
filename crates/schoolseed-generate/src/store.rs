use async_trait::async_trait;
use thiserror::Error;

use schoolseed_core::{
    AssessmentId, CourseId, CourseRecord, Division, MessageId, NewAssessment, NewCourse, NewGrade,
    NewMessage, NewSubject, NewSubjectMessage, NewUser, PersonalData, Phase, Role, SubjectId,
    SubjectRecord, TimetableEntry, UserId,
};

/// Errors raised by a [`Store`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violation on {entity}: {detail}")]
    ConstraintViolation { entity: &'static str, detail: String },
    #[error("{entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: String },
    #[error("no phase is open")]
    NoOpenPhase,
    #[error("phase '{0}' is already open")]
    PhaseAlreadyOpen(Phase),
    #[error("database error: {0}")]
    Database(String),
}

/// Persistence seam for the generation engine.
///
/// Every write and read happens between [`Store::begin_phase`] and
/// [`Store::commit_phase`]. An aborted phase leaves no rows behind.
#[async_trait]
pub trait Store: Send {
    async fn begin_phase(&mut self, phase: Phase) -> Result<(), StoreError>;
    async fn commit_phase(&mut self) -> Result<(), StoreError>;
    /// Discards every write of the open phase.
    async fn abort_phase(&mut self) -> Result<(), StoreError>;

    async fn insert_user(&mut self, user: &NewUser) -> Result<UserId, StoreError>;
    async fn insert_personal_data(
        &mut self,
        user_id: UserId,
        data: &PersonalData,
    ) -> Result<(), StoreError>;
    /// Writes personal data, replacing any row the user already has.
    async fn upsert_personal_data(
        &mut self,
        user_id: UserId,
        data: &PersonalData,
    ) -> Result<(), StoreError>;
    /// Second-step write of `users.course_id`.
    async fn assign_course(&mut self, user_id: UserId, course_id: CourseId)
    -> Result<(), StoreError>;

    async fn insert_course(&mut self, course: &NewCourse) -> Result<CourseId, StoreError>;
    /// Second-step write of `courses.preceptor_id`.
    async fn assign_preceptor(
        &mut self,
        course_id: CourseId,
        preceptor_id: UserId,
    ) -> Result<(), StoreError>;
    async fn insert_family(&mut self, student_id: UserId, father_id: UserId)
    -> Result<(), StoreError>;

    async fn insert_subject(&mut self, subject: &NewSubject) -> Result<SubjectId, StoreError>;
    async fn insert_timetable(&mut self, entry: &TimetableEntry) -> Result<(), StoreError>;
    async fn insert_assessment(
        &mut self,
        assessment: &NewAssessment,
    ) -> Result<AssessmentId, StoreError>;
    async fn insert_grade(&mut self, grade: &NewGrade) -> Result<(), StoreError>;
    async fn insert_message(&mut self, message: &NewMessage) -> Result<MessageId, StoreError>;
    async fn link_message_course(
        &mut self,
        message_id: MessageId,
        course_id: CourseId,
    ) -> Result<(), StoreError>;
    async fn insert_subject_message(
        &mut self,
        message: &NewSubjectMessage,
    ) -> Result<(), StoreError>;

    /// Students whose `course_id` is `course_id`, ordered by id.
    async fn course_roster(&mut self, course_id: CourseId) -> Result<Vec<UserId>, StoreError>;
    /// Users holding any of `roles`, ordered by id.
    async fn users_with_roles(&mut self, roles: &[Role]) -> Result<Vec<UserId>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserId>, StoreError>;
    async fn find_course(
        &mut self,
        year: u8,
        division: Division,
    ) -> Result<Option<CourseRecord>, StoreError>;
    async fn find_subject(
        &mut self,
        course_id: CourseId,
        name: &str,
    ) -> Result<Option<SubjectRecord>, StoreError>;
}
