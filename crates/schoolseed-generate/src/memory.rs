//! In-process [`Store`] used for dry runs and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use schoolseed_core::{
    AssessmentId, AssessmentType, CourseId, CourseRecord, Division, GradeType, MessageId,
    NewAssessment, NewCourse, NewGrade, NewMessage, NewSubject, NewSubjectMessage, NewUser,
    PersonalData, Phase, Role, SubjectId, SubjectMessageType, SubjectRecord, TimetableEntry,
    UserId,
};

use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub course_id: Option<CourseId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalDataRow {
    pub user_id: UserId,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyRow {
    pub student_id: UserId,
    pub father_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentRow {
    pub id: AssessmentId,
    pub assessment_type: AssessmentType,
    pub due_date: NaiveDate,
    pub task: String,
    pub subject_id: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRow {
    pub id: i64,
    pub description: String,
    pub grade: f64,
    pub student_id: UserId,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
    pub grade_type: GradeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender_id: UserId,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageCourseRow {
    pub message_id: MessageId,
    pub course_id: CourseId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectMessageRow {
    pub id: i64,
    pub sender_id: Option<UserId>,
    pub subject_id: SubjectId,
    pub title: String,
    pub content: String,
    pub message_type: SubjectMessageType,
}

/// Every table the engine writes, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub users: Vec<UserRow>,
    pub personal_data: Vec<PersonalDataRow>,
    pub courses: Vec<CourseRecord>,
    pub families: Vec<FamilyRow>,
    pub subjects: Vec<SubjectRecord>,
    pub timetables: Vec<TimetableEntry>,
    pub assessments: Vec<AssessmentRow>,
    pub grades: Vec<GradeRow>,
    pub messages: Vec<MessageRow>,
    pub message_courses: Vec<MessageCourseRow>,
    pub subject_messages: Vec<SubjectMessageRow>,
}

impl Dataset {
    pub fn user(&self, id: UserId) -> Option<&UserRow> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&UserRow> {
        self.users.iter().find(|user| user.email == email)
    }

    pub fn users_with_role(&self, role: Role) -> impl Iterator<Item = &UserRow> + '_ {
        self.users.iter().filter(move |user| user.role == role)
    }

    pub fn course(&self, id: CourseId) -> Option<&CourseRecord> {
        self.courses.iter().find(|course| course.id == id)
    }

    pub fn subject(&self, id: SubjectId) -> Option<&SubjectRecord> {
        self.subjects.iter().find(|subject| subject.id == id)
    }

    pub fn roster(&self, course_id: CourseId) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|user| user.role == Role::Student && user.course_id == Some(course_id))
            .map(|user| user.id)
            .collect()
    }
}

/// Unique keys that would cost a scan to check against the rows.
#[derive(Debug, Clone, Default)]
struct UniqueKeys {
    emails: HashSet<String>,
    /// (student, father)
    families: HashSet<(UserId, UserId)>,
    /// (assessment, student)
    grades: HashSet<(AssessmentId, UserId)>,
}

/// Applies writes immediately, keeps a snapshot per phase for aborts, and
/// enforces the same keys as the SQL schema:
/// unique emails, one course per (year, division), one personal data row per
/// user, one family row per (student, father), one grade per (assessment,
/// student), and existing targets for every reference.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Dataset,
    keys: UniqueKeys,
    open_phase: Option<Phase>,
    /// State as of `begin_phase`, restored on abort.
    snapshot: Option<(Dataset, UniqueKeys)>,
    committed: Vec<Phase>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn into_dataset(self) -> Dataset {
        self.data
    }

    /// Phases committed so far, in order.
    pub fn committed_phases(&self) -> &[Phase] {
        &self.committed
    }

    pub fn open_phase(&self) -> Option<Phase> {
        self.open_phase
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        match self.open_phase {
            Some(_) => Ok(()),
            None => Err(StoreError::NoOpenPhase),
        }
    }

    fn require_user(&self, id: UserId, entity: &'static str) -> Result<(), StoreError> {
        match self.data.user(id) {
            Some(_) => Ok(()),
            None => Err(foreign_key(entity, "user", id)),
        }
    }

    fn require_course(&self, id: CourseId, entity: &'static str) -> Result<(), StoreError> {
        match self.data.course(id) {
            Some(_) => Ok(()),
            None => Err(foreign_key(entity, "course", id)),
        }
    }

    fn require_subject(&self, id: SubjectId, entity: &'static str) -> Result<(), StoreError> {
        match self.data.subject(id) {
            Some(_) => Ok(()),
            None => Err(foreign_key(entity, "subject", id)),
        }
    }
}

fn foreign_key(entity: &'static str, target: &str, id: i64) -> StoreError {
    StoreError::ConstraintViolation {
        entity,
        detail: format!("{target} {id} does not exist"),
    }
}

fn next_id(len: usize) -> i64 {
    len as i64 + 1
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin_phase(&mut self, phase: Phase) -> Result<(), StoreError> {
        if let Some(open) = self.open_phase {
            return Err(StoreError::PhaseAlreadyOpen(open));
        }
        self.snapshot = Some((self.data.clone(), self.keys.clone()));
        self.open_phase = Some(phase);
        Ok(())
    }

    async fn commit_phase(&mut self) -> Result<(), StoreError> {
        let phase = self.open_phase.take().ok_or(StoreError::NoOpenPhase)?;
        self.snapshot = None;
        self.committed.push(phase);
        Ok(())
    }

    async fn abort_phase(&mut self) -> Result<(), StoreError> {
        self.open_phase.take().ok_or(StoreError::NoOpenPhase)?;
        if let Some((data, keys)) = self.snapshot.take() {
            self.data = data;
            self.keys = keys;
        }
        Ok(())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<UserId, StoreError> {
        self.ensure_open()?;
        if !self.keys.emails.insert(user.email.clone()) {
            return Err(StoreError::ConstraintViolation {
                entity: "users",
                detail: format!("duplicate email '{}'", user.email),
            });
        }
        let id = next_id(self.data.users.len());
        self.data.users.push(UserRow {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            course_id: None,
        });
        Ok(id)
    }

    async fn insert_personal_data(
        &mut self,
        user_id: UserId,
        data: &PersonalData,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_user(user_id, "personal_data")?;
        if self.data.personal_data.iter().any(|row| row.user_id == user_id) {
            return Err(StoreError::ConstraintViolation {
                entity: "personal_data",
                detail: format!("user {user_id} already has personal data"),
            });
        }
        self.data.personal_data.push(PersonalDataRow {
            user_id,
            full_name: data.full_name.clone(),
            birth_date: data.birth_date,
            address: data.address.clone(),
            phone_number: data.phone_number.clone(),
        });
        Ok(())
    }

    async fn upsert_personal_data(
        &mut self,
        user_id: UserId,
        data: &PersonalData,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_user(user_id, "personal_data")?;
        self.data.personal_data.retain(|row| row.user_id != user_id);
        self.insert_personal_data(user_id, data).await
    }

    async fn assign_course(
        &mut self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_course(course_id, "users")?;
        let user = self
            .data
            .users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| StoreError::MissingReference {
                entity: "user",
                id: user_id.to_string(),
            })?;
        user.course_id = Some(course_id);
        Ok(())
    }

    async fn insert_course(&mut self, course: &NewCourse) -> Result<CourseId, StoreError> {
        self.ensure_open()?;
        if self
            .data
            .courses
            .iter()
            .any(|row| row.year == course.year && row.division == course.division)
        {
            return Err(StoreError::ConstraintViolation {
                entity: "courses",
                detail: format!("duplicate course {}{}", course.year, course.division),
            });
        }
        let id = next_id(self.data.courses.len());
        self.data.courses.push(CourseRecord {
            id,
            year: course.year,
            division: course.division,
            level: course.level,
            shift: course.shift,
            name: course.name.clone(),
            preceptor_id: None,
        });
        Ok(id)
    }

    async fn assign_preceptor(
        &mut self,
        course_id: CourseId,
        preceptor_id: UserId,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_user(preceptor_id, "courses")?;
        let course = self
            .data
            .courses
            .iter_mut()
            .find(|course| course.id == course_id)
            .ok_or_else(|| StoreError::MissingReference {
                entity: "course",
                id: course_id.to_string(),
            })?;
        course.preceptor_id = Some(preceptor_id);
        Ok(())
    }

    async fn insert_family(
        &mut self,
        student_id: UserId,
        father_id: UserId,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_user(student_id, "families")?;
        self.require_user(father_id, "families")?;
        if !self.keys.families.insert((student_id, father_id)) {
            return Err(StoreError::ConstraintViolation {
                entity: "families",
                detail: format!("student {student_id} is already linked to father {father_id}"),
            });
        }
        self.data.families.push(FamilyRow {
            student_id,
            father_id,
        });
        Ok(())
    }

    async fn insert_subject(&mut self, subject: &NewSubject) -> Result<SubjectId, StoreError> {
        self.ensure_open()?;
        self.require_course(subject.course_id, "subjects")?;
        if let Some(teacher_id) = subject.teacher_id {
            self.require_user(teacher_id, "subjects")?;
        }
        let id = next_id(self.data.subjects.len());
        self.data.subjects.push(SubjectRecord {
            id,
            name: subject.name.clone(),
            course_id: subject.course_id,
            teacher_id: subject.teacher_id,
        });
        Ok(id)
    }

    async fn insert_timetable(&mut self, entry: &TimetableEntry) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_course(entry.course_id, "timetables")?;
        self.require_subject(entry.subject_id, "timetables")?;
        self.data.timetables.push(entry.clone());
        Ok(())
    }

    async fn insert_assessment(
        &mut self,
        assessment: &NewAssessment,
    ) -> Result<AssessmentId, StoreError> {
        self.ensure_open()?;
        self.require_subject(assessment.subject_id, "assessments")?;
        let id = next_id(self.data.assessments.len());
        self.data.assessments.push(AssessmentRow {
            id,
            assessment_type: assessment.assessment_type,
            due_date: assessment.due_date,
            task: assessment.task.clone(),
            subject_id: assessment.subject_id,
        });
        Ok(id)
    }

    async fn insert_grade(&mut self, grade: &NewGrade) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_user(grade.student_id, "grades")?;
        self.require_subject(grade.subject_id, "grades")?;
        if !self
            .data
            .assessments
            .iter()
            .any(|row| row.id == grade.assessment_id)
        {
            return Err(foreign_key("grades", "assessment", grade.assessment_id));
        }
        if !self
            .keys
            .grades
            .insert((grade.assessment_id, grade.student_id))
        {
            return Err(StoreError::ConstraintViolation {
                entity: "grades",
                detail: format!(
                    "student {} is already graded for assessment {}",
                    grade.student_id, grade.assessment_id
                ),
            });
        }
        let id = next_id(self.data.grades.len());
        self.data.grades.push(GradeRow {
            id,
            description: grade.description.clone(),
            grade: grade.grade,
            student_id: grade.student_id,
            subject_id: grade.subject_id,
            assessment_id: grade.assessment_id,
            grade_type: grade.grade_type,
        });
        Ok(())
    }

    async fn insert_message(&mut self, message: &NewMessage) -> Result<MessageId, StoreError> {
        self.ensure_open()?;
        self.require_user(message.sender_id, "messages")?;
        let id = next_id(self.data.messages.len());
        self.data.messages.push(MessageRow {
            id,
            sender_id: message.sender_id,
            title: message.title.clone(),
            content: message.content.clone(),
        });
        Ok(id)
    }

    async fn link_message_course(
        &mut self,
        message_id: MessageId,
        course_id: CourseId,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        if !self.data.messages.iter().any(|row| row.id == message_id) {
            return Err(foreign_key("message_courses", "message", message_id));
        }
        self.require_course(course_id, "message_courses")?;
        let link = MessageCourseRow {
            message_id,
            course_id,
        };
        if self.data.message_courses.contains(&link) {
            return Err(StoreError::ConstraintViolation {
                entity: "message_courses",
                detail: format!("message {message_id} already linked to course {course_id}"),
            });
        }
        self.data.message_courses.push(link);
        Ok(())
    }

    async fn insert_subject_message(
        &mut self,
        message: &NewSubjectMessage,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.require_subject(message.subject_id, "subject_messages")?;
        if let Some(sender_id) = message.sender_id {
            self.require_user(sender_id, "subject_messages")?;
        }
        let id = next_id(self.data.subject_messages.len());
        self.data.subject_messages.push(SubjectMessageRow {
            id,
            sender_id: message.sender_id,
            subject_id: message.subject_id,
            title: message.title.clone(),
            content: message.content.clone(),
            message_type: message.message_type,
        });
        Ok(())
    }

    async fn course_roster(&mut self, course_id: CourseId) -> Result<Vec<UserId>, StoreError> {
        self.ensure_open()?;
        Ok(self.data.roster(course_id))
    }

    async fn users_with_roles(&mut self, roles: &[Role]) -> Result<Vec<UserId>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .data
            .users
            .iter()
            .filter(|user| roles.contains(&user.role))
            .map(|user| user.id)
            .collect())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserId>, StoreError> {
        self.ensure_open()?;
        Ok(self.data.user_by_email(email).map(|user| user.id))
    }

    async fn find_course(
        &mut self,
        year: u8,
        division: Division,
    ) -> Result<Option<CourseRecord>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .data
            .courses
            .iter()
            .find(|course| course.year == year && course.division == division)
            .cloned())
    }

    async fn find_subject(
        &mut self,
        course_id: CourseId,
        name: &str,
    ) -> Result<Option<SubjectRecord>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .data
            .subjects
            .iter()
            .find(|subject| subject.course_id == course_id && subject.name == name)
            .cloned())
    }
}
