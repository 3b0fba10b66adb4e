use std::str::FromStr;

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use schoolseed_core::{
    AssessmentId, CourseId, CourseRecord, Division, MessageId, NewAssessment, NewCourse, NewGrade,
    NewMessage, NewSubject, NewSubjectMessage, NewUser, PersonalData, Phase, Role, SubjectId,
    SubjectRecord, TimetableEntry, UserId,
};
use schoolseed_generate::{Store, StoreError};

/// Row shape of `courses`.
type CourseRow = (i64, i16, String, String, String, String, Option<i64>);

/// [`Store`] over a Postgres pool. Each phase is one transaction.
pub struct PgStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    phase: Option<Phase>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: None,
            phase: None,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn open_phase(&self) -> Option<Phase> {
        self.phase
    }

    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::NoOpenPhase)
    }
}

/// Maps driver errors; key and reference failures become constraint violations.
fn db_error(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        let kind = err.as_database_error().map(|db| db.kind());
        match kind {
            Some(
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation,
            ) => StoreError::ConstraintViolation {
                entity,
                detail: err.to_string(),
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}

fn parse_text<T>(value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = schoolseed_core::Error>,
{
    value
        .parse()
        .map_err(|err: schoolseed_core::Error| StoreError::Database(err.to_string()))
}

fn course_record(row: CourseRow) -> Result<CourseRecord, StoreError> {
    let (id, year, division, level, shift, name, preceptor_id) = row;
    let year = u8::try_from(year)
        .map_err(|_| StoreError::Database(format!("course {id} has year {year}")))?;
    Ok(CourseRecord {
        id,
        year,
        division: parse_text(&division)?,
        level: parse_text(&level)?,
        shift: parse_text(&shift)?,
        name,
        preceptor_id,
    })
}

fn missing_if_untouched(rows: u64, entity: &'static str, id: i64) -> Result<(), StoreError> {
    if rows == 0 {
        return Err(StoreError::MissingReference {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn begin_phase(&mut self, phase: Phase) -> Result<(), StoreError> {
        if let Some(open) = self.phase {
            return Err(StoreError::PhaseAlreadyOpen(open));
        }
        let tx = self.pool.begin().await.map_err(db_error("transaction"))?;
        self.tx = Some(tx);
        self.phase = Some(phase);
        debug!(phase = %phase, "transaction opened");
        Ok(())
    }

    async fn commit_phase(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::NoOpenPhase)?;
        let phase = self.phase.take();
        tx.commit().await.map_err(db_error("transaction"))?;
        if let Some(phase) = phase {
            debug!(phase = %phase, "transaction committed");
        }
        Ok(())
    }

    async fn abort_phase(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::NoOpenPhase)?;
        let phase = self.phase.take();
        tx.rollback().await.map_err(db_error("transaction"))?;
        if let Some(phase) = phase {
            debug!(phase = %phase, "transaction rolled back");
        }
        Ok(())
    }

    async fn insert_user(&mut self, user: &NewUser) -> Result<UserId, StoreError> {
        let conn = self.conn()?;
        let id: i64 =
            sqlx::query_scalar("INSERT INTO users (email, password) VALUES ($1, $2) RETURNING id")
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&mut *conn)
                .await
                .map_err(db_error("users"))?;
        sqlx::query("INSERT INTO roles (user_id, role) VALUES ($1, $2)")
            .bind(id)
            .bind(user.role.as_str())
            .execute(&mut *conn)
            .await
            .map_err(db_error("roles"))?;
        Ok(id)
    }

    async fn insert_personal_data(
        &mut self,
        user_id: UserId,
        data: &PersonalData,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO personal_data (user_id, full_name, birth_date, address, phone_number)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(&data.full_name)
        .bind(data.birth_date)
        .bind(&data.address)
        .bind(&data.phone_number)
        .execute(self.conn()?)
        .await
        .map_err(db_error("personal_data"))?;
        Ok(())
    }

    async fn upsert_personal_data(
        &mut self,
        user_id: UserId,
        data: &PersonalData,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO personal_data (user_id, full_name, birth_date, address, phone_number)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                birth_date = EXCLUDED.birth_date,
                address = EXCLUDED.address,
                phone_number = EXCLUDED.phone_number
            "#,
        )
        .bind(user_id)
        .bind(&data.full_name)
        .bind(data.birth_date)
        .bind(&data.address)
        .bind(&data.phone_number)
        .execute(self.conn()?)
        .await
        .map_err(db_error("personal_data"))?;
        Ok(())
    }

    async fn assign_course(
        &mut self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET course_id = $1 WHERE id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(self.conn()?)
            .await
            .map_err(db_error("users"))?;
        missing_if_untouched(result.rows_affected(), "user", user_id)
    }

    async fn insert_course(&mut self, course: &NewCourse) -> Result<CourseId, StoreError> {
        sqlx::query_scalar(
            r#"
            INSERT INTO courses (year, division, level, shift, name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(i16::from(course.year))
        .bind(course.division.as_str())
        .bind(course.level.as_str())
        .bind(course.shift.as_str())
        .bind(&course.name)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error("courses"))
    }

    async fn assign_preceptor(
        &mut self,
        course_id: CourseId,
        preceptor_id: UserId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE courses SET preceptor_id = $1 WHERE id = $2")
            .bind(preceptor_id)
            .bind(course_id)
            .execute(self.conn()?)
            .await
            .map_err(db_error("courses"))?;
        missing_if_untouched(result.rows_affected(), "course", course_id)
    }

    async fn insert_family(
        &mut self,
        student_id: UserId,
        father_id: UserId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO families (student_id, father_id) VALUES ($1, $2)")
            .bind(student_id)
            .bind(father_id)
            .execute(self.conn()?)
            .await
            .map_err(db_error("families"))?;
        Ok(())
    }

    async fn insert_subject(&mut self, subject: &NewSubject) -> Result<SubjectId, StoreError> {
        sqlx::query_scalar(
            "INSERT INTO subjects (name, course_id, teacher_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&subject.name)
        .bind(subject.course_id)
        .bind(subject.teacher_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error("subjects"))
    }

    async fn insert_timetable(&mut self, entry: &TimetableEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO timetables (course_id, subject_id, start_time, end_time, day)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.course_id)
        .bind(entry.subject_id)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.day.as_str())
        .execute(self.conn()?)
        .await
        .map_err(db_error("timetables"))?;
        Ok(())
    }

    async fn insert_assessment(
        &mut self,
        assessment: &NewAssessment,
    ) -> Result<AssessmentId, StoreError> {
        sqlx::query_scalar(
            r#"
            INSERT INTO assessments (type, due_date, task, subject_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(assessment.assessment_type.as_str())
        .bind(assessment.due_date)
        .bind(&assessment.task)
        .bind(assessment.subject_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error("assessments"))
    }

    async fn insert_grade(&mut self, grade: &NewGrade) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO grades
                (description, grade, student_id, subject_id, assessment_id, grade_type)
            VALUES ($1, CAST($2 AS NUMERIC(4, 2)), $3, $4, $5, $6)
            "#,
        )
        .bind(&grade.description)
        .bind(grade.grade)
        .bind(grade.student_id)
        .bind(grade.subject_id)
        .bind(grade.assessment_id)
        .bind(grade.grade_type.as_str())
        .execute(self.conn()?)
        .await
        .map_err(db_error("grades"))?;
        Ok(())
    }

    async fn insert_message(&mut self, message: &NewMessage) -> Result<MessageId, StoreError> {
        sqlx::query_scalar(
            "INSERT INTO messages (sender_id, message, title) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(&message.title)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error("messages"))
    }

    async fn link_message_course(
        &mut self,
        message_id: MessageId,
        course_id: CourseId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO message_courses (message_id, course_id) VALUES ($1, $2)")
            .bind(message_id)
            .bind(course_id)
            .execute(self.conn()?)
            .await
            .map_err(db_error("message_courses"))?;
        Ok(())
    }

    async fn insert_subject_message(
        &mut self,
        message: &NewSubjectMessage,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subject_messages (sender_id, subject_id, title, content, type)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.sender_id)
        .bind(message.subject_id)
        .bind(&message.title)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .execute(self.conn()?)
        .await
        .map_err(db_error("subject_messages"))?;
        Ok(())
    }

    async fn course_roster(&mut self, course_id: CourseId) -> Result<Vec<UserId>, StoreError> {
        sqlx::query_scalar(
            r#"
            SELECT u.id
            FROM users u
            JOIN roles r ON r.user_id = u.id
            WHERE u.course_id = $1 AND r.role = $2
            ORDER BY u.id
            "#,
        )
        .bind(course_id)
        .bind(Role::Student.as_str())
        .fetch_all(self.conn()?)
        .await
        .map_err(db_error("users"))
    }

    async fn users_with_roles(&mut self, roles: &[Role]) -> Result<Vec<UserId>, StoreError> {
        let names: Vec<&'static str> = roles.iter().map(|role| role.as_str()).collect();
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT u.id
            FROM users u
            JOIN roles r ON r.user_id = u.id
            WHERE r.role = ANY($1)
            ORDER BY u.id
            "#,
        )
        .bind(names)
        .fetch_all(self.conn()?)
        .await
        .map_err(db_error("roles"))
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserId>, StoreError> {
        sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.conn()?)
            .await
            .map_err(db_error("users"))
    }

    async fn find_course(
        &mut self,
        year: u8,
        division: Division,
    ) -> Result<Option<CourseRecord>, StoreError> {
        let row: Option<CourseRow> = sqlx::query_as(
            r#"
            SELECT id, year, division, level, shift, name, preceptor_id
            FROM courses
            WHERE year = $1 AND division = $2
            "#,
        )
        .bind(i16::from(year))
        .bind(division.as_str())
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error("courses"))?;
        row.map(course_record).transpose()
    }

    async fn find_subject(
        &mut self,
        course_id: CourseId,
        name: &str,
    ) -> Result<Option<SubjectRecord>, StoreError> {
        let row: Option<(i64, String, i64, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT id, name, course_id, teacher_id
            FROM subjects
            WHERE course_id = $1 AND name = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(course_id)
        .bind(name)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error("subjects"))?;
        Ok(row.map(|(id, name, course_id, teacher_id)| SubjectRecord {
            id,
            name,
            course_id,
            teacher_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schoolseed_core::{Level, Shift};

    #[test]
    fn course_rows_decode_into_records() {
        let row: CourseRow = (
            4,
            8,
            "B".to_string(),
            "secondary".to_string(),
            "morning".to_string(),
            "Primer año Tierra".to_string(),
            Some(11),
        );
        let record = course_record(row).unwrap();
        assert_eq!(record.year, 8);
        assert_eq!(record.division, Division::B);
        assert_eq!(record.level, Level::Secondary);
        assert_eq!(record.shift, Shift::Morning);
        assert_eq!(record.preceptor_id, Some(11));
    }

    #[test]
    fn unknown_text_values_are_database_errors() {
        let row: CourseRow = (
            1,
            1,
            "Z".to_string(),
            "primary".to_string(),
            "morning".to_string(),
            "x".to_string(),
            None,
        );
        assert!(matches!(course_record(row), Err(StoreError::Database(_))));

        let row: CourseRow = (
            1,
            -3,
            "A".to_string(),
            "primary".to_string(),
            "morning".to_string(),
            "x".to_string(),
            None,
        );
        assert!(matches!(course_record(row), Err(StoreError::Database(_))));
    }

    #[test]
    fn untouched_updates_name_the_missing_row() {
        assert!(missing_if_untouched(1, "course", 3).is_ok());
        match missing_if_untouched(0, "course", 3) {
            Err(StoreError::MissingReference { entity, id }) => {
                assert_eq!(entity, "course");
                assert_eq!(id, "3");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_database_errors_are_not_constraint_violations() {
        let err = db_error("users")(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
