use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type UserId = i64;
pub type CourseId = i64;
pub type SubjectId = i64;
pub type AssessmentId = i64;
pub type MessageId = i64;

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Account role, fixed when the user is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Preceptor,
    Student,
    Father,
}

text_enum!(Role, "role", {
    Admin => "admin",
    Teacher => "teacher",
    Preceptor => "preceptor",
    Student => "student",
    Father => "father",
});

impl Role {
    /// Staff roles may send broadcast messages.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Teacher | Role::Preceptor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Primary,
    Secondary,
}

text_enum!(Level, "level", {
    Primary => "primary",
    Secondary => "secondary",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Afternoon,
}

text_enum!(Shift, "shift", {
    Morning => "morning",
    Afternoon => "afternoon",
});

/// Course division within a school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Division {
    A,
    B,
    C,
}

text_enum!(Division, "division", {
    A => "A",
    B => "B",
    C => "C",
});

impl Division {
    /// 1-based division number.
    pub fn number(self) -> u8 {
        match self {
            Division::A => 1,
            Division::B => 2,
            Division::C => 3,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

text_enum!(Weekday, "weekday", {
    Monday => "Monday",
    Tuesday => "Tuesday",
    Wednesday => "Wednesday",
    Thursday => "Thursday",
    Friday => "Friday",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    Exam,
    Homework,
    Project,
    Oral,
}

text_enum!(AssessmentType, "assessment type", {
    Exam => "exam",
    Homework => "homework",
    Project => "project",
    Oral => "oral",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeType {
    Numerical,
    Conceptual,
    Percentage,
}

text_enum!(GradeType, "grade type", {
    Numerical => "numerical",
    Conceptual => "conceptual",
    Percentage => "percentage",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectMessageType {
    Message,
    Link,
    File,
}

text_enum!(SubjectMessageType, "subject message type", {
    Message => "message",
    Link => "link",
    File => "file",
});

/// User row before insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Personal data owned 1:1 by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalData {
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub year: u8,
    pub division: Division,
    pub level: Level,
    pub shift: Shift,
    pub name: String,
}

/// Course as known after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: CourseId,
    pub year: u8,
    pub division: Division,
    pub level: Level,
    pub shift: Shift,
    pub name: String,
    pub preceptor_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
    pub name: String,
    pub course_id: CourseId,
    pub teacher_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: SubjectId,
    pub name: String,
    pub course_id: CourseId,
    pub teacher_id: Option<UserId>,
}

/// One weekly timetable row; `[start_time, end_time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub course_id: CourseId,
    pub subject_id: SubjectId,
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimetableEntry {
    pub fn overlaps(&self, other: &TimetableEntry) -> bool {
        self.course_id == other.course_id
            && self.day == other.day
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub assessment_type: AssessmentType,
    pub due_date: NaiveDate,
    pub task: String,
    pub subject_id: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: AssessmentId,
    pub assessment_type: AssessmentType,
    pub subject_id: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGrade {
    pub description: String,
    pub grade: f64,
    pub student_id: UserId,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
    pub grade_type: GradeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubjectMessage {
    pub sender_id: Option<UserId>,
    pub subject_id: SubjectId,
    pub title: String,
    pub content: String,
    pub message_type: SubjectMessageType,
}
