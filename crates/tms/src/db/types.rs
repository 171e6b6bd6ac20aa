/// Database row types for the directory and enrollment tables
use chrono::{DateTime, Utc};

use crate::enrollment::{
    CourseRecord, CourseSchedule, Enrollment, EnrollmentStatus, StoreError, StudentRecord,
};

#[derive(Debug, Clone)]
pub struct DbCourse {
    pub course_id: i64,
    pub course_code: String,
    pub name: String,
    pub capacity: i64,
    pub schedule: Option<String>, // free text, e.g. "Mon/Wed 10:00-11:30"
    pub semester: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct DbStudent {
    pub student_number: String,
    pub status: String, // "active", "on_leave", "graduated"
}

#[derive(Debug, Clone)]
pub struct DbEnrollment {
    pub enrollment_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub enrolled_at: DateTime<Utc>,
    pub status: String,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

/// Input for creating a student together with its user account.
#[derive(Debug, Clone)]
pub struct NewStudent<'a> {
    pub username: &'a str,
    pub full_name: &'a str,
    pub student_number: &'a str,
    pub major: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewCourse<'a> {
    pub course_code: &'a str,
    pub name: &'a str,
    pub capacity: u32,
    pub schedule: Option<&'a str>,
    pub semester: &'a str,
}

impl TryFrom<DbCourse> for CourseRecord {
    type Error = StoreError;

    fn try_from(row: DbCourse) -> Result<Self, Self::Error> {
        let capacity = u32::try_from(row.capacity).map_err(|_| StoreError::Corrupt {
            message: format!("course {} has capacity {}", row.course_id, row.capacity),
        })?;

        Ok(CourseRecord {
            course_id: row.course_id,
            course_code: row.course_code,
            name: row.name,
            capacity,
            schedule: CourseSchedule::from_raw(row.schedule.as_deref()),
            semester: row.semester,
            active: row.is_active,
        })
    }
}

impl From<DbStudent> for StudentRecord {
    fn from(row: DbStudent) -> Self {
        StudentRecord {
            active: row.status == "active",
            student_number: row.student_number,
        }
    }
}

impl TryFrom<DbEnrollment> for Enrollment {
    type Error = StoreError;

    fn try_from(row: DbEnrollment) -> Result<Self, Self::Error> {
        let status = EnrollmentStatus::parse(&row.status).ok_or_else(|| StoreError::Corrupt {
            message: format!(
                "enrollment {} has status {:?}",
                row.enrollment_id, row.status
            ),
        })?;

        Ok(Enrollment {
            enrollment_id: row.enrollment_id,
            student_id: row.student_id,
            course_id: row.course_id,
            enrolled_at: row.enrolled_at,
            status,
            withdrawn_at: row.withdrawn_at,
        })
    }
}
