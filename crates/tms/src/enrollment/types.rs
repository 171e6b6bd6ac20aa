/// Core records shared by the enrollment engine and its collaborators
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::CourseSchedule;

pub type StudentId = i64;
pub type CourseId = i64;
pub type EnrollmentId = i64;

/// Lifecycle of an enrollment: active -> withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Withdrawn,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EnrollmentStatus::Active),
            "withdrawn" => Some(EnrollmentStatus::Withdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub status: EnrollmentStatus,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }
}

/// Immutable snapshot of a course as seen by the engine.
#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub course_id: CourseId,
    pub course_code: String,
    pub name: String,
    pub capacity: u32,
    pub schedule: CourseSchedule,
    pub semester: String,
    pub active: bool,
}

/// Immutable snapshot of a student as seen by the engine.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub student_number: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub course_id: CourseId,
    pub capacity: u32,
    pub current_enrollment: u32,
    pub available_slots: u32,
    pub is_full: bool,
}

impl CapacitySnapshot {
    pub fn new(course_id: CourseId, capacity: u32, current_enrollment: u32) -> Self {
        let available_slots = capacity.saturating_sub(current_enrollment);
        Self {
            course_id,
            capacity,
            current_enrollment,
            available_slots,
            is_full: available_slots == 0,
        }
    }
}
