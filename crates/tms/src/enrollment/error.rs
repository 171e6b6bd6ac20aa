//! Error types for the enrollment subsystem.

use thiserror::Error;

use super::types::{CourseId, EnrollmentId, StudentId};

/// Failures reported by the directory and enrollment store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database is busy or locked by another writer
    #[error("store busy: {message}")]
    Busy { message: String },

    /// The caller's deadline passed while waiting on the store
    #[error("timed out waiting for the store")]
    Timeout,

    /// Any other database failure
    #[error("database error: {message}")]
    Database { message: String },

    /// A persisted row could not be mapped back into a record
    #[error("corrupt row: {message}")]
    Corrupt { message: String },
}

/// Outcomes of `Enroll` other than success.
///
/// Everything except [`EnrollmentError::StoreUnavailable`] and
/// [`EnrollmentError::Timeout`] is an expected business rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("enrollment is closed")]
    EnrollmentClosed,

    #[error("student {student_id} not found")]
    StudentNotFound { student_id: StudentId },

    #[error("student {student_id} is not active")]
    StudentInactive { student_id: StudentId },

    #[error("course not open for enrollment")]
    CourseInactive { course_id: CourseId },

    #[error("already enrolled")]
    DuplicateEnrollment {
        student_id: StudentId,
        course_id: CourseId,
    },

    #[error("course is at capacity")]
    CourseFull { course_id: CourseId, capacity: u32 },

    #[error("schedule conflict with course {course_name}")]
    ScheduleConflict {
        course_id: CourseId,
        course_name: String,
    },

    #[error("course schedule {raw:?} cannot be read")]
    InvalidSchedule { course_id: CourseId, raw: String },

    #[error("enrollment limit of {limit} courses per term reached")]
    EnrollmentLimitReached { limit: u32 },

    #[error("enrollment store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("enrollment attempt timed out")]
    Timeout,
}

impl EnrollmentError {
    /// Returns true if the failure is transient and the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EnrollmentError::StoreUnavailable { .. } | EnrollmentError::Timeout
        )
    }
}

impl From<StoreError> for EnrollmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => EnrollmentError::Timeout,
            other => EnrollmentError::StoreUnavailable {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WithdrawalError {
    #[error("no active enrollment with id {enrollment_id}")]
    NotFound { enrollment_id: EnrollmentId },

    #[error("enrollment store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("withdrawal timed out")]
    Timeout,
}

impl WithdrawalError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WithdrawalError::StoreUnavailable { .. } | WithdrawalError::Timeout
        )
    }
}

impl From<StoreError> for WithdrawalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => WithdrawalError::Timeout,
            other => WithdrawalError::StoreUnavailable {
                message: other.to_string(),
            },
        }
    }
}
