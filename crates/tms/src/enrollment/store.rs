//! Contracts for the collaborators the enrollment engine depends on.
//!
//! Every call takes the caller's deadline; implementations return
//! [`StoreError::Timeout`] instead of blocking past it.

use std::time::Instant;

use super::error::StoreError;
use super::types::{CourseId, CourseRecord, Enrollment, EnrollmentId, StudentId, StudentRecord};

/// Read-only view of the student and course catalog.
pub trait Directory: Send + Sync {
    fn get_course(
        &self,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Option<CourseRecord>, StoreError>;

    fn get_student(
        &self,
        student_id: StudentId,
        deadline: Instant,
    ) -> Result<Option<StudentRecord>, StoreError>;

    /// Courses in `term` the student currently holds an active enrollment in.
    fn student_active_courses(
        &self,
        student_id: StudentId,
        term: &str,
        deadline: Instant,
    ) -> Result<Vec<CourseId>, StoreError>;
}

/// Result of a conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Enrollment),
    /// An active enrollment for the pair already exists; nothing was written.
    Duplicate,
    /// The course already holds `capacity` active enrollments; nothing was written.
    Full,
}

/// Persistent enrollment table.
pub trait EnrollmentStore: Send + Sync {
    fn get_enrollment(
        &self,
        enrollment_id: EnrollmentId,
        deadline: Instant,
    ) -> Result<Option<Enrollment>, StoreError>;

    fn find_active(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Option<Enrollment>, StoreError>;

    fn count_active(&self, course_id: CourseId, deadline: Instant) -> Result<u32, StoreError>;

    /// Inserts an active enrollment if the pair is not already enrolled and
    /// the course holds fewer than `capacity` active enrollments. The checks
    /// and the insert commit or roll back together.
    fn insert_if_below_capacity(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        capacity: u32,
        deadline: Instant,
    ) -> Result<InsertOutcome, StoreError>;

    /// Marks an active enrollment withdrawn. Returns `None` if no active
    /// enrollment with that id exists.
    fn mark_withdrawn(
        &self,
        enrollment_id: EnrollmentId,
        deadline: Instant,
    ) -> Result<Option<Enrollment>, StoreError>;

    fn list_active_for_student(
        &self,
        student_id: StudentId,
        deadline: Instant,
    ) -> Result<Vec<Enrollment>, StoreError>;

    fn list_active_for_course(
        &self,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Vec<Enrollment>, StoreError>;
}
