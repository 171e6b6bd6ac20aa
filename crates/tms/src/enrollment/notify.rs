//! Enrollment notifications.
//!
//! Delivery is best-effort: the engine logs a failed emit and carries on.

use serde::Serialize;
use thiserror::Error;

use super::types::{CourseId, EnrollmentId, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    Enrolled {
        enrollment_id: EnrollmentId,
        student_id: StudentId,
        course_id: CourseId,
        course_name: String,
    },
    Withdrawn {
        enrollment_id: EnrollmentId,
        student_id: StudentId,
        course_id: CourseId,
        course_name: String,
    },
}

impl EnrollmentEvent {
    pub fn student_id(&self) -> StudentId {
        match self {
            EnrollmentEvent::Enrolled { student_id, .. }
            | EnrollmentEvent::Withdrawn { student_id, .. } => *student_id,
        }
    }

    pub fn title(&self) -> String {
        match self {
            EnrollmentEvent::Enrolled { course_name, .. } => {
                format!("Successfully Enrolled: {course_name}")
            }
            EnrollmentEvent::Withdrawn { course_name, .. } => {
                format!("Withdrawn: {course_name}")
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            EnrollmentEvent::Enrolled { course_name, .. } => {
                format!("You have been successfully enrolled in {course_name}")
            }
            EnrollmentEvent::Withdrawn { course_name, .. } => {
                format!("You have been withdrawn from {course_name}")
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {message}")]
pub struct NotifyError {
    pub message: String,
}

/// Receiver of enrollment events.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &EnrollmentEvent) -> Result<(), NotifyError>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that keeps every event, optionally failing each delivery.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<EnrollmentEvent>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn events(&self) -> Vec<EnrollmentEvent> {
            self.events.lock().clone()
        }
    }

    impl NotificationSink for RecordingSink {
        fn emit(&self, event: &EnrollmentEvent) -> Result<(), NotifyError> {
            self.events.lock().push(event.clone());
            if self.fail {
                return Err(NotifyError {
                    message: "sink offline".to_string(),
                });
            }
            Ok(())
        }
    }
}
