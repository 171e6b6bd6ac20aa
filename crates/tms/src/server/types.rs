use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::enrollment::{EnrollmentError, StoreError, WithdrawalError};

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiErrorType {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    retryable: bool,
}

impl ApiErrorType {
    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, error, context): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            error: error.to_string(),
            context,
            retryable: false,
        }
    }
}

impl From<&EnrollmentError> for ApiErrorType {
    fn from(err: &EnrollmentError) -> Self {
        let (status, kind) = match err {
            EnrollmentError::EnrollmentClosed => (StatusCode::FORBIDDEN, "enrollment_closed"),
            EnrollmentError::StudentNotFound { .. } => (StatusCode::NOT_FOUND, "student_not_found"),
            EnrollmentError::StudentInactive { .. } => (StatusCode::FORBIDDEN, "student_inactive"),
            EnrollmentError::CourseInactive { .. } => (StatusCode::CONFLICT, "course_inactive"),
            EnrollmentError::DuplicateEnrollment { .. } => {
                (StatusCode::CONFLICT, "duplicate_enrollment")
            }
            EnrollmentError::CourseFull { .. } => (StatusCode::CONFLICT, "course_full"),
            EnrollmentError::ScheduleConflict { .. } => (StatusCode::CONFLICT, "schedule_conflict"),
            EnrollmentError::InvalidSchedule { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_schedule")
            }
            EnrollmentError::EnrollmentLimitReached { .. } => {
                (StatusCode::CONFLICT, "enrollment_limit_reached")
            }
            EnrollmentError::StoreUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
            EnrollmentError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        };

        let api_error = Self::from((status, err.to_string().as_str(), Some(kind.to_string())));
        if err.is_retryable() {
            api_error.retryable()
        } else {
            api_error
        }
    }
}

impl From<&WithdrawalError> for ApiErrorType {
    fn from(err: &WithdrawalError) -> Self {
        let status = match err {
            WithdrawalError::NotFound { .. } => StatusCode::NOT_FOUND,
            WithdrawalError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WithdrawalError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        };

        let api_error = Self::from((status, "Failed to withdraw from course", Some(err.to_string())));
        if err.is_retryable() {
            api_error.retryable()
        } else {
            api_error
        }
    }
}

impl From<&StoreError> for ApiErrorType {
    fn from(err: &StoreError) -> Self {
        let status = match err {
            StoreError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::from((status, "Failed to read enrollment data", Some(err.to_string()))).retryable()
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rejections_are_not_retryable() {
        let full = ApiErrorType::from(&EnrollmentError::CourseFull {
            course_id: 1,
            capacity: 10,
        });
        assert_eq!(full.status, StatusCode::CONFLICT);
        assert_eq!(full.error, "course is at capacity");
        assert_eq!(full.context.as_deref(), Some("course_full"));
        assert!(!full.retryable);
    }

    #[test]
    fn test_infrastructure_faults_are_retryable() {
        let timeout = ApiErrorType::from(&EnrollmentError::Timeout);
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.retryable);

        let busy = ApiErrorType::from(&WithdrawalError::StoreUnavailable {
            message: "database is locked".to_string(),
        });
        assert_eq!(busy.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(busy.retryable);

        let missing = ApiErrorType::from(&WithdrawalError::NotFound { enrollment_id: 3 });
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert!(!missing.retryable);
    }
}
