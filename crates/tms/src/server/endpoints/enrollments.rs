use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::enrollment::{CourseId, EnrollmentId, StudentId};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
}

/// POST /enrollments
/// Enrolls a student in a course
pub async fn post_enroll(
    State(s): State<Arc<AppState>>,
    Json(body): Json<EnrollRequest>,
) -> Response {
    info!(
        "POST /enrollments (student={}, course={})",
        body.student_id, body.course_id
    );

    let settings = s.settings_snapshot();
    match s
        .engine
        .enroll(body.student_id, body.course_id, &settings, s.deadline())
        .await
    {
        Ok(enrollment) => (StatusCode::CREATED, Json(enrollment)).into_response(),
        Err(e) => ApiErrorType::from(&e).into_response(),
    }
}

/// DELETE /enrollments/:enrollment_id
/// Withdraws from a course
pub async fn delete_enrollment(
    Path(enrollment_id): Path<EnrollmentId>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("DELETE /enrollments/{}", enrollment_id);

    match s.engine.withdraw(enrollment_id, s.deadline()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Successfully withdrawn from course" })),
        )
            .into_response(),
        Err(e) => ApiErrorType::from(&e).into_response(),
    }
}

/// GET /enrollments/student/:student_id
/// Returns the student's active enrollments
pub async fn get_student_enrollments(
    Path(student_id): Path<StudentId>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /enrollments/student/{}", student_id);

    match s.engine.list_active_enrollments(student_id, s.deadline()) {
        Ok(enrollments) => (StatusCode::OK, Json(enrollments)).into_response(),
        Err(e) => ApiErrorType::from(&e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::endpoints::testing::state_with_course;

    #[tokio::test]
    async fn test_enroll_then_withdraw() {
        let (state, student_id, course_id) = state_with_course(5);

        let created = post_enroll(
            State(state.clone()),
            Json(EnrollRequest {
                student_id,
                course_id,
            }),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let again = post_enroll(
            State(state.clone()),
            Json(EnrollRequest {
                student_id,
                course_id,
            }),
        )
        .await;
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let listed = get_student_enrollments(Path(student_id), State(state.clone())).await;
        assert_eq!(listed.status(), StatusCode::OK);

        let enrollment_id = state
            .engine
            .list_active_enrollments(student_id, state.deadline())
            .unwrap()[0]
            .enrollment_id;
        let withdrawn = delete_enrollment(Path(enrollment_id), State(state.clone())).await;
        assert_eq!(withdrawn.status(), StatusCode::OK);

        let missing = delete_enrollment(Path(enrollment_id), State(state)).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_closed_enrollment_uses_current_settings() {
        let (state, student_id, course_id) = state_with_course(5);
        state.settings.write().enrollment_open = false;

        let response = post_enroll(
            State(state),
            Json(EnrollRequest {
                student_id,
                course_id,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
