use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::enrollment::CourseId;
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// GET /courses/:course_id/enrollments
/// Returns the active roster of a course
pub async fn get_course_enrollments(
    Path(course_id): Path<CourseId>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /courses/{}/enrollments", course_id);

    match s.engine.list_course_enrollments(course_id, s.deadline()) {
        Ok(enrollments) => (StatusCode::OK, Json(enrollments)).into_response(),
        Err(e) => ApiErrorType::from(&e).into_response(),
    }
}

/// GET /courses/:course_id/capacity
/// Returns capacity, current enrollment, and available seats
pub async fn get_course_capacity(
    Path(course_id): Path<CourseId>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /courses/{}/capacity", course_id);

    match s.engine.capacity_snapshot(course_id, s.deadline()) {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => {
            warn!("Course not found: {}", course_id);
            ApiErrorType::from((
                StatusCode::NOT_FOUND,
                "Course not found",
                Some(format!("No course with ID: {}", course_id)),
            ))
            .into_response()
        }
        Err(e) => ApiErrorType::from(&e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::endpoints::testing::state_with_course;

    #[tokio::test]
    async fn test_capacity_endpoint() {
        let (state, student_id, course_id) = state_with_course(1);
        let settings = state.settings_snapshot();
        state
            .engine
            .enroll(student_id, course_id, &settings, state.deadline())
            .await
            .unwrap();

        let found = get_course_capacity(Path(course_id), State(state.clone())).await;
        assert_eq!(found.status(), StatusCode::OK);

        let missing = get_course_capacity(Path(course_id + 1), State(state.clone())).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let roster = get_course_enrollments(Path(course_id), State(state)).await;
        assert_eq!(roster.status(), StatusCode::OK);
    }
}
