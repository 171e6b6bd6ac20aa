use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::server::endpoints::{admin, courses, enrollments, status};
use crate::types::AppState;

mod endpoints;
mod types;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let enrollment_router = Router::new()
        .route("/enrollments", post(enrollments::post_enroll))
        .route(
            "/enrollments/:enrollment_id",
            delete(enrollments::delete_enrollment),
        )
        .route(
            "/enrollments/student/:student_id",
            get(enrollments::get_student_enrollments),
        )
        .route(
            "/courses/:course_id/enrollments",
            get(courses::get_course_enrollments),
        )
        .route(
            "/courses/:course_id/capacity",
            get(courses::get_course_capacity),
        );

    let admin_router = Router::new().route(
        "/admin/enrollment_settings",
        get(admin::get_settings).post(admin::post_settings),
    );

    Router::new()
        .route("/health", get(status::get_health))
        .merge(enrollment_router)
        .merge(admin_router)
        .with_state(app_state)
}
