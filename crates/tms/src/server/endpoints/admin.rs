//! Runtime enrollment settings.
//!
//! Updates apply to requests that start after the change; requests already
//! in flight keep the snapshot they took.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::enrollment::SchedulePolicy;
use crate::types::AppState;

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    /// An empty string clears the semester restriction
    pub current_semester: Option<String>,
    pub enrollment_open: Option<bool>,
    /// Zero removes the per-student cap
    pub max_enrollments_per_student: Option<u32>,
    pub schedule_policy: Option<SchedulePolicy>,
}

/// GET /admin/enrollment_settings
pub async fn get_settings(State(s): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, Json(s.settings_snapshot())).into_response()
}

/// POST /admin/enrollment_settings
pub async fn post_settings(
    State(s): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    let updated = {
        let mut settings = s.settings.write();
        if let Some(semester) = update.current_semester {
            settings.current_semester = Some(semester).filter(|s| !s.is_empty());
        }
        if let Some(open) = update.enrollment_open {
            settings.enrollment_open = open;
        }
        if let Some(max) = update.max_enrollments_per_student {
            settings.max_enrollments_per_student = Some(max).filter(|m| *m > 0);
        }
        if let Some(policy) = update.schedule_policy {
            settings.schedule_policy = policy;
        }
        settings.clone()
    };

    info!(
        "POST /admin/enrollment_settings (semester={:?}, open={}, max={:?}, policy={:?})",
        updated.current_semester,
        updated.enrollment_open,
        updated.max_enrollments_per_student,
        updated.schedule_policy
    );

    (StatusCode::OK, Json(updated)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::endpoints::testing::{state_with_course, TERM};

    #[tokio::test]
    async fn test_partial_update() {
        let (state, _, _) = state_with_course(1);

        let response = post_settings(
            State(state.clone()),
            Json(SettingsUpdate {
                current_semester: Some(TERM.to_string()),
                max_enrollments_per_student: Some(0),
                schedule_policy: Some(SchedulePolicy::Strict),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let settings = state.settings_snapshot();
        assert_eq!(settings.current_semester.as_deref(), Some(TERM));
        assert_eq!(settings.max_enrollments_per_student, None);
        assert_eq!(settings.schedule_policy, SchedulePolicy::Strict);
        assert!(settings.enrollment_open);

        post_settings(
            State(state.clone()),
            Json(SettingsUpdate {
                current_semester: Some(String::new()),
                enrollment_open: Some(false),
                ..Default::default()
            }),
        )
        .await;
        let settings = state.settings_snapshot();
        assert_eq!(settings.current_semester, None);
        assert!(!settings.enrollment_open);

        let fetched = get_settings(State(state)).await;
        assert_eq!(fetched.status(), StatusCode::OK);
    }
}
