pub mod admin;
pub mod courses;
pub mod enrollments;
pub mod status;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::db::{NewCourse, NewStudent, SqliteStore};
    use crate::types::AppState;

    pub const TERM: &str = "2024 Spring";

    /// App state over an in-memory store with one student and one course.
    pub fn state_with_course(capacity: u32) -> (Arc<AppState>, i64, i64) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let student_id = store
            .insert_student(&NewStudent {
                username: "alice",
                full_name: "Alice",
                student_number: "S1",
                major: None,
            })
            .unwrap();
        let course_id = store
            .insert_course(&NewCourse {
                course_code: "CS101",
                name: "Introduction to Programming",
                capacity,
                schedule: Some("Mon/Wed 10:00-11:30"),
                semester: TERM,
            })
            .unwrap();

        let state = Arc::new(AppState::new(&AppConfig::default(), store));
        (state, student_id, course_id)
    }
}
