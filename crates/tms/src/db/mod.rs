/// Database module for the course directory, enrollment table, and notifications

mod types;

pub use types::{NewCourse, NewStudent};

use types::{DbCourse, DbEnrollment, DbStudent};

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::enrollment::{
    CourseId, CourseRecord, Directory, Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentStatus,
    EnrollmentStore, InsertOutcome, NotificationSink, NotifyError, StoreError, StudentId,
    StudentRecord,
};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_tms.sql");

const ENROLLMENT_COLUMNS: &str =
    "enrollment_id, student_id, course_id, enrolled_at, status, withdrawn_at";

const COURSE_COLUMNS: &str = "course_id, course_code, name, capacity, schedule, semester, is_active";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Busy {
                    message: err.to_string(),
                }
            }
            _ => StoreError::Database {
                message: err.to_string(),
            },
        }
    }
}

/// SQLite-backed directory, enrollment store, and notification sink.
///
/// A single connection is shared behind a mutex; callers wait for it no
/// longer than their deadline.
pub struct SqliteStore {
    db: Mutex<Connection>,
    /// Wait bound for calls that carry no caller deadline (seeding, notifications)
    lock_timeout: Duration,
}

impl SqliteStore {
    /// Opens (or creates) the database at `db_path` and applies the schema.
    pub fn open(db_path: &str, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        info!("Opened enrollment database at {db_path}");
        Self::init(conn, busy_timeout)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, Duration::from_secs(2))
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self, StoreError> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            db: Mutex::new(conn),
            lock_timeout: busy_timeout,
        })
    }

    fn lock(&self, deadline: Instant) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.try_lock_until(deadline).ok_or(StoreError::Timeout)
    }

    fn lock_default(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.lock(Instant::now() + self.lock_timeout)
    }

    /// Creates a user account with the student role and its student record.
    pub fn insert_student(&self, student: &NewStudent<'_>) -> Result<StudentId, StoreError> {
        let mut conn = self.lock_default()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO users (username, full_name, role, is_active, created_at)
             VALUES (?1, ?2, 'student', 1, ?3)",
            params![student.username, student.full_name, Utc::now()],
        )?;
        let user_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO students (user_id, student_number, major, status)
             VALUES (?1, ?2, ?3, 'active')",
            params![user_id, student.student_number, student.major],
        )?;
        let student_id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(student_id)
    }

    pub fn insert_course(&self, course: &NewCourse<'_>) -> Result<CourseId, StoreError> {
        let conn = self.lock_default()?;
        conn.execute(
            "INSERT INTO courses (course_code, name, capacity, schedule, semester, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
            params![
                course.course_code,
                course.name,
                course.capacity,
                course.schedule,
                course.semester,
                Utc::now()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Inserts a small demo catalog if no courses exist yet.
    pub fn seed_demo(&self, semester: &str) -> Result<(), StoreError> {
        let existing: i64 = self
            .lock_default()?
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        if existing > 0 {
            info!("Database already has {existing} courses, skipping demo seed");
            return Ok(());
        }

        let courses = [
            ("CS101", "Introduction to Programming", 30, "Mon/Wed 10:00-11:30"),
            ("MATH201", "Linear Algebra", 25, "Mon/Wed 11:00-12:00"),
            ("PHYS110", "General Physics", 2, "Tue/Thu 14:00-15:30"),
            ("ENG150", "Technical Writing", 20, "Fri 09:00-11:00"),
        ];
        for (code, name, capacity, schedule) in courses {
            self.insert_course(&NewCourse {
                course_code: code,
                name,
                capacity,
                schedule: Some(schedule),
                semester,
            })?;
        }

        let students = [
            ("zhang.wei", "Zhang Wei", "S2024001"),
            ("li.na", "Li Na", "S2024002"),
            ("wang.fang", "Wang Fang", "S2024003"),
        ];
        for (username, full_name, student_number) in students {
            self.insert_student(&NewStudent {
                username,
                full_name,
                student_number,
                major: Some("Computer Science"),
            })?;
        }

        info!(
            "Seeded {} demo courses and {} demo students for {semester}",
            courses.len(),
            students.len()
        );
        Ok(())
    }
}

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<DbCourse> {
    Ok(DbCourse {
        course_id: row.get(0)?,
        course_code: row.get(1)?,
        name: row.get(2)?,
        capacity: row.get(3)?,
        schedule: row.get(4)?,
        semester: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<DbEnrollment> {
    Ok(DbEnrollment {
        enrollment_id: row.get(0)?,
        student_id: row.get(1)?,
        course_id: row.get(2)?,
        enrolled_at: row.get(3)?,
        status: row.get(4)?,
        withdrawn_at: row.get(5)?,
    })
}

fn collect_enrollments(rows: Vec<DbEnrollment>) -> Result<Vec<Enrollment>, StoreError> {
    rows.into_iter().map(Enrollment::try_from).collect()
}

impl Directory for SqliteStore {
    fn get_course(
        &self,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Option<CourseRecord>, StoreError> {
        let conn = self.lock(deadline)?;
        let row = conn
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE course_id = ?1"),
                [course_id],
                course_from_row,
            )
            .optional()?;

        row.map(CourseRecord::try_from).transpose()
    }

    fn get_student(
        &self,
        student_id: StudentId,
        deadline: Instant,
    ) -> Result<Option<StudentRecord>, StoreError> {
        let conn = self.lock(deadline)?;
        let row = conn
            .query_row(
                "SELECT student_number, status FROM students WHERE student_id = ?1",
                [student_id],
                |row| {
                    Ok(DbStudent {
                        student_number: row.get(0)?,
                        status: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(row.map(StudentRecord::from))
    }

    fn student_active_courses(
        &self,
        student_id: StudentId,
        term: &str,
        deadline: Instant,
    ) -> Result<Vec<CourseId>, StoreError> {
        let conn = self.lock(deadline)?;
        let mut stmt = conn.prepare(
            "SELECT e.course_id
             FROM enrollments e
             JOIN courses c ON c.course_id = e.course_id
             WHERE e.student_id = ?1 AND e.status = 'active' AND c.semester = ?2
             ORDER BY e.enrollment_id",
        )?;

        let ids = stmt
            .query_map(params![student_id, term], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<CourseId>>>()?;
        Ok(ids)
    }
}

impl EnrollmentStore for SqliteStore {
    fn get_enrollment(
        &self,
        enrollment_id: EnrollmentId,
        deadline: Instant,
    ) -> Result<Option<Enrollment>, StoreError> {
        let conn = self.lock(deadline)?;
        let row = conn
            .query_row(
                &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE enrollment_id = ?1"),
                [enrollment_id],
                enrollment_from_row,
            )
            .optional()?;

        row.map(Enrollment::try_from).transpose()
    }

    fn find_active(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Option<Enrollment>, StoreError> {
        let conn = self.lock(deadline)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
                     WHERE student_id = ?1 AND course_id = ?2 AND status = 'active'"
                ),
                [student_id, course_id],
                enrollment_from_row,
            )
            .optional()?;

        row.map(Enrollment::try_from).transpose()
    }

    fn count_active(&self, course_id: CourseId, deadline: Instant) -> Result<u32, StoreError> {
        let conn = self.lock(deadline)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM enrollments WHERE course_id = ?1 AND status = 'active'",
            [course_id],
            |row| row.get(0),
        )?;

        u32::try_from(count).map_err(|_| StoreError::Corrupt {
            message: format!("course {course_id} has {count} active enrollments"),
        })
    }

    fn insert_if_below_capacity(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        capacity: u32,
        deadline: Instant,
    ) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.lock(deadline)?;
        // IMMEDIATE takes the write lock up front so the count below cannot go stale.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let duplicate: bool = tx.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM enrollments
                 WHERE student_id = ?1 AND course_id = ?2 AND status = 'active'
             )",
            [student_id, course_id],
            |row| row.get(0),
        )?;
        if duplicate {
            return Ok(InsertOutcome::Duplicate);
        }

        let current: i64 = tx.query_row(
            "SELECT COUNT(*) FROM enrollments WHERE course_id = ?1 AND status = 'active'",
            [course_id],
            |row| row.get(0),
        )?;
        if current >= i64::from(capacity) {
            return Ok(InsertOutcome::Full);
        }

        let enrolled_at = Utc::now();
        match tx.execute(
            "INSERT INTO enrollments (student_id, course_id, enrolled_at, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                student_id,
                course_id,
                enrolled_at,
                EnrollmentStatus::Active.as_str()
            ],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Ok(InsertOutcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        }
        let enrollment_id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(enrollment_id, student_id, course_id, "Inserted enrollment row");

        Ok(InsertOutcome::Inserted(Enrollment {
            enrollment_id,
            student_id,
            course_id,
            enrolled_at,
            status: EnrollmentStatus::Active,
            withdrawn_at: None,
        }))
    }

    fn mark_withdrawn(
        &self,
        enrollment_id: EnrollmentId,
        deadline: Instant,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut conn = self.lock(deadline)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE enrollments SET status = ?3, withdrawn_at = ?2
             WHERE enrollment_id = ?1 AND status = ?4",
            params![
                enrollment_id,
                Utc::now(),
                EnrollmentStatus::Withdrawn.as_str(),
                EnrollmentStatus::Active.as_str()
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let row = tx.query_row(
            &format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE enrollment_id = ?1"),
            [enrollment_id],
            enrollment_from_row,
        )?;
        tx.commit()?;

        Enrollment::try_from(row).map(Some)
    }

    fn list_active_for_student(
        &self,
        student_id: StudentId,
        deadline: Instant,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let conn = self.lock(deadline)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE student_id = ?1 AND status = 'active'
             ORDER BY enrollment_id"
        ))?;

        let rows = stmt
            .query_map([student_id], enrollment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        collect_enrollments(rows)
    }

    fn list_active_for_course(
        &self,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Vec<Enrollment>, StoreError> {
        let conn = self.lock(deadline)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE course_id = ?1 AND status = 'active'
             ORDER BY enrollment_id"
        ))?;

        let rows = stmt
            .query_map([course_id], enrollment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        collect_enrollments(rows)
    }
}

impl NotificationSink for SqliteStore {
    /// Writes one `enrollment` notification addressed to the student's user account.
    fn emit(&self, event: &EnrollmentEvent) -> Result<(), NotifyError> {
        let conn = self.lock_default().map_err(|e| NotifyError {
            message: e.to_string(),
        })?;

        let inserted = conn
            .execute(
                "INSERT INTO notifications (user_id, title, message, notification_type, is_read, created_at)
                 SELECT user_id, ?2, ?3, 'enrollment', 0, ?4 FROM students WHERE student_id = ?1",
                params![event.student_id(), event.title(), event.message(), Utc::now()],
            )
            .map_err(|e| NotifyError {
                message: e.to_string(),
            })?;

        if inserted == 0 {
            return Err(NotifyError {
                message: format!("student {} has no user account", event.student_id()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
impl SqliteStore {
    pub fn set_course_active(&self, course_id: CourseId, active: bool) -> Result<(), StoreError> {
        self.lock_default()?.execute(
            "UPDATE courses SET is_active = ?2 WHERE course_id = ?1",
            params![course_id, active],
        )?;
        Ok(())
    }

    pub fn set_student_status(&self, student_id: StudentId, status: &str) -> Result<(), StoreError> {
        self.lock_default()?.execute(
            "UPDATE students SET status = ?2 WHERE student_id = ?1",
            params![student_id, status],
        )?;
        Ok(())
    }

    pub fn notification_titles(&self, student_id: StudentId) -> Result<Vec<String>, StoreError> {
        let conn = self.lock_default()?;
        let mut stmt = conn.prepare(
            "SELECT n.title FROM notifications n
             JOIN students s ON s.user_id = n.user_id
             WHERE s.student_id = ?1
             ORDER BY n.notification_id",
        )?;
        let titles = stmt
            .query_map([student_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::CourseSchedule;

    const TERM: &str = "2024 Spring";

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn setup() -> (SqliteStore, StudentId, StudentId, CourseId) {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store
            .insert_student(&NewStudent {
                username: "alice",
                full_name: "Alice",
                student_number: "S1",
                major: Some("Mathematics"),
            })
            .unwrap();
        let b = store
            .insert_student(&NewStudent {
                username: "bob",
                full_name: "Bob",
                student_number: "S2",
                major: None,
            })
            .unwrap();
        let course = store
            .insert_course(&NewCourse {
                course_code: "CS101",
                name: "Intro",
                capacity: 1,
                schedule: Some("Mon/Wed 10:00-11:30"),
                semester: TERM,
            })
            .unwrap();
        (store, a, b, course)
    }

    #[test]
    fn test_course_round_trip_parses_schedule() {
        let (store, _, _, course) = setup();
        let record = store.get_course(course, soon()).unwrap().unwrap();

        assert_eq!(record.capacity, 1);
        assert!(record.active);
        assert!(matches!(record.schedule, CourseSchedule::Parsed(ref s) if s.meetings().len() == 2));
        assert!(store.get_course(course + 100, soon()).unwrap().is_none());
    }

    #[test]
    fn test_conditional_insert() {
        let (store, a, b, course) = setup();

        let first = store.insert_if_below_capacity(a, course, 1, soon()).unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(ref e) if e.student_id == a));
        assert_eq!(
            store.insert_if_below_capacity(a, course, 5, soon()).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(
            store.insert_if_below_capacity(b, course, 1, soon()).unwrap(),
            InsertOutcome::Full
        );
        assert_eq!(store.count_active(course, soon()).unwrap(), 1);
    }

    #[test]
    fn test_mark_withdrawn_once() {
        let (store, a, _, course) = setup();
        let InsertOutcome::Inserted(enrollment) =
            store.insert_if_below_capacity(a, course, 1, soon()).unwrap()
        else {
            panic!("expected insert");
        };

        let withdrawn = store
            .mark_withdrawn(enrollment.enrollment_id, soon())
            .unwrap()
            .unwrap();
        assert_eq!(withdrawn.status, EnrollmentStatus::Withdrawn);
        assert!(withdrawn.withdrawn_at.is_some());
        assert!(store
            .mark_withdrawn(enrollment.enrollment_id, soon())
            .unwrap()
            .is_none());
        assert_eq!(store.count_active(course, soon()).unwrap(), 0);

        // The stored row survives for history.
        let stored = store
            .get_enrollment(enrollment.enrollment_id, soon())
            .unwrap()
            .unwrap();
        assert!(!stored.is_active());
    }

    #[test]
    fn test_active_courses_scoped_to_term() {
        let (store, a, _, course) = setup();
        let fall = store
            .insert_course(&NewCourse {
                course_code: "CS100",
                name: "Prep",
                capacity: 10,
                schedule: None,
                semester: "2023 Fall",
            })
            .unwrap();
        store.insert_if_below_capacity(a, course, 1, soon()).unwrap();
        store.insert_if_below_capacity(a, fall, 10, soon()).unwrap();

        assert_eq!(
            store.student_active_courses(a, TERM, soon()).unwrap(),
            vec![course]
        );
        assert_eq!(store.list_active_for_student(a, soon()).unwrap().len(), 2);
    }

    #[test]
    fn test_lock_wait_respects_deadline() {
        let (store, _, _, course) = setup();
        let _held = store.db.lock();

        let err = store
            .count_active(course, Instant::now() + Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err, StoreError::Timeout);
    }

    #[test]
    fn test_notification_rows() {
        let (store, a, _, course) = setup();
        store
            .emit(&EnrollmentEvent::Enrolled {
                enrollment_id: 1,
                student_id: a,
                course_id: course,
                course_name: "Intro".to_string(),
            })
            .unwrap();

        assert_eq!(
            store.notification_titles(a).unwrap(),
            vec!["Successfully Enrolled: Intro".to_string()]
        );
        assert!(store
            .emit(&EnrollmentEvent::Withdrawn {
                enrollment_id: 1,
                student_id: 999,
                course_id: course,
                course_name: "Intro".to_string(),
            })
            .is_err());
    }

    #[test]
    fn test_seed_demo_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.seed_demo(TERM).unwrap();
        store.seed_demo(TERM).unwrap();

        let count: i64 = store
            .lock_default()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 4);
    }
}
