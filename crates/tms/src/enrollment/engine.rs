//! Enrollment engine and withdrawal handler.
//!
//! Admission for a course is serialized by a per-course lock, and a student's
//! own attempts are serialized by a per-student lock (always taken first), so
//! neither capacity nor schedule checks can be raced. The store re-checks
//! duplicates and capacity inside the insert transaction.

use dashmap::DashMap;
use rand::Rng;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use super::conflict::{find_conflict, SchedulePolicy, ScheduledCourse};
use super::error::{EnrollmentError, StoreError, WithdrawalError};
use super::notify::{EnrollmentEvent, NotificationSink};
use super::schedule::CourseSchedule;
use super::store::{Directory, EnrollmentStore, InsertOutcome};
use super::types::{
    CapacitySnapshot, CourseId, CourseRecord, Enrollment, EnrollmentId, StudentId, StudentRecord,
};
use crate::config::EnrollmentSettings;

/// Lazily created async locks keyed by id. An entry only lives while some
/// caller holds or waits on its lock.
struct KeyedLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// Held lock on one key; dropping it prunes the entry if nobody else wants it.
struct KeyedGuard<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(&self.key);
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Waits for the lock on `key` until `deadline`. Returns `None` on expiry.
    async fn acquire(&self, key: &K, deadline: Instant) -> Option<KeyedGuard<'_, K>> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let acquired =
            tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), lock.lock_owned())
                .await
                .ok();

        match acquired {
            Some(guard) => Some(KeyedGuard {
                locks: self,
                key: key.clone(),
                guard: Some(guard),
            }),
            None => {
                self.prune(key);
                None
            }
        }
    }

    /// Removes the entry for `key` when the map holds the only reference.
    fn prune(&self, key: &K) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

pub struct EnrollmentEngine {
    directory: Arc<dyn Directory>,
    store: Arc<dyn EnrollmentStore>,
    notifier: Arc<dyn NotificationSink>,
    course_locks: KeyedLocks<CourseId>,
    student_locks: KeyedLocks<StudentId>,
}

impl EnrollmentEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn EnrollmentStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            directory,
            store,
            notifier,
            course_locks: KeyedLocks::new(),
            student_locks: KeyedLocks::new(),
        }
    }

    /// Enrolls `student_id` in `course_id`.
    ///
    /// Checks run in a fixed order and the first failure wins: enrollment
    /// open, student active, course open, not already enrolled, capacity,
    /// schedule conflicts, per-term limit. Nothing is written unless every
    /// check passes, and exactly one notification is emitted on success.
    pub async fn enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        settings: &EnrollmentSettings,
        deadline: Instant,
    ) -> Result<Enrollment, EnrollmentError> {
        let correlation_id = generate_correlation_id();
        let start = Instant::now();

        let result = self
            .enroll_locked(student_id, course_id, settings, deadline, &correlation_id)
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(enrollment) => info!(
                correlation_id = %correlation_id,
                student_id,
                course_id,
                enrollment_id = enrollment.enrollment_id,
                duration_ms,
                "Enrollment committed"
            ),
            Err(e) if e.is_retryable() => error!(
                correlation_id = %correlation_id,
                student_id,
                course_id,
                error = %e,
                duration_ms,
                "Enrollment attempt failed"
            ),
            Err(e) => info!(
                correlation_id = %correlation_id,
                student_id,
                course_id,
                reason = %e,
                duration_ms,
                "Enrollment rejected"
            ),
        }

        result
    }

    async fn enroll_locked(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        settings: &EnrollmentSettings,
        deadline: Instant,
        correlation_id: &str,
    ) -> Result<Enrollment, EnrollmentError> {
        if !settings.enrollment_open {
            return Err(EnrollmentError::EnrollmentClosed);
        }

        // Unknown or closed ids are turned away before they get a lock entry.
        self.active_student(student_id, deadline)?;
        self.open_course(course_id, settings, deadline)?;

        let _student_guard = self
            .student_locks
            .acquire(&student_id, deadline)
            .await
            .ok_or(EnrollmentError::Timeout)?;
        let _course_guard = self
            .course_locks
            .acquire(&course_id, deadline)
            .await
            .ok_or(EnrollmentError::Timeout)?;

        let student = self.active_student(student_id, deadline)?;
        let course = self.open_course(course_id, settings, deadline)?;

        if self
            .store
            .find_active(student_id, course_id, deadline)?
            .is_some()
        {
            return Err(EnrollmentError::DuplicateEnrollment {
                student_id,
                course_id,
            });
        }

        let current = self.store.count_active(course_id, deadline)?;
        if current >= course.capacity {
            return Err(EnrollmentError::CourseFull {
                course_id,
                capacity: course.capacity,
            });
        }

        if let CourseSchedule::Malformed(raw) = &course.schedule {
            if settings.schedule_policy == SchedulePolicy::Strict {
                return Err(EnrollmentError::InvalidSchedule {
                    course_id,
                    raw: raw.clone(),
                });
            }
            debug!(
                correlation_id = %correlation_id,
                course_id,
                raw = %raw,
                "Ignoring unreadable course schedule"
            );
        }

        let held = self
            .directory
            .student_active_courses(student_id, &course.semester, deadline)?;
        let mut scheduled = Vec::with_capacity(held.len());
        for other_id in held.iter().copied().filter(|id| *id != course_id) {
            if let Some(other) = self.directory.get_course(other_id, deadline)? {
                scheduled.push(ScheduledCourse {
                    course_id: other.course_id,
                    name: other.name,
                    schedule: other.schedule,
                });
            }
        }
        if let Some(hit) = find_conflict(&course.schedule, &scheduled, settings.schedule_policy) {
            return Err(EnrollmentError::ScheduleConflict {
                course_id: hit.course_id,
                course_name: hit.name.clone(),
            });
        }

        if let Some(limit) = settings.max_enrollments_per_student {
            if held.len() >= limit as usize {
                return Err(EnrollmentError::EnrollmentLimitReached { limit });
            }
        }

        if Instant::now() >= deadline {
            return Err(EnrollmentError::Timeout);
        }

        debug!(
            correlation_id = %correlation_id,
            student_number = %student.student_number,
            course_code = %course.course_code,
            current,
            capacity = course.capacity,
            "Admission checks passed"
        );

        let enrollment = match self.store.insert_if_below_capacity(
            student_id,
            course_id,
            course.capacity,
            deadline,
        )? {
            InsertOutcome::Inserted(enrollment) => enrollment,
            InsertOutcome::Duplicate => {
                return Err(EnrollmentError::DuplicateEnrollment {
                    student_id,
                    course_id,
                })
            }
            InsertOutcome::Full => {
                return Err(EnrollmentError::CourseFull {
                    course_id,
                    capacity: course.capacity,
                })
            }
        };

        self.emit(
            EnrollmentEvent::Enrolled {
                enrollment_id: enrollment.enrollment_id,
                student_id,
                course_id,
                course_name: course.name,
            },
            correlation_id,
        );

        Ok(enrollment)
    }

    fn active_student(
        &self,
        student_id: StudentId,
        deadline: Instant,
    ) -> Result<StudentRecord, EnrollmentError> {
        let student = self
            .directory
            .get_student(student_id, deadline)?
            .ok_or(EnrollmentError::StudentNotFound { student_id })?;
        if !student.active {
            return Err(EnrollmentError::StudentInactive { student_id });
        }
        Ok(student)
    }

    /// Active and, when a current semester is configured, offered in it.
    fn open_course(
        &self,
        course_id: CourseId,
        settings: &EnrollmentSettings,
        deadline: Instant,
    ) -> Result<CourseRecord, EnrollmentError> {
        match self.directory.get_course(course_id, deadline)? {
            Some(course)
                if course.active
                    && settings
                        .current_semester
                        .as_deref()
                        .map_or(true, |term| term == course.semester) =>
            {
                Ok(course)
            }
            _ => Err(EnrollmentError::CourseInactive { course_id }),
        }
    }

    /// Withdraws an active enrollment, freeing one seat in its course.
    ///
    /// A second call for the same id returns [`WithdrawalError::NotFound`].
    pub async fn withdraw(
        &self,
        enrollment_id: EnrollmentId,
        deadline: Instant,
    ) -> Result<(), WithdrawalError> {
        let correlation_id = generate_correlation_id();

        let result = self
            .withdraw_locked(enrollment_id, deadline, &correlation_id)
            .await;

        match &result {
            Ok(()) => info!(
                correlation_id = %correlation_id,
                enrollment_id,
                "Enrollment withdrawn"
            ),
            Err(e) if e.is_retryable() => error!(
                correlation_id = %correlation_id,
                enrollment_id,
                error = %e,
                "Withdrawal failed"
            ),
            Err(e) => info!(
                correlation_id = %correlation_id,
                enrollment_id,
                reason = %e,
                "Withdrawal rejected"
            ),
        }

        result
    }

    async fn withdraw_locked(
        &self,
        enrollment_id: EnrollmentId,
        deadline: Instant,
        correlation_id: &str,
    ) -> Result<(), WithdrawalError> {
        let existing = self
            .store
            .get_enrollment(enrollment_id, deadline)?
            .filter(Enrollment::is_active)
            .ok_or(WithdrawalError::NotFound { enrollment_id })?;

        let _course_guard = self
            .course_locks
            .acquire(&existing.course_id, deadline)
            .await
            .ok_or(WithdrawalError::Timeout)?;

        if Instant::now() >= deadline {
            return Err(WithdrawalError::Timeout);
        }

        let withdrawn = self
            .store
            .mark_withdrawn(enrollment_id, deadline)?
            .ok_or(WithdrawalError::NotFound { enrollment_id })?;

        // The withdrawal is committed; a failed name lookup only degrades the message.
        let course_name = match self.directory.get_course(withdrawn.course_id, deadline) {
            Ok(Some(course)) => course.name,
            _ => format!("course {}", withdrawn.course_id),
        };

        self.emit(
            EnrollmentEvent::Withdrawn {
                enrollment_id,
                student_id: withdrawn.student_id,
                course_id: withdrawn.course_id,
                course_name,
            },
            correlation_id,
        );

        Ok(())
    }

    pub fn list_active_enrollments(
        &self,
        student_id: StudentId,
        deadline: Instant,
    ) -> Result<Vec<Enrollment>, StoreError> {
        self.store.list_active_for_student(student_id, deadline)
    }

    pub fn list_course_enrollments(
        &self,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Vec<Enrollment>, StoreError> {
        self.store.list_active_for_course(course_id, deadline)
    }

    /// Returns `None` if the course does not exist.
    pub fn capacity_snapshot(
        &self,
        course_id: CourseId,
        deadline: Instant,
    ) -> Result<Option<CapacitySnapshot>, StoreError> {
        let Some(course) = self.directory.get_course(course_id, deadline)? else {
            return Ok(None);
        };
        let current = self.store.count_active(course_id, deadline)?;
        Ok(Some(CapacitySnapshot::new(course_id, course.capacity, current)))
    }

    fn emit(&self, event: EnrollmentEvent, correlation_id: &str) {
        if let Err(e) = self.notifier.emit(&event) {
            warn!(
                correlation_id = %correlation_id,
                student_id = event.student_id(),
                error = %e,
                "Failed to deliver enrollment notification"
            );
        }
    }
}

/// Generates a short id used to correlate the log lines of one attempt.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
