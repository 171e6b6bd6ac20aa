//! Schedule conflict detection.

use serde::{Deserialize, Serialize};

use super::schedule::{CourseSchedule, Schedule};
use super::types::CourseId;

/// How unparseable schedule strings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePolicy {
    /// Malformed schedules never conflict with anything.
    #[default]
    Permissive,
    /// A malformed candidate is rejected outright, and a malformed schedule the
    /// student already holds conflicts with every candidate.
    Strict,
}

/// A course the student is actively enrolled in, as seen by the detector.
#[derive(Debug, Clone)]
pub struct ScheduledCourse {
    pub course_id: CourseId,
    pub name: String,
    pub schedule: CourseSchedule,
}

/// Returns true iff `candidate` overlaps any of `active` on the same day.
pub fn has_conflict<'a, I>(candidate: &Schedule, active: I) -> bool
where
    I: IntoIterator<Item = &'a Schedule>,
{
    active.into_iter().any(|existing| candidate.overlaps(existing))
}

/// Finds the first active course whose schedule conflicts with `candidate`.
///
/// An unspecified schedule on either side never conflicts. A malformed
/// candidate is not handled here; callers decide whether to reject it first.
pub fn find_conflict<'a>(
    candidate: &CourseSchedule,
    active: &'a [ScheduledCourse],
    policy: SchedulePolicy,
) -> Option<&'a ScheduledCourse> {
    let candidate = candidate.parsed()?;

    active.iter().find(|course| match &course.schedule {
        CourseSchedule::Parsed(existing) => has_conflict(candidate, [existing]),
        CourseSchedule::Malformed(_) => policy == SchedulePolicy::Strict,
        CourseSchedule::Unspecified => false,
    })
}
