//! Course enrollment: capacity, duplicate, and schedule-conflict checked
//! registration plus withdrawal.

mod conflict;
mod engine;
mod error;
mod notify;
mod schedule;
mod store;
mod types;

pub use conflict::SchedulePolicy;
pub use engine::EnrollmentEngine;
pub use error::{EnrollmentError, StoreError, WithdrawalError};
pub use notify::{EnrollmentEvent, NotificationSink, NotifyError};
pub use schedule::CourseSchedule;
pub use store::{Directory, EnrollmentStore, InsertOutcome};
pub use types::*;
