//! Structured course meeting times.
//!
//! Course schedules are stored as free text (e.g. `"Mon/Wed 10:00-11:30"`).
//! They are parsed once, when a course leaves the directory, so the conflict
//! detector only ever sees [`Schedule`] values.

use chrono::{NaiveTime, Weekday};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<days>[A-Za-z][A-Za-z/&\s]*?)\s+(?P<sh>[0-9]{1,2}):(?P<sm>[0-9]{2})\s*-\s*(?P<eh>[0-9]{1,2}):(?P<em>[0-9]{2})$")
        .unwrap()
});
static DAY_SPLIT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/&\s]+").unwrap());

/// Errors produced while parsing a schedule string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleParseError {
    #[error("schedule group is not of the form `<days> HH:MM-HH:MM`: {group:?}")]
    BadGroup { group: String },

    #[error("unknown day {day:?}")]
    UnknownDay { day: String },

    #[error("invalid time {hour:02}:{minute:02}")]
    BadTime { hour: u32, minute: u32 },

    #[error("meeting must end after it starts ({start}-{end})")]
    EmptyRange { start: NaiveTime, end: NaiveTime },

    #[error("schedule is empty")]
    Empty,
}

/// One weekly meeting: a half-open `[start, end)` interval on a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Meeting {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Meeting {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleParseError> {
        if start >= end {
            return Err(ScheduleParseError::EmptyRange { start, end });
        }
        Ok(Self { day, start, end })
    }

    /// Returns true if both meetings fall on the same day and their half-open
    /// intervals intersect. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Meeting) -> bool {
        self.day == other.day && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Meeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.day,
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// The set of weekly meetings attached to a course.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    meetings: Vec<Meeting>,
}

impl Schedule {
    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }

    /// Returns true if any meeting of `self` overlaps any meeting of `other`.
    pub fn overlaps(&self, other: &Schedule) -> bool {
        self.meetings
            .iter()
            .any(|a| other.meetings.iter().any(|b| a.overlaps(b)))
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, meeting) in self.meetings.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{meeting}")?;
        }
        Ok(())
    }
}

impl FromStr for Schedule {
    type Err = ScheduleParseError;

    /// Parses `"Mon/Wed 10:00-11:30"`, with multiple groups separated by `;`
    /// or `,` (e.g. `"Mon 09:00-10:00; Thu 13:00-14:30"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut meetings = Vec::new();

        for group in s.split([';', ',']).map(str::trim).filter(|g| !g.is_empty()) {
            let caps = GROUP_REGEX
                .captures(group)
                .ok_or_else(|| ScheduleParseError::BadGroup {
                    group: group.to_string(),
                })?;

            let start = parse_time(&caps["sh"], &caps["sm"])?;
            let end = parse_time(&caps["eh"], &caps["em"])?;

            for token in DAY_SPLIT_REGEX
                .split(caps["days"].trim())
                .filter(|t| !t.is_empty())
            {
                meetings.push(Meeting::new(parse_day(token)?, start, end)?);
            }
        }

        if meetings.is_empty() {
            return Err(ScheduleParseError::Empty);
        }

        Ok(Schedule { meetings })
    }
}

/// Accepts full day names and their common abbreviations, case-insensitively.
fn parse_day(token: &str) -> Result<Weekday, ScheduleParseError> {
    let day = match token.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "weds" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => {
            return Err(ScheduleParseError::UnknownDay {
                day: token.to_string(),
            })
        }
    };
    Ok(day)
}

fn parse_time(hour: &str, minute: &str) -> Result<NaiveTime, ScheduleParseError> {
    // Both fields are one or two ASCII digits.
    let hour: u32 = hour.parse().unwrap_or(u32::MAX);
    let minute: u32 = minute.parse().unwrap_or(u32::MAX);
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ScheduleParseError::BadTime { hour, minute })
}

/// A course schedule as it leaves the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseSchedule {
    Parsed(Schedule),
    /// No schedule recorded for the course.
    Unspecified,
    /// A schedule string that could not be parsed; kept verbatim for errors.
    Malformed(String),
}

impl CourseSchedule {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => CourseSchedule::Unspecified,
            Some(text) => match text.parse::<Schedule>() {
                Ok(schedule) => CourseSchedule::Parsed(schedule),
                Err(_) => CourseSchedule::Malformed(text.to_string()),
            },
        }
    }

    pub fn parsed(&self) -> Option<&Schedule> {
        match self {
            CourseSchedule::Parsed(schedule) => Some(schedule),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_multi_day_group() {
        let schedule: Schedule = "Mon/Wed 10:00-11:30".parse().unwrap();
        assert_eq!(
            schedule.meetings(),
            &[
                Meeting::new(Weekday::Mon, t(10, 0), t(11, 30)).unwrap(),
                Meeting::new(Weekday::Wed, t(10, 0), t(11, 30)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_parse_multiple_groups_and_full_day_names() {
        let schedule: Schedule = "Monday 9:00-10:00; thu 13:00 - 14:30".parse().unwrap();
        assert_eq!(schedule.meetings().len(), 2);
        assert_eq!(schedule.meetings()[0].day, Weekday::Mon);
        assert_eq!(schedule.meetings()[0].start, t(9, 0));
        assert_eq!(schedule.meetings()[1].day, Weekday::Thu);
        assert_eq!(schedule.to_string(), "Mon 09:00-10:00; Thu 13:00-14:30");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "sometime in the afternoon".parse::<Schedule>(),
            Err(ScheduleParseError::BadGroup { .. })
        ));
        assert!(matches!(
            "Moon 10:00-11:00".parse::<Schedule>(),
            Err(ScheduleParseError::UnknownDay { .. })
        ));
        assert!(matches!(
            "Mon 25:00-26:00".parse::<Schedule>(),
            Err(ScheduleParseError::BadTime { hour: 25, minute: 0 })
        ));
        assert!(matches!(
            "Mon 11:00-10:00".parse::<Schedule>(),
            Err(ScheduleParseError::EmptyRange { .. })
        ));
        assert_eq!(" ; ".parse::<Schedule>(), Err(ScheduleParseError::Empty));
    }

    #[test]
    fn test_day_names_must_be_whole_words() {
        for text in ["Monkey 10:00-11:00", "Wednesdays 10:00-11:00", "Frid 09:00-10:00"] {
            assert!(
                matches!(
                    text.parse::<Schedule>(),
                    Err(ScheduleParseError::UnknownDay { .. })
                ),
                "{text}"
            );
        }

        let schedule: Schedule = "TUES/thurs 08:00-09:15".parse().unwrap();
        assert_eq!(schedule.meetings()[0].day, Weekday::Tue);
        assert_eq!(schedule.meetings()[1].day, Weekday::Thu);
    }

    #[test]
    fn test_non_ascii_digits_are_rejected() {
        assert!(matches!(
            "Mon \u{661}\u{660}:00-11:00".parse::<Schedule>(),
            Err(ScheduleParseError::BadGroup { .. })
        ));
        assert_eq!(
            CourseSchedule::from_raw(Some("Mon \u{661}\u{660}:00-\u{661}\u{661}:00")),
            CourseSchedule::Malformed("Mon \u{661}\u{660}:00-\u{661}\u{661}:00".to_string())
        );
    }

    #[test]
    fn test_half_open_overlap() {
        let a = Meeting::new(Weekday::Mon, t(10, 0), t(11, 30)).unwrap();
        let b = Meeting::new(Weekday::Mon, t(11, 0), t(12, 0)).unwrap();
        let c = Meeting::new(Weekday::Mon, t(11, 30), t(12, 30)).unwrap();
        let d = Meeting::new(Weekday::Tue, t(10, 0), t(11, 30)).unwrap();

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_course_schedule_from_raw() {
        assert_eq!(CourseSchedule::from_raw(None), CourseSchedule::Unspecified);
        assert_eq!(CourseSchedule::from_raw(Some("   ")), CourseSchedule::Unspecified);
        assert_eq!(
            CourseSchedule::from_raw(Some("TBA")),
            CourseSchedule::Malformed("TBA".to_string())
        );
        assert!(CourseSchedule::from_raw(Some("Tue/Thu 14:00-15:30"))
            .parsed()
            .is_some());
    }
}
