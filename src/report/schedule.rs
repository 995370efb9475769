use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use utoipa::ToSchema;

use crate::data::lecture::Lecture;
use crate::data::Id;
use crate::time::{self, ClockTime, TimeRange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DaySchedule {
    pub day: String,
    pub date: NaiveDate,
    pub lectures: Vec<Lecture>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeekSchedule {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    /// Sunday through Saturday, always seven entries.
    pub days: Vec<DaySchedule>,
}

/// Lecture that ended without a complete attendance sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PendingAttendance {
    pub lecture: Lecture,
    pub taken: u64,
    pub enrolled: u64,
}

/// Orders lectures by start time, keeping the original order for ties.
pub fn sort_by_start(lectures: &mut [Lecture]) {
    lectures.sort_by_key(|it| it.time.start);
}

/// Buckets lectures of the week containing `date` by weekday.
pub fn group_by_weekday(date: NaiveDate, lectures: Vec<Lecture>) -> WeekSchedule {
    let (week_start, week_end) = time::week_bounds(date);

    let mut days: Vec<DaySchedule> = (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            DaySchedule {
                day: time::weekday_name(date).to_string(),
                date,
                lectures: vec![],
            }
        })
        .collect();

    for lecture in lectures {
        let index = lecture.date.weekday().num_days_from_sunday() as usize;
        days[index].lectures.push(lecture);
    }
    for day in days.iter_mut() {
        sort_by_start(&mut day.lectures);
    }

    WeekSchedule {
        week_start,
        week_end,
        days,
    }
}

/// Whether an existing lecture other than `except` occupies exactly
/// `date` and `time`. Overlapping but different ranges don't conflict.
pub fn has_conflict(
    existing: &[Lecture],
    date: NaiveDate,
    time: TimeRange,
    except: Option<Id>,
) -> bool {
    existing
        .iter()
        .filter(|it| Some(it.id) != except)
        .any(|it| it.date == date && it.time == time)
}

/// Time of day is ignored; only earlier calendar days are in the past.
pub fn is_past_date(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

/// Whether a lecture on `date` ending at `end` is over at `now`.
pub fn has_ended(date: NaiveDate, end: ClockTime, now: NaiveDateTime) -> bool {
    let today = now.date();
    if date != today {
        return date < today;
    }

    let minutes = (now.hour() * 60 + now.minute()) as u16;
    minutes >= end.minutes()
}

/// An ended lecture needs attendance while fewer rows exist than enrolled
/// students, or none at all.
pub fn needs_attendance(lecture: &Lecture, taken: u64, enrolled: u64, now: NaiveDateTime) -> bool {
    has_ended(lecture.date, lecture.time.end, now) && (taken == 0 || taken < enrolled)
}
