use chrono::NaiveDate;
use utoipa::ToSchema;

use crate::data::Id;
use crate::resp::error::problems;
use crate::resp::ApiError;
use crate::time::{self, TimeRange};

pub mod db;

pub use db::LECTURE_COLLECTION_NAME;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub enum LectureKind {
    #[default]
    Lecture,
    Test,
}

impl From<LectureKind> for bson::Bson {
    fn from(kind: LectureKind) -> Self {
        match kind {
            LectureKind::Lecture => bson::Bson::String("Lecture".to_string()),
            LectureKind::Test => bson::Bson::String("Test".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    #[serde(rename = "_id")]
    pub id: Id,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub subject: Id,
    pub tutor: Id,
    pub standard: Id,
    #[serde(default)]
    pub kind: LectureKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Weekday name derived from `date`.
    pub day: String,
    /// Set once attendance has been taken.
    #[serde(default)]
    pub is_marked: bool,
}

impl Lecture {
    pub fn is_test(&self) -> bool {
        self.kind == LectureKind::Test
    }
}

/// Request body for scheduling or rescheduling a lecture.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LectureScheduleData {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `H:MM AM to H:MM PM`
    pub time: String,
    pub subject: Id,
    pub tutor: Id,
    pub standard: Id,
    #[serde(default)]
    pub kind: LectureKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl LectureScheduleData {
    /// Parses the textual date and time; the first malformed field wins.
    pub fn parse(&self) -> Result<(NaiveDate, TimeRange), ApiError> {
        parse_slot(&self.date, &self.time)
    }

    pub fn into_lecture(self, date: NaiveDate, time: TimeRange) -> Lecture {
        Lecture {
            id: Id::new(),
            date,
            time,
            subject: self.subject,
            tutor: self.tutor,
            standard: self.standard,
            kind: self.kind,
            description: self.description,
            day: time::weekday_name(date).to_string(),
            is_marked: false,
        }
    }
}

/// Request body for moving a lecture; the tutor may change with it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LectureRescheduleData {
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub tutor: Option<Id>,
}

impl LectureRescheduleData {
    pub fn parse(&self) -> Result<(NaiveDate, TimeRange), ApiError> {
        parse_slot(&self.date, &self.time)
    }
}

fn parse_slot(date: &str, range: &str) -> Result<(NaiveDate, TimeRange), ApiError> {
    let date = time::parse_date("date", date)?;
    let range = range
        .parse::<TimeRange>()
        .map_err(|e| problems::invalid_field("time", e))?;
    Ok((date, range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(date: &str, time: &str) -> LectureScheduleData {
        LectureScheduleData {
            date: date.to_string(),
            time: time.to_string(),
            subject: Id::new(),
            tutor: Id::new(),
            standard: Id::new(),
            kind: LectureKind::Test,
            description: None,
        }
    }

    #[test]
    fn scheduling_derives_the_weekday() {
        let data = schedule("2024-01-03", "9:00 AM to 10:00 AM");
        let (date, time) = data.parse().unwrap();
        let lecture = data.into_lecture(date, time);

        assert_eq!(lecture.day, "Wednesday");
        assert!(lecture.is_test());
        assert!(!lecture.is_marked);
    }

    #[test]
    fn malformed_fields_are_named() {
        let err = schedule("03/01/2024", "9:00 AM to 10:00 AM")
            .parse()
            .unwrap_err();
        assert_eq!(err.errors[0].field, "date");

        let err = schedule("2024-01-03", "9 to 10").parse().unwrap_err();
        assert_eq!(err.errors[0].field, "time");

        let backwards = LectureRescheduleData {
            date: "2024-01-03".to_string(),
            time: "10:00 AM to 9:00 AM".to_string(),
            tutor: None,
        };
        assert_eq!(backwards.parse().unwrap_err().errors[0].field, "time");
    }

    #[test]
    fn lectures_serialize_with_wire_formats() {
        let data = schedule("2024-01-01", "9:00 AM to 10:00 AM");
        let (date, time) = data.parse().unwrap();
        let lecture = data.into_lecture(date, time);

        let json = serde_json::to_value(&lecture).unwrap();
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["time"], "9:00 AM to 10:00 AM");
        assert_eq!(json["kind"], "Test");
        assert_eq!(json["isMarked"], false);
    }
}
