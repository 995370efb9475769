use std::collections::HashSet;

use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use crate::data::Id;
use crate::resp::error::problems;
use crate::resp::ApiError;

pub mod db;

pub use db::MARKS_COLLECTION_NAME;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarksRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    pub student: Id,
    pub lecture: Id,
    /// Copied from the lecture so reports can group without a join.
    pub subject: Id,
    pub marks: f64,
    pub total_marks: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: Id,
    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub created: DateTime<Utc>,
}

pub fn validate_score(field: &str, marks: f64, total_marks: f64) -> Result<(), ApiError> {
    if !total_marks.is_finite() || total_marks <= 0.0 {
        return Err(problems::invalid_field(
            "totalMarks",
            "Total marks must be greater than zero.",
        ));
    }
    if !marks.is_finite() || marks < 0.0 || marks > total_marks {
        return Err(problems::invalid_field(
            field,
            format!("Marks must be between 0 and {}.", total_marks),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MarksEntry {
    pub student: Id,
    pub marks: f64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarksSheet {
    pub total_marks: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub entries: Vec<MarksEntry>,
}

impl MarksSheet {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.entries.is_empty() {
            return Err(problems::invalid_field(
                "entries",
                "At least one student must be graded.",
            ));
        }
        let mut seen = HashSet::new();
        for (i, entry) in self.entries.iter().enumerate() {
            validate_score(&format!("entries[{}].marks", i), entry.marks, self.total_marks)?;
            if !seen.insert(entry.student) {
                return Err(problems::invalid_field(
                    format!("entries[{}].student", i),
                    "Student is graded twice on this sheet.",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarksUpdateData {
    pub marks: f64,
    pub total_marks: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl MarksUpdateData {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_score("marks", self.marks, self.total_marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_must_fit_the_total() {
        assert!(validate_score("marks", 45.0, 50.0).is_ok());
        assert!(validate_score("marks", 0.0, 50.0).is_ok());
        assert!(validate_score("marks", 50.0, 50.0).is_ok());
        assert!(validate_score("marks", 51.0, 50.0).is_err());
        assert!(validate_score("marks", -1.0, 50.0).is_err());
        assert!(validate_score("marks", 0.0, 0.0).is_err());
        assert!(validate_score("marks", f64::NAN, 10.0).is_err());
    }

    #[test]
    fn sheet_points_at_the_bad_entry() {
        let sheet = MarksSheet {
            total_marks: 20.0,
            description: None,
            entries: vec![
                MarksEntry {
                    student: Id::new(),
                    marks: 12.0,
                },
                MarksEntry {
                    student: Id::new(),
                    marks: 21.0,
                },
            ],
        };
        let err = sheet.validate().unwrap_err();
        assert_eq!(err.errors[0].field, "entries[1].marks");
    }

    #[test]
    fn records_store_a_native_creation_date() {
        let record = MarksRecord {
            id: Id::new(),
            student: Id::new(),
            lecture: Id::new(),
            subject: Id::new(),
            marks: 18.0,
            total_marks: 20.0,
            description: None,
            created_by: Id::new(),
            created: Utc::now(),
        };

        let stored: bson::Document = bson::from_slice(&bson::to_vec(&record).unwrap()).unwrap();
        assert!(stored.get_datetime("created").is_ok());
        assert!(serde_json::to_value(&record).unwrap()["created"].is_string());
    }

    #[test]
    fn sheet_grades_each_student_once() {
        let student = Id::new();
        let sheet = MarksSheet {
            total_marks: 20.0,
            description: None,
            entries: vec![
                MarksEntry {
                    student,
                    marks: 12.0,
                },
                MarksEntry {
                    student: Id::new(),
                    marks: 15.0,
                },
                MarksEntry {
                    student,
                    marks: 14.0,
                },
            ],
        };
        let err = sheet.validate().unwrap_err();
        assert_eq!(err.errors[0].field, "entries[2].student");
    }
}
