use chrono::{DateTime, Utc};
use utoipa::ToSchema;

use crate::data::Id;
use crate::resp::error::problems;
use crate::resp::ApiError;

pub mod db;

pub use db::ATTENDANCE_COLLECTION_NAME;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl From<AttendanceStatus> for bson::Bson {
    fn from(status: AttendanceStatus) -> Self {
        let name = match status {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        };
        bson::Bson::String(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    pub lecture: Id,
    pub student: Id,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub marked_by: Option<Id>,
    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub marked_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttendanceEntry {
    pub student: Id,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttendanceSheet {
    pub entries: Vec<AttendanceEntry>,
}

impl AttendanceSheet {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.entries.is_empty() {
            return Err(problems::invalid_field(
                "entries",
                "At least one student must be marked.",
            ));
        }
        Ok(())
    }
}
