use bson::doc;
use chrono::Utc;
use mongodb::options::UpdateOptions;
use mongodb::Database;

use super::{AttendanceEntry, AttendanceRecord};
use crate::data::{filter, find_many, stamp, Id};
use crate::resp::ApiError;

pub static ATTENDANCE_COLLECTION_NAME: &str = "attendance";

pub trait AttendanceDbExt {
    /// Writes one record per (lecture, student), replacing an earlier status.
    async fn record_attendance(
        &self,
        lecture: Id,
        entries: &[AttendanceEntry],
        marked_by: Id,
    ) -> Result<u64, ApiError>;

    async fn lecture_attendance(&self, lecture: Id) -> Result<Vec<AttendanceRecord>, ApiError>;
    async fn count_lecture_attendance(&self, lecture: Id) -> Result<u64, ApiError>;

    /// A student's records for `lectures`, oldest marking first.
    async fn student_attendance(
        &self,
        student: Id,
        lectures: &[Id],
    ) -> Result<Vec<AttendanceRecord>, ApiError>;

    async fn delete_lecture_attendance(&self, lecture: Id) -> Result<u64, ApiError>;
}

impl AttendanceDbExt for Database {
    async fn record_attendance(
        &self,
        lecture: Id,
        entries: &[AttendanceEntry],
        marked_by: Id,
    ) -> Result<u64, ApiError> {
        let collection = self.collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME);
        let upsert = UpdateOptions::builder().upsert(true).build();
        let mut written = 0;

        for entry in entries {
            collection
                .update_one(
                    doc! { "lecture": lecture, "student": entry.student },
                    doc! {
                        "$set": {
                            "status": entry.status,
                            "markedBy": marked_by,
                            "markedOn": stamp::to_bson(&Utc::now()),
                        },
                        "$setOnInsert": { "_id": Id::new() },
                    },
                    upsert.clone(),
                )
                .await?;
            written += 1;
        }

        Ok(written)
    }

    async fn lecture_attendance(&self, lecture: Id) -> Result<Vec<AttendanceRecord>, ApiError> {
        Ok(find_many(
            self,
            ATTENDANCE_COLLECTION_NAME,
            doc! { "lecture": lecture },
            None,
            None,
        )
        .await?)
    }

    async fn count_lecture_attendance(&self, lecture: Id) -> Result<u64, ApiError> {
        self.collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME)
            .count_documents(doc! { "lecture": lecture }, None)
            .await
            .map_err(ApiError::from)
    }

    async fn student_attendance(
        &self,
        student: Id,
        lectures: &[Id],
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        let mut filter = filter::field_in("lecture", lectures);
        filter.insert("student", student);

        Ok(find_many(
            self,
            ATTENDANCE_COLLECTION_NAME,
            filter,
            Some(doc! { "markedOn": 1 }),
            None,
        )
        .await?)
    }

    async fn delete_lecture_attendance(&self, lecture: Id) -> Result<u64, ApiError> {
        let result = self
            .collection::<AttendanceRecord>(ATTENDANCE_COLLECTION_NAME)
            .delete_many(doc! { "lecture": lecture }, None)
            .await?;
        Ok(result.deleted_count)
    }
}
