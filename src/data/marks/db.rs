use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Database;

use super::MarksRecord;
use crate::data::{filter, find_many, Id};
use crate::resp::ApiError;

pub static MARKS_COLLECTION_NAME: &str = "marks";

pub trait MarksDbExt {
    /// Inserts a test's marks; a student already graded for the lecture is a conflict.
    async fn insert_marks(&self, records: &[MarksRecord]) -> Result<(), ApiError>;
    async fn get_marks(&self, id: Id) -> Result<Option<MarksRecord>, ApiError>;
    async fn lecture_marks(&self, lecture: Id) -> Result<Vec<MarksRecord>, ApiError>;
    async fn graded_students(&self, lecture: Id, students: &[Id]) -> Result<Vec<Id>, ApiError>;

    /// A student's marks, most recent first.
    async fn student_marks(&self, student: Id) -> Result<Vec<MarksRecord>, ApiError>;

    async fn update_marks(
        &self,
        id: Id,
        marks: f64,
        total_marks: f64,
        description: Option<String>,
    ) -> Result<Option<MarksRecord>, ApiError>;
    async fn delete_marks(&self, id: Id) -> Result<Option<MarksRecord>, ApiError>;
}

impl MarksDbExt for Database {
    async fn insert_marks(&self, records: &[MarksRecord]) -> Result<(), ApiError> {
        self.collection::<MarksRecord>(MARKS_COLLECTION_NAME)
            .insert_many(records, None)
            .await?;
        Ok(())
    }

    async fn get_marks(&self, id: Id) -> Result<Option<MarksRecord>, ApiError> {
        self.collection(MARKS_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn lecture_marks(&self, lecture: Id) -> Result<Vec<MarksRecord>, ApiError> {
        Ok(find_many(
            self,
            MARKS_COLLECTION_NAME,
            doc! { "lecture": lecture },
            Some(doc! { "marks": -1 }),
            None,
        )
        .await?)
    }

    async fn graded_students(&self, lecture: Id, students: &[Id]) -> Result<Vec<Id>, ApiError> {
        let mut filter = filter::field_in("student", students);
        filter.insert("lecture", lecture);

        let existing: Vec<MarksRecord> =
            find_many(self, MARKS_COLLECTION_NAME, filter, None, None).await?;
        Ok(existing.into_iter().map(|it| it.student).collect())
    }

    async fn student_marks(&self, student: Id) -> Result<Vec<MarksRecord>, ApiError> {
        Ok(find_many(
            self,
            MARKS_COLLECTION_NAME,
            doc! { "student": student },
            Some(doc! { "created": -1 }),
            None,
        )
        .await?)
    }

    async fn update_marks(
        &self,
        id: Id,
        marks: f64,
        total_marks: f64,
        description: Option<String>,
    ) -> Result<Option<MarksRecord>, ApiError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection(MARKS_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": {
                    "marks": marks,
                    "totalMarks": total_marks,
                    "description": description,
                } },
                options,
            )
            .await
            .map_err(ApiError::from)
    }

    async fn delete_marks(&self, id: Id) -> Result<Option<MarksRecord>, ApiError> {
        self.collection(MARKS_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
