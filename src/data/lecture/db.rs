use bson::{doc, Document};
use chrono::NaiveDate;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Database;

use super::{Lecture, LectureKind};
use crate::data::attendance::ATTENDANCE_COLLECTION_NAME;
use crate::data::marks::MARKS_COLLECTION_NAME;
use crate::data::{filter, find_many, Id};
use crate::resp::ApiError;
use crate::time::{self, TimeRange};

pub static LECTURE_COLLECTION_NAME: &str = "lectures";

/// Restricts lecture queries; unset fields don't filter.
#[derive(Debug, Clone, Default)]
pub struct LectureQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub standard: Option<Id>,
    pub subjects: Option<Vec<Id>>,
    pub tutor: Option<Id>,
    pub kind: Option<LectureKind>,
}

impl LectureQuery {
    pub fn to_filter(&self) -> Document {
        let mut filter = Document::new();

        let mut date = Document::new();
        if let Some(from) = self.from {
            date.insert("$gte", from.to_string());
        }
        if let Some(to) = self.to {
            date.insert("$lte", to.to_string());
        }
        if !date.is_empty() {
            filter.insert("date", date);
        }

        if let Some(standard) = self.standard {
            filter.insert("standard", standard);
        }
        if let Some(subjects) = &self.subjects {
            filter.insert("subject", doc! { "$in": filter::ids_bson(subjects) });
        }
        if let Some(tutor) = self.tutor {
            filter.insert("tutor", tutor);
        }
        if let Some(kind) = self.kind {
            filter.insert("kind", kind);
        }

        filter
    }
}

pub trait LectureDbExt {
    async fn create_lecture(&self, lecture: &Lecture) -> Result<(), ApiError>;
    async fn get_lecture(&self, id: Id) -> Result<Option<Lecture>, ApiError>;

    /// Lectures sharing `date` and `time` exactly, other than `except`.
    async fn find_conflicts(
        &self,
        date: NaiveDate,
        time: TimeRange,
        except: Option<Id>,
    ) -> Result<Vec<Lecture>, ApiError>;

    /// Lectures matching `query`, ordered by date and then start time.
    async fn find_lectures(&self, query: &LectureQuery) -> Result<Vec<Lecture>, ApiError>;
    async fn count_lectures(&self, query: &LectureQuery) -> Result<u64, ApiError>;

    async fn reschedule_lecture(
        &self,
        id: Id,
        date: NaiveDate,
        time: TimeRange,
        tutor: Id,
    ) -> Result<Option<Lecture>, ApiError>;

    async fn set_marked(&self, id: Id, marked: bool) -> Result<(), ApiError>;

    /// Deletes a lecture together with its attendance and marks.
    async fn delete_lecture(&self, id: Id) -> Result<Option<Lecture>, ApiError>;
}

impl LectureDbExt for Database {
    async fn create_lecture(&self, lecture: &Lecture) -> Result<(), ApiError> {
        self.collection::<Lecture>(LECTURE_COLLECTION_NAME)
            .insert_one(lecture, None)
            .await?;
        Ok(())
    }

    async fn get_lecture(&self, id: Id) -> Result<Option<Lecture>, ApiError> {
        self.collection(LECTURE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn find_conflicts(
        &self,
        date: NaiveDate,
        time: TimeRange,
        except: Option<Id>,
    ) -> Result<Vec<Lecture>, ApiError> {
        let mut filter = doc! { "date": date.to_string(), "time": time };
        if let Some(except) = except {
            filter.insert("_id", doc! { "$ne": except });
        }
        Ok(find_many(self, LECTURE_COLLECTION_NAME, filter, None, None).await?)
    }

    async fn find_lectures(&self, query: &LectureQuery) -> Result<Vec<Lecture>, ApiError> {
        let mut lectures: Vec<Lecture> = find_many(
            self,
            LECTURE_COLLECTION_NAME,
            query.to_filter(),
            Some(doc! { "date": 1 }),
            None,
        )
        .await?;
        lectures.sort_by_key(|it| (it.date, it.time.start));
        Ok(lectures)
    }

    async fn count_lectures(&self, query: &LectureQuery) -> Result<u64, ApiError> {
        self.collection::<Lecture>(LECTURE_COLLECTION_NAME)
            .count_documents(query.to_filter(), None)
            .await
            .map_err(ApiError::from)
    }

    async fn reschedule_lecture(
        &self,
        id: Id,
        date: NaiveDate,
        time: TimeRange,
        tutor: Id,
    ) -> Result<Option<Lecture>, ApiError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection(LECTURE_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": {
                    "date": date.to_string(),
                    "time": time,
                    "tutor": tutor,
                    "day": time::weekday_name(date),
                } },
                options,
            )
            .await
            .map_err(ApiError::from)
    }

    async fn set_marked(&self, id: Id, marked: bool) -> Result<(), ApiError> {
        self.collection::<Lecture>(LECTURE_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$set": { "isMarked": marked } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn delete_lecture(&self, id: Id) -> Result<Option<Lecture>, ApiError> {
        let removed: Option<Lecture> = self
            .collection(LECTURE_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await?;

        if removed.is_some() {
            let attendance = self
                .collection::<Document>(ATTENDANCE_COLLECTION_NAME)
                .delete_many(doc! { "lecture": id }, None)
                .await?;
            let marks = self
                .collection::<Document>(MARKS_COLLECTION_NAME)
                .delete_many(doc! { "lecture": id }, None)
                .await?;
            tracing::info!(
                "Deleted lecture {} with {} attendance and {} marks records.",
                id,
                attendance.deleted_count,
                marks.deleted_count
            );
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        assert!(LectureQuery::default().to_filter().is_empty());
    }

    #[test]
    fn query_filters_by_date_window_and_subjects() {
        let subject = Id::new();
        let query = LectureQuery {
            from: NaiveDate::from_ymd_opt(2024, 1, 7),
            to: NaiveDate::from_ymd_opt(2024, 1, 13),
            subjects: Some(vec![subject]),
            kind: Some(LectureKind::Test),
            ..Default::default()
        };
        let filter = query.to_filter();

        let date = filter.get_document("date").unwrap();
        assert_eq!(date.get_str("$gte").unwrap(), "2024-01-07");
        assert_eq!(date.get_str("$lte").unwrap(), "2024-01-13");
        assert_eq!(filter.get_str("kind").unwrap(), "Test");
        let subjects = filter.get_document("subject").unwrap();
        assert_eq!(
            subjects.get_array("$in").unwrap(),
            &vec![bson::Bson::String(subject.to_string())]
        );
    }
}
