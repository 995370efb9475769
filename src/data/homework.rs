use bson::{doc, Document};
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::middleware::paging::PageState;
use crate::resp::ApiError;

pub static HOMEWORK_COLLECTION_NAME: &str = "homework";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject: Id,
    pub standard: Id,
    pub tutor: Id,
    pub due_date: NaiveDate,
    /// URL of the uploaded attachment, if any.
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub created: DateTime<Utc>,
}

pub trait HomeworkDbExt {
    async fn create_homework(&self, homework: &Homework) -> Result<(), ApiError>;
    async fn get_homework(&self, id: Id) -> Result<Option<Homework>, ApiError>;
    /// Homework for any of `subjects` (or all homework), newest first.
    async fn list_homework(
        &self,
        subjects: Option<&[Id]>,
        page: PageState,
    ) -> Result<Vec<Homework>, ApiError>;
    async fn delete_homework(&self, id: Id) -> Result<Option<Homework>, ApiError>;
}

impl HomeworkDbExt for Database {
    async fn create_homework(&self, homework: &Homework) -> Result<(), ApiError> {
        self.collection::<Homework>(HOMEWORK_COLLECTION_NAME)
            .insert_one(homework, None)
            .await?;
        Ok(())
    }

    async fn get_homework(&self, id: Id) -> Result<Option<Homework>, ApiError> {
        self.collection(HOMEWORK_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn list_homework(
        &self,
        subjects: Option<&[Id]>,
        page: PageState,
    ) -> Result<Vec<Homework>, ApiError> {
        let filter = subjects
            .map(|it| filter::field_in("subject", it))
            .unwrap_or_else(Document::new);
        Ok(find_many(
            self,
            HOMEWORK_COLLECTION_NAME,
            filter,
            Some(doc! { "created": -1 }),
            Some(page),
        )
        .await?)
    }

    async fn delete_homework(&self, id: Id) -> Result<Option<Homework>, ApiError> {
        self.collection(HOMEWORK_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
