use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::middleware::paging::PageState;
use crate::resp::ApiError;

pub static NOTE_COLLECTION_NAME: &str = "notes";

/// Study material shared with a subject's students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject: Id,
    pub standard: Id,
    pub tutor: Id,
    pub file: String,
    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub created: DateTime<Utc>,
}

pub trait NoteDbExt {
    async fn create_note(&self, note: &Note) -> Result<(), ApiError>;
    async fn get_note(&self, id: Id) -> Result<Option<Note>, ApiError>;
    async fn list_notes(
        &self,
        subjects: Option<&[Id]>,
        page: PageState,
    ) -> Result<Vec<Note>, ApiError>;
    async fn delete_note(&self, id: Id) -> Result<Option<Note>, ApiError>;
}

impl NoteDbExt for Database {
    async fn create_note(&self, note: &Note) -> Result<(), ApiError> {
        self.collection::<Note>(NOTE_COLLECTION_NAME)
            .insert_one(note, None)
            .await?;
        Ok(())
    }

    async fn get_note(&self, id: Id) -> Result<Option<Note>, ApiError> {
        self.collection(NOTE_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn list_notes(
        &self,
        subjects: Option<&[Id]>,
        page: PageState,
    ) -> Result<Vec<Note>, ApiError> {
        let filter = subjects
            .map(|it| filter::field_in("subject", it))
            .unwrap_or_else(Document::new);
        Ok(find_many(
            self,
            NOTE_COLLECTION_NAME,
            filter,
            Some(doc! { "created": -1 }),
            Some(page),
        )
        .await?)
    }

    async fn delete_note(&self, id: Id) -> Result<Option<Note>, ApiError> {
        self.collection(NOTE_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
