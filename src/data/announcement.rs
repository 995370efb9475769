use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::ApiError;

pub static ANNOUNCEMENT_COLLECTION_NAME: &str = "announcements";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    pub body: String,
    /// Audience; everyone when unset.
    #[serde(default)]
    pub standard: Option<Id>,
    pub author: Id,
    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnnouncementCreateData {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub standard: Option<Id>,
}

impl AnnouncementCreateData {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(problems::invalid_field("title", "Title can't be empty."));
        }
        if self.body.trim().is_empty() {
            return Err(problems::invalid_field("body", "Body can't be empty."));
        }
        Ok(())
    }

    pub fn into_announcement(self, author: Id) -> Announcement {
        Announcement {
            id: Id::new(),
            title: self.title.trim().to_string(),
            body: self.body,
            standard: self.standard,
            author,
            created: Utc::now(),
        }
    }
}

pub trait AnnouncementDbExt {
    async fn create_announcement(&self, announcement: &Announcement) -> Result<(), ApiError>;
    async fn get_announcement(&self, id: Id) -> Result<Option<Announcement>, ApiError>;
    /// Announcements with the given ids, or all of them, newest first.
    async fn list_announcements(
        &self,
        ids: Option<&[Id]>,
        page: PageState,
    ) -> Result<Vec<Announcement>, ApiError>;
    async fn delete_announcement(&self, id: Id) -> Result<Option<Announcement>, ApiError>;
}

impl AnnouncementDbExt for Database {
    async fn create_announcement(&self, announcement: &Announcement) -> Result<(), ApiError> {
        self.collection::<Announcement>(ANNOUNCEMENT_COLLECTION_NAME)
            .insert_one(announcement, None)
            .await?;
        Ok(())
    }

    async fn get_announcement(&self, id: Id) -> Result<Option<Announcement>, ApiError> {
        self.collection(ANNOUNCEMENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn list_announcements(
        &self,
        ids: Option<&[Id]>,
        page: PageState,
    ) -> Result<Vec<Announcement>, ApiError> {
        let filter = ids.map(filter::by_ids).unwrap_or_default();
        Ok(find_many(
            self,
            ANNOUNCEMENT_COLLECTION_NAME,
            filter,
            Some(doc! { "created": -1 }),
            Some(page),
        )
        .await?)
    }

    async fn delete_announcement(&self, id: Id) -> Result<Option<Announcement>, ApiError> {
        self.collection(ANNOUNCEMENT_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
