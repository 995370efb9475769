use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::ApiError;

pub static REMARK_COLLECTION_NAME: &str = "remarks";

/// Tutor feedback about a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Remark {
    #[serde(rename = "_id")]
    pub id: Id,
    pub student: Id,
    pub tutor: Id,
    #[serde(default)]
    pub subject: Option<Id>,
    pub text: String,
    #[serde(default = "Utc::now", with = "crate::data::stamp")]
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RemarkCreateData {
    pub student: Id,
    #[serde(default)]
    pub subject: Option<Id>,
    pub text: String,
}

impl RemarkCreateData {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.text.trim().is_empty() {
            return Err(problems::invalid_field("text", "Remark can't be empty."));
        }
        Ok(())
    }
}

pub trait RemarkDbExt {
    async fn create_remark(&self, remark: &Remark) -> Result<(), ApiError>;
    async fn get_remark(&self, id: Id) -> Result<Option<Remark>, ApiError>;
    async fn student_remarks(&self, student: Id, page: PageState)
        -> Result<Vec<Remark>, ApiError>;
    async fn delete_remark(&self, id: Id) -> Result<Option<Remark>, ApiError>;
}

impl RemarkDbExt for Database {
    async fn create_remark(&self, remark: &Remark) -> Result<(), ApiError> {
        self.collection::<Remark>(REMARK_COLLECTION_NAME)
            .insert_one(remark, None)
            .await?;
        Ok(())
    }

    async fn get_remark(&self, id: Id) -> Result<Option<Remark>, ApiError> {
        self.collection(REMARK_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn student_remarks(
        &self,
        student: Id,
        page: PageState,
    ) -> Result<Vec<Remark>, ApiError> {
        Ok(find_many(
            self,
            REMARK_COLLECTION_NAME,
            doc! { "student": student },
            Some(doc! { "created": -1 }),
            Some(page),
        )
        .await?)
    }

    async fn delete_remark(&self, id: Id) -> Result<Option<Remark>, ApiError> {
        self.collection(REMARK_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
