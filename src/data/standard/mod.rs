use bson::doc;
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::resp::error::problems;
use crate::resp::ApiError;

pub static STANDARD_COLLECTION_NAME: &str = "standards";

/// Grade level grouping students and the lectures their cohort attends.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Standard {
    #[serde(rename = "_id", default)]
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StandardCreateData {
    pub name: String,
}

impl StandardCreateData {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(problems::invalid_field("name", "Name can't be empty."));
        }
        Ok(())
    }
}

pub trait StandardDbExt {
    async fn create_standard(&self, name: &str) -> Result<Standard, ApiError>;
    async fn get_standard(&self, id: Id) -> Result<Option<Standard>, ApiError>;
    async fn list_standards(&self) -> Result<Vec<Standard>, ApiError>;
    async fn delete_standard(&self, id: Id) -> Result<Option<Standard>, ApiError>;
}

impl StandardDbExt for Database {
    async fn create_standard(&self, name: &str) -> Result<Standard, ApiError> {
        let standard = Standard {
            id: Id::new(),
            name: name.trim().to_string(),
        };

        self.collection::<Standard>(STANDARD_COLLECTION_NAME)
            .insert_one(&standard, None)
            .await?;
        Ok(standard)
    }

    async fn get_standard(&self, id: Id) -> Result<Option<Standard>, ApiError> {
        self.collection(STANDARD_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn list_standards(&self) -> Result<Vec<Standard>, ApiError> {
        Ok(find_many(
            self,
            STANDARD_COLLECTION_NAME,
            doc! {},
            Some(doc! { "name": 1 }),
            None,
        )
        .await?)
    }

    async fn delete_standard(&self, id: Id) -> Result<Option<Standard>, ApiError> {
        self.collection(STANDARD_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
