use std::collections::HashMap;

use bson::{doc, Document};
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::resp::error::problems;
use crate::resp::ApiError;

pub static SUBJECT_COLLECTION_NAME: &str = "subjects";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subject {
    #[serde(rename = "_id", default)]
    pub id: Id,
    pub name: String,
    pub standard: Id,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubjectCreateData {
    pub name: String,
    pub standard: Id,
}

impl SubjectCreateData {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(problems::invalid_field("name", "Name can't be empty."));
        }
        Ok(())
    }
}

pub trait SubjectDbExt {
    async fn create_subject(&self, data: SubjectCreateData) -> Result<Subject, ApiError>;
    async fn get_subject(&self, id: Id) -> Result<Option<Subject>, ApiError>;
    async fn list_subjects(&self, standard: Option<Id>) -> Result<Vec<Subject>, ApiError>;
    /// Subject names keyed by id, for labelling reports.
    async fn subject_names(&self, ids: &[Id]) -> Result<HashMap<Id, String>, ApiError>;
    async fn delete_subject(&self, id: Id) -> Result<Option<Subject>, ApiError>;
}

impl SubjectDbExt for Database {
    async fn create_subject(&self, data: SubjectCreateData) -> Result<Subject, ApiError> {
        let subject = Subject {
            id: Id::new(),
            name: data.name.trim().to_string(),
            standard: data.standard,
        };

        self.collection::<Subject>(SUBJECT_COLLECTION_NAME)
            .insert_one(&subject, None)
            .await?;
        Ok(subject)
    }

    async fn get_subject(&self, id: Id) -> Result<Option<Subject>, ApiError> {
        self.collection(SUBJECT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn list_subjects(&self, standard: Option<Id>) -> Result<Vec<Subject>, ApiError> {
        let filter = match standard {
            Some(standard) => doc! { "standard": standard },
            None => Document::new(),
        };
        Ok(find_many(
            self,
            SUBJECT_COLLECTION_NAME,
            filter,
            Some(doc! { "name": 1 }),
            None,
        )
        .await?)
    }

    async fn subject_names(&self, ids: &[Id]) -> Result<HashMap<Id, String>, ApiError> {
        let subjects: Vec<Subject> =
            find_many(self, SUBJECT_COLLECTION_NAME, filter::by_ids(ids), None, None).await?;
        Ok(subjects.into_iter().map(|it| (it.id, it.name)).collect())
    }

    async fn delete_subject(&self, id: Id) -> Result<Option<Subject>, ApiError> {
        self.collection(SUBJECT_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
