use bson::Document;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use rocket::futures::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;

pub mod announcement;
pub mod attendance;
pub mod filter;
pub mod homework;
pub mod id;
pub mod lecture;
pub mod marks;
pub mod note;
pub mod remark;
pub mod stamp;
pub mod standard;
pub mod subject;
pub mod user;

pub use id::Id;

use crate::middleware::paging::PageState;

/// Drains a cursor, skipping documents that no longer match their model.
///
/// Cursor failures end the read with an error rather than a partial result.
pub(crate) async fn collect_lenient<T, S>(mut documents: S) -> Result<Vec<T>, mongodb::error::Error>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<Document, mongodb::error::Error>> + Unpin,
{
    let mut items = vec![];
    while let Some(document) = documents.try_next().await? {
        match bson::from_document::<T>(document) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Unable to deserialize document: {}", e),
        }
    }
    Ok(items)
}

/// Runs `filter` against `collection` with optional sort and paging.
pub(crate) async fn find_many<T>(
    db: &Database,
    collection: &str,
    filter: Document,
    sort: Option<Document>,
    page: Option<PageState>,
) -> Result<Vec<T>, mongodb::error::Error>
where
    T: DeserializeOwned,
{
    let mut options = mongodb::options::FindOptions::default();
    options.sort = sort;
    if let Some(page) = page {
        options.skip = Some(page.skip());
        options.limit = Some(page.page_length as i64);
    }

    let cursor = db
        .collection::<Document>(collection)
        .find(filter, options)
        .await?;
    collect_lenient(cursor).await
}

/// Creates the unique indexes the write paths rely on.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let unique = |keys: Document| {
        IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build()
    };

    db.collection::<Document>(attendance::ATTENDANCE_COLLECTION_NAME)
        .create_index(unique(bson::doc! { "lecture": 1, "student": 1 }), None)
        .await?;
    db.collection::<Document>(marks::MARKS_COLLECTION_NAME)
        .create_index(unique(bson::doc! { "lecture": 1, "student": 1 }), None)
        .await?;
    db.collection::<Document>(user::USER_COLLECTION_NAME)
        .create_index(unique(bson::doc! { "username": 1 }), None)
        .await?;
    db.collection::<Document>(user::USER_COLLECTION_NAME)
        .create_index(unique(bson::doc! { "email": 1 }), None)
        .await?;
    db.collection::<Document>(standard::STANDARD_COLLECTION_NAME)
        .create_index(unique(bson::doc! { "name": 1 }), None)
        .await?;
    db.collection::<Document>(subject::SUBJECT_COLLECTION_NAME)
        .create_index(unique(bson::doc! { "name": 1, "standard": 1 }), None)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use rocket::futures::stream;

    use super::collect_lenient;
    use crate::data::lecture::Lecture;
    use crate::data::Id;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Named {
        name: String,
    }

    #[rocket::async_test]
    async fn mismatched_documents_are_skipped() {
        let documents = stream::iter(vec![
            Ok(doc! { "name": "Maths" }),
            Ok(doc! { "name": 5 }),
            Ok(doc! { "name": "Science" }),
        ]);

        let items: Vec<Named> = collect_lenient(documents).await.unwrap();
        assert_eq!(
            items,
            vec![
                Named {
                    name: "Maths".to_string()
                },
                Named {
                    name: "Science".to_string()
                },
            ]
        );
    }

    #[rocket::async_test]
    async fn lectures_with_unreadable_times_are_skipped() {
        let stored = |time: &str| {
            doc! {
                "_id": Id::new(),
                "date": "2024-03-15",
                "time": time,
                "subject": Id::new(),
                "tutor": Id::new(),
                "standard": Id::new(),
                "kind": "Lecture",
                "day": "Friday",
            }
        };
        let documents = stream::iter(vec![
            Ok(stored("sometime")),
            Ok(stored("9:00 AM to 10:00 AM")),
        ]);

        let lectures: Vec<Lecture> = collect_lenient(documents).await.unwrap();
        assert_eq!(lectures.len(), 1);
        assert_eq!(lectures[0].time.to_string(), "9:00 AM to 10:00 AM");
    }

    #[rocket::async_test]
    async fn cursor_failures_are_not_partial_results() {
        let documents = stream::iter(vec![
            Ok(doc! { "name": "Maths" }),
            Err(mongodb::error::Error::from(
                std::io::ErrorKind::ConnectionReset,
            )),
            Ok(doc! { "name": "Science" }),
        ]);

        let items: Result<Vec<Named>, _> = collect_lenient(documents).await;
        assert!(items.is_err());
    }
}
