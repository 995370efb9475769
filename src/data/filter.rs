use bson::{doc, Bson, Document};

use super::Id;

#[inline]
pub fn by_id(id: Id) -> Document {
    doc! { "_id": id }
}

#[inline]
pub fn by_ids(ids: &[Id]) -> Document {
    doc! { "_id": { "$in": ids_bson(ids) } }
}

#[inline]
pub fn by_email(email: impl AsRef<str>) -> Document {
    doc! { "email": email.as_ref().to_lowercase() }
}

#[inline]
pub fn by_username(username: impl AsRef<str>) -> Document {
    doc! { "username": username.as_ref() }
}

#[inline]
pub fn ids_bson(ids: &[Id]) -> Vec<Bson> {
    ids.iter().copied().map(Bson::from).collect()
}

/// `field` matches any of `ids`.
#[inline]
pub fn field_in(field: &str, ids: &[Id]) -> Document {
    let mut filter = Document::new();
    filter.insert(field, doc! { "$in": ids_bson(ids) });
    filter
}
