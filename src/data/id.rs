use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bson::Bson;
use rocket::form::{self, FromFormField, ValueField};
use rocket::request::FromParam;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use utoipa::openapi::schema::{KnownFormat, ObjectBuilder, SchemaFormat, SchemaType};
use utoipa::openapi::{RefOr, Schema};
use uuid::Uuid;

/// Document identifier.
///
/// Always (de)serialized as the hyphenated UUID string, so filters built with
/// `doc!` match what typed collections write regardless of serializer.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Id {
        Id(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new()
    }
}

impl From<Uuid> for Id {
    fn from(value: Uuid) -> Self {
        Id(value)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Id)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::String(id.to_string())
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = uuid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

#[rocket::async_trait]
impl<'v> FromFormField<'v> for Id {
    fn from_value(field: ValueField<'v>) -> form::Result<'v, Self> {
        field
            .value
            .parse()
            .map_err(|_| form::Error::validation("not a valid id").into())
    }
}

impl<'s> utoipa::ToSchema<'s> for Id {
    fn schema() -> (&'s str, RefOr<Schema>) {
        (
            "Id",
            ObjectBuilder::new()
                .schema_type(SchemaType::String)
                .format(Some(SchemaFormat::KnownFormat(KnownFormat::Uuid)))
                .into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id: Id = "6f1c2f3e-3b4a-4c5d-9e8f-0a1b2c3d4e5f".parse().unwrap();

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1c2f3e-3b4a-4c5d-9e8f-0a1b2c3d4e5f\"");

        let doc = bson::doc! { "_id": id };
        assert_eq!(
            doc.get_str("_id").unwrap(),
            "6f1c2f3e-3b4a-4c5d-9e8f-0a1b2c3d4e5f"
        );
    }

    #[test]
    fn ids_round_trip_through_bson_documents() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            id: Id,
            refs: Vec<Id>,
        }

        let holder = Holder {
            id: Id::new(),
            refs: vec![Id::new(), Id::new()],
        };
        let raw = bson::to_raw_document_buf(&holder).unwrap();
        let back: Holder = bson::from_slice(raw.as_bytes()).unwrap();

        assert_eq!(back.id, holder.id);
        assert_eq!(back.refs, holder.refs);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!("not-a-uuid".parse::<Id>().is_err());
        assert!(serde_json::from_str::<Id>("\"42\"").is_err());
    }
}
