//! Timestamps stored as BSON dates and exchanged as RFC 3339 text.
//!
//! Use with `#[serde(with = "crate::data::stamp")]` on `DateTime<Utc>` fields
//! that are sorted on in MongoDB. The driver writes documents through a
//! non-human-readable serializer, so those get a native date; JSON responses
//! keep chrono's text form. Rows written as text before the switch still read.

use bson::Bson;
use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub fn to_bson(date: &DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(date.timestamp_millis())
}

pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if serializer.is_human_readable() {
        date.serialize(serializer)
    } else {
        to_bson(date).serialize(serializer)
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match Bson::deserialize(deserializer)? {
        Bson::DateTime(date) => Utc
            .timestamp_millis_opt(date.timestamp_millis())
            .single()
            .ok_or_else(|| de::Error::custom("timestamp out of range")),
        Bson::String(text) => DateTime::parse_from_rfc3339(&text)
            .map(|it| it.with_timezone(&Utc))
            .map_err(de::Error::custom),
        other => Err(de::Error::custom(format!(
            "expected a date, found {:?}",
            other.element_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, Document};
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "super")]
        at: DateTime<Utc>,
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn driver_writes_native_dates() {
        let stamped = Stamped { at: at(1_710_000_000) };

        let bytes = bson::to_vec(&stamped).unwrap();
        let stored: Document = bson::from_slice(&bytes).unwrap();
        assert_eq!(
            stored.get_datetime("at").unwrap().timestamp_millis(),
            1_710_000_000_000
        );

        let read: Stamped = bson::from_document(stored).unwrap();
        assert_eq!(read, stamped);
    }

    #[test]
    fn responses_keep_text_and_old_rows_still_read() {
        let stamped = Stamped { at: at(1_710_000_000) };
        let json = serde_json::to_value(&stamped).unwrap();
        assert_eq!(json["at"], "2024-03-09T16:00:00Z");

        let legacy: Stamped =
            bson::from_document(doc! { "at": "2024-03-09T16:00:00+00:00" }).unwrap();
        assert_eq!(legacy, stamped);
    }

    #[test]
    fn native_dates_order_chronologically() {
        let earlier = super::to_bson(&at(9));
        let later = super::to_bson(&at(10));
        assert!(earlier < later);
    }
}
