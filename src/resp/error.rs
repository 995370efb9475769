use std::fmt::{Display, Formatter};
use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::Serialize;
use utoipa::ToSchema;

use super::Envelope;
use crate::error::BackendError;

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Failure half of every API response.
///
/// Rendered as `{ statusCode, success: false, message, errors }` with the
/// HTTP status equal to `statusCode`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip)]
    pub status: Status,
    pub message: String,
    pub detail: Option<String>,
    pub errors: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status: Status, message: impl ToString) -> ApiError {
        ApiError {
            status,
            message: message.to_string(),
            detail: None,
            errors: vec![],
        }
    }

    pub fn detail(mut self, value: impl ToString) -> ApiError {
        self.detail = Some(value.to_string());
        self
    }

    pub fn field(mut self, field: impl ToString, message: impl ToString) -> ApiError {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
        self
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if self.status.code >= 500 {
            tracing::error!(uri = %req.uri(), "{}", self);
        } else {
            tracing::debug!(uri = %req.uri(), "{}", self);
        }

        let body = Envelope::<()> {
            status_code: self.status.code,
            success: false,
            message: &self.message,
            data: None,
            detail: self.detail.as_deref(),
            errors: Some(&self.errors),
        };
        let body_string =
            serde_json::to_string(&body).expect("error envelope must be JSON serializable");

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use super::ApiError;
    use rocket::http::Status;

    #[inline]
    pub fn bad_request(message: impl ToString) -> ApiError {
        ApiError::new(Status::BadRequest, message)
    }

    #[inline]
    pub fn invalid_field(field: impl ToString, message: impl ToString) -> ApiError {
        ApiError::new(Status::BadRequest, "Request validation failed.").field(field, message)
    }

    #[inline]
    pub fn unauthorized(detail: impl ToString) -> ApiError {
        ApiError::new(Status::Unauthorized, "Unable to authorize user.").detail(detail)
    }

    #[inline]
    pub fn forbidden(detail: impl ToString) -> ApiError {
        ApiError::new(Status::Forbidden, "Permission level too low.").detail(detail)
    }

    #[inline]
    pub fn not_found(what: &str, id: impl ToString) -> ApiError {
        ApiError::new(Status::NotFound, format!("{} doesn't exist.", what))
            .field("id", id.to_string())
    }

    #[inline]
    pub fn conflict(message: impl ToString) -> ApiError {
        ApiError::new(Status::Conflict, message)
    }

    #[inline]
    pub fn internal() -> ApiError {
        ApiError::new(Status::InternalServerError, "Something went wrong.")
    }
}

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(kind: &mongodb::error::ErrorKind) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(e) => e
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|it| it.code == DUPLICATE_KEY))
            .unwrap_or(false),
        _ => false,
    }
}

impl From<mongodb::error::Error> for ApiError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        fn mongodb_problem() -> ApiError {
            ApiError::new(
                Status::InternalServerError,
                "MongoDB failed while processing request.",
            )
        }

        fn access_problem() -> ApiError {
            ApiError::new(
                Status::InternalServerError,
                "Server was unable to access MongoDB.",
            )
        }

        fn bson_problem() -> ApiError {
            ApiError::new(
                Status::InternalServerError,
                "There was a problem with handling MongoDB bson.",
            )
        }

        tracing::error!("MongoDB error: {}", e);

        if is_duplicate_key(e.kind.as_ref()) {
            return problems::conflict("A matching record already exists.");
        }

        match e.kind.as_ref() {
            ErrorKind::Authentication { .. } => access_problem(),
            ErrorKind::BsonDeserialization(_) => bson_problem(),
            ErrorKind::BsonSerialization(_) => bson_problem(),
            ErrorKind::DnsResolve { .. } => access_problem(),
            ErrorKind::ServerSelection { .. } => access_problem(),
            ErrorKind::InvalidTlsConfig { .. } => access_problem(),
            ErrorKind::IncompatibleServer { .. } => access_problem(),
            ErrorKind::Io(_) => mongodb_problem()
                .detail("An IO error occurred. Submitted data might not be properly stored."),
            ErrorKind::Write(_) => mongodb_problem()
                .detail("A write error occurred. Submitted data might not be properly stored."),
            _ => mongodb_problem(),
        }
    }
}

impl From<bson::de::Error> for ApiError {
    fn from(e: bson::de::Error) -> Self {
        tracing::error!("BSON deserialization error: {}", e);
        ApiError::new(
            Status::InternalServerError,
            "An error occurred while processing BSON data.",
        )
    }
}

impl From<bson::ser::Error> for ApiError {
    fn from(e: bson::ser::Error) -> Self {
        tracing::error!("BSON serialization error: {}", e);
        ApiError::new(
            Status::InternalServerError,
            "An error occurred while processing BSON data.",
        )
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(_: serde_json::Error) -> Self {
        ApiError::new(
            Status::InternalServerError,
            "An error occurred while processing JSON data.",
        )
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => problems::unauthorized("Expired JWT signature."),
            _ => problems::unauthorized("Error while handling JWT."),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        tracing::error!("IO error: {}", e);
        ApiError::new(Status::InternalServerError, "Server IO error")
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Database(e) => e.into(),
            BackendError::Bson(e) => e.into(),
            BackendError::BsonSer(e) => e.into(),
            BackendError::Jwt(e) => e.into(),
            BackendError::Storage(crate::error::StorageError::Empty) => {
                problems::invalid_field("file", "Uploaded file is empty.")
            }
            other => {
                tracing::error!("Backend error: {}", other);
                problems::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_accumulate_field_errors() {
        let e = problems::invalid_field("time", "Malformed time range.").field("date", "Missing.");

        assert_eq!(e.status, Status::BadRequest);
        assert_eq!(e.errors.len(), 2);
        assert_eq!(e.errors[1].field, "date");
    }

    #[test]
    fn not_found_names_the_entity() {
        let e = problems::not_found("Lecture", "abc");
        assert_eq!(e.status, Status::NotFound);
        assert_eq!(e.message, "Lecture doesn't exist.");
        assert_eq!(e.to_string(), "404 Not Found: Lecture doesn't exist.");
    }
}
