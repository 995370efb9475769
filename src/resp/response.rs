use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::Serialize;

use super::{ApiError, Envelope};

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Success half of every API response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: Status,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: Status, data: T, message: impl ToString) -> ApiResponse<T> {
        ApiResponse {
            status,
            message: message.to_string(),
            data,
        }
    }

    pub fn ok(data: T, message: impl ToString) -> ApiResponse<T> {
        Self::new(Status::Ok, data, message)
    }

    pub fn created(data: T, message: impl ToString) -> ApiResponse<T> {
        Self::new(Status::Created, data, message)
    }
}

impl<'r, T: Serialize> Responder<'r, 'static> for ApiResponse<T> {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = Envelope {
            status_code: self.status.code,
            success: true,
            message: &self.message,
            data: Some(&self.data),
            detail: None,
            errors: None,
        };
        let body_string = serde_json::to_string(&body).map_err(|e| {
            tracing::error!("unable to serialize response data: {}", e);
            Status::InternalServerError
        })?;

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}
