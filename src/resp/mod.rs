use serde::Serialize;

pub mod error;
pub mod jwt;
pub mod response;

pub use error::{ApiError, FieldError};
pub use response::{ApiResponse, ApiResult};

/// Body shared by success and failure responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope<'a, T: Serialize> {
    pub status_code: u16,
    pub success: bool,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<&'a [FieldError]>,
}
