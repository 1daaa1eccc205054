//! Process-level error type.
//!
//! Leaf errors live in [`lyricline_common::AppError`]; this enum adds the
//! axum `IntoResponse` mapping so handler failures serialize as the
//! `{success:false, error}` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lyricline_common::{AppError, ErrorKind};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::App(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::OK, // never an HTTP error, see spec §7
                ErrorKind::Misconfigured => StatusCode::OK,
                ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Corrupt => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
