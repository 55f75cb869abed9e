mod client_errors;
mod server_errors;

pub use client_errors::*;
pub use server_errors::*;

use rocket::http::Status;
use rocket::serde::json::Json;

/// Body shared by every error response of the API.
#[derive(serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn error_body(message: impl Into<String>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: message.into(),
    })
}

fn default_message(status: Status) -> &'static str {
    status.reason().unwrap_or("Unexpected status")
}
