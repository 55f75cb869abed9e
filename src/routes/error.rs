use crate::catchers::error_body;
use crate::routes::error_chain_fmt;
use rocket::http::Status;
use rocket::response::{status, Responder};
use rocket::Request;

/// Failure of an API handler. Every variant renders as `{"error": ...}`.
#[derive(thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Invalid email or password.")]
    AuthError(#[source] anyhow::Error),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("You are not allowed to access this resource.")]
    Forbidden,
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("Something went wrong.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::ValidationError(_) => Status::BadRequest,
            ApiError::AuthError(_) => Status::Unauthorized,
            ApiError::PaymentRequired(_) => Status::PaymentRequired,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::UnexpectedError(_) => Status::InternalServerError,
        }
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(e: diesel::result::Error) -> Self {
        ApiError::UnexpectedError(anyhow::Error::new(e).context("A database query failed."))
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            tracing::error!(error.cause_chain = ?self, "Request failed");
        } else {
            tracing::info!(error.cause_chain = ?self, status = status.code, "Request rejected");
        }
        status::Custom(status, error_body(self.to_string())).respond_to(request)
    }
}
