use crate::catchers::{error_body, ErrorBody};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::Request;

#[catch(500)]
pub fn internal_error(req: &Request) -> status::Custom<Json<ErrorBody>> {
    tracing::error!(uri = %req.uri(), "Request failed with an internal error");
    status::Custom(Status::InternalServerError, error_body("Something went wrong."))
}
