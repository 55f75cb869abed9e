use crate::catchers::{default_message, error_body, ErrorBody};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::Request;

#[catch(400)]
pub fn bad_request(_req: &Request) -> status::BadRequest<Json<ErrorBody>> {
    status::BadRequest(error_body(default_message(Status::BadRequest)))
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> status::Custom<Json<ErrorBody>> {
    status::Custom(Status::Unauthorized, error_body("Authentication required."))
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> status::Custom<Json<ErrorBody>> {
    status::Custom(
        Status::Forbidden,
        error_body("You are not allowed to access this resource."),
    )
}

#[catch(404)]
pub fn not_found(_req: &Request) -> status::NotFound<Json<ErrorBody>> {
    status::NotFound(error_body(default_message(Status::NotFound)))
}

/// Rocket answers 422 when a JSON body fails to deserialize; the API treats
/// that as a plain bad request.
#[catch(422)]
pub fn unprocessable_entity_to_bad_request(_req: &Request) -> status::BadRequest<Json<ErrorBody>> {
    status::BadRequest(error_body("The request body is malformed."))
}
