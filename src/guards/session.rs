use crate::guards::OrStatus;
use rocket::http::{CookieJar, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

pub const SESSION_COOKIE: &str = "terroir_session";

/// The user id carried by the encrypted session cookie. The cookie is
/// authenticated, so its content can be trusted, but the user may have been
/// deleted since it was issued.
pub struct SessionUserId(pub i32);

pub fn open_session(cookies: &CookieJar<'_>, user_id: i32) {
    cookies.add_private((SESSION_COOKIE, user_id.to_string()));
}

pub fn close_session(cookies: &CookieJar<'_>) {
    cookies.remove_private(SESSION_COOKIE);
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionUserId {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match from_request_result(request) {
            Ok(user_id) => Outcome::Success(user_id),
            Err(failure) => Outcome::Error(failure),
        }
    }
}

fn from_request_result(request: &Request<'_>) -> Result<SessionUserId, (Status, anyhow::Error)> {
    let cookie = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .or_status(Status::Unauthorized, "No valid session cookie was sent.")?;
    let user_id = cookie
        .value()
        .parse::<i32>()
        .or_status(Status::Unauthorized, "The session cookie is corrupted.")?;
    Ok(SessionUserId(user_id))
}
