use crate::guards::AuthenticatedUser;
use anyhow::anyhow;
use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

/// An authenticated user holding the administrator flag.
pub struct AdminUser(pub AuthenticatedUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = try_outcome!(request.guard::<AuthenticatedUser>().await);
        if user.is_admin {
            Outcome::Success(AdminUser(user))
        } else {
            Outcome::Error((
                Status::Forbidden,
                anyhow!("User {} is not an administrator.", user.user_id),
            ))
        }
    }
}
