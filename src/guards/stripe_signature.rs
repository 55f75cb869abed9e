use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

/// Raw value of the `Stripe-Signature` header. Verification needs the body,
/// so it happens in the handler.
pub struct StripeSignature(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StripeSignature {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("Stripe-Signature") {
            Some(value) => Outcome::Success(StripeSignature(value.to_string())),
            None => Outcome::Error((
                Status::BadRequest,
                anyhow::anyhow!("The 'Stripe-Signature' header was missing."),
            )),
        }
    }
}
