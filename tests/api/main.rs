mod auth;
mod helpers;
mod producers;
mod stripe_webhook;
