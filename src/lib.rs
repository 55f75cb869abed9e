#[macro_use]
extern crate rocket;

pub mod accounts;
pub mod authentication;
pub mod billing;
pub mod bound_port;
pub mod catchers;
pub mod configuration;
pub mod database;
pub mod domain;
pub mod email;
pub mod guards;
pub mod models;
pub mod payments;
pub mod routes;
pub mod schema;
pub mod startup;
pub mod telemetry;
