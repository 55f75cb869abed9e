use crate::schema::demandes_producteur;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

pub const APPLICATION_PENDING: &str = "pending";
pub const APPLICATION_APPROVED: &str = "approved";
pub const APPLICATION_REJECTED: &str = "rejected";

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = demandes_producteur)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProducerApplication {
    pub id: i32,
    pub user_id: i32,
    pub farm_name: String,
    pub email: String,
    pub city: String,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
}

impl ProducerApplication {
    pub fn is_pending(&self) -> bool {
        self.status == APPLICATION_PENDING
    }
}

#[derive(Insertable)]
#[diesel(table_name = demandes_producteur)]
pub struct NewProducerApplication<'a> {
    pub user_id: i32,
    pub farm_name: &'a str,
    pub email: &'a str,
    pub city: &'a str,
    pub phone: Option<&'a str>,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub created_at: &'a NaiveDateTime,
}
