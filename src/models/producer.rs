use crate::schema::producteurs;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = producteurs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Producer {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub city: String,
    pub address: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl Producer {
    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.user_id == Some(user_id)
    }
}

#[derive(Insertable)]
#[diesel(table_name = producteurs)]
pub struct NewProducer<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub city: &'a str,
    pub description: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub user_id: Option<i32>,
    pub created_at: &'a NaiveDateTime,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(AsChangeset, Default, Debug)]
#[diesel(table_name = producteurs)]
pub struct ProducerChangeset {
    pub name: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ProducerChangeset {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.city.is_none()
            && self.address.is_none()
            && self.description.is_none()
            && self.phone.is_none()
            && self.website.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}
