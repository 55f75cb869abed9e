use crate::schema::photos_producteurs;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone)]
#[diesel(table_name = photos_producteurs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Photo {
    pub id: i32,
    pub producer_id: i32,
    pub url: String,
    pub caption: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = photos_producteurs)]
pub struct NewPhoto<'a> {
    pub producer_id: i32,
    pub url: &'a str,
    pub caption: Option<&'a str>,
    pub created_at: &'a NaiveDateTime,
}
