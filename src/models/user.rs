use crate::schema::utilisateurs;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = utilisateurs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = utilisateurs)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub is_admin: bool,
    pub created_at: &'a NaiveDateTime,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = utilisateurs)]
pub struct UserChangeset {
    pub email: Option<String>,
    pub phone: Option<String>,
}
