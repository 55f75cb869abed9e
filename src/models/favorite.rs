use crate::schema::favoris;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Insertable)]
#[diesel(table_name = favoris)]
pub struct NewFavorite<'a> {
    pub user_id: i32,
    pub producer_id: i32,
    pub created_at: &'a NaiveDateTime,
}
