use crate::schema::reset_tokens;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = reset_tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ResetToken {
    pub token: String,
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
    pub used: bool,
}

impl ResetToken {
    pub fn is_usable_at(&self, now: NaiveDateTime) -> bool {
        !self.used && now < self.expires_at
    }
}

#[derive(Insertable)]
#[diesel(table_name = reset_tokens)]
pub struct NewResetToken<'a> {
    pub token: &'a str,
    pub user_id: i32,
    pub expires_at: &'a NaiveDateTime,
    pub used: bool,
}
