use crate::schema::statistiques;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = statistiques)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Statistics {
    pub producer_id: i32,
    pub profile_views: i32,
    pub contact_clicks: i32,
    pub map_clicks: i32,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = statistiques)]
pub struct NewStatistics<'a> {
    pub producer_id: i32,
    pub updated_at: &'a NaiveDateTime,
}
