use crate::database::write_transaction;
use crate::guards::AuthenticatedUser;
use crate::models::{NewStatistics, Statistics};
use crate::routes::{editable_producer, ApiError};
use crate::startup::TerroirDbConn;
use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use rocket::http::Status;
use rocket::serde::json::Json;
use uuid::Uuid;

/// Visitor interaction counted on a producer profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatKind {
    View,
    Contact,
    MapClick,
}

impl StatKind {
    pub fn parse(segment: &str) -> Option<StatKind> {
        match segment {
            "view" => Some(StatKind::View),
            "contact" => Some(StatKind::Contact),
            "map-click" => Some(StatKind::MapClick),
            _ => None,
        }
    }
}

fn increment(
    conn: &mut SqliteConnection,
    producer_id: i32,
    kind: StatKind,
) -> QueryResult<usize> {
    use crate::schema::statistiques as s;
    let now = Utc::now().naive_utc();
    let row = s::table.find(producer_id);
    match kind {
        StatKind::View => diesel::update(row)
            .set((s::profile_views.eq(s::profile_views + 1), s::updated_at.eq(now)))
            .execute(conn),
        StatKind::Contact => diesel::update(row)
            .set((s::contact_clicks.eq(s::contact_clicks + 1), s::updated_at.eq(now)))
            .execute(conn),
        StatKind::MapClick => diesel::update(row)
            .set((s::map_clicks.eq(s::map_clicks + 1), s::updated_at.eq(now)))
            .execute(conn),
    }
}

#[tracing::instrument(
    name = "Record a profile interaction",
    skip(conn),
    fields(request_id = %Uuid::new_v4())
)]
#[post("/<producer_id>/<kind>")]
pub async fn record_event(
    producer_id: i32,
    kind: &str,
    conn: TerroirDbConn,
) -> Result<Status, ApiError> {
    let kind = StatKind::parse(kind).ok_or(ApiError::NotFound("Statistic kind"))?;
    let recorded = conn
        .run(move |c| -> QueryResult<bool> {
            use crate::schema::{producteurs, statistiques};
            write_transaction(c, |c| {
                let exists = producteurs::table
                    .find(producer_id)
                    .count()
                    .get_result::<i64>(c)?
                    > 0;
                if !exists {
                    return Ok(false);
                }
                diesel::insert_or_ignore_into(statistiques::table)
                    .values(NewStatistics {
                        producer_id,
                        updated_at: &Utc::now().naive_utc(),
                    })
                    .execute(c)?;
                increment(c, producer_id, kind)?;
                Ok(true)
            })
        })
        .await
        .context("Failed to record the interaction.")?;

    if recorded {
        Ok(Status::NoContent)
    } else {
        Err(ApiError::NotFound("Producer"))
    }
}

#[tracing::instrument(
    name = "Fetch producer statistics",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[get("/<producer_id>")]
pub async fn get_statistics(
    user: AuthenticatedUser,
    producer_id: i32,
    conn: TerroirDbConn,
) -> Result<Json<Statistics>, ApiError> {
    conn.run(move |c| -> Result<Statistics, ApiError> {
        use crate::schema::statistiques;
        editable_producer(c, producer_id, &user)?;
        let stats = statistiques::table
            .find(producer_id)
            .select(Statistics::as_select())
            .first(c)
            .optional()
            .context("Failed to load the statistics.")?;
        Ok(stats.unwrap_or(Statistics {
            producer_id,
            profile_views: 0,
            contact_clicks: 0,
            map_clicks: 0,
            updated_at: Utc::now().naive_utc(),
        }))
    })
    .await
    .map(Json)
}
