//! Multi-table account operations shared by the HTTP handlers and the
//! maintenance CLI. Deletes remove dependent rows first, children before
//! parents, inside one transaction.

use crate::domain::SubscriptionState;
use crate::models::{NewProducer, NewStatistics, Producer, SubscriptionRecord, User};
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

#[derive(Debug, PartialEq)]
pub struct DeletedAccount {
    pub user_id: i32,
    pub producer_id: Option<i32>,
}

pub fn find_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> QueryResult<Option<User>> {
    use crate::schema::utilisateurs;
    utilisateurs::table
        .filter(utilisateurs::email.eq(email))
        .select(User::as_select())
        .first(conn)
        .optional()
}

pub fn find_user(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<User>> {
    use crate::schema::utilisateurs;
    utilisateurs::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

/// Grants or revokes administrator rights. Returns `false` when the user
/// does not exist.
pub fn set_admin(conn: &mut SqliteConnection, user_id: i32, is_admin: bool) -> QueryResult<bool> {
    use crate::schema::utilisateurs;
    let updated = diesel::update(utilisateurs::table.find(user_id))
        .set(utilisateurs::is_admin.eq(is_admin))
        .execute(conn)?;
    Ok(updated > 0)
}

pub fn producer_owned_by(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Option<Producer>> {
    use crate::schema::producteurs;
    producteurs::table
        .filter(producteurs::user_id.eq(user_id))
        .select(Producer::as_select())
        .first(conn)
        .optional()
}

/// Creates a producer together with its zeroed statistics and its `free`
/// subscription row.
pub fn create_producer(
    conn: &mut SqliteConnection,
    new_producer: &NewProducer<'_>,
) -> QueryResult<Producer> {
    use crate::schema::{producteurs, statistiques, subscriptions};
    conn.transaction(|conn| {
        let producer = diesel::insert_into(producteurs::table)
            .values(new_producer)
            .returning(Producer::as_returning())
            .get_result(conn)?;
        let now = Utc::now().naive_utc();
        diesel::insert_into(statistiques::table)
            .values(NewStatistics {
                producer_id: producer.id,
                updated_at: &now,
            })
            .execute(conn)?;
        let state = SubscriptionState::free();
        diesel::insert_into(subscriptions::table)
            .values(SubscriptionRecord::new(producer.id, &state, now))
            .execute(conn)?;
        Ok(producer)
    })
}

fn delete_producer_rows(conn: &mut SqliteConnection, producer_id: i32) -> QueryResult<()> {
    use crate::schema::{favoris, photos_producteurs, producteurs, statistiques, subscriptions};
    diesel::delete(photos_producteurs::table.filter(photos_producteurs::producer_id.eq(producer_id)))
        .execute(conn)?;
    diesel::delete(statistiques::table.filter(statistiques::producer_id.eq(producer_id)))
        .execute(conn)?;
    diesel::delete(subscriptions::table.filter(subscriptions::producer_id.eq(producer_id)))
        .execute(conn)?;
    diesel::delete(favoris::table.filter(favoris::producer_id.eq(producer_id))).execute(conn)?;
    diesel::delete(producteurs::table.find(producer_id)).execute(conn)?;
    Ok(())
}

/// Removes a user and everything hanging off it, including the producer
/// profile they own. Returns `None` when the user does not exist.
#[tracing::instrument(name = "Delete a user and dependent rows", skip(conn))]
pub fn delete_user_cascade(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Option<DeletedAccount>> {
    use crate::schema::{demandes_producteur, favoris, reset_tokens, utilisateurs};
    conn.transaction(|conn| {
        if find_user(conn, user_id)?.is_none() {
            return Ok(None);
        }
        let producer_id = producer_owned_by(conn, user_id)?.map(|producer| producer.id);
        if let Some(producer_id) = producer_id {
            delete_producer_rows(conn, producer_id)?;
        }
        diesel::delete(favoris::table.filter(favoris::user_id.eq(user_id))).execute(conn)?;
        diesel::delete(reset_tokens::table.filter(reset_tokens::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(demandes_producteur::table.filter(demandes_producteur::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::delete(utilisateurs::table.find(user_id)).execute(conn)?;
        Ok(Some(DeletedAccount {
            user_id,
            producer_id,
        }))
    })
}
