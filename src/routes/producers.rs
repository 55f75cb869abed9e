use crate::billing::load_subscription;
use crate::database::write_transaction;
use crate::domain::{Coordinates, Phone, Plan, ProducerName, SubscriptionStatus, UserEmail};
use crate::guards::AuthenticatedUser;
use crate::models::{NewPhoto, Photo, Producer, ProducerChangeset};
use crate::routes::ApiError;
use crate::startup::TerroirDbConn;
use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use uuid::Uuid;

const MAX_URL_LENGTH: usize = 2048;

/// A producer joined with the plan and status columns of its subscription.
pub type ProducerRow = (Producer, Option<String>, Option<String>);

/// What the map needs to place and rank a producer.
#[derive(serde::Serialize, Debug)]
pub struct ProducerSummary {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub plan: Plan,
}

impl ProducerSummary {
    pub fn from_row((producer, plan, status): ProducerRow) -> Self {
        ProducerSummary {
            id: producer.id,
            name: producer.name,
            city: producer.city,
            latitude: producer.latitude,
            longitude: producer.longitude,
            plan: effective_plan(plan.as_deref(), status.as_deref()),
        }
    }
}

fn effective_plan(plan: Option<&str>, status: Option<&str>) -> Plan {
    match (plan, status.map(SubscriptionStatus::parse)) {
        (Some(plan), Some(Ok(SubscriptionStatus::Active))) => {
            Plan::parse(plan).unwrap_or(Plan::Free)
        }
        _ => Plan::Free,
    }
}

#[derive(serde::Serialize)]
pub struct ProducerDetail {
    #[serde(flatten)]
    pub producer: Producer,
    pub plan: Plan,
    pub photos: Vec<Photo>,
}

#[derive(serde::Deserialize)]
pub struct ProducerUpdate {
    name: Option<String>,
    email: Option<String>,
    city: Option<String>,
    address: Option<String>,
    description: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl TryFrom<ProducerUpdate> for ProducerChangeset {
    type Error = String;

    fn try_from(update: ProducerUpdate) -> Result<Self, Self::Error> {
        let name = update
            .name
            .map(ProducerName::parse)
            .transpose()?
            .map(|name| name.as_ref().to_string());
        let email = update
            .email
            .map(UserEmail::parse)
            .transpose()?
            .map(|email| email.as_ref().to_string());
        let phone = update
            .phone
            .map(Phone::parse)
            .transpose()?
            .map(|phone| phone.as_ref().to_string());
        let city = match update.city.map(|city| city.trim().to_string()) {
            Some(city) if city.is_empty() => return Err("The city cannot be blank.".into()),
            city => city,
        };
        let coordinates = match (update.latitude, update.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)?),
            (None, None) => None,
            _ => return Err("Latitude and longitude must be provided together.".into()),
        };
        if let Some(website) = &update.website {
            validate_url(website)?;
        }
        Ok(ProducerChangeset {
            name,
            email,
            city,
            address: update.address,
            description: update.description,
            phone,
            website: update.website,
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
        })
    }
}

#[derive(serde::Deserialize)]
pub struct NewPhotoBody {
    url: String,
    caption: Option<String>,
}

fn validate_url(url: &str) -> Result<(), String> {
    let has_scheme = url.starts_with("https://") || url.starts_with("http://");
    if has_scheme && url.len() <= MAX_URL_LENGTH && !url.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(format!("{} is not a valid URL.", url))
    }
}

/// Case- and accent-insensitive form of a name, used to compare and order
/// producers. SQLite's `lower()` and `LIKE` only fold ASCII.
fn fold(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ÿ' => 'y',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Filters and orders map summaries: paid plans first, then by folded name.
fn select_producers(
    producers: Vec<ProducerSummary>,
    city: Option<&str>,
    q: Option<&str>,
) -> Vec<ProducerSummary> {
    let city = city.map(|city| city.trim().to_lowercase()).filter(|city| !city.is_empty());
    let q = q.map(fold).filter(|q| !q.is_empty());
    let mut selected: Vec<_> = producers
        .into_iter()
        .filter(|p| match &city {
            Some(city) => p.city.trim().to_lowercase() == *city,
            None => true,
        })
        .filter(|p| match &q {
            Some(q) => fold(&p.name).contains(q.as_str()),
            None => true,
        })
        .collect();
    selected.sort_by_cached_key(|p| (!p.plan.is_paid(), fold(&p.name), p.id));
    selected
}

/// Loads a producer the user may edit: its owner, or an administrator.
pub(crate) fn editable_producer(
    conn: &mut SqliteConnection,
    producer_id: i32,
    user: &AuthenticatedUser,
) -> Result<Producer, ApiError> {
    use crate::schema::producteurs;
    let producer = producteurs::table
        .find(producer_id)
        .select(Producer::as_select())
        .first(conn)
        .optional()
        .context("Failed to load the producer.")?
        .ok_or(ApiError::NotFound("Producer"))?;
    if producer.is_owned_by(user.user_id) || user.is_admin {
        Ok(producer)
    } else {
        Err(ApiError::Forbidden)
    }
}

fn load_detail(conn: &mut SqliteConnection, producer_id: i32) -> Result<ProducerDetail, ApiError> {
    use crate::schema::{photos_producteurs, producteurs};
    let producer = producteurs::table
        .find(producer_id)
        .select(Producer::as_select())
        .first(conn)
        .optional()
        .context("Failed to load the producer.")?
        .ok_or(ApiError::NotFound("Producer"))?;
    let photos = photos_producteurs::table
        .filter(photos_producteurs::producer_id.eq(producer_id))
        .order(photos_producteurs::id.asc())
        .select(Photo::as_select())
        .load(conn)
        .context("Failed to load the producer photos.")?;
    let plan = load_subscription(conn, producer_id)?
        .map(|state| state.effective_plan())
        .unwrap_or(Plan::Free);
    Ok(ProducerDetail {
        producer,
        plan,
        photos,
    })
}

#[tracing::instrument(name = "List producers", skip(conn), fields(request_id = %Uuid::new_v4()))]
#[get("/?<city>&<q>")]
pub async fn list_producers(
    city: Option<String>,
    q: Option<String>,
    conn: TerroirDbConn,
) -> Result<Json<Vec<ProducerSummary>>, ApiError> {
    let producers = conn
        .run(|c| -> QueryResult<Vec<ProducerRow>> {
            use crate::schema::{producteurs, subscriptions};
            producteurs::table
                .left_join(subscriptions::table)
                .select((
                    Producer::as_select(),
                    subscriptions::plan.nullable(),
                    subscriptions::status.nullable(),
                ))
                .load(c)
        })
        .await
        .context("Failed to list producers.")?
        .into_iter()
        .map(ProducerSummary::from_row)
        .collect();

    Ok(Json(select_producers(
        producers,
        city.as_deref(),
        q.as_deref(),
    )))
}

#[tracing::instrument(name = "Fetch a producer", skip(conn), fields(request_id = %Uuid::new_v4()))]
#[get("/<producer_id>")]
pub async fn get_producer(
    producer_id: i32,
    conn: TerroirDbConn,
) -> Result<Json<ProducerDetail>, ApiError> {
    conn.run(move |c| load_detail(c, producer_id))
        .await
        .map(Json)
}

#[tracing::instrument(
    name = "Update a producer profile",
    skip(user, body, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[put("/<producer_id>", data = "<body>")]
pub async fn update_producer(
    user: AuthenticatedUser,
    producer_id: i32,
    body: Json<ProducerUpdate>,
    conn: TerroirDbConn,
) -> Result<Json<ProducerDetail>, ApiError> {
    let changeset: ProducerChangeset = body
        .into_inner()
        .try_into()
        .map_err(ApiError::ValidationError)?;
    conn.run(move |c| -> Result<ProducerDetail, ApiError> {
        use crate::schema::producteurs;
        write_transaction(c, |c| {
            editable_producer(c, producer_id, &user)?;
            if !changeset.is_empty() {
                diesel::update(producteurs::table.find(producer_id))
                    .set(&changeset)
                    .execute(c)
                    .context("Failed to update the producer.")?;
            }
            load_detail(c, producer_id)
        })
    })
    .await
    .map(Json)
}

#[tracing::instrument(
    name = "Attach a photo to a producer",
    skip(user, body, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[post("/<producer_id>/photos", data = "<body>")]
pub async fn add_photo(
    user: AuthenticatedUser,
    producer_id: i32,
    body: Json<NewPhotoBody>,
    conn: TerroirDbConn,
) -> Result<status::Created<Json<Photo>>, ApiError> {
    let NewPhotoBody { url, caption } = body.into_inner();
    let url = url.trim().to_string();
    validate_url(&url).map_err(ApiError::ValidationError)?;

    let photo = conn
        .run(move |c| -> Result<Photo, ApiError> {
            use crate::schema::photos_producteurs;
            write_transaction(c, |c| {
                editable_producer(c, producer_id, &user)?;
                let plan = load_subscription(c, producer_id)?
                    .map(|state| state.effective_plan())
                    .unwrap_or(Plan::Free);
                let photo_count: i64 = photos_producteurs::table
                    .filter(photos_producteurs::producer_id.eq(producer_id))
                    .count()
                    .get_result(c)
                    .context("Failed to count the producer photos.")?;
                if photo_count >= plan.photo_limit() {
                    return Err(ApiError::PaymentRequired(format!(
                        "The {} plan allows {} photos. Upgrade to add more.",
                        plan.as_str(),
                        plan.photo_limit()
                    )));
                }
                diesel::insert_into(photos_producteurs::table)
                    .values(NewPhoto {
                        producer_id,
                        url: &url,
                        caption: caption.as_deref(),
                        created_at: &Utc::now().naive_utc(),
                    })
                    .returning(Photo::as_returning())
                    .get_result(c)
                    .context("Failed to store the photo.")
                    .map_err(ApiError::from)
            })
        })
        .await?;

    Ok(status::Created::new(format!(
        "/api/producers/{}/photos/{}",
        producer_id, photo.id
    ))
    .body(Json(photo)))
}

#[tracing::instrument(
    name = "Remove a producer photo",
    skip(user, conn),
    fields(request_id = %Uuid::new_v4(), user_id = %user.user_id)
)]
#[delete("/<producer_id>/photos/<photo_id>")]
pub async fn delete_photo(
    user: AuthenticatedUser,
    producer_id: i32,
    photo_id: i32,
    conn: TerroirDbConn,
) -> Result<Status, ApiError> {
    conn.run(move |c| -> Result<Status, ApiError> {
        use crate::schema::photos_producteurs;
        write_transaction(c, |c| {
            editable_producer(c, producer_id, &user)?;
            let deleted = diesel::delete(
                photos_producteurs::table
                    .filter(photos_producteurs::id.eq(photo_id))
                    .filter(photos_producteurs::producer_id.eq(producer_id)),
            )
            .execute(c)
            .context("Failed to delete the photo.")?;
            if deleted == 0 {
                Err(ApiError::NotFound("Photo"))
            } else {
                Ok(Status::NoContent)
            }
        })
    })
    .await
}
