use crate::helpers::{spawn_app, unique_email};
use serde_json::{json, Value};

async fn list(app: &crate::helpers::TestApp, query: &str) -> Vec<Value> {
    app.api_client
        .get(app.url(&format!("/api/producers{}", query)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn paying_producers_are_listed_first() {
    // arrange
    let app = spawn_app().await;
    let (_, free_id) = app.create_producer("Aubépine", "Nantes").await;
    let (_, paid_id) = app.create_producer("Zinnia", "Nantes").await;
    app.activate_subscription(paid_id, "premium", "sub_zinnia").await;

    // act
    let producers = list(&app, "").await;

    // assert
    assert_eq!(producers.len(), 2);
    assert_eq!(producers[0]["id"], paid_id);
    assert_eq!(producers[0]["plan"], "premium");
    assert_eq!(producers[1]["id"], free_id);
    assert_eq!(producers[1]["plan"], "free");
}

#[tokio::test]
async fn the_listing_filters_by_city_and_name() {
    // arrange
    let app = spawn_app().await;
    app.create_producer("Ferme du Lac", "Annecy").await;
    app.create_producer("Miellerie du Lac", "Chambéry").await;
    app.create_producer("Fromagerie 100%", "Annecy").await;

    // act
    let in_annecy = list(&app, "?city=annecy").await;
    let named_lac = list(&app, "?q=lac").await;
    let percent = list(&app, "?q=%25").await;

    // assert
    assert_eq!(in_annecy.len(), 2);
    assert_eq!(named_lac.len(), 2);
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0]["name"], "Fromagerie 100%");
}

#[tokio::test]
async fn accented_city_names_match_in_any_case() {
    // arrange
    let app = spawn_app().await;
    let (_, producer_id) = app.create_producer("Ferme du Val", "Évreux").await;
    app.create_producer("Les Vergers", "Rouen").await;

    for city in ["Évreux", "évreux", "ÉVREUX"] {
        // act
        let producers: Vec<Value> = app
            .api_client
            .get(app.url("/api/producers"))
            .query(&[("city", city)])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        // assert
        assert_eq!(producers.len(), 1, "city={}", city);
        assert_eq!(producers[0]["id"], producer_id);
    }
}

#[tokio::test]
async fn free_producers_are_sorted_alphabetically_ignoring_accents() {
    // arrange
    let app = spawn_app().await;
    app.create_producer("Zeste", "Tours").await;
    app.create_producer("Ébène", "Tours").await;
    app.create_producer("abeilles", "Tours").await;

    // act
    let producers = list(&app, "?city=tours").await;

    // assert
    let names: Vec<_> = producers.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["abeilles", "Ébène", "Zeste"]);
}

#[tokio::test]
async fn producer_details_include_photos_and_plan() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Les Jardins d'Ella", "Rennes").await;
    owner
        .post(app.url(&format!("/api/producers/{}/photos", producer_id)))
        .json(&json!({ "url": "https://images.example.com/serre.jpg", "caption": "La serre" }))
        .send()
        .await
        .unwrap();

    // act
    let detail: Value = app
        .api_client
        .get(app.url(&format!("/api/producers/{}", producer_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // assert
    assert_eq!(detail["name"], "Les Jardins d'Ella");
    assert_eq!(detail["plan"], "free");
    assert_eq!(detail["photos"].as_array().unwrap().len(), 1);
    assert_eq!(detail["photos"][0]["caption"], "La serre");
}

#[tokio::test]
async fn an_unknown_producer_is_a_404() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app
        .api_client
        .get(app.url("/api/producers/4242"))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn only_the_owner_or_an_admin_can_edit_a_producer() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Blanche", "Caen").await;
    let stranger = app.signed_in_user(&unique_email()).await;
    let admin = app.signed_in_admin().await;
    let url = app.url(&format!("/api/producers/{}", producer_id));

    // act
    let by_owner = owner
        .put(&url)
        .json(&json!({ "description": "Oeufs bio", "latitude": 49.18, "longitude": -0.37 }))
        .send()
        .await
        .unwrap();
    let by_stranger = stranger
        .put(&url)
        .json(&json!({ "description": "Vandalisme" }))
        .send()
        .await
        .unwrap();
    let by_admin = admin
        .put(&url)
        .json(&json!({ "website": "https://ferme-blanche.example.com" }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(by_owner.status().as_u16(), 200);
    assert_eq!(by_stranger.status().as_u16(), 403);
    assert_eq!(by_admin.status().as_u16(), 200);
    let detail: Value = by_admin.json().await.unwrap();
    assert_eq!(detail["description"], "Oeufs bio");
    assert_eq!(detail["website"], "https://ferme-blanche.example.com");
    assert_eq!(detail["latitude"], 49.18);
}

#[tokio::test]
async fn invalid_producer_updates_are_rejected() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Grise", "Lille").await;
    let url = app.url(&format!("/api/producers/{}", producer_id));
    let test_cases = vec![
        (json!({ "latitude": 50.6 }), "a latitude without longitude"),
        (json!({ "latitude": 123.0, "longitude": 3.0 }), "an out of range latitude"),
        (json!({ "website": "ftp://example.com" }), "a non-http website"),
        (json!({ "name": "" }), "an empty name"),
        (json!({ "city": "  " }), "a blank city"),
    ];

    for (body, description) in test_cases {
        // act
        let response = owner.put(&url).json(&body).send().await.unwrap();

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request for {}.",
            description
        );
    }
}

#[tokio::test]
async fn the_free_plan_is_limited_to_three_photos() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Rousse", "Dijon").await;
    let url = app.url(&format!("/api/producers/{}/photos", producer_id));
    for i in 0..3 {
        let response = owner
            .post(&url)
            .json(&json!({ "url": format!("https://images.example.com/{}.jpg", i) }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    // act
    let over_limit = owner
        .post(&url)
        .json(&json!({ "url": "https://images.example.com/3.jpg" }))
        .send()
        .await
        .unwrap();
    app.activate_subscription(producer_id, "standard", "sub_rousse").await;
    let after_upgrade = owner
        .post(&url)
        .json(&json!({ "url": "https://images.example.com/3.jpg" }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(over_limit.status().as_u16(), 402);
    assert_eq!(after_upgrade.status().as_u16(), 201);
}

#[tokio::test]
async fn photos_can_be_deleted_by_their_owner() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Verte", "Metz").await;
    let photo: Value = owner
        .post(app.url(&format!("/api/producers/{}/photos", producer_id)))
        .json(&json!({ "url": "https://images.example.com/champ.jpg" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let photo_url = app.url(&format!(
        "/api/producers/{}/photos/{}",
        producer_id, photo["id"]
    ));

    // act
    let deleted = owner.delete(&photo_url).send().await.unwrap();
    let deleted_again = owner.delete(&photo_url).send().await.unwrap();

    // assert
    assert_eq!(deleted.status().as_u16(), 204);
    assert_eq!(deleted_again.status().as_u16(), 404);
}
