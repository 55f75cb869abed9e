use async_trait::async_trait;
use chrono::Utc;
use diesel::SqliteConnection;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use secrecy::Secret;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use terroir::accounts::{find_user_by_email, set_admin};
use terroir::configuration::get_configuration;
use terroir::database::establish_connection;
use terroir::domain::{Plan, UserEmail};
use terroir::email::Email;
use terroir::payments::{CheckoutRequest, CheckoutSession, PaymentProvider};
use terroir::startup::Application;
use terroir::telemetry::{get_subscriber, init_subscriber};
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery";

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".into();
    let subscriber_name = "test".into();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber).expect("Failed to install the subscriber.");
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber).expect("Failed to install the subscriber.");
    }
});

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Default)]
pub struct MockEmailClient {
    pub sent_emails: Mutex<Vec<SentEmail>>,
    /// When set, every send fails as if the provider were down.
    pub unavailable: AtomicBool,
}

#[async_trait]
impl Email for MockEmailClient {
    async fn send_email(
        &self,
        recipient: &UserEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), anyhow::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("The email provider is unavailable.");
        }
        self.sent_emails.lock().unwrap().push(SentEmail {
            recipient: recipient.as_ref().to_string(),
            subject: subject.to_string(),
            html: html_content.to_string(),
            text: text_content.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCheckout {
    pub producer_id: i32,
    pub plan: Plan,
    pub price_id: String,
    pub customer_email: String,
}

#[derive(Default)]
pub struct MockPaymentProvider {
    pub checkouts: Mutex<Vec<RecordedCheckout>>,
    pub cancellations: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, anyhow::Error> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(RecordedCheckout {
            producer_id: request.producer_id,
            plan: request.plan,
            price_id: request.price_id,
            customer_email: request.customer_email,
        });
        let id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/pay/{}", id),
            id,
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), anyhow::Error> {
        self.cancellations
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub db_path: String,
    pub api_client: reqwest::Client,
    pub email_client: Arc<MockEmailClient>,
    pub payments: Arc<MockPaymentProvider>,
    pub webhook_secret: String,
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let db_path = std::env::temp_dir()
        .join(format!("terroir-test-{}.db", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    let webhook_secret = format!("whsec_{}", Uuid::new_v4().simple());
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        c.application.port = None;
        c.database.path = db_path.clone();
        c.payments.webhook_secret = Secret::new(webhook_secret.clone());
        c.payments.standard_price_id = Some("price_standard_test".into());
        c.payments.premium_price_id = Some("price_premium_test".into());
        c
    };

    let email_client = Arc::new(MockEmailClient::default());
    let payments = Arc::new(MockPaymentProvider::default());
    let application = Application::build(&configuration, email_client.clone(), payments.clone())
        .await
        .expect("Failed to build the application.");
    let Application { server, mut port } = application;
    let _ = tokio::spawn(server.launch());
    let port = port.get().await.expect("The server did not report its port.");

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        db_path,
        api_client: new_client(),
        email_client,
        payments,
        webhook_secret,
    }
}

/// A client with its own cookie jar, so each one holds a separate session.
pub fn new_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

pub fn unique_email() -> String {
    format!("{}@example.com", Uuid::new_v4().simple())
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn db_connection(&self) -> SqliteConnection {
        establish_connection(&self.db_path).expect("Failed to open the test database.")
    }

    pub async fn register(
        &self,
        client: &reqwest::Client,
        email: &str,
        password: &str,
    ) -> reqwest::Response {
        client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(
        &self,
        client: &reqwest::Client,
        email: &str,
        password: &str,
    ) -> reqwest::Response {
        client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Registers a fresh account and returns a client logged in as it.
    pub async fn signed_in_user(&self, email: &str) -> reqwest::Client {
        let client = new_client();
        let response = self.register(&client, email, PASSWORD).await;
        assert_eq!(response.status().as_u16(), 201);
        client
    }

    pub fn make_admin(&self, email: &str) {
        let mut conn = self.db_connection();
        let user = find_user_by_email(&mut conn, email).unwrap().unwrap();
        assert!(set_admin(&mut conn, user.id, true).unwrap());
    }

    pub async fn signed_in_admin(&self) -> reqwest::Client {
        let email = unique_email();
        let client = self.signed_in_user(&email).await;
        self.make_admin(&email);
        client
    }

    pub async fn submit_application(
        &self,
        client: &reqwest::Client,
        farm_name: &str,
        city: &str,
    ) -> reqwest::Response {
        client
            .post(self.url("/api/producers/applications"))
            .json(&json!({
                "farm_name": farm_name,
                "email": unique_email(),
                "city": city,
                "description": "Légumes de saison"
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Takes an application through approval and returns the owner's client
    /// and the new producer id.
    pub async fn create_producer(&self, farm_name: &str, city: &str) -> (reqwest::Client, i32) {
        let owner = self.signed_in_user(&unique_email()).await;
        let response = self.submit_application(&owner, farm_name, city).await;
        assert_eq!(response.status().as_u16(), 201);
        let application: Value = response.json().await.unwrap();

        let admin = self.signed_in_admin().await;
        let response = admin
            .post(self.url(&format!(
                "/api/producers/applications/{}/approve",
                application["id"]
            )))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(response.status().as_u16(), 201);
        let producer: Value = response.json().await.unwrap();
        (owner, producer["id"].as_i64().unwrap() as i32)
    }

    pub fn sign_webhook(&self, payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    pub async fn post_webhook(&self, event: &Value) -> reqwest::Response {
        let payload = event.to_string();
        let signature = self.sign_webhook(&payload, Utc::now().timestamp());
        self.api_client
            .post(self.url("/api/stripe/webhook"))
            .header("Stripe-Signature", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Simulates the provider confirming a paid checkout for a producer.
    pub async fn activate_subscription(&self, producer_id: i32, plan: &str, subscription_id: &str) {
        let response = self
            .post_webhook(&checkout_completed(producer_id, plan, subscription_id))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    /// Asks for a reset email and returns the token carried by its link.
    pub async fn request_reset_token(&self, email: &str) -> String {
        let response = self
            .api_client
            .post(self.url("/api/auth/forgot-password"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(response.status().as_u16(), 202);
        let sent = self.email_client.sent_emails.lock().unwrap().last().cloned().unwrap();
        assert_eq!(sent.recipient, email);
        self.reset_link(&sent)
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .expect("The reset link carries no token.")
    }

    /// Extracts the single link of a password reset email.
    pub fn reset_link(&self, email: &SentEmail) -> reqwest::Url {
        let links: Vec<_> = linkify::LinkFinder::new()
            .links(&email.text)
            .filter(|l| *l.kind() == linkify::LinkKind::Url)
            .collect();
        assert_eq!(links.len(), 1);
        reqwest::Url::parse(links[0].as_str()).unwrap()
    }
}

pub fn checkout_completed(producer_id: i32, plan: &str, subscription_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "client_reference_id": producer_id.to_string(),
                "customer": "cus_test",
                "subscription": subscription_id,
                "metadata": { "producer_id": producer_id.to_string(), "plan": plan }
            }
        }
    })
}

pub fn subscription_event(event_type: &str, object: Value) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "object": object }
    })
}
