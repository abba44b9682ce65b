//! Integration tests for Devgad Hapus.
//!
//! Each test spawns the storefront on an ephemeral port with the in-memory
//! document store and auth provider, then drives it over HTTP the way a
//! browser would: one cookie-holding `reqwest::Client` per browser session.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p hapus-integration-tests
//! ```
//!
//! No external services are needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use hapus_core::Email;
use hapus_storefront::config::StorefrontConfig;
use hapus_storefront::services::auth::MemoryIdentityProvider;
use hapus_storefront::state::AppState;
use hapus_storefront::store::MemoryStore;

/// Delivery details accepted by checkout and registration.
pub const MUMBAI_PINCODE: &str = "400050";
pub const PHONE: &str = "9876543210";
pub const ADDRESS: &str = "14 Carter Road, Bandra West";
pub const PASSWORD: &str = "alphonso-season";

/// A running storefront plus handles on its in-memory backends.
pub struct TestContext {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MemoryIdentityProvider>,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a storefront whose admin allow-list is `admin_emails`.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start(admin_emails: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MemoryIdentityProvider::new());

        let mut config = StorefrontConfig::in_memory(admin_emails);
        config.guard_wait = Duration::from_secs(2);

        let state = AppState::with_backends(config, store.clone(), provider.clone());
        let app = hapus_storefront::app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            provider,
            server,
        }
    }

    /// A new browser session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn browser(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and decode the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn get(&self, browser: &Client, path: &str) -> (StatusCode, Value) {
        let resp = browser
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed");
        decode(resp).await
    }

    /// POST `body` as JSON to `path` and decode the JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn post(&self, browser: &Client, path: &str, body: &Value) -> (StatusCode, Value) {
        let resp = browser
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed");
        decode(resp).await
    }

    /// Register `email` in `browser` with valid Mumbai details.
    pub async fn register(&self, browser: &Client, name: &str, email: &str) -> (StatusCode, Value) {
        self.post(
            browser,
            "/api/auth/register",
            &json!({
                "name": name,
                "email": email,
                "phone": PHONE,
                "address": ADDRESS,
                "pincode": MUMBAI_PINCODE,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
            }),
        )
        .await
    }

    /// Click the verification link for `email` and refresh `browser`'s
    /// session.
    ///
    /// # Panics
    ///
    /// Panics if the account does not exist or the check fails.
    pub async fn verify(&self, browser: &Client, email: &str) {
        let email = Email::parse(email).expect("valid test email");
        assert!(self.provider.confirm_email(&email).await, "unknown account");
        let (status, body) = self
            .post(browser, "/api/auth/verify-email/check", &json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["verified"], true);
    }

    /// A browser signed in as a freshly registered, verified customer.
    /// Returns the browser and the customer's uid.
    ///
    /// # Panics
    ///
    /// Panics if registration or verification fails.
    pub async fn verified_customer(&self, name: &str, email: &str) -> (Client, String) {
        let browser = self.browser();
        let (status, body) = self.register(&browser, name, email).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        self.verify(&browser, email).await;

        let (_, session) = self.get(&browser, "/api/auth/session").await;
        let uid = session["user"]["uid"]
            .as_str()
            .expect("signed-in session has a uid")
            .to_string();
        (browser, uid)
    }

    /// Put one of `product_id` in `browser`'s cart.
    ///
    /// # Panics
    ///
    /// Panics if the product is unknown.
    pub async fn add_to_cart(&self, browser: &Client, product_id: &str) -> Value {
        let (status, body) = self
            .post(browser, "/api/cart/items", &json!({ "product_id": product_id }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    /// Valid checkout details for `name`.
    #[must_use]
    pub fn checkout_form(name: &str) -> Value {
        json!({
            "name": name,
            "phone": PHONE,
            "address": ADDRESS,
            "pincode": MUMBAI_PINCODE,
            "notes": "Please call before delivery",
        })
    }

    /// Poll `path` until it answers `expected`, for changes that arrive
    /// through a live subscription.
    ///
    /// # Panics
    ///
    /// Panics if `expected` is not seen within two seconds.
    pub async fn eventually(&self, browser: &Client, path: &str, expected: StatusCode) -> Value {
        let mut last = Value::Null;
        for _ in 0..100 {
            let (status, body) = self.get(browser, path).await;
            if status == expected {
                return body;
            }
            last = body;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{path} never answered {expected}; last body: {last}");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Status and JSON body of a response. Empty bodies decode to `null`.
///
/// # Panics
///
/// Panics if the body cannot be read or is not JSON.
pub async fn decode(resp: Response) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = resp.bytes().await.expect("Failed to read response body");
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!("{status}: body is not JSON ({e}): {}", String::from_utf8_lossy(&bytes))
    });
    (status, body)
}
