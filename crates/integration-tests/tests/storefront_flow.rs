//! End-to-end storefront tests: cart, checkout, guards, auth flows and the
//! admin console, driven over HTTP against in-memory backends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde_json::json;

use hapus_core::Email;
use hapus_integration_tests::TestContext;

const ADMIN: &str = "owner@devgadhapus.in";

#[tokio::test]
async fn test_cart_checkout_and_order_history() {
    let ctx = TestContext::start(ADMIN).await;
    let (browser, _) = ctx.verified_customer("Meera Shah", "meera@example.in").await;

    ctx.add_to_cart(&browser, "royal-hapus").await;
    ctx.add_to_cart(&browser, "royal-hapus").await;
    let cart = ctx.add_to_cart(&browser, "family-pack").await;
    assert_eq!(cart["total_items"], 3);
    assert_eq!(cart["total_price"], 1800 * 2 + 1200);

    let (status, placed) = ctx
        .post(&browser, "/api/checkout", &TestContext::checkout_form("Meera Shah"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{placed}");
    assert_eq!(
        placed["message"],
        "Your order is pending. Admin will confirm shortly."
    );
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (_, cart) = ctx.get(&browser, "/api/cart").await;
    assert_eq!(cart["total_items"], 0);

    let (status, orders) = ctx.get(&browser, "/api/orders").await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id.as_str());
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["totalPrice"], 4800);
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart_and_outside_pincode() {
    let ctx = TestContext::start(ADMIN).await;
    let (browser, _) = ctx.verified_customer("Arjun", "arjun@example.in").await;

    let (status, body) = ctx
        .post(&browser, "/api/checkout", &TestContext::checkout_form("Arjun"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Your cart is empty");

    ctx.add_to_cart(&browser, "premium-box").await;
    let mut form = TestContext::checkout_form("Arjun");
    form["pincode"] = json!("411001");
    let (status, _) = ctx.post(&browser, "/api/checkout", &form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The cart survives a failed checkout.
    let (_, cart) = ctx.get(&browser, "/api/cart").await;
    assert_eq!(cart["total_items"], 1);
}

#[tokio::test]
async fn test_signed_out_guard_notice_is_shown_once() {
    let ctx = TestContext::start(ADMIN).await;
    let browser = ctx.browser();

    let resp = browser.get(ctx.url("/api/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[LOCATION], "/auth");
    let (_, body) = hapus_integration_tests::decode(resp).await;
    assert_eq!(body["from"], "/orders");
    assert_eq!(body["notice"], "Please log in to continue");

    let (status, body) = ctx.get(&browser, "/api/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["notice"].is_null());
}

#[tokio::test]
async fn test_signed_out_checkout_asks_to_log_in() {
    let ctx = TestContext::start(ADMIN).await;
    let browser = ctx.browser();
    ctx.add_to_cart(&browser, "classic-hapus").await;

    let (status, body) = ctx
        .post(&browser, "/api/checkout", &TestContext::checkout_form("Guest"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/auth");
    assert_eq!(body["notice"], "Please log in to place an order.");

    // The guest cart is still there after signing in.
    let (status, _) = ctx.register(&browser, "Guest", "guest@example.in").await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, cart) = ctx.get(&browser, "/api/cart").await;
    assert_eq!(cart["total_items"], 1);
}

#[tokio::test]
async fn test_unverified_user_is_sent_to_verify_email() {
    let ctx = TestContext::start(ADMIN).await;
    let browser = ctx.browser();

    let (status, body) = ctx.register(&browser, "Kavya", "kavya@example.in").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Account created! Please verify your email.");
    assert_eq!(body["session"]["is_email_verified"], false);

    let (status, body) = ctx.get(&browser, "/api/orders").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["redirect"], "/verify-email");
    assert_eq!(body["from"], "/orders");

    let (_, body) = ctx
        .post(&browser, "/api/auth/verify-email/check", &json!({}))
        .await;
    assert_eq!(body["verified"], false);
    assert_eq!(
        body["message"],
        "Email not verified yet. Please check your inbox."
    );

    ctx.verify(&browser, "kavya@example.in").await;
    let (status, _) = ctx.get(&browser, "/api/orders").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_registration_and_bad_password() {
    let ctx = TestContext::start(ADMIN).await;
    let (status, _) = ctx
        .register(&ctx.browser(), "Rohan", "rohan@example.in")
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .register(&ctx.browser(), "Rohan Again", "rohan@example.in")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .post(
            &ctx.browser(),
            "/api/auth/login",
            &json!({ "email": "rohan@example.in", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_login_and_logout() {
    let ctx = TestContext::start(ADMIN).await;
    ctx.verified_customer("Isha", "isha@example.in").await;

    let browser = ctx.browser();
    let (status, body) = ctx
        .post(
            &browser,
            "/api/auth/login",
            &json!({ "email": "isha@example.in", "password": hapus_integration_tests::PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Login successful!");
    assert_eq!(body["session"]["is_email_verified"], true);

    let (_, body) = ctx.post(&browser, "/api/auth/logout", &json!({})).await;
    assert_eq!(body["message"], "Logged out successfully!");

    let (_, session) = ctx.get(&browser, "/api/auth/session").await;
    assert!(session["user"].is_null());
}

#[tokio::test]
async fn test_email_link_sign_in() {
    let ctx = TestContext::start(ADMIN).await;
    let browser = ctx.browser();

    let (status, body) = ctx
        .post(&browser, "/api/auth/email-link", &json!({ "email": "nikhil@example.in" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Sign in link sent! Check your email.");

    let email = Email::parse("nikhil@example.in").unwrap();
    let link = ctx
        .provider
        .last_email_to(&email)
        .await
        .and_then(|message| message.link)
        .expect("sign-in link was sent");
    assert!(link.contains("oobCode="));

    // Same browser: the pending email is remembered.
    let (status, body) = ctx
        .post(&browser, "/api/auth/email-link/complete", &json!({ "link": link }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["session"]["user"]["email"], "nikhil@example.in");
}

#[tokio::test]
async fn test_email_link_on_another_device_needs_the_email() {
    let ctx = TestContext::start(ADMIN).await;
    ctx.post(&ctx.browser(), "/api/auth/email-link", &json!({ "email": "tara@example.in" }))
        .await;
    let link = ctx
        .provider
        .last_email_to(&Email::parse("tara@example.in").unwrap())
        .await
        .and_then(|message| message.link)
        .unwrap();

    let other = ctx.browser();
    let (status, _) = ctx
        .post(&other, "/api/auth/email-link/complete", &json!({ "link": link }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .post(
            &other,
            "/api/auth/email-link/complete",
            &json!({ "link": link, "email": "tara@example.in" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_google_sign_in_for_allow_listed_admin() {
    let ctx = TestContext::start(ADMIN).await;
    ctx.provider
        .register_google_identity("google-owner", Email::parse(ADMIN).unwrap(), true)
        .await;

    let browser = ctx.browser();
    let (status, body) = ctx
        .post(&browser, "/api/auth/google", &json!({ "id_token": "google-owner" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["session"]["is_admin"], true);

    let (status, buckets) = ctx.get(&browser, "/api/admin/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert!(buckets["pending"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_customer_is_kept_out_of_admin_console() {
    let ctx = TestContext::start(ADMIN).await;
    let (browser, _) = ctx.verified_customer("Dev", "dev@example.in").await;

    let (status, body) = ctx.get(&browser, "/api/admin/orders").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["redirect"], "/");
    assert_eq!(body["notice"], "Admin access only");

    let (status, _) = ctx
        .post(&browser, "/api/admin/users/someone/promote", &json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_confirms_rejects_and_messages_orders() {
    let ctx = TestContext::start(ADMIN).await;
    let (customer, _) = ctx.verified_customer("Meera", "meera@example.in").await;
    let (admin, _) = ctx.verified_customer("Owner", ADMIN).await;

    let mut placed = Vec::new();
    for product in ["royal-hapus", "aam-ras-special"] {
        ctx.add_to_cart(&customer, product).await;
        let (status, body) = ctx
            .post(&customer, "/api/checkout", &TestContext::checkout_form("Meera"))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        placed.push(body["order_id"].as_str().unwrap().to_string());
    }

    let (_, buckets) = ctx.get(&admin, "/api/admin/orders").await;
    assert_eq!(buckets["pending"].as_array().unwrap().len(), 2);

    let (status, _) = ctx
        .post(&admin, &format!("/api/admin/orders/{}/confirm", placed[0]), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx
        .post(&admin, &format!("/api/admin/orders/{}/reject", placed[1]), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, buckets) = ctx.get(&admin, "/api/admin/orders").await;
    assert!(buckets["pending"].as_array().unwrap().is_empty());
    assert_eq!(buckets["confirmed"][0]["id"], placed[0].as_str());
    assert_eq!(buckets["rejected"][0]["id"], placed[1].as_str());

    let path = format!("/api/admin/orders/{}/messages", placed[0]);
    let (status, body) = ctx.post(&admin, &path, &json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please enter a message");

    let (status, body) = ctx
        .post(&admin, &path, &json!({ "message": "Dispatching tomorrow morning" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["messages"][0]["senderType"], "admin");

    // The customer sees the new status and the message.
    let (_, orders) = ctx.get(&customer, "/api/orders").await;
    let confirmed = orders
        .as_array()
        .unwrap()
        .iter()
        .find(|order| order["id"] == placed[0].as_str())
        .unwrap();
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["messages"][0]["message"], "Dispatching tomorrow morning");

    let (status, _) = ctx
        .post(&admin, "/api/admin/orders/-missing/confirm", &json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_promotes_and_suspends_users() {
    let ctx = TestContext::start(ADMIN).await;
    let (customer, customer_uid) = ctx.verified_customer("Sana", "sana@example.in").await;
    let (admin, admin_uid) = ctx.verified_customer("Owner", ADMIN).await;

    let (status, users) = ctx.get(&admin, "/api/admin/users").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        users
            .as_array()
            .unwrap()
            .iter()
            .any(|entry| entry["uid"] == customer_uid.as_str())
    );

    let (status, body) = ctx
        .post(&admin, &format!("/api/admin/users/{customer_uid}/promote"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Made admin");
    ctx.eventually(&customer, "/api/admin/orders", StatusCode::OK).await;

    let (_, body) = ctx
        .post(&admin, &format!("/api/admin/users/{customer_uid}/suspend"), &json!({}))
        .await;
    assert_eq!(body["message"], "User suspended");
    let body = ctx
        .eventually(&customer, "/api/orders", StatusCode::FORBIDDEN)
        .await;
    assert_eq!(body["redirect"], "/");
    assert_eq!(
        body["notice"],
        "Your account has been suspended. Contact support."
    );

    let (_, body) = ctx
        .post(&admin, &format!("/api/admin/users/{customer_uid}/unsuspend"), &json!({}))
        .await;
    assert_eq!(body["message"], "User unsuspended");
    ctx.eventually(&customer, "/api/orders", StatusCode::OK).await;

    // Admins cannot revoke their own access.
    let (status, body) = ctx
        .post(&admin, &format!("/api/admin/users/{admin_uid}/demote"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You cannot demote your own account");

    let (status, _) = ctx
        .post(&admin, &format!("/api/admin/users/{customer_uid}/crown"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_read_failure_falls_back_to_allow_list() {
    let ctx = TestContext::start(ADMIN).await;
    ctx.store.deny("userRoles").await;
    ctx.provider
        .register_google_identity("google-owner", Email::parse(ADMIN).unwrap(), true)
        .await;
    ctx.provider
        .register_google_identity(
            "google-guest",
            Email::parse("guest@example.in").unwrap(),
            true,
        )
        .await;

    let owner = ctx.browser();
    let (status, body) = ctx
        .post(&owner, "/api/auth/google", &json!({ "id_token": "google-owner" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["session"]["is_admin"], true);
    assert_eq!(body["session"]["loading"], false);

    let guest = ctx.browser();
    let (_, body) = ctx
        .post(&guest, "/api/auth/google", &json!({ "id_token": "google-guest" }))
        .await;
    assert_eq!(body["session"]["is_admin"], false);
    assert_eq!(body["session"]["is_suspended"], false);
}

#[tokio::test]
async fn test_catalog_is_public() {
    let ctx = TestContext::start(ADMIN).await;
    let browser = ctx.browser();

    let (status, products) = ctx.get(&browser, "/api/catalog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(products.as_array().unwrap().len(), 5);

    let (status, product) = ctx.get(&browser, "/api/catalog/royal-hapus").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["price"], 1800);

    let (status, _) = ctx.get(&browser, "/api/catalog/kesar").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_feed_streams_snapshot() {
    let ctx = TestContext::start(ADMIN).await;
    let (browser, _) = ctx.verified_customer("Meera", "meera@example.in").await;

    let mut resp = browser
        .get(ctx.url("/api/orders/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = resp.chunk().await.unwrap().expect("first event");
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("event: orders"), "{text}");
}
