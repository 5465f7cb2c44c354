mod common;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

use common::{checkout_request, widget_cart, FakeBridge, TestApp};
use storefront_orders::domain::aggregates::{OrderStatus, PaymentStatus, Role};
use storefront_orders::domain::value_objects::OrderNumber;
use storefront_orders::store::{Page, Store};

async fn stored(app: &TestApp, number: &str) -> storefront_orders::domain::aggregates::Order {
    app.store.order_by_number(&OrderNumber::parse(number).unwrap()).await.unwrap().unwrap()
}

#[tokio::test]
async fn demo_checkout_marks_order_paid() {
    let app = TestApp::demo();
    let (status, body) = app.send(checkout_request(&widget_cart(), None, None)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body.get("checkoutUrl").is_none());
    let number = body["orderNumber"].as_str().unwrap();
    assert!(number.starts_with("ORD-"));

    let order = stored(&app, number).await;
    assert_eq!(order.payment_status(), PaymentStatus::Paid);
    assert_eq!(order.status(), OrderStatus::Processing);
    assert_eq!(order.items().len(), 1);
    let totals = order.totals();
    assert_eq!(totals.total, Decimal::new(2700, 2));
    assert_eq!(totals.total, totals.subtotal + totals.shipping + totals.tax);
    assert_eq!(order.user_id(), None);
}

#[tokio::test]
async fn bridge_checkout_returns_redirect_and_stores_session() {
    let bridge = Arc::new(FakeBridge::default());
    let app = TestApp::with_bridge(bridge.clone());
    let (status, body) = app.send(checkout_request(&widget_cart(), None, None)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["checkoutUrl"], "https://pay.test/cs_test_1");
    let number = body["orderNumber"].as_str().unwrap();
    let order = stored(&app, number).await;
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.payment_status(), PaymentStatus::Pending);
    assert_eq!(order.payment_intent_id(), Some("cs_test_1"));

    let requests = bridge.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.order_id, order.id());
    assert_eq!(request.customer_email, "a@b.com");
    assert_eq!(request.success_url, format!("http://shop.test/checkout/success?order={number}"));
    assert_eq!(request.cancel_url, "http://shop.test/cart");
    let amounts: Vec<(i64, i32)> = request.lines.iter().map(|l| (l.unit_amount, l.quantity)).collect();
    assert_eq!(amounts, vec![(1000, 2), (500, 1), (200, 1)]);
}

#[tokio::test]
async fn idempotency_key_replays_original_order() {
    let bridge = Arc::new(FakeBridge::default());
    let app = TestApp::with_bridge(bridge.clone());
    let (first_status, first) = app.send(checkout_request(&widget_cart(), Some("attempt-1"), None)).await;
    let (second_status, second) = app.send(checkout_request(&widget_cart(), Some("attempt-1"), None)).await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["orderNumber"], second["orderNumber"]);
    assert_eq!(first["checkoutUrl"], second["checkoutUrl"]);
    assert_eq!(bridge.requests.lock().unwrap().len(), 1);
    assert_eq!(app.store.list_orders(None, Page::default()).await.unwrap().1, 1);
}

#[tokio::test]
async fn double_submit_without_key_is_deduplicated() {
    let app = TestApp::demo();
    let (_, first) = app.send(checkout_request(&widget_cart(), None, None)).await;
    let (status, second) = app.send(checkout_request(&widget_cart(), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["orderNumber"], second["orderNumber"]);
    assert_eq!(app.store.list_orders(None, Page::default()).await.unwrap().1, 1);
}

#[tokio::test]
async fn concurrent_double_click_settles_once_in_demo_mode() {
    let app = TestApp::lockstep(2, None);
    let ((first_status, first), (second_status, second)) = tokio::join!(
        app.send(checkout_request(&widget_cart(), Some("dbl-click"), None)),
        app.send(checkout_request(&widget_cart(), Some("dbl-click"), None)),
    );

    let mut statuses = [first_status, second_status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CREATED]);
    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);
    assert_eq!(first["orderNumber"], second["orderNumber"]);

    let (orders, total) = app.store.list_orders(None, Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].payment_status(), PaymentStatus::Paid);
    assert_eq!(orders[0].status(), OrderStatus::Processing);
}

#[tokio::test]
async fn concurrent_double_click_shares_one_checkout_url() {
    let bridge = Arc::new(FakeBridge::default());
    let app = TestApp::lockstep(2, Some(bridge.clone()));
    let ((first_status, first), (second_status, second)) = tokio::join!(
        app.send(checkout_request(&widget_cart(), Some("dbl-click"), None)),
        app.send(checkout_request(&widget_cart(), Some("dbl-click"), None)),
    );

    let mut statuses = [first_status, second_status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CREATED]);
    assert_eq!(first["orderNumber"], second["orderNumber"]);
    assert_eq!(first["checkoutUrl"], second["checkoutUrl"]);

    let (orders, total) = app.store.list_orders(None, Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(Some(first["checkoutUrl"].as_str().unwrap()), orders[0].checkout_url());
}

#[tokio::test]
async fn failed_payment_session_resumes_on_retry() {
    let bridge = Arc::new(FakeBridge::failing(1));
    let app = TestApp::with_bridge(bridge.clone());

    let (status, body) = app.send(checkout_request(&widget_cart(), Some("retry-me"), None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    let (orders, total) = app.store.list_orders(None, Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].payment_intent_id(), None);

    let (status, body) = app.send(checkout_request(&widget_cart(), Some("retry-me"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderNumber"], orders[0].order_number().to_string());
    assert_eq!(body["checkoutUrl"], "https://pay.test/cs_test_1");
    assert_eq!(app.store.list_orders(None, Page::default()).await.unwrap().1, 1);
}

#[tokio::test]
async fn invalid_carts_are_rejected() {
    let app = TestApp::demo();

    let mut empty = widget_cart();
    empty["items"] = json!([]);
    let (status, body) = app.send(checkout_request(&empty, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "No items in cart" }));

    let mut wrong_total = widget_cart();
    wrong_total["total"] = json!(30.00);
    let (status, _) = app.send(checkout_request(&wrong_total, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut zero_quantity = widget_cart();
    zero_quantity["items"][0]["quantity"] = json!(0);
    let (status, body) = app.send(checkout_request(&zero_quantity, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "items[0].quantity must be at least 1");

    let mut bad_email = widget_cart();
    bad_email["shippingAddress"]["email"] = json!("not-an-email");
    let (status, _) = app.send(checkout_request(&bad_email, None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.list_orders(None, Page::default()).await.unwrap().1, 0);
}

#[tokio::test]
async fn guest_lookup_requires_matching_email() {
    let app = TestApp::demo();
    let (_, body) = app.send(checkout_request(&widget_cart(), None, None)).await;
    let number = body["orderNumber"].as_str().unwrap();

    let (status, order) = app.call("GET", &format!("/api/v1/orders?orderNumber={number}&email=A@B.com"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["orderNumber"], number);
    assert_eq!(order["items"][0]["name"], "Widget");

    let (status, _) = app.call("GET", &format!("/api/v1/orders?orderNumber={number}&email=c@d.com"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call("GET", "/api/v1/orders?orderNumber=ORD-NOPE-0000&email=a@b.com", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call("GET", &format!("/api/v1/orders?orderNumber={number}"), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_in_checkout_is_owned_by_the_account() {
    let app = TestApp::demo();
    let (owner, owner_token) = app.user("owner@shop.test", Role::Customer).await;
    let (_, stranger_token) = app.user("stranger@shop.test", Role::Customer).await;
    let (_, admin_token) = app.user("admin@shop.test", Role::Admin).await;

    let (_, body) = app.send(checkout_request(&widget_cart(), None, Some(&owner_token))).await;
    let order = stored(&app, body["orderNumber"].as_str().unwrap()).await;
    assert_eq!(order.user_id(), Some(owner.id));

    let uri = format!("/api/v1/orders/{}", order.id());
    assert_eq!(app.call("GET", &uri, Some(&owner_token), None).await.0, StatusCode::OK);
    assert_eq!(app.call("GET", &uri, Some(&admin_token), None).await.0, StatusCode::OK);
    assert_eq!(app.call("GET", &uri, Some(&stranger_token), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.call("GET", &uri, None, None).await.0, StatusCode::UNAUTHORIZED);

    let (status, mine) = app.call("GET", "/api/v1/account/orders", Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = app.call("GET", "/api/v1/account/orders", Some(&stranger_token), None).await;
    assert!(theirs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn guest_order_reconciles_by_email_after_signup() {
    let app = TestApp::demo();
    let (_, body) = app.send(checkout_request(&widget_cart(), None, None)).await;

    let (status, session) = app.call("POST", "/api/v1/auth/signup", None, Some(json!({
        "email": "A@B.com", "password": "correct-horse", "name": "A B"
    }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let token = session["token"].as_str().unwrap().to_string();
    assert!(session["user"].get("passwordHash").is_none());

    let (_, mine) = app.call("GET", "/api/v1/account/orders", Some(&token), None).await;
    assert_eq!(mine[0]["orderNumber"], body["orderNumber"]);

    let (status, _) = app.call("POST", "/api/v1/auth/signin", None, Some(json!({ "email": "a@b.com", "password": "wrong-horse" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call("POST", "/api/v1/auth/signin", None, Some(json!({ "email": "a@b.com", "password": "correct-horse" }))).await;
    assert_eq!(status, StatusCode::OK);
}
