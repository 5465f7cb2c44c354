mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use common::{checkout_request, widget_cart, FakeBridge, TestApp};
use storefront_orders::domain::aggregates::Role;
use storefront_orders::store::{Page, Store};

/// Orders placed through a bridge stay `pending` until the webhook arrives.
fn app() -> TestApp { TestApp::with_bridge(Arc::new(FakeBridge::default())) }

async fn place(app: &TestApp) -> Value {
    let (_, body) = app.send(checkout_request(&widget_cart(), None, None)).await;
    let (orders, _) = app.store.list_orders(None, Page::default()).await.unwrap();
    let order = orders.into_iter().find(|o| o.order_number().as_str() == body["orderNumber"]).unwrap();
    json!({ "id": order.id().to_string(), "version": order.version() })
}

fn product(name: &str, slug: &str, category_id: Option<&Value>) -> Value {
    json!({ "name": name, "slug": slug, "price": "12.50", "inventory": 3, "categoryId": category_id })
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let app = app();
    let (_, customer) = app.user("customer@shop.test", Role::Customer).await;

    let (status, body) = app.call("GET", "/api/v1/admin/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(app.call("GET", "/api/v1/admin/orders", Some("not-a-jwt"), None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.call("GET", "/api/v1/admin/users", Some(&customer), None).await.0, StatusCode::FORBIDDEN);
    assert_eq!(
        app.call("POST", "/api/v1/admin/categories", Some(&customer), Some(json!({ "name": "X", "slug": "x" }))).await.0,
        StatusCode::FORBIDDEN,
    );
}

#[tokio::test]
async fn order_status_follows_the_state_machine() {
    let app = app();
    let (_, admin) = app.user("admin@shop.test", Role::Admin).await;
    let order = place(&app).await;
    let uri = format!("/api/v1/admin/orders/{}", order["id"].as_str().unwrap());

    let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "status": "shipped" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let version = order["version"].as_i64().unwrap();
    let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "status": "processing", "version": version }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");
    assert_eq!(body["version"], version + 1);

    let (status, _) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "status": "shipped", "version": version }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "status": "bogus" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next in ["shipped", "delivered"] {
        let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "status": next }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], next);
    }
    let (status, _) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "trackingNumber": "1Z999", "notes": "left at door" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "delivered");
    assert_eq!(body["trackingNumber"], "1Z999");
    assert_eq!(body["notes"], "left at door");
}

#[tokio::test]
async fn admin_order_listing_filters_by_status() {
    let app = app();
    let (_, admin) = app.user("admin@shop.test", Role::Admin).await;
    place(&app).await;

    let (status, body) = app.call("GET", "/api/v1/admin/orders?status=pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    let (_, body) = app.call("GET", "/api/v1/admin/orders?status=shipped", Some(&admin), None).await;
    assert_eq!(body["total"], 0);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_cannot_change_own_role() {
    let app = app();
    let (me, admin) = app.user("admin@shop.test", Role::Admin).await;
    let uri = format!("/api/v1/admin/users/{}", me.id);

    let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "role": "customer" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "you cannot change your own role");

    let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "role": "emperor" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "you cannot change your own role");
}

#[tokio::test]
async fn role_changes_take_effect_on_next_request() {
    let app = app();
    let (_, admin) = app.user("admin@shop.test", Role::Admin).await;
    let (other, other_token) = app.user("second@shop.test", Role::Admin).await;
    let uri = format!("/api/v1/admin/users/{}", other.id);

    assert_eq!(app.call("GET", "/api/v1/admin/users", Some(&other_token), None).await.0, StatusCode::OK);

    let (status, _) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "role": "emperor" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call("PATCH", &uri, Some(&admin), Some(json!({ "role": "customer" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "customer");
    assert_eq!(app.call("GET", "/api/v1/admin/users", Some(&other_token), None).await.0, StatusCode::FORBIDDEN);

    let (status, detail) = app.call("GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["email"], "second@shop.test");
    assert!(detail["orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn categories_with_products_cannot_be_deleted() {
    let app = app();
    let (_, admin) = app.user("admin@shop.test", Role::Admin).await;

    let (status, category) = app.call("POST", "/api/v1/admin/categories", Some(&admin), Some(json!({ "name": "Tools", "slug": "tools" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.call("POST", "/api/v1/admin/categories", Some(&admin), Some(json!({ "name": "Tools again", "slug": "tools" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (name, slug) in [("Hammer", "hammer"), ("Wrench", "wrench")] {
        let (status, _) = app.call("POST", "/api/v1/admin/products", Some(&admin), Some(product(name, slug, Some(&category["id"])))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, listing) = app.call("GET", "/api/v1/categories", None, None).await;
    assert_eq!(listing[0]["productCount"], 2);

    let uri = format!("/api/v1/admin/categories/{}", category["id"].as_str().unwrap());
    let (status, body) = app.call("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains('2'));

    let (_, empty) = app.call("POST", "/api/v1/admin/categories", Some(&admin), Some(json!({ "name": "Empty", "slug": "empty" }))).await;
    let uri = format!("/api/v1/admin/categories/{}", empty["id"].as_str().unwrap());
    assert_eq!(app.call("DELETE", &uri, Some(&admin), None).await.0, StatusCode::OK);
    assert_eq!(app.call("DELETE", &uri, Some(&admin), None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_catalog_management() {
    let app = app();
    let (_, admin) = app.user("admin@shop.test", Role::Admin).await;
    let (_, shopper) = app.user("shopper@shop.test", Role::Customer).await;

    let (status, created) = app.call("POST", "/api/v1/admin/products", Some(&admin), Some(product("Lamp", "lamp", None))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["price"], "12.50");
    let (status, _) = app.call("POST", "/api/v1/admin/products", Some(&admin), Some(product("Other lamp", "lamp", None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.call("POST", "/api/v1/admin/products", Some(&admin), Some(json!({ "name": "Free", "slug": "free", "price": "-1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, found) = app.call("GET", "/api/v1/products/lamp", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], created["id"]);

    let product_id = created["id"].clone();
    let (status, _) = app.call("POST", "/api/v1/wishlist", Some(&shopper), Some(json!({ "productId": product_id }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.call("POST", "/api/v1/wishlist", Some(&shopper), Some(json!({ "productId": product_id }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, wishlist) = app.call("GET", "/api/v1/wishlist", Some(&shopper), None).await;
    assert_eq!(wishlist[0]["product"]["slug"], "lamp");

    let uri = format!("/api/v1/admin/products/{}", product_id.as_str().unwrap());
    let mut hidden = product("Lamp", "lamp", None);
    hidden["active"] = json!(false);
    let (status, updated) = app.call("PUT", &uri, Some(&admin), Some(hidden)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["active"], false);
    assert_eq!(app.call("GET", "/api/v1/products/lamp", None, None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.call("GET", &uri, Some(&admin), None).await.0, StatusCode::OK);

    assert_eq!(app.call("DELETE", &uri, Some(&admin), None).await.0, StatusCode::OK);
    let (_, wishlist) = app.call("GET", "/api/v1/wishlist", Some(&shopper), None).await;
    assert!(wishlist.as_array().unwrap().is_empty());
    assert_eq!(app.call("GET", &uri, Some(&admin), None).await.0, StatusCode::NOT_FOUND);
}
