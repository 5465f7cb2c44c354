//! HTTP surface.

mod accounts;
mod admin;
mod catalog;
mod extract;
mod orders;
mod webhooks;
mod wishlist;

pub use extract::ValidJson;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::store::Page;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-orders"})) }))
        .route("/api/v1/auth/signup", post(accounts::sign_up))
        .route("/api/v1/auth/signin", post(accounts::sign_in))
        .route("/api/v1/products", get(catalog::list_products))
        .route("/api/v1/products/:slug", get(catalog::get_product))
        .route("/api/v1/categories", get(catalog::list_categories))
        .route("/api/v1/orders", get(orders::guest_lookup).post(orders::place_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/account/orders", get(orders::my_orders))
        .route("/api/v1/wishlist", get(wishlist::list).post(wishlist::add).delete(wishlist::remove))
        .route("/api/v1/webhooks/payment", post(webhooks::payment))
        .route("/api/v1/admin/orders", get(admin::list_orders))
        .route("/api/v1/admin/orders/:id", get(admin::get_order).patch(admin::update_order))
        .route("/api/v1/admin/products", get(admin::list_products).post(admin::create_product))
        .route("/api/v1/admin/products/:id", get(admin::get_product).put(admin::update_product).delete(admin::delete_product))
        .route("/api/v1/admin/categories", get(admin::list_categories).post(admin::create_category))
        .route("/api/v1/admin/categories/:id", put(admin::update_category).delete(admin::delete_category))
        .route("/api/v1/admin/users", get(admin::list_users))
        .route("/api/v1/admin/users/:id", get(admin::get_user).patch(admin::update_user_role))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> Page { Page::new(self.page, self.per_page) }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new((data, total): (Vec<T>, i64), page: Page) -> Self { Self { data, total, page: page.page } }
}

fn success() -> Json<serde_json::Value> { Json(serde_json::json!({ "success": true })) }
