//! Back-office handlers. Every handler takes [`Admin`], so the role guard
//! runs before any of them.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{success, ListParams, PaginatedResponse, ValidJson};
use crate::auth::Admin;
use crate::domain::aggregates::{Category, CategorySummary, ContentBlock, Order, OrderStatus, Product, ProductDraft, User};
use crate::domain::value_objects::{Sku, Slug};
use crate::error::AppResult;
use crate::services::accounts::{self, UserDetail};
use crate::services::catalog::{self, CategoryInput};
use crate::services::orders::{self, OrderUpdate};
use crate::state::AppState;
use crate::store::ProductFilter;

// =============================================================================
// Orders
// =============================================================================

pub async fn list_orders(State(s): State<AppState>, _: Admin, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<Order>>> {
    let status = p.status.as_deref().filter(|v| !v.is_empty()).map(str::parse::<OrderStatus>).transpose()?;
    let page = p.page();
    Ok(Json(PaginatedResponse::new(orders::list_orders(&s, status, page).await?, page)))
}

pub async fn get_order(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> AppResult<Json<Order>> {
    Ok(Json(orders::get_order(&s, id).await?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub version: Option<i32>,
}

pub async fn update_order(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<UpdateOrderRequest>,
) -> AppResult<Json<Order>> {
    let status = r.status.as_deref().filter(|v| !v.is_empty()).map(str::parse::<OrderStatus>).transpose()?;
    let update = OrderUpdate { status, tracking_number: r.tracking_number, notes: r.notes, expected_version: r.version };
    Ok(Json(orders::update_order(&s, id, update).await?))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub content: Option<Vec<ContentBlock>>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub inventory: i32,
    pub sku: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    pub category_id: Option<Uuid>,
}

fn default_active() -> bool { true }

impl TryFrom<ProductRequest> for ProductDraft {
    type Error = crate::error::AppError;

    fn try_from(r: ProductRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            name: r.name,
            slug: Slug::new(r.slug)?,
            description: r.description,
            content: r.content.filter(|blocks| !blocks.is_empty()),
            price: r.price,
            compare_price: r.compare_price,
            images: r.images.into_iter().map(|i| i.trim().to_string()).filter(|i| !i.is_empty()).collect(),
            inventory: r.inventory,
            sku: r.sku.filter(|s| !s.trim().is_empty()).map(Sku::new).transpose()?,
            featured: r.featured,
            active: r.active,
            category_id: r.category_id,
        })
    }
}

pub async fn list_products(State(s): State<AppState>, _: Admin, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<Product>>> {
    let filter = ProductFilter {
        category_slug: p.category.clone().filter(|c| !c.is_empty()),
        featured: p.featured,
        search: p.search.clone().filter(|q| !q.trim().is_empty()),
        include_inactive: true,
    };
    let page = p.page();
    Ok(Json(PaginatedResponse::new(catalog::list_products(&s, &filter, page).await?, page)))
}

pub async fn get_product(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> AppResult<Json<Product>> {
    Ok(Json(catalog::product_by_id(&s, id).await?))
}

pub async fn create_product(State(s): State<AppState>, _: Admin, ValidJson(r): ValidJson<ProductRequest>) -> AppResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_product(&s, r.try_into()?).await?)))
}

pub async fn update_product(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<ProductRequest>,
) -> AppResult<Json<Product>> {
    Ok(Json(catalog::update_product(&s, id, r.try_into()?).await?))
}

pub async fn delete_product(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> AppResult<Json<serde_json::Value>> {
    catalog::delete_product(&s, id).await?;
    Ok(success())
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl TryFrom<CategoryRequest> for CategoryInput {
    type Error = crate::error::AppError;

    fn try_from(r: CategoryRequest) -> Result<Self, Self::Error> {
        Ok(Self { name: r.name, slug: Slug::new(r.slug)?, description: r.description, image: r.image })
    }
}

pub async fn list_categories(State(s): State<AppState>, _: Admin) -> AppResult<Json<Vec<CategorySummary>>> {
    Ok(Json(catalog::list_categories(&s).await?))
}

pub async fn create_category(State(s): State<AppState>, _: Admin, ValidJson(r): ValidJson<CategoryRequest>) -> AppResult<(StatusCode, Json<Category>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_category(&s, r.try_into()?).await?)))
}

pub async fn update_category(
    State(s): State<AppState>,
    _: Admin,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<CategoryRequest>,
) -> AppResult<Json<Category>> {
    Ok(Json(catalog::update_category(&s, id, r.try_into()?).await?))
}

pub async fn delete_category(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> AppResult<Json<serde_json::Value>> {
    catalog::delete_category(&s, id).await?;
    Ok(success())
}

// =============================================================================
// Users
// =============================================================================

pub async fn list_users(State(s): State<AppState>, _: Admin, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<User>>> {
    let page = p.page();
    Ok(Json(PaginatedResponse::new(accounts::list_users(&s, page).await?, page)))
}

pub async fn get_user(State(s): State<AppState>, _: Admin, Path(id): Path<Uuid>) -> AppResult<Json<UserDetail>> {
    Ok(Json(accounts::user_detail(&s, id).await?))
}

#[derive(Debug, Default, Deserialize)]
struct RoleRequest {
    #[serde(default)]
    role: String,
}

/// The body is read raw so the self-change check runs before it is parsed.
pub async fn update_user_role(State(s): State<AppState>, Admin(admin): Admin, Path(id): Path<Uuid>, body: Bytes) -> AppResult<Json<User>> {
    let requested = serde_json::from_slice::<RoleRequest>(&body).unwrap_or_default().role;
    Ok(Json(accounts::update_role(&s, &admin, id, &requested).await?))
}
