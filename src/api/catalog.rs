use axum::extract::{Path, Query, State};
use axum::Json;

use super::{ListParams, PaginatedResponse};
use crate::domain::aggregates::{CategorySummary, Product};
use crate::error::AppResult;
use crate::services::catalog;
use crate::state::AppState;
use crate::store::ProductFilter;

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> AppResult<Json<PaginatedResponse<Product>>> {
    let filter = ProductFilter {
        category_slug: p.category.clone().filter(|c| !c.is_empty()),
        featured: p.featured,
        search: p.search.clone().map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        include_inactive: false,
    };
    let page = p.page();
    Ok(Json(PaginatedResponse::new(catalog::list_products(&s, &filter, page).await?, page)))
}

pub async fn get_product(State(s): State<AppState>, Path(slug): Path<String>) -> AppResult<Json<Product>> {
    Ok(Json(catalog::product_by_slug(&s, &slug).await?))
}

pub async fn list_categories(State(s): State<AppState>) -> AppResult<Json<Vec<CategorySummary>>> {
    Ok(Json(catalog::list_categories(&s).await?))
}
