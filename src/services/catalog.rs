//! Public catalog reads and admin product/category maintenance.

use tracing::instrument;
use uuid::Uuid;

use crate::domain::aggregates::{Category, CategorySummary, Product, ProductDraft};
use crate::domain::value_objects::Slug;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::{Page, ProductFilter};

pub async fn list_products(state: &AppState, filter: &ProductFilter, page: Page) -> AppResult<(Vec<Product>, i64)> {
    Ok(state.store.list_products(filter, page).await?)
}

/// Storefront product page; inactive products are hidden.
pub async fn product_by_slug(state: &AppState, slug: &str) -> AppResult<Product> {
    let not_found = || AppError::not_found("Product");
    let slug = Slug::new(slug).map_err(|_| not_found())?;
    state.store.product_by_slug(&slug).await?.filter(|p| p.active).ok_or_else(not_found)
}

pub async fn product_by_id(state: &AppState, id: Uuid) -> AppResult<Product> {
    state.store.product_by_id(id).await?.ok_or_else(|| AppError::not_found("Product"))
}

#[instrument(skip(state, draft), fields(slug = %draft.slug))]
pub async fn create_product(state: &AppState, draft: ProductDraft) -> AppResult<Product> {
    ensure_category(state, draft.category_id).await?;
    let product = Product::create(draft)?;
    state.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok(product)
}

#[instrument(skip(state, draft), fields(slug = %draft.slug))]
pub async fn update_product(state: &AppState, id: Uuid, draft: ProductDraft) -> AppResult<Product> {
    let mut product = product_by_id(state, id).await?;
    ensure_category(state, draft.category_id).await?;
    product.revise(draft)?;
    state.store.update_product(&product).await?;
    Ok(product)
}

#[instrument(skip(state))]
pub async fn delete_product(state: &AppState, id: Uuid) -> AppResult<()> {
    state.store.delete_product(id).await.map_err(|e| match e {
        crate::store::StoreError::NotFound => AppError::not_found("Product"),
        other => other.into(),
    })?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(())
}

async fn ensure_category(state: &AppState, category_id: Option<Uuid>) -> AppResult<()> {
    if let Some(id) = category_id {
        if state.store.category_by_id(id).await?.is_none() {
            return Err(AppError::Validation("category does not exist".into()));
        }
    }
    Ok(())
}

pub async fn list_categories(state: &AppState) -> AppResult<Vec<CategorySummary>> {
    Ok(state.store.list_categories().await?)
}

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub image: Option<String>,
}

fn category_name(input: &CategoryInput) -> AppResult<String> {
    let name = input.name.trim();
    if name.is_empty() { return Err(AppError::Validation("name is required".into())); }
    Ok(name.to_string())
}

#[instrument(skip(state, input), fields(slug = %input.slug))]
pub async fn create_category(state: &AppState, input: CategoryInput) -> AppResult<Category> {
    let name = category_name(&input)?;
    let category = Category::create(name, input.slug, input.description, non_blank(input.image));
    state.store.insert_category(&category).await?;
    Ok(category)
}

#[instrument(skip(state, input), fields(slug = %input.slug))]
pub async fn update_category(state: &AppState, id: Uuid, input: CategoryInput) -> AppResult<Category> {
    let mut category = state.store.category_by_id(id).await?.ok_or_else(|| AppError::not_found("Category"))?;
    category.name = category_name(&input)?;
    category.slug = input.slug;
    category.description = input.description;
    category.image = non_blank(input.image);
    state.store.update_category(&category).await?;
    Ok(category)
}

#[instrument(skip(state))]
pub async fn delete_category(state: &AppState, id: Uuid) -> AppResult<()> {
    state.store.delete_category(id).await.map_err(|e| match e {
        crate::store::StoreError::NotFound => AppError::not_found("Category"),
        other => other.into(),
    })?;
    tracing::info!(category_id = %id, "category deleted");
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
