use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::aggregates::{WishlistEntry, WishlistItem};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::StoreError;

pub async fn list(state: &AppState, identity: &Identity) -> AppResult<Vec<WishlistEntry>> {
    Ok(state.store.wishlist(identity.user.id).await?)
}

pub async fn add(state: &AppState, identity: &Identity, product_id: Uuid) -> AppResult<WishlistEntry> {
    let product = state.store.product_by_id(product_id).await?.ok_or_else(|| AppError::not_found("Product"))?;
    let item = WishlistItem::new(identity.user.id, product_id);
    state.store.add_wishlist_item(&item).await.map_err(|e| match e {
        StoreError::Duplicate(_) => AppError::Conflict("Already in wishlist".into()),
        StoreError::UnknownReference(_) => AppError::not_found("Product"),
        other => other.into(),
    })?;
    Ok(WishlistEntry { item, product })
}

pub async fn remove(state: &AppState, identity: &Identity, product_id: Uuid) -> AppResult<()> {
    state.store.remove_wishlist_item(identity.user.id, product_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("Wishlist item"),
        other => other.into(),
    })
}
