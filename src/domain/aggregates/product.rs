//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{Sku, Slug, ValueError};

/// One block of a product's rich description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { url: String, #[serde(default, skip_serializing_if = "Option::is_none")] caption: Option<String> },
    Video { url: String, #[serde(default, skip_serializing_if = "Option::is_none")] caption: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub content: Option<Vec<ContentBlock>>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub images: Vec<String>,
    /// Display only; orders neither reserve nor decrement it.
    pub inventory: i32,
    pub sku: Option<Sku>,
    pub featured: bool,
    pub active: bool,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated admin input for creating or replacing a product.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub content: Option<Vec<ContentBlock>>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub images: Vec<String>,
    pub inventory: i32,
    pub sku: Option<Sku>,
    pub featured: bool,
    pub active: bool,
    pub category_id: Option<Uuid>,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        if self.compare_price.is_some_and(|p| p.is_sign_negative()) { return Err(ProductError::NegativePrice); }
        if self.inventory < 0 { return Err(ProductError::NegativeInventory); }
        for block in self.content.iter().flatten() {
            let empty = match block {
                ContentBlock::Text { text } => text.trim().is_empty(),
                ContentBlock::Image { url, .. } | ContentBlock::Video { url, .. } => url.trim().is_empty(),
            };
            if empty { return Err(ProductError::EmptyContentBlock); }
        }
        Ok(())
    }
}

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, ProductError> {
        draft.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), name: draft.name.trim().to_string(), slug: draft.slug, description: draft.description,
            content: draft.content, price: draft.price, compare_price: draft.compare_price, images: draft.images,
            inventory: draft.inventory, sku: draft.sku, featured: draft.featured, active: draft.active,
            category_id: draft.category_id, created_at: now, updated_at: now,
        })
    }

    pub fn revise(&mut self, draft: ProductDraft) -> Result<(), ProductError> {
        draft.validate()?;
        self.name = draft.name.trim().to_string();
        self.slug = draft.slug;
        self.description = draft.description;
        self.content = draft.content;
        self.price = draft.price;
        self.compare_price = draft.compare_price;
        self.images = draft.images;
        self.inventory = draft.inventory;
        self.sku = draft.sku;
        self.featured = draft.featured;
        self.active = draft.active;
        self.category_id = draft.category_id;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_in_stock(&self) -> bool { self.inventory > 0 }

    /// True when a higher compare-at price makes this a discount.
    pub fn is_discounted(&self) -> bool { self.compare_price.is_some_and(|p| p > self.price) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("name is required")]
    MissingName,
    #[error("price must not be negative")]
    NegativePrice,
    #[error("inventory must not be negative")]
    NegativeInventory,
    #[error("content blocks must not be empty")]
    EmptyContentBlock,
    #[error(transparent)]
    Value(#[from] ValueError),
}
