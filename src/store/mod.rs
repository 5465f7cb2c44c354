//! Persistence gateway.
//!
//! Services talk to storage only through [`Store`]. [`PgStore`] is the
//! production implementation; [`MemoryStore`] keeps the same contract in
//! process and backs the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Category, CategorySummary, Order, OrderStatus, Product, Role, User, WishlistEntry, WishlistItem};
use crate::domain::value_objects::{Email, OrderNumber, Slug};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0} is already in use")]
    Duplicate(&'static str),
    #[error("referenced {0} does not exist")]
    UnknownReference(&'static str),
    #[error("record was modified concurrently")]
    Conflict,
    #[error("category still has {0} products")]
    CategoryInUse(i64),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

/// Outcome of inserting an order under an idempotency key.
#[derive(Debug, Clone)]
pub enum Placement {
    Created(Order),
    /// The key was already used; carries the order stored under it.
    Existing(Order),
}

impl Placement {
    pub fn is_new(&self) -> bool { matches!(self, Self::Created(_)) }
    pub fn into_order(self) -> Order {
        match self { Self::Created(o) | Self::Existing(o) => o }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE) }
    }
    pub fn limit(&self) -> i64 { self.per_page as i64 }
    pub fn offset(&self) -> i64 { ((self.page - 1) as i64) * self.per_page as i64 }
}

impl Default for Page {
    fn default() -> Self { Self::new(None, None) }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Writes the order header and all its items as one unit. A reused
    /// idempotency key leaves storage untouched and returns the earlier order.
    async fn insert_order(&self, order: &Order) -> Result<Placement, StoreError>;
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError>;
    /// Orders owned by the account or placed with its email, newest first.
    async fn orders_for_customer(&self, user_id: Option<Uuid>, email: &Email) -> Result<Vec<Order>, StoreError>;
    async fn list_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64), StoreError>;
    /// Persists the mutable order fields if the stored version still equals
    /// `order.version()`; returns the new version.
    async fn save_order(&self, order: &Order) -> Result<i32, StoreError>;

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, i64), StoreError>;
    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, StoreError>;
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;
    /// Removes the product and its wishlist entries together.
    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError>;

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StoreError>;
    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError>;
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    async fn update_category(&self, category: &Category) -> Result<(), StoreError>;
    /// Fails with [`StoreError::CategoryInUse`] while products reference it.
    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError>;

    async fn wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, StoreError>;
    async fn add_wishlist_item(&self, item: &WishlistItem) -> Result<(), StoreError>;
    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), StoreError>;
}
