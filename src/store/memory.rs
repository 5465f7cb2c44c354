//! In-process store with the same contract as [`super::PgStore`].

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, Placement, ProductFilter, Store, StoreError};
use crate::domain::aggregates::{Category, CategorySummary, Order, OrderStatus, Product, Role, User, WishlistEntry, WishlistItem};
use crate::domain::value_objects::{Email, OrderNumber, Slug};

#[derive(Default)]
struct Tables {
    orders: Vec<Order>,
    products: Vec<Product>,
    categories: Vec<Category>,
    users: Vec<User>,
    wishlist: Vec<WishlistItem>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn paginate<T: Clone>(rows: &[T], page: Page) -> Vec<T> {
    rows.iter().skip(page.offset() as usize).take(page.limit() as usize).cloned().collect()
}

fn newest_first(orders: &mut [Order]) { orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)); }

#[async_trait]
impl Store for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<Placement, StoreError> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t.orders.iter().find(|o| o.idempotency_key == order.idempotency_key) {
            return Ok(Placement::Existing(existing.clone()));
        }
        if t.orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Duplicate("order number"));
        }
        let mut stored = order.clone();
        stored.events.clear();
        t.orders.push(stored.clone());
        Ok(Placement::Created(stored))
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.iter().find(|o| &o.order_number == number).cloned())
    }

    async fn orders_for_customer(&self, user_id: Option<Uuid>, email: &Email) -> Result<Vec<Order>, StoreError> {
        let t = self.tables.read().await;
        let mut found: Vec<Order> = t.orders.iter()
            .filter(|o| (user_id.is_some() && o.user_id == user_id) || &o.email == email)
            .cloned().collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn list_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64), StoreError> {
        let t = self.tables.read().await;
        let mut found: Vec<Order> = t.orders.iter().filter(|o| status.map_or(true, |s| o.status == s)).cloned().collect();
        newest_first(&mut found);
        Ok((paginate(&found, page), found.len() as i64))
    }

    async fn save_order(&self, order: &Order) -> Result<i32, StoreError> {
        let mut t = self.tables.write().await;
        let stored = t.orders.iter_mut().find(|o| o.id == order.id).ok_or(StoreError::NotFound)?;
        if stored.version != order.version { return Err(StoreError::Conflict); }
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.payment_intent_id = order.payment_intent_id.clone();
        stored.checkout_url = order.checkout_url.clone();
        stored.tracking_number = order.tracking_number.clone();
        stored.notes = order.notes.clone();
        stored.updated_at = order.updated_at;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, i64), StoreError> {
        let t = self.tables.read().await;
        let category = filter.category_slug.as_deref()
            .map(|slug| t.categories.iter().find(|c| c.slug.as_str() == slug).map(|c| c.id));
        let search = filter.search.as_deref().map(str::to_lowercase);
        let mut found: Vec<Product> = t.products.iter()
            .filter(|p| filter.include_inactive || p.active)
            .filter(|p| match category {
                None => true,
                Some(id) => id.is_some() && p.category_id == id,
            })
            .filter(|p| filter.featured.map_or(true, |f| p.featured == f))
            .filter(|p| search.as_deref().map_or(true, |s| p.name.to_lowercase().contains(s) || p.description.to_lowercase().contains(s)))
            .cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok((paginate(&found, page), found.len() as i64))
    }

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.read().await.products.iter().find(|p| p.id == id).cloned())
    }

    async fn product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.read().await.products.iter().find(|p| &p.slug == slug).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.products.iter().any(|p| p.slug == product.slug) { return Err(StoreError::Duplicate("slug")); }
        if let Some(id) = product.category_id {
            if !t.categories.iter().any(|c| c.id == id) { return Err(StoreError::UnknownReference("category")); }
        }
        t.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.products.iter().any(|p| p.slug == product.slug && p.id != product.id) { return Err(StoreError::Duplicate("slug")); }
        if let Some(id) = product.category_id {
            if !t.categories.iter().any(|c| c.id == id) { return Err(StoreError::UnknownReference("category")); }
        }
        let stored = t.products.iter_mut().find(|p| p.id == product.id).ok_or(StoreError::NotFound)?;
        *stored = product.clone();
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        if t.products.len() == before { return Err(StoreError::NotFound); }
        t.wishlist.retain(|w| w.product_id != id);
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StoreError> {
        let t = self.tables.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for id in t.products.iter().filter_map(|p| p.category_id) {
            *counts.entry(id).or_default() += 1;
        }
        let mut summaries: Vec<CategorySummary> = t.categories.iter()
            .map(|c| CategorySummary { category: c.clone(), product_count: counts.get(&c.id).copied().unwrap_or(0) })
            .collect();
        summaries.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(summaries)
    }

    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        Ok(self.tables.read().await.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.categories.iter().any(|c| c.slug == category.slug) { return Err(StoreError::Duplicate("slug")); }
        t.categories.push(category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.categories.iter().any(|c| c.slug == category.slug && c.id != category.id) { return Err(StoreError::Duplicate("slug")); }
        let stored = t.categories.iter_mut().find(|c| c.id == category.id).ok_or(StoreError::NotFound)?;
        *stored = category.clone();
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if !t.categories.iter().any(|c| c.id == id) { return Err(StoreError::NotFound); }
        let in_use = t.products.iter().filter(|p| p.category_id == Some(id)).count() as i64;
        if in_use > 0 { return Err(StoreError::CategoryInUse(in_use)); }
        t.categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == user.email) { return Err(StoreError::Duplicate("email")); }
        t.users.push(user.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.iter().find(|u| &u.email == email).cloned())
    }

    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError> {
        let t = self.tables.read().await;
        let mut users = t.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok((paginate(&users, page), users.len() as i64))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> {
        let mut t = self.tables.write().await;
        let user = t.users.iter_mut().find(|u| u.id == id).ok_or(StoreError::NotFound)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, StoreError> {
        let t = self.tables.read().await;
        let mut entries: Vec<WishlistEntry> = t.wishlist.iter()
            .filter(|w| w.user_id == user_id)
            .filter_map(|w| {
                let product = t.products.iter().find(|p| p.id == w.product_id)?;
                Some(WishlistEntry { item: w.clone(), product: product.clone() })
            })
            .collect();
        entries.sort_by(|a, b| b.item.created_at.cmp(&a.item.created_at));
        Ok(entries)
    }

    async fn add_wishlist_item(&self, item: &WishlistItem) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if !t.products.iter().any(|p| p.id == item.product_id) { return Err(StoreError::UnknownReference("product")); }
        if t.wishlist.iter().any(|w| w.user_id == item.user_id && w.product_id == item.product_id) {
            return Err(StoreError::Duplicate("wishlist item"));
        }
        t.wishlist.push(item.clone());
        Ok(())
    }

    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        let before = t.wishlist.len();
        t.wishlist.retain(|w| !(w.user_id == user_id && w.product_id == product_id));
        if t.wishlist.len() == before { return Err(StoreError::NotFound); }
        Ok(())
    }
}
