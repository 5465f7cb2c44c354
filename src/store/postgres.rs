//! Postgres implementation of the persistence gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Page, Placement, ProductFilter, Store, StoreError};
use crate::domain::aggregates::{
    Category, CategorySummary, ContentBlock, Order, OrderItem, OrderStatus, Product, Role, ShippingAddress, User, WishlistEntry,
    WishlistItem,
};
use crate::domain::value_objects::{Email, OrderNumber, Sku, Slug, ValueError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        if rows.is_empty() { return Ok(vec![]); }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(&ids).fetch_all(&self.pool).await?;
        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item.into());
        }
        rows.into_iter().map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(items)
        }).collect()
    }

    async fn one_order(&self, row: Option<OrderRow>) -> Result<Option<Order>, StoreError> {
        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_items(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), StoreError> {
        for (position, item) in order.items().iter().enumerate() {
            sqlx::query("INSERT INTO order_items (id, order_id, position, product_id, name, price, quantity, image) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(item.id).bind(order.id()).bind(position as i32).bind(&item.product_id).bind(&item.name)
                .bind(item.price).bind(item.quantity).bind(&item.image)
                .execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn products_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into().map(|p: Product| (p.id, p))).collect()
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some("23505") => return StoreError::Duplicate(unique_field(db.constraint())),
                Some("23503") => return StoreError::UnknownReference(referenced_entity(db.constraint())),
                _ => {}
            }
        }
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

fn unique_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "email",
        Some("categories_slug_key") | Some("products_slug_key") => "slug",
        Some("orders_order_number_key") => "order number",
        Some("orders_idempotency_key_key") => "idempotency key",
        Some("wishlist_items_user_product_key") => "wishlist item",
        _ => "value",
    }
}

fn referenced_entity(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("products_category_fkey") => "category",
        Some(c) if c.starts_with("wishlist_items_product") => "product",
        Some(c) if c.contains("user") => "user",
        _ => "record",
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<Uuid>,
    email: String,
    phone: Option<String>,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    currency: String,
    shipping_address: Json<ShippingAddress>,
    status: String,
    payment_status: String,
    payment_intent_id: Option<String>,
    checkout_url: Option<String>,
    tracking_number: Option<String>,
    notes: Option<String>,
    idempotency_key: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let id = self.id;
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("order {}: {}", id, e));
        Ok(Order {
            id,
            order_number: OrderNumber::parse(self.order_number).map_err(|e| corrupt(&e))?,
            user_id: self.user_id,
            email: Email::new(self.email).map_err(|e| corrupt(&e))?,
            phone: self.phone,
            subtotal: self.subtotal,
            shipping: self.shipping,
            tax: self.tax,
            total: self.total,
            currency: self.currency,
            shipping_address: self.shipping_address.0,
            status: self.status.parse().map_err(|e| corrupt(&e))?,
            payment_status: self.payment_status.parse().map_err(|e| corrupt(&e))?,
            payment_intent_id: self.payment_intent_id,
            checkout_url: self.checkout_url,
            tracking_number: self.tracking_number,
            notes: self.notes,
            idempotency_key: self.idempotency_key,
            version: self.version,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
            events: vec![],
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: String,
    name: String,
    price: Decimal,
    quantity: i32,
    image: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self { id: r.id, product_id: r.product_id, name: r.name, price: r.price, quantity: r.quantity, image: r.image }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    content: Option<Json<Vec<ContentBlock>>>,
    price: Decimal,
    compare_price: Option<Decimal>,
    images: Vec<String>,
    inventory: i32,
    sku: Option<String>,
    featured: bool,
    active: bool,
    category_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let corrupt = |e: ValueError| StoreError::Corrupt(format!("product {}: {}", id, e));
        Ok(Self {
            id,
            name: r.name,
            slug: Slug::new(r.slug).map_err(corrupt)?,
            description: r.description,
            content: r.content.map(|c| c.0),
            price: r.price,
            compare_price: r.compare_price,
            images: r.images,
            inventory: r.inventory,
            sku: r.sku.map(Sku::new).transpose().map_err(corrupt)?,
            featured: r.featured,
            active: r.active,
            category_id: r.category_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;
    fn try_from(r: CategoryRow) -> Result<Self, Self::Error> {
        let slug = Slug::new(r.slug).map_err(|e| StoreError::Corrupt(format!("category {}: {}", r.id, e)))?;
        Ok(Self { id: r.id, name: r.name, slug, description: r.description, image: r.image, created_at: r.created_at })
    }
}

#[derive(Debug, FromRow)]
struct CategoryCountRow {
    #[sqlx(flatten)]
    category: CategoryRow,
    product_count: i64,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    password_hash: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;
    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(format!("user {}: {}", id, e));
        Ok(Self {
            id,
            email: Email::new(r.email).map_err(|e| corrupt(&e))?,
            name: r.name,
            password_hash: r.password_hash,
            role: r.role.parse::<Role>().map_err(|e| corrupt(&e))?,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WishlistRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    created_at: DateTime<Utc>,
}

const PRODUCT_FILTER: &str = "FROM products p LEFT JOIN categories c ON c.id = p.category_id \
    WHERE ($1 OR p.active) AND ($2::text IS NULL OR c.slug = $2) AND ($3::bool IS NULL OR p.featured = $3) \
    AND ($4::text IS NULL OR p.name ILIKE '%' || $4 || '%' OR p.description ILIKE '%' || $4 || '%')";

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<Placement, StoreError> {
        let mut tx = self.pool.begin().await?;
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO orders (id, order_number, user_id, email, phone, subtotal, shipping, tax, total, currency, shipping_address, status, payment_status, payment_intent_id, checkout_url, tracking_number, notes, idempotency_key, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21) \
             ON CONFLICT (idempotency_key) DO NOTHING RETURNING id")
            .bind(order.id()).bind(order.order_number().as_str()).bind(order.user_id()).bind(order.email().as_str()).bind(&order.phone)
            .bind(order.subtotal).bind(order.shipping).bind(order.tax).bind(order.total).bind(&order.currency)
            .bind(Json(order.shipping_address())).bind(order.status().as_str()).bind(order.payment_status().as_str())
            .bind(order.payment_intent_id()).bind(order.checkout_url()).bind(order.tracking_number()).bind(order.notes())
            .bind(order.idempotency_key()).bind(order.version()).bind(order.created_at).bind(order.updated_at)
            .fetch_optional(&mut *tx).await?;

        if inserted.is_none() {
            tx.rollback().await?;
            let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE idempotency_key = $1")
                .bind(order.idempotency_key()).fetch_optional(&self.pool).await?;
            return self.one_order(row).await?.map(Placement::Existing).ok_or(StoreError::NotFound);
        }

        Self::insert_items(&mut tx, order).await?;
        tx.commit().await?;
        let mut stored = order.clone();
        stored.events.clear();
        Ok(Placement::Created(stored))
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        self.one_order(row).await
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_number = $1")
            .bind(number.as_str()).fetch_optional(&self.pool).await?;
        self.one_order(row).await
    }

    async fn orders_for_customer(&self, user_id: Option<Uuid>, email: &Email) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE ($1::uuid IS NOT NULL AND user_id = $1) OR email = $2 ORDER BY created_at DESC")
            .bind(user_id).bind(email.as_str()).fetch_all(&self.pool).await?;
        self.with_items(rows).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64), StoreError> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
            .bind(status).bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
            .bind(status).fetch_one(&self.pool).await?;
        Ok((self.with_items(rows).await?, total.0))
    }

    async fn save_order(&self, order: &Order) -> Result<i32, StoreError> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE orders SET status = $3, payment_status = $4, payment_intent_id = $5, checkout_url = $6, tracking_number = $7, notes = $8, \
             version = version + 1, updated_at = $9 WHERE id = $1 AND version = $2 RETURNING version")
            .bind(order.id()).bind(order.version()).bind(order.status().as_str()).bind(order.payment_status().as_str())
            .bind(order.payment_intent_id()).bind(order.checkout_url()).bind(order.tracking_number()).bind(order.notes()).bind(order.updated_at)
            .fetch_optional(&self.pool).await?;
        match updated {
            Some((version,)) => Ok(version),
            None => {
                let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1").bind(order.id()).fetch_optional(&self.pool).await?;
                Err(if exists.is_some() { StoreError::Conflict } else { StoreError::NotFound })
            }
        }
    }

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, i64), StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT p.* {PRODUCT_FILTER} ORDER BY p.created_at DESC LIMIT $5 OFFSET $6"))
            .bind(filter.include_inactive).bind(&filter.category_slug).bind(filter.featured).bind(&filter.search)
            .bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {PRODUCT_FILTER}"))
            .bind(filter.include_inactive).bind(&filter.category_slug).bind(filter.featured).bind(&filter.search)
            .fetch_one(&self.pool).await?;
        let products = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((products, total.0))
    }

    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, StoreError> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE slug = $1").bind(slug.as_str()).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn insert_product(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO products (id, name, slug, description, content, price, compare_price, images, inventory, sku, featured, active, category_id, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)")
            .bind(p.id).bind(&p.name).bind(p.slug.as_str()).bind(&p.description).bind(p.content.as_ref().map(Json))
            .bind(p.price).bind(p.compare_price).bind(&p.images).bind(p.inventory).bind(p.sku.as_ref().map(Sku::as_str))
            .bind(p.featured).bind(p.active).bind(p.category_id).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET name = $2, slug = $3, description = $4, content = $5, price = $6, compare_price = $7, images = $8, \
                                  inventory = $9, sku = $10, featured = $11, active = $12, category_id = $13, updated_at = $14 WHERE id = $1")
            .bind(p.id).bind(&p.name).bind(p.slug.as_str()).bind(&p.description).bind(p.content.as_ref().map(Json))
            .bind(p.price).bind(p.compare_price).bind(&p.images).bind(p.inventory).bind(p.sku.as_ref().map(Sku::as_str))
            .bind(p.featured).bind(p.active).bind(p.category_id).bind(p.updated_at)
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM wishlist_items WHERE product_id = $1").bind(id).execute(&mut *tx).await?;
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            "SELECT c.*, (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count FROM categories c ORDER BY c.name")
            .fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| -> Result<_, StoreError> { Ok(CategorySummary { category: r.category.try_into()?, product_count: r.product_count }) })
            .collect()
    }

    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1").bind(id).fetch_optional(&self.pool).await?
            .map(Category::try_from).transpose()
    }

    async fn insert_category(&self, c: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, slug, description, image, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(c.id).bind(&c.name).bind(c.slug.as_str()).bind(&c.description).bind(&c.image).bind(c.created_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update_category(&self, c: &Category) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE categories SET name = $2, slug = $3, description = $4, image = $5 WHERE id = $1")
            .bind(c.id).bind(&c.name).bind(c.slug.as_str()).bind(&c.description).bind(&c.image)
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> {
        // Guard and delete in one statement; the RESTRICT foreign key covers
        // a product being filed under the category concurrently.
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM products WHERE category_id = $1)")
            .bind(id).execute(&self.pool).await;
        let deleted = match deleted {
            Ok(result) => result.rows_affected(),
            Err(e) => match StoreError::from(e) {
                StoreError::UnknownReference(_) => 0,
                other => return Err(other),
            },
        };
        if deleted > 0 { return Ok(()); }
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1").bind(id).fetch_one(&self.pool).await?;
        if count > 0 { return Err(StoreError::CategoryInUse(count)); }
        Err(StoreError::NotFound)
    }

    async fn insert_user(&self, u: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, email, name, password_hash, role, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(u.id).bind(u.email.as_str()).bind(&u.name).bind(&u.password_hash).bind(u.role.as_str()).bind(u.created_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?
            .map(User::try_from).transpose()
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1").bind(email.as_str()).fetch_optional(&self.pool).await?
            .map(User::try_from).transpose()
    }

    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        let users = rows.into_iter().map(User::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((users, total.0))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>("UPDATE users SET role = $2 WHERE id = $1 RETURNING *")
            .bind(id).bind(role.as_str()).fetch_optional(&self.pool).await?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, StoreError> {
        let rows = sqlx::query_as::<_, WishlistRow>("SELECT * FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        let mut products = self.products_by_ids(&ids).await?;
        Ok(rows.into_iter().filter_map(|r| {
            let product = products.remove(&r.product_id)?;
            Some(WishlistEntry { item: WishlistItem { id: r.id, user_id: r.user_id, product_id: r.product_id, created_at: r.created_at }, product })
        }).collect())
    }

    async fn add_wishlist_item(&self, item: &WishlistItem) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO wishlist_items (id, user_id, product_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(item.id).bind(item.user_id).bind(item.product_id).bind(item.created_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id).bind(product_id).execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }
}
