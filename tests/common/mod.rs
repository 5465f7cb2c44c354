#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_orders::domain::aggregates::{
    Category, CategorySummary, Order, OrderStatus, Product, Role, User, WishlistEntry, WishlistItem,
};
use storefront_orders::domain::value_objects::{Email, OrderNumber, Slug};
use storefront_orders::payment::{CheckoutRequest, CheckoutSession, PaymentBridge, PaymentError};
use storefront_orders::publisher::EventPublisher;
use storefront_orders::store::{MemoryStore, Page, Placement, ProductFilter, Store, StoreError};
use storefront_orders::{api, AppConfig, AppState};

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn config() -> AppConfig {
    AppConfig::from_lookup(|name| match name {
        "DATABASE_URL" => Some("postgres://unused".into()),
        "JWT_SECRET" => Some("test-secret".into()),
        "PUBLIC_BASE_URL" => Some("http://shop.test".into()),
        "STRIPE_WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.into()),
        _ => None,
    })
    .unwrap()
}

/// Payment bridge double: numbers sessions and can fail a set number of calls.
#[derive(Default)]
pub struct FakeBridge {
    pub requests: Mutex<Vec<CheckoutRequest>>,
    failures_left: AtomicUsize,
}

impl FakeBridge {
    pub fn failing(times: usize) -> Self {
        Self { failures_left: AtomicUsize::new(times), ..Default::default() }
    }
}

#[async_trait]
impl PaymentBridge for FakeBridge {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(PaymentError::Provider("gateway timeout".into()));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession { redirect_url: format!("https://pay.test/{id}"), session_id: id })
    }
}

/// Delegates to a [`MemoryStore`], holding each order insert at a barrier.
pub struct LockstepStore {
    inner: Arc<MemoryStore>,
    barrier: Barrier,
}

#[async_trait]
impl Store for LockstepStore {
    async fn insert_order(&self, order: &Order) -> Result<Placement, StoreError> {
        let placement = self.inner.insert_order(order).await;
        self.barrier.wait().await;
        placement
    }
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> { self.inner.order_by_id(id).await }
    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> { self.inner.order_by_number(number).await }
    async fn orders_for_customer(&self, user_id: Option<Uuid>, email: &Email) -> Result<Vec<Order>, StoreError> {
        self.inner.orders_for_customer(user_id, email).await
    }
    async fn list_orders(&self, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64), StoreError> {
        self.inner.list_orders(status, page).await
    }
    async fn save_order(&self, order: &Order) -> Result<i32, StoreError> { self.inner.save_order(order).await }
    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, i64), StoreError> {
        self.inner.list_products(filter, page).await
    }
    async fn product_by_id(&self, id: Uuid) -> Result<Option<Product>, StoreError> { self.inner.product_by_id(id).await }
    async fn product_by_slug(&self, slug: &Slug) -> Result<Option<Product>, StoreError> { self.inner.product_by_slug(slug).await }
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> { self.inner.insert_product(product).await }
    async fn update_product(&self, product: &Product) -> Result<(), StoreError> { self.inner.update_product(product).await }
    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError> { self.inner.delete_product(id).await }
    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StoreError> { self.inner.list_categories().await }
    async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>, StoreError> { self.inner.category_by_id(id).await }
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> { self.inner.insert_category(category).await }
    async fn update_category(&self, category: &Category) -> Result<(), StoreError> { self.inner.update_category(category).await }
    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> { self.inner.delete_category(id).await }
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> { self.inner.insert_user(user).await }
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> { self.inner.user_by_id(id).await }
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> { self.inner.user_by_email(email).await }
    async fn list_users(&self, page: Page) -> Result<(Vec<User>, i64), StoreError> { self.inner.list_users(page).await }
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> { self.inner.set_user_role(id, role).await }
    async fn wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistEntry>, StoreError> { self.inner.wishlist(user_id).await }
    async fn add_wishlist_item(&self, item: &WishlistItem) -> Result<(), StoreError> { self.inner.add_wishlist_item(item).await }
    async fn remove_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), StoreError> {
        self.inner.remove_wishlist_item(user_id, product_id).await
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn demo() -> Self { Self::build(None) }

    pub fn with_bridge(bridge: Arc<FakeBridge>) -> Self { Self::build(Some(bridge)) }

    /// Every `insert_order` waits until `submissions` of them have returned,
    /// so concurrent checkouts reach payment settlement together.
    pub fn lockstep(submissions: usize, bridge: Option<Arc<FakeBridge>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gated = Arc::new(LockstepStore { inner: store.clone(), barrier: Barrier::new(submissions) });
        Self::assemble(gated, store, bridge)
    }

    fn build(bridge: Option<Arc<FakeBridge>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::assemble(store.clone(), store, bridge)
    }

    fn assemble(backend: Arc<dyn Store>, store: Arc<MemoryStore>, bridge: Option<Arc<FakeBridge>>) -> Self {
        let payments = bridge.map(|b| b as Arc<dyn PaymentBridge>);
        let state = AppState::new(config(), backend, payments, EventPublisher::disabled());
        Self { state, store }
    }

    pub async fn user(&self, email: &str, role: Role) -> (User, String) {
        let mut user = User::register(Email::new(email).unwrap(), Some("Test".into()), "unused".into());
        user.role = role;
        self.store.insert_user(&user).await.unwrap();
        let token = self.state.tokens.issue(user.id, email).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = api::router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, body)
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.unwrap()).await
    }
}

/// The one-widget cart: 2 x 10.00 + 5.00 shipping + 2.00 tax.
pub fn widget_cart() -> Value {
    json!({
        "items": [{ "id": "p1", "name": "Widget", "price": 10.00, "quantity": 2 }],
        "shippingAddress": {
            "email": "a@b.com", "firstName": "A", "lastName": "B", "address": "1 St",
            "city": "X", "state": "Y", "zipCode": "00000", "country": "US"
        },
        "subtotal": 20.00, "shipping": 5.00, "tax": 2.00, "total": 27.00
    })
}

pub fn checkout_request(body: &Value, key: Option<&str>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/v1/orders").header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("idempotency-key", key);
    }
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
