use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::domain::value_objects::OrderNumberGenerator;
use crate::payment::PaymentBridge;
use crate::publisher::EventPublisher;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    /// `None` puts checkout in demo mode.
    pub payments: Option<Arc<dyn PaymentBridge>>,
    pub events: EventPublisher,
    pub tokens: TokenService,
    pub order_numbers: Arc<OrderNumberGenerator>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, payments: Option<Arc<dyn PaymentBridge>>, events: EventPublisher) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl_hours);
        Self { config: Arc::new(config), store, payments, events, tokens, order_numbers: Arc::new(OrderNumberGenerator::new()) }
    }
}
