//! Shared handler state.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthorizationPort;
use crate::cart::{CartValidator, OrderConfirmer};
use crate::checkin::{CheckinService, QrIssuer};
use crate::config::EngineConfig;
use crate::orders::OrderLifecycle;
use crate::store::{CatalogStore, InventoryStore, OrderStore, TicketStore};

/// Engines wired against one store. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<CartValidator>,
    pub confirmer: Arc<OrderConfirmer>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub checkin: Arc<CheckinService>,
    pub issuer: Arc<QrIssuer>,
    pub authz: Arc<dyn AuthorizationPort>,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, engine: &EngineConfig) -> Self
    where
        S: CatalogStore + InventoryStore + OrderStore + TicketStore + AuthorizationPort + 'static,
    {
        let catalog: Arc<dyn CatalogStore> = store.clone();
        let inventory: Arc<dyn InventoryStore> = store.clone();
        let orders: Arc<dyn OrderStore> = store.clone();
        let tickets: Arc<dyn TicketStore> = store.clone();
        let authz: Arc<dyn AuthorizationPort> = store;

        let validator = Arc::new(CartValidator::new(catalog, engine.sale_window_skew()));
        let confirmer = Arc::new(OrderConfirmer::new(
            validator.clone(),
            inventory,
            orders.clone(),
        ));

        Self {
            validator,
            confirmer,
            lifecycle: Arc::new(OrderLifecycle::new(orders.clone(), authz.clone())),
            checkin: Arc::new(CheckinService::new(tickets.clone(), authz.clone())),
            issuer: Arc::new(QrIssuer::new(
                tickets,
                orders,
                authz.clone(),
                engine.qr_key_id.clone(),
            )),
            authz,
        }
    }
}

impl FromRef<AppState> for Arc<dyn AuthorizationPort> {
    fn from_ref(state: &AppState) -> Self {
        state.authz.clone()
    }
}
