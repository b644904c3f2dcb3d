mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::Fixture;
use ingressos_server::auth::Role;
use ingressos_server::cart::OrderConfirmer;
use ingressos_server::models::{
    CouponKind, CouponLimits, NewCouponUsage, Order, OrderStatus,
};
use ingressos_server::store::{InventoryStore, MemoryStore, OrderStore, StoreError, StoreResult};
use ingressos_server::utils::error::{ErrorCode, RejectionKind};

/// Inventory whose coupon usage log is down.
struct UsageLogDown(Arc<MemoryStore>);

#[async_trait]
impl InventoryStore for UsageLogDown {
    async fn try_increment_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<bool> {
        self.0.try_increment_stock(lot_id, quantity).await
    }

    async fn release_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<()> {
        self.0.release_stock(lot_id, quantity).await
    }

    async fn try_consume_coupon(
        &self,
        coupon_id: Uuid,
        limit_total: Option<i64>,
    ) -> StoreResult<bool> {
        self.0.try_consume_coupon(coupon_id, limit_total).await
    }

    async fn release_coupon(&self, coupon_id: Uuid) -> StoreResult<()> {
        self.0.release_coupon(coupon_id).await
    }

    async fn record_coupon_usage(&self, _usage: NewCouponUsage) -> StoreResult<()> {
        Err(StoreError::Unavailable("coupon_usage insert timed out".to_string()))
    }

    async fn release_coupon_usage(&self, coupon_id: Uuid, order_id: Uuid) -> StoreResult<()> {
        self.0.release_coupon_usage(coupon_id, order_id).await
    }
}

/// Orders that another writer always moves first.
struct OrderAlreadyMoved(Arc<MemoryStore>);

#[async_trait]
impl OrderStore for OrderAlreadyMoved {
    async fn find_order(&self, tenant_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
        self.0.find_order(tenant_id, order_id).await
    }

    async fn transition_order(
        &self,
        _tenant_id: Uuid,
        _order_id: Uuid,
        _from: OrderStatus,
        _to: OrderStatus,
        _total: Option<Decimal>,
    ) -> StoreResult<bool> {
        Ok(false)
    }
}

fn add_single_use_coupon(fx: &Fixture) -> Uuid {
    fx.add_coupon(
        "BEMVINDO",
        CouponKind::Percentual,
        Decimal::new(10, 0),
        true,
        CouponLimits {
            limite_por_cpf: Some(1),
            ..CouponLimits::default()
        },
    )
}

#[tokio::test]
async fn test_confirm_takes_stock_and_moves_order() {
    let fx = Fixture::new();
    let coupon_id = fx.add_coupon(
        "DESCONTO10",
        CouponKind::Percentual,
        Decimal::new(10, 0),
        true,
        CouponLimits::default(),
    );
    let order_id = fx.insert_order(OrderStatus::Rascunho, None);
    let mut cart = fx.cart(4);
    cart.coupon_codes = vec!["DESCONTO10".to_string()];

    let confirmed = fx
        .confirmer()
        .confirm(order_id, &cart, Utc::now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(confirmed.status, OrderStatus::AguardandoPagto);
    assert_eq!(fx.store.lot(fx.lot_id).unwrap().qtd_vendida, 4);
    assert_eq!(fx.store.coupon(coupon_id).unwrap().uso_total, 1);

    let order = fx.store.order(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::AguardandoPagto);
    assert_eq!(order.total, Decimal::new(360, 0));

    let usages = fx.store.coupon_usages();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].order_id, order_id);
    assert_eq!(usages[0].cpf, common::BUYER_CPF_DIGITS);
}

#[tokio::test]
async fn test_confirm_twice_is_rejected() {
    let fx = Fixture::new();
    let order_id = fx.insert_order(OrderStatus::Rascunho, None);
    let confirmer = fx.confirmer();

    confirmer
        .confirm(order_id, &fx.cart(2), Utc::now())
        .await
        .unwrap()
        .unwrap();
    let rejection = confirmer
        .confirm(order_id, &fx.cart(2), Utc::now())
        .await
        .unwrap()
        .unwrap_err();

    assert!(rejection.has_code(ErrorCode::OrderNotDraft));
    assert_eq!(fx.store.lot(fx.lot_id).unwrap().qtd_vendida, 2);
}

#[tokio::test]
async fn test_confirm_unknown_order() {
    let fx = Fixture::new();

    let rejection = fx
        .confirmer()
        .confirm(uuid::Uuid::new_v4(), &fx.cart(1), Utc::now())
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(rejection.kind, RejectionKind::NotFound);
    assert!(rejection.has_code(ErrorCode::OrderNotFound));
}

#[tokio::test]
async fn test_concurrent_confirmations_never_oversell() {
    let fx = Fixture::new();
    let confirmer = Arc::new(fx.confirmer());

    // 8 orders of 3 against a lot of 10: exactly 3 fit.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let order_id = fx.insert_order(OrderStatus::Rascunho, None);
        let confirmer = confirmer.clone();
        let cart = fx.cart(3);
        handles.push(tokio::spawn(async move {
            confirmer.confirm(order_id, &cart, Utc::now()).await
        }));
    }

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Ok(_) => confirmed += 1,
            Err(rejection) => assert!(rejection.has_code(ErrorCode::LoteSemEstoque)),
        }
    }

    assert_eq!(confirmed, 3);
    let lot = fx.store.lot(fx.lot_id).unwrap();
    assert_eq!(lot.qtd_vendida, 9);
    assert!(lot.qtd_vendida <= lot.qtd_total);
}

#[tokio::test]
async fn test_exhausted_coupon_releases_stock() {
    let fx = Fixture::new();
    let coupon_id = fx.add_coupon(
        "UNICO",
        CouponKind::Valor,
        Decimal::new(50, 0),
        true,
        CouponLimits {
            limite_total: Some(1),
            ..CouponLimits::default()
        },
    );
    let confirmer = fx.confirmer();

    let mut handles = Vec::new();
    let confirmer = Arc::new(confirmer);
    for _ in 0..4 {
        let order_id = fx.insert_order(OrderStatus::Rascunho, None);
        let confirmer = confirmer.clone();
        let mut cart = fx.cart(1);
        cart.coupon_codes = vec!["UNICO".to_string()];
        handles.push(tokio::spawn(async move {
            confirmer.confirm(order_id, &cart, Utc::now()).await
        }));
    }

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Ok(_) => confirmed += 1,
            Err(rejection) => assert!(rejection.has_code(ErrorCode::LimiteTotalExcedido)),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(fx.store.coupon(coupon_id).unwrap().uso_total, 1);
    assert_eq!(fx.store.lot(fx.lot_id).unwrap().qtd_vendida, 1);
    assert_eq!(fx.store.coupon_usages().len(), 1);
}

#[tokio::test]
async fn test_admin_advances_order_forward_only() {
    let fx = Fixture::new();
    let admin = fx.operator_with(Role::Admin);
    let order_id = fx.insert_order(OrderStatus::AguardandoPagto, None);
    let lifecycle = fx.lifecycle();

    let moved = lifecycle
        .advance(fx.tenant_id, order_id, OrderStatus::Pago, &admin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.from, OrderStatus::AguardandoPagto);
    assert_eq!(moved.status, OrderStatus::Pago);

    let rejection = lifecycle
        .advance(fx.tenant_id, order_id, OrderStatus::AguardandoPagto, &admin)
        .await
        .unwrap()
        .unwrap_err();
    assert!(rejection.has_code(ErrorCode::OrderTransitionInvalid));
    assert_eq!(fx.store.order(order_id).unwrap().status, OrderStatus::Pago);
}

#[tokio::test]
async fn test_only_admins_advance_orders() {
    let fx = Fixture::new();
    let operator = fx.operator_with(Role::CheckinOperator);
    let order_id = fx.insert_order(OrderStatus::AguardandoPagto, None);

    let rejection = fx
        .lifecycle()
        .advance(fx.tenant_id, order_id, OrderStatus::Pago, &operator)
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(rejection.kind, RejectionKind::Forbidden);
    assert_eq!(
        fx.store.order(order_id).unwrap().status,
        OrderStatus::AguardandoPagto
    );
}

#[tokio::test]
async fn test_usage_log_failure_fails_confirmation() {
    let fx = Fixture::new();
    let coupon_id = add_single_use_coupon(&fx);
    let order_id = fx.insert_order(OrderStatus::Rascunho, None);
    let confirmer = OrderConfirmer::new(
        fx.validator(),
        Arc::new(UsageLogDown(fx.store.clone())),
        fx.store.clone(),
    );
    let mut cart = fx.cart(2);
    cart.coupon_codes = vec!["BEMVINDO".to_string()];

    let result = confirmer.confirm(order_id, &cart, Utc::now()).await;

    assert!(matches!(result, Err(StoreError::Unavailable(_))));
    assert_eq!(fx.store.order(order_id).unwrap().status, OrderStatus::Rascunho);
    assert_eq!(fx.store.lot(fx.lot_id).unwrap().qtd_vendida, 0);
    assert_eq!(fx.store.coupon(coupon_id).unwrap().uso_total, 0);
}

#[tokio::test]
async fn test_lost_order_transition_removes_usage_rows() {
    let fx = Fixture::new();
    let coupon_id = add_single_use_coupon(&fx);
    let order_id = fx.insert_order(OrderStatus::Rascunho, None);
    let confirmer = OrderConfirmer::new(
        fx.validator(),
        fx.store.clone(),
        Arc::new(OrderAlreadyMoved(fx.store.clone())),
    );
    let mut cart = fx.cart(2);
    cart.coupon_codes = vec!["BEMVINDO".to_string()];

    let rejection = confirmer
        .confirm(order_id, &cart, Utc::now())
        .await
        .unwrap()
        .unwrap_err();

    assert!(rejection.has_code(ErrorCode::OrderNotDraft));
    assert!(fx.store.coupon_usages().is_empty());
    assert_eq!(fx.store.coupon(coupon_id).unwrap().uso_total, 0);
    assert_eq!(fx.store.lot(fx.lot_id).unwrap().qtd_vendida, 0);

    // The buyer keeps their single use for the next attempt.
    assert!(fx.validator().validate(&cart, Utc::now()).await.unwrap().is_ok());
}

#[tokio::test]
async fn test_inapplicable_coupon_is_not_consumed() {
    let fx = Fixture::new();
    let coupon_id = fx.add_coupon(
        "CAMAROTE50",
        CouponKind::Percentual,
        Decimal::new(50, 0),
        true,
        CouponLimits {
            limite_total: Some(1),
            whitelist_tipos: Some(vec![Uuid::new_v4()]),
            ..CouponLimits::default()
        },
    );
    let order_id = fx.insert_order(OrderStatus::Rascunho, None);
    let mut cart = fx.cart(1);
    cart.coupon_codes = vec!["CAMAROTE50".to_string()];

    let confirmed = fx
        .confirmer()
        .confirm(order_id, &cart, Utc::now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(confirmed.summary.pricing.discounts[0].amount, Decimal::ZERO);
    assert_eq!(fx.store.coupon(coupon_id).unwrap().uso_total, 0);
    assert!(fx.store.coupon_usages().is_empty());
    assert_eq!(fx.store.order(order_id).unwrap().total, Decimal::new(100, 0));
}
