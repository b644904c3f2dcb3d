#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use ingressos_server::auth::{Operator, Role};
use ingressos_server::cart::{CartItem, CartRequest, CartValidator, OrderConfirmer};
use ingressos_server::checkin::{qr, CheckinService, QrIssuer};
use ingressos_server::config::EngineConfig;
use ingressos_server::models::{
    Coupon, CouponKind, CouponLimits, Event, EventStatus, LimitRules, Lot, Order, OrderStatus,
    Ticket, TicketStatus, TicketType,
};
use ingressos_server::orders::OrderLifecycle;
use ingressos_server::state::AppState;
use ingressos_server::store::MemoryStore;

pub const BUYER_CPF: &str = "123.456.789-00";
pub const BUYER_CPF_DIGITS: &str = "12345678900";

/// One tenant with one published event, one sector, one ticket type at
/// 100.00 and one open lot of 10.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub tenant_id: Uuid,
    pub event_id: Uuid,
    pub sector_id: Uuid,
    pub ticket_type_id: Uuid,
    pub lot_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_limits(LimitRules::default())
    }

    pub fn with_limits(limits: LimitRules) -> Self {
        let store = Arc::new(MemoryStore::new());
        let tenant_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();
        let sector_id = Uuid::new_v4();

        store.insert_event(Event {
            id: event_id,
            tenant_id,
            titulo: "Festival de Verão".to_string(),
            status: EventStatus::Publicado,
            regras_limite: Json(limits),
            created_at: Utc::now(),
        });

        let mut fixture = Self {
            store,
            tenant_id,
            event_id,
            sector_id,
            ticket_type_id: Uuid::nil(),
            lot_id: Uuid::nil(),
        };
        fixture.ticket_type_id =
            fixture.add_ticket_type("Pista", Decimal::new(10000, 2), sector_id, 100);
        fixture.lot_id = fixture.add_lot(fixture.ticket_type_id, 10);
        fixture
    }

    pub fn add_ticket_type(
        &self,
        nome: &str,
        preco: Decimal,
        sector_id: Uuid,
        capacidade: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_ticket_type(TicketType {
            id,
            event_id: self.event_id,
            sector_id,
            nome: nome.to_string(),
            preco,
            max_por_pedido: None,
            ativo: true,
            setor_capacidade: capacidade,
        });
        id
    }

    pub fn add_lot(&self, ticket_type_id: Uuid, qtd_total: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_lot(Lot {
            id,
            ticket_type_id,
            nome: "1º lote".to_string(),
            preco: None,
            qtd_total,
            qtd_vendida: 0,
            inicio_vendas: Some(Utc::now() - Duration::days(1)),
            fim_vendas: Some(Utc::now() + Duration::days(1)),
        });
        id
    }

    pub fn add_coupon(
        &self,
        codigo: &str,
        tipo: CouponKind,
        valor: Decimal,
        combinavel: bool,
        limites: CouponLimits,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_coupon(Coupon {
            id,
            event_id: self.event_id,
            codigo: codigo.to_string(),
            tipo,
            valor,
            combinavel,
            limites: Json(limites),
            uso_total: 0,
            ativo: true,
        });
        id
    }

    pub fn cart(&self, quantity: i64) -> CartRequest {
        CartRequest {
            tenant_id: self.tenant_id,
            event_id: self.event_id,
            buyer_cpf: BUYER_CPF.to_string(),
            items: vec![CartItem {
                ticket_type_id: self.ticket_type_id,
                lot_id: self.lot_id,
                quantity,
            }],
            coupon_codes: Vec::new(),
        }
    }

    pub fn insert_order(&self, status: OrderStatus, comprador_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_order(Order {
            id,
            tenant_id: self.tenant_id,
            event_id: self.event_id,
            comprador_id,
            comprador_cpf: BUYER_CPF_DIGITS.to_string(),
            status,
            total: Decimal::ZERO,
        });
        id
    }

    /// A ticket on a fresh paid order, carrying `nonce` when given.
    pub fn insert_ticket(&self, status: TicketStatus, nonce: Option<&str>) -> Uuid {
        self.insert_ticket_for(self.insert_order(OrderStatus::Pago, None), status, nonce)
    }

    pub fn insert_ticket_for(
        &self,
        order_id: Uuid,
        status: TicketStatus,
        nonce: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.store.insert_ticket(Ticket {
            id,
            tenant_id: self.tenant_id,
            order_id,
            ticket_type_id: self.ticket_type_id,
            sector_id: self.sector_id,
            status,
            nome_titular: None,
            cpf_titular: None,
            qr_nonce: nonce.map(str::to_string),
            qr_kid: nonce.map(|_| "k1".to_string()),
            qr_version: 1,
        });
        id
    }

    pub fn operator_with(&self, role: Role) -> Operator {
        let operator = Operator {
            user_id: Uuid::new_v4(),
        };
        self.store.grant_role(operator.user_id, self.tenant_id, role);
        operator
    }

    pub fn validator(&self) -> Arc<CartValidator> {
        Arc::new(CartValidator::new(
            self.store.clone(),
            EngineConfig::default().sale_window_skew(),
        ))
    }

    pub fn confirmer(&self) -> OrderConfirmer {
        OrderConfirmer::new(self.validator(), self.store.clone(), self.store.clone())
    }

    pub fn lifecycle(&self) -> OrderLifecycle {
        OrderLifecycle::new(self.store.clone(), self.store.clone())
    }

    pub fn checkin(&self) -> CheckinService {
        CheckinService::new(self.store.clone(), self.store.clone())
    }

    pub fn issuer(&self) -> QrIssuer {
        QrIssuer::new(self.store.clone(), self.store.clone(), self.store.clone(), "k1")
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.store.clone(), &EngineConfig::default())
    }
}

pub fn qr_for(ticket_id: Uuid, nonce: &str) -> String {
    qr::encode(&qr::QrPayload::new(ticket_id, nonce.to_string(), 1_700_000_000_000))
        .expect("payload encodes")
}
