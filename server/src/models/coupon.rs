use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coupon_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// `valor` is a percentage between 0 and 100.
    Percentual,
    /// `valor` is a fixed currency amount.
    Valor,
    /// Zeroes out the eligible items; `valor` is ignored.
    Cortesia,
}

/// Usage caps stored in `coupons.limites`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponLimits {
    #[serde(rename = "limiteTotal", default)]
    pub limite_total: Option<i64>,
    #[serde(rename = "limitePorCPF", alias = "limitePorCpf", default)]
    pub limite_por_cpf: Option<i64>,
    #[serde(rename = "whitelistTipos", default)]
    pub whitelist_tipos: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub event_id: Uuid,
    pub codigo: String,
    pub tipo: CouponKind,
    pub valor: Decimal,
    pub combinavel: bool,
    pub limites: Json<CouponLimits>,
    pub uso_total: i32,
    pub ativo: bool,
}

impl Coupon {
    pub fn limits(&self) -> &CouponLimits {
        &self.limites.0
    }

    /// An empty or missing whitelist admits every ticket type.
    pub fn applies_to(&self, ticket_type_id: Uuid) -> bool {
        match &self.limits().whitelist_tipos {
            Some(tipos) if !tipos.is_empty() => tipos.contains(&ticket_type_id),
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCouponUsage {
    pub coupon_id: Uuid,
    pub order_id: Uuid,
    pub cpf: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_accept_both_cpf_spellings() {
        let upper: CouponLimits =
            serde_json::from_value(serde_json::json!({ "limitePorCPF": 2 })).unwrap();
        let camel: CouponLimits =
            serde_json::from_value(serde_json::json!({ "limitePorCpf": 2 })).unwrap();

        assert_eq!(upper.limite_por_cpf, Some(2));
        assert_eq!(upper, camel);
    }

    #[test]
    fn test_whitelist_restricts_ticket_types() {
        let vip = Uuid::new_v4();
        let pista = Uuid::new_v4();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            codigo: "VIPONLY".to_string(),
            tipo: CouponKind::Percentual,
            valor: Decimal::new(50, 0),
            combinavel: true,
            limites: Json(CouponLimits {
                whitelist_tipos: Some(vec![vip]),
                ..CouponLimits::default()
            }),
            uso_total: 0,
            ativo: true,
        };

        assert!(coupon.applies_to(vip));
        assert!(!coupon.applies_to(pista));
    }
}
