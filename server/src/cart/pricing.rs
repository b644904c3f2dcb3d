//! Coupon discount computation.
//!
//! Pure over already-loaded coupons so that stacking rules can be exercised
//! without a store. Discounts from several coupons are additive against the
//! original eligible subtotal; they never compound and the total is floored
//! at zero.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::models::{Coupon, CouponKind};
use crate::utils::error::ErrorCode;
use crate::utils::response::ApiErrorBody;

use super::types::{AppliedDiscount, Pricing};

/// One priced cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub ticket_type_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricingResult {
    pub pricing: Option<Pricing>,
    pub errors: Vec<ApiErrorBody>,
    pub warnings: Vec<String>,
}

/// Upper-cases, trims and de-duplicates requested codes, keeping their order.
pub fn normalize_codes(codes: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes {
        let code = code.trim().to_uppercase();
        if !code.is_empty() && !normalized.contains(&code) {
            normalized.push(code);
        }
    }
    normalized
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies `codes` (already normalised) to `lines`.
///
/// `coupons` holds the active coupons found for those codes and
/// `usage_by_cpf` the buyer's prior uses of each of them.
pub fn price_cart(
    lines: &[PricedLine],
    codes: &[String],
    coupons: &[Coupon],
    usage_by_cpf: &HashMap<Uuid, i64>,
) -> PricingResult {
    let mut result = PricingResult::default();
    let subtotal: Decimal = lines.iter().map(|l| l.amount).sum();

    let mut found: Vec<&Coupon> = Vec::with_capacity(codes.len());
    for code in codes {
        match coupons.iter().find(|c| c.codigo == *code && c.ativo) {
            Some(coupon) => found.push(coupon),
            None => result.errors.push(
                ApiErrorBody::new(
                    ErrorCode::CupomNaoEncontrado,
                    format!("Cupom {code} não encontrado ou inativo"),
                )
                .for_coupon(code.clone()),
            ),
        }
    }

    if codes.len() > 1 {
        let mut exclusive: Vec<&str> = found
            .iter()
            .filter(|c| !c.combinavel)
            .map(|c| c.codigo.as_str())
            .collect();
        exclusive.sort_unstable();

        if let Some(first) = exclusive.first() {
            result.errors.push(
                ApiErrorBody::new(
                    ErrorCode::CupomNaoCombinavel,
                    format!(
                        "Cupom(ns) {} não podem ser combinados com outros cupons",
                        exclusive.join(", ")
                    ),
                )
                .for_coupon(*first),
            );
            return result;
        }
    }

    for coupon in &found {
        let limits = coupon.limits();
        if let Some(limit) = limits.limite_total {
            if i64::from(coupon.uso_total) + 1 > limit {
                result.errors.push(
                    ApiErrorBody::new(
                        ErrorCode::LimiteTotalExcedido,
                        format!("Cupom {} atingiu o limite de {limit} usos", coupon.codigo),
                    )
                    .for_coupon(coupon.codigo.clone()),
                );
            }
        }
        if let Some(limit) = limits.limite_por_cpf {
            let used = usage_by_cpf.get(&coupon.id).copied().unwrap_or(0);
            if used >= limit {
                result.errors.push(
                    ApiErrorBody::new(
                        ErrorCode::LimitePorCpfExcedido,
                        format!(
                            "Cupom {} já foi usado {used} vez(es) por este CPF (limite {limit})",
                            coupon.codigo
                        ),
                    )
                    .for_coupon(coupon.codigo.clone()),
                );
            }
        }
    }

    if !result.errors.is_empty() {
        return result;
    }

    let mut discounts = Vec::with_capacity(found.len());
    for coupon in found {
        let mut applied_to: Vec<Uuid> = Vec::new();
        let mut eligible = Decimal::ZERO;
        for line in lines.iter().filter(|l| coupon.applies_to(l.ticket_type_id)) {
            eligible += line.amount;
            if !applied_to.contains(&line.ticket_type_id) {
                applied_to.push(line.ticket_type_id);
            }
        }

        // Accepted but inapplicable coupons stay listed at zero.
        let amount = if applied_to.is_empty() {
            result.warnings.push(format!(
                "Cupom {} não se aplica a nenhum item do carrinho",
                coupon.codigo
            ));
            Decimal::ZERO
        } else {
            discount_amount(coupon, eligible)
        };

        discounts.push(AppliedDiscount {
            code: coupon.codigo.clone(),
            amount,
            applied_to,
            coupon_id: coupon.id,
            limit_total: coupon.limits().limite_total,
        });
    }

    let discounted: Decimal = discounts.iter().map(|d| d.amount).sum();
    let total = (subtotal - discounted).max(Decimal::ZERO);

    result.pricing = Some(Pricing {
        subtotal,
        discounts,
        total,
    });
    result
}

/// Discount of a single coupon over its eligible subtotal, within `[0, eligible]`.
fn discount_amount(coupon: &Coupon, eligible: Decimal) -> Decimal {
    let raw = match coupon.tipo {
        CouponKind::Percentual => round_money(eligible * coupon.valor / Decimal::ONE_HUNDRED),
        CouponKind::Valor => coupon.valor.min(eligible),
        CouponKind::Cortesia => eligible,
    };
    raw.max(Decimal::ZERO).min(eligible)
}
