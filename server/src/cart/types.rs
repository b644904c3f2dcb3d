use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cpf::Cpf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRequest {
    pub tenant_id: Uuid,
    pub event_id: Uuid,
    pub buyer_cpf: String,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub coupon_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub ticket_type_id: Uuid,
    pub lot_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeQuantity {
    pub ticket_type_id: Uuid,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotQuantity {
    pub lot_id: Uuid,
    pub qty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub code: String,
    pub amount: Decimal,
    pub applied_to: Vec<Uuid>,
    #[serde(skip)]
    pub coupon_id: Uuid,
    #[serde(skip)]
    pub limit_total: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: Decimal,
    pub discounts: Vec<AppliedDiscount>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub total_items: i64,
    pub by_type: Vec<TypeQuantity>,
    pub by_lot: Vec<LotQuantity>,
    pub pricing: Pricing,
    pub warnings: Vec<String>,
}

/// A fully validated and priced cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartQuote {
    pub cpf: Cpf,
    pub summary: CartSummary,
}

/// Requested quantities summed per ticket type, lot and overall, in order of
/// first appearance in the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: i64,
    pub by_type: Vec<TypeQuantity>,
    pub by_lot: Vec<LotQuantity>,
}

impl Tally {
    /// `None` when any sum overflows.
    pub fn from_items(items: &[CartItem]) -> Option<Self> {
        let mut tally = Tally::default();
        for item in items {
            tally.total = tally.total.checked_add(item.quantity)?;

            match tally
                .by_type
                .iter_mut()
                .find(|t| t.ticket_type_id == item.ticket_type_id)
            {
                Some(entry) => entry.qty = entry.qty.checked_add(item.quantity)?,
                None => tally.by_type.push(TypeQuantity {
                    ticket_type_id: item.ticket_type_id,
                    qty: item.quantity,
                }),
            }

            match tally.by_lot.iter_mut().find(|l| l.lot_id == item.lot_id) {
                Some(entry) => entry.qty = entry.qty.checked_add(item.quantity)?,
                None => tally.by_lot.push(LotQuantity {
                    lot_id: item.lot_id,
                    qty: item.quantity,
                }),
            }
        }
        Some(tally)
    }

    pub fn type_ids(&self) -> Vec<Uuid> {
        self.by_type.iter().map(|t| t.ticket_type_id).collect()
    }

    pub fn lot_ids(&self) -> Vec<Uuid> {
        self.by_lot.iter().map(|l| l.lot_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_sums_repeated_references() {
        let pista = Uuid::new_v4();
        let vip = Uuid::new_v4();
        let lote1 = Uuid::new_v4();
        let lote2 = Uuid::new_v4();
        let items = vec![
            CartItem { ticket_type_id: pista, lot_id: lote1, quantity: 2 },
            CartItem { ticket_type_id: vip, lot_id: lote2, quantity: 1 },
            CartItem { ticket_type_id: pista, lot_id: lote1, quantity: 3 },
        ];

        let tally = Tally::from_items(&items).unwrap();

        assert_eq!(tally.total, 6);
        assert_eq!(
            tally.by_type,
            vec![
                TypeQuantity { ticket_type_id: pista, qty: 5 },
                TypeQuantity { ticket_type_id: vip, qty: 1 },
            ]
        );
        assert_eq!(tally.lot_ids(), vec![lote1, lote2]);
        assert_eq!(tally.by_lot[0].qty, 5);
    }

    #[test]
    fn test_tally_refuses_overflowing_sums() {
        let lote = Uuid::new_v4();
        let pista = Uuid::new_v4();
        let items = vec![
            CartItem { ticket_type_id: pista, lot_id: lote, quantity: i64::MAX },
            CartItem { ticket_type_id: pista, lot_id: lote, quantity: 2 },
        ];

        assert_eq!(Tally::from_items(&items), None);
    }

    #[test]
    fn test_request_accepts_missing_coupon_codes() {
        let request: CartRequest = serde_json::from_value(serde_json::json!({
            "tenantId": Uuid::new_v4(),
            "eventId": Uuid::new_v4(),
            "buyerCpf": "123.456.789-00",
            "items": [{ "ticketTypeId": Uuid::new_v4(), "lotId": Uuid::new_v4(), "quantity": 2 }]
        }))
        .unwrap();

        assert!(request.coupon_codes.is_empty());
        assert_eq!(request.items[0].quantity, 2);
    }
}
