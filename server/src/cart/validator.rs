use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{Lot, TicketType};
use crate::store::{CatalogStore, StoreResult};
use crate::utils::error::{ErrorCode, Rejection, RejectionKind};
use crate::utils::response::ApiErrorBody;

use super::cpf::Cpf;
use super::pricing::{self, PricedLine};
use super::types::{CartQuote, CartRequest, CartSummary, Tally};

/// Validates carts and quotes their price. Never mutates the store.
pub struct CartValidator {
    catalog: Arc<dyn CatalogStore>,
    sale_window_skew: Duration,
}

impl CartValidator {
    pub fn new(catalog: Arc<dyn CatalogStore>, sale_window_skew: Duration) -> Self {
        Self {
            catalog,
            sale_window_skew,
        }
    }

    /// Runs every check against the store as of `now`.
    ///
    /// Referential failures abort at once; rule violations are all collected
    /// and returned together. Pricing only runs on a cart with no violations.
    #[instrument(skip(self, request, now), fields(tenant_id = %request.tenant_id, event_id = %request.event_id))]
    pub async fn validate(
        &self,
        request: &CartRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<Result<CartQuote, Rejection>> {
        let cpf = match check_input(request) {
            Ok(cpf) => cpf,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let Some(tally) = Tally::from_items(&request.items) else {
            return Ok(Err(Rejection::single(
                RejectionKind::Input,
                ApiErrorBody::new(
                    ErrorCode::InvalidQuantity,
                    "Quantidade total do carrinho fora do limite",
                ),
            )));
        };
        let lot_ids = tally.lot_ids();
        let type_ids = tally.type_ids();
        let catalog = self.catalog.as_ref();

        let (event, lots, ticket_types, paid_by_type) = tokio::try_join!(
            catalog.find_event(request.tenant_id, request.event_id),
            catalog.lots_by_ids(request.tenant_id, request.event_id, &lot_ids),
            catalog.ticket_types_by_ids(request.tenant_id, request.event_id, &type_ids),
            catalog.paid_tickets_by_type(request.tenant_id, request.event_id, cpf.as_str()),
        )?;

        let Some(event) = event else {
            return Ok(Err(Rejection::single(
                RejectionKind::NotFound,
                ApiErrorBody::new(ErrorCode::EventNotFound, "Evento não encontrado"),
            )));
        };

        let lots: HashMap<Uuid, Lot> = lots.into_iter().map(|l| (l.id, l)).collect();
        let ticket_types: HashMap<Uuid, TicketType> = ticket_types
            .into_iter()
            .filter(|t| t.ativo)
            .map(|t| (t.id, t))
            .collect();

        if let Some(rejection) = missing_references(&lot_ids, &lots, &type_ids, &ticket_types) {
            return Ok(Err(rejection));
        }

        let mut errors = Vec::new();

        for item in &request.items {
            let lot = &lots[&item.lot_id];
            if lot.ticket_type_id != item.ticket_type_id {
                errors.push(
                    ApiErrorBody::new(
                        ErrorCode::LotTypeMismatch,
                        format!("Lote {} não pertence ao tipo de ingresso informado", lot.nome),
                    )
                    .for_lot(lot.id)
                    .for_type(item.ticket_type_id),
                );
            }
        }

        for requested in &tally.by_lot {
            let lot = &lots[&requested.lot_id];
            if !lot.is_on_sale(now, self.sale_window_skew) {
                errors.push(
                    ApiErrorBody::new(
                        ErrorCode::LoteForaDaJanela,
                        format!("Lote {} fora da janela de vendas", lot.nome),
                    )
                    .for_lot(lot.id),
                );
            }
            if requested.qty > lot.available() {
                errors.push(
                    ApiErrorBody::new(
                        ErrorCode::LoteSemEstoque,
                        format!(
                            "Lote {} possui {} ingresso(s) disponível(is), {} solicitado(s)",
                            lot.nome,
                            lot.available().max(0),
                            requested.qty
                        ),
                    )
                    .for_lot(lot.id),
                );
            }
        }

        for requested in &tally.by_type {
            let ticket_type = &ticket_types[&requested.ticket_type_id];
            if let Some(max) = ticket_type.max_por_pedido {
                if requested.qty > i64::from(max) {
                    errors.push(
                        ApiErrorBody::new(
                            ErrorCode::LimitMaxPorTipoPorPedido,
                            format!(
                                "{} ingresso(s) {} excedem o máximo de {max} por pedido",
                                requested.qty, ticket_type.nome
                            ),
                        )
                        .for_type(ticket_type.id),
                    );
                }
            }
        }

        let limits = event.limits();
        if let Some(max) = limits.max_total_por_pedido {
            if tally.total > max {
                errors.push(ApiErrorBody::new(
                    ErrorCode::LimitMaxTotalPorPedido,
                    format!(
                        "Pedido com {} ingressos excede o máximo de {max} por pedido",
                        tally.total
                    ),
                ));
            }
        }

        if let Some(max) = limits.max_por_cpf_por_tipo {
            for requested in &tally.by_type {
                let existing = paid_by_type
                    .get(&requested.ticket_type_id)
                    .copied()
                    .unwrap_or(0);
                if existing.saturating_add(requested.qty) > max {
                    errors.push(
                        ApiErrorBody::new(
                            ErrorCode::LimitMaxPorCpfPorTipo,
                            format!(
                                "CPF já possui {existing} ingresso(s) deste tipo; com mais {} excede o máximo de {max}",
                                requested.qty
                            ),
                        )
                        .for_type(requested.ticket_type_id),
                    );
                }
            }
        }

        if let Some(max) = limits.max_por_cpf_no_evento {
            let existing: i64 = paid_by_type.values().sum();
            if existing.saturating_add(tally.total) > max {
                errors.push(ApiErrorBody::new(
                    ErrorCode::LimitMaxPorCpfNoEvento,
                    format!(
                        "CPF já possui {existing} ingresso(s) no evento; com mais {} excede o máximo de {max}",
                        tally.total
                    ),
                ));
            }
        }

        if !errors.is_empty() {
            info!(errors = errors.len(), "Cart rejected");
            return Ok(Err(Rejection::new(RejectionKind::BusinessRule, errors)));
        }

        let codes = pricing::normalize_codes(&request.coupon_codes);
        let sector_ids = distinct_sectors(&tally, &ticket_types);

        let (allocations, coupons) = tokio::try_join!(
            catalog.sector_allocations(request.tenant_id, &sector_ids),
            async {
                if codes.is_empty() {
                    Ok(Vec::new())
                } else {
                    catalog.active_coupons(event.id, &codes).await
                }
            },
        )?;

        let coupon_ids: Vec<Uuid> = coupons.iter().map(|c| c.id).collect();
        let usage_by_cpf = if coupon_ids.is_empty() {
            HashMap::new()
        } else {
            catalog.coupon_usage_by_cpf(&coupon_ids, cpf.as_str()).await?
        };

        let mut warnings = Vec::new();
        for sector_id in &sector_ids {
            let capacity = ticket_types
                .values()
                .find(|t| t.sector_id == *sector_id)
                .map_or(0, |t| i64::from(t.setor_capacidade));
            let allocated = allocations.get(sector_id).copied().unwrap_or(0);
            if allocated > capacity {
                warnings.push(format!(
                    "Setor {sector_id} tem {allocated} ingressos alocados em lotes para capacidade de {capacity}"
                ));
            }
        }

        let lines: Vec<PricedLine> = request
            .items
            .iter()
            .map(|item| {
                let lot = &lots[&item.lot_id];
                let ticket_type = &ticket_types[&item.ticket_type_id];
                PricedLine {
                    ticket_type_id: item.ticket_type_id,
                    amount: lot.unit_price(ticket_type) * rust_decimal::Decimal::from(item.quantity),
                }
            })
            .collect();

        let priced = pricing::price_cart(&lines, &codes, &coupons, &usage_by_cpf);
        warnings.extend(priced.warnings);

        let Some(pricing) = priced.pricing else {
            info!(errors = priced.errors.len(), "Cart coupons rejected");
            return Ok(Err(Rejection::new(RejectionKind::BusinessRule, priced.errors)));
        };

        debug!(buyer = %cpf, total = %pricing.total, "Cart quoted");

        Ok(Ok(CartQuote {
            cpf,
            summary: CartSummary {
                total_items: tally.total,
                by_type: tally.by_type,
                by_lot: tally.by_lot,
                pricing,
                warnings,
            },
        }))
    }
}

/// Lot counters are `INTEGER` columns.
const MAX_ITEM_QUANTITY: i64 = i32::MAX as i64;

/// Input checks that need no store access.
fn check_input(request: &CartRequest) -> Result<Cpf, Rejection> {
    let mut errors = Vec::new();
    let cpf = Cpf::parse(&request.buyer_cpf);
    if cpf.is_none() {
        errors.push(ApiErrorBody::new(
            ErrorCode::InvalidCpf,
            "CPF deve conter exatamente 11 dígitos",
        ));
    }

    if request.items.is_empty() {
        errors.push(ApiErrorBody::new(ErrorCode::EmptyCart, "Carrinho vazio"));
    }

    for item in &request.items {
        if item.quantity <= 0 || item.quantity > MAX_ITEM_QUANTITY {
            errors.push(
                ApiErrorBody::new(
                    ErrorCode::InvalidQuantity,
                    format!("Quantidade inválida: {}", item.quantity),
                )
                .for_lot(item.lot_id)
                .for_type(item.ticket_type_id),
            );
        }
    }

    match cpf {
        Some(cpf) if errors.is_empty() => Ok(cpf),
        _ => Err(Rejection::new(RejectionKind::Input, errors)),
    }
}

fn missing_references(
    lot_ids: &[Uuid],
    lots: &HashMap<Uuid, Lot>,
    type_ids: &[Uuid],
    ticket_types: &HashMap<Uuid, TicketType>,
) -> Option<Rejection> {
    let missing_lots: Vec<Uuid> = lot_ids
        .iter()
        .filter(|id| !lots.contains_key(*id))
        .copied()
        .collect();
    let missing_types: Vec<Uuid> = type_ids
        .iter()
        .filter(|id| !ticket_types.contains_key(*id))
        .copied()
        .collect();

    if missing_lots.is_empty() && missing_types.is_empty() {
        return None;
    }

    let mut errors = Vec::new();
    if !missing_lots.is_empty() {
        errors.push(ApiErrorBody::new(
            ErrorCode::LotsNotFound,
            format!("{} lote(s) não encontrado(s)", missing_lots.len()),
        ));
        errors.extend(missing_lots.into_iter().map(|id| {
            ApiErrorBody::new(ErrorCode::LotNotFound, "Lote não encontrado").for_lot(id)
        }));
    }
    if !missing_types.is_empty() {
        errors.push(ApiErrorBody::new(
            ErrorCode::TypesNotFound,
            format!("{} tipo(s) de ingresso não encontrado(s)", missing_types.len()),
        ));
        errors.extend(missing_types.into_iter().map(|id| {
            ApiErrorBody::new(ErrorCode::TypeNotFound, "Tipo de ingresso não encontrado")
                .for_type(id)
        }));
    }
    Some(Rejection::new(RejectionKind::NotFound, errors))
}

fn distinct_sectors(tally: &Tally, ticket_types: &HashMap<Uuid, TicketType>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    tally
        .by_type
        .iter()
        .map(|t| ticket_types[&t.ticket_type_id].sector_id)
        .filter(|sector_id| seen.insert(*sector_id))
        .collect()
}
