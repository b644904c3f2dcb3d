use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Rascunho,
    Publicado,
    Cancelado,
}

/// Purchase caps stored in `events.regras_limite`. Absent keys mean "no cap".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRules {
    #[serde(rename = "maxTotalPorPedido", default)]
    pub max_total_por_pedido: Option<i64>,
    #[serde(rename = "maxPorCPFPorTipo", alias = "maxPorCpfPorTipo", default)]
    pub max_por_cpf_por_tipo: Option<i64>,
    #[serde(rename = "maxPorCPFNoEvento", alias = "maxPorCpfNoEvento", default)]
    pub max_por_cpf_no_evento: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub titulo: String,
    pub status: EventStatus,
    pub regras_limite: Json<LimitRules>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn limits(&self) -> &LimitRules {
        &self.regras_limite.0
    }
}
