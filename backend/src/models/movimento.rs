use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[sqlx(type_name = "tipo_movimento", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TipoMovimento {
    Entrata,
    Uscita,
}

/// Company ledger entry. Rows created automatically when a payslip is paid
/// carry its id in `stipendio_id`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MovimentoAziendale {
    pub id: Uuid,
    pub data: time::Date,
    pub tipo: TipoMovimento,
    pub categoria: String,
    pub importo: Decimal,
    pub descrizione: Option<String>,
    pub stipendio_id: Option<Uuid>,
    pub servizio_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMovimentoRequest {
    pub data: time::Date,
    pub tipo: TipoMovimento,
    #[validate(length(min = 1, max = 100, message = "categoria is required"))]
    pub categoria: String,
    pub importo: Decimal,
    #[validate(length(max = 500))]
    pub descrizione: Option<String>,
    pub servizio_id: Option<Uuid>,
}
