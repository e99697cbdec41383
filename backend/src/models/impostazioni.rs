use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::models::stipendio::TariffeStipendio;

/// Single-row application settings. The row is seeded by the migrations and
/// only ever updated, never inserted or deleted at runtime.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Impostazioni {
    pub id: i32,
    pub aliquota_iva: Decimal,
    pub tariffa_km: Decimal,
    pub compenso_servizio: Decimal,
    pub tariffa_sosta: Decimal,
    pub timezone: String,
    pub email_notifiche_attive: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Impostazioni {
    pub fn tariffe(&self) -> TariffeStipendio {
        TariffeStipendio {
            tariffa_km: self.tariffa_km,
            compenso_servizio: self.compenso_servizio,
            tariffa_sosta: self.tariffa_sosta,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateImpostazioniRequest {
    pub aliquota_iva: Option<Decimal>,
    pub tariffa_km: Option<Decimal>,
    pub compenso_servizio: Option<Decimal>,
    pub tariffa_sosta: Option<Decimal>,
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
    pub email_notifiche_attive: Option<bool>,
}
