use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// Out-of-pocket expense reported by an employee (fuel, tolls, parking).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SpesaPersonale {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data: time::Date,
    pub importo: Decimal,
    pub categoria: String,
    pub descrizione: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// List row with the employee's name from the join.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SpesaRiga {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nome: String,
    pub cognome: String,
    pub data: time::Date,
    pub importo: Decimal,
    pub categoria: String,
    pub descrizione: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSpesaRequest {
    /// Staff can record for anyone; employees only for themselves.
    pub user_id: Option<Uuid>,
    pub data: time::Date,
    pub importo: Decimal,
    #[validate(length(min = 1, max = 100, message = "categoria is required"))]
    pub categoria: String,
    #[validate(length(max = 500))]
    pub descrizione: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSpesaRequest {
    pub data: Option<time::Date>,
    pub importo: Option<Decimal>,
    #[validate(length(min = 1, max = 100))]
    pub categoria: Option<String>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub descrizione: Option<Option<String>>,
}
