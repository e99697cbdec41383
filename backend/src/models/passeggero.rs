use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// Passenger, optionally tied to a client company.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Passeggero {
    pub id: Uuid,
    pub nome: String,
    pub cognome: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub azienda_id: Option<Uuid>,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePasseggeroRequest {
    #[validate(length(min = 1, max = 100, message = "nome is required"))]
    pub nome: String,
    #[validate(length(min = 1, max = 100, message = "cognome is required"))]
    pub cognome: String,
    pub telefono: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub azienda_id: Option<Uuid>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasseggeroRequest {
    #[validate(length(min = 1, max = 100))]
    pub nome: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub cognome: Option<String>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub telefono: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub azienda_id: Option<Option<Uuid>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub note: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AggiungiPasseggeroRequest {
    pub passeggero_id: Uuid,
}
