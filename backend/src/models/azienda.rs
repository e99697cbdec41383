use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// Client company billed for services.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Azienda {
    pub id: Uuid,
    pub nome: String,
    pub partita_iva: Option<String>,
    pub indirizzo: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
    pub attivo: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Contact person inside a client company.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Referente {
    pub id: Uuid,
    pub azienda_id: Uuid,
    pub nome: String,
    pub cognome: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub attivo: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAziendaRequest {
    #[validate(length(min = 1, max = 200, message = "nome is required"))]
    pub nome: String,
    #[validate(length(max = 20))]
    pub partita_iva: Option<String>,
    pub indirizzo: Option<String>,
    pub telefono: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAziendaRequest {
    #[validate(length(min = 1, max = 200))]
    pub nome: Option<String>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub partita_iva: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub indirizzo: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub telefono: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub note: Option<Option<String>>,
    pub attivo: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReferenteRequest {
    #[validate(length(min = 1, max = 100, message = "nome is required"))]
    pub nome: String,
    #[validate(length(min = 1, max = 100, message = "cognome is required"))]
    pub cognome: String,
    pub telefono: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReferenteRequest {
    #[validate(length(min = 1, max = 100))]
    pub nome: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub cognome: Option<String>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub telefono: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub email: Option<Option<String>>,
    pub attivo: Option<bool>,
}
