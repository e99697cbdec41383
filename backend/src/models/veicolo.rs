use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Veicolo {
    pub id: Uuid,
    pub targa: String,
    pub marca: String,
    pub modello: String,
    pub posti: i32,
    pub note: Option<String>,
    pub attivo: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVeicoloRequest {
    #[validate(length(min = 1, max = 20, message = "targa is required"))]
    pub targa: String,
    #[validate(length(min = 1, max = 100, message = "marca is required"))]
    pub marca: String,
    #[validate(length(min = 1, max = 100, message = "modello is required"))]
    pub modello: String,
    #[validate(range(min = 1, max = 50))]
    pub posti: Option<i32>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVeicoloRequest {
    #[validate(length(min = 1, max = 20))]
    pub targa: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub marca: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub modello: Option<String>,
    #[validate(range(min = 1, max = 50))]
    pub posti: Option<i32>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub note: Option<Option<String>>,
    pub attivo: Option<bool>,
}
