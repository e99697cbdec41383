use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Role;

/// Full profile record as stored in the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub nome: String,
    pub cognome: String,
    pub email: String,
    pub telefono: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub data_assunzione: Option<time::Date>,
    pub attivo: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Subset returned to the client (no password hash).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProfileView {
    pub id: Uuid,
    pub nome: String,
    pub cognome: String,
    pub email: String,
    pub telefono: Option<String>,
    pub role: Role,
    pub data_assunzione: Option<time::Date>,
    pub attivo: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "nome is required"))]
    pub nome: String,
    #[validate(length(min = 1, max = 100, message = "cognome is required"))]
    pub cognome: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    pub telefono: Option<String>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    pub data_assunzione: Option<time::Date>,
}

/// Double-Option on nullable fields: missing keeps the stored value, an
/// explicit null clears it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub nome: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub cognome: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub telefono: Option<Option<String>>,
    pub role: Option<Role>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub data_assunzione: Option<Option<time::Date>>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: ProfileView,
}
