use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{extract::State, Json};
use sqlx::PgPool;

use crate::{
    auth::{create_token, AuthUser},
    error::{AppError, Result},
    models::profile::{LoginRequest, LoginResponse, Profile, ProfileView},
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let profile = sqlx::query_as::<_, Profile>(
        "SELECT id, nome, cognome, email, telefono, password_hash, role,
                data_assunzione, attivo, created_at, updated_at
         FROM profiles WHERE email = $1 AND attivo = true",
    )
    .bind(&req.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let parsed = PasswordHash::new(&profile.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid stored hash")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized)?;

    let token = create_token(
        profile.id,
        profile.role,
        &state.jwt_secret,
        state.jwt_expiry_hours,
    )
    .map_err(AppError::Internal)?;

    Ok(Json(LoginResponse {
        token,
        user: ProfileView {
            id: profile.id,
            nome: profile.nome,
            cognome: profile.cognome,
            email: profile.email,
            telefono: profile.telefono,
            role: profile.role,
            data_assunzione: profile.data_assunzione,
            attivo: profile.attivo,
        },
    }))
}

pub async fn me(State(pool): State<PgPool>, auth: AuthUser) -> Result<Json<ProfileView>> {
    let profile = sqlx::query_as::<_, ProfileView>(
        "SELECT id, nome, cognome, email, telefono, role, data_assunzione, attivo
         FROM profiles WHERE id = $1",
    )
    .bind(auth.id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(Json(profile))
}
