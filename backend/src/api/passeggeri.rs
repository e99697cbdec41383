use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::passeggero::{CreatePasseggeroRequest, Passeggero, UpdatePasseggeroRequest},
    record_guard,
};

#[derive(Debug, serde::Deserialize)]
pub struct PasseggeroListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub azienda_id: Option<Uuid>,
    /// Case-insensitive substring match on nome or cognome.
    pub cerca: Option<String>,
}

impl PasseggeroListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

const PASSEGGERO_COLS: &str = "id, nome, cognome, telefono, email, azienda_id, note, created_at";

pub async fn list(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Query(params): Query<PasseggeroListParams>,
) -> Result<Json<Vec<Passeggero>>> {
    let cerca = params.cerca.as_deref().map(|s| format!("%{}%", s.trim()));

    let passeggeri = sqlx::query_as::<_, Passeggero>(&format!(
        "SELECT {PASSEGGERO_COLS}
         FROM passeggeri
         WHERE ($1::uuid IS NULL OR azienda_id = $1)
           AND ($2::text IS NULL OR nome ILIKE $2 OR cognome ILIKE $2)
         ORDER BY cognome, nome
         LIMIT $3 OFFSET $4"
    ))
    .bind(params.azienda_id)
    .bind(&cerca)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(passeggeri))
}

pub async fn get_one(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Passeggero>> {
    let passeggero = sqlx::query_as::<_, Passeggero>(&format!(
        "SELECT {PASSEGGERO_COLS} FROM passeggeri WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Passenger not found".into()))?;

    Ok(Json(passeggero))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreatePasseggeroRequest>,
) -> Result<Json<Passeggero>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }
    if let Some(azienda_id) = req.azienda_id {
        record_guard::verify_azienda(&pool, azienda_id).await?;
    }

    let passeggero = sqlx::query_as::<_, Passeggero>(&format!(
        "INSERT INTO passeggeri (id, nome, cognome, telefono, email, azienda_id, note)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {PASSEGGERO_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(&req.telefono)
    .bind(&req.email)
    .bind(req.azienda_id)
    .bind(&req.note)
    .fetch_one(&pool)
    .await?;

    Ok(Json(passeggero))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePasseggeroRequest>,
) -> Result<Json<Passeggero>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }
    if let Some(Some(azienda_id)) = req.azienda_id {
        record_guard::verify_azienda(&pool, azienda_id).await?;
    }

    let telefono_provided = req.telefono.is_some();
    let telefono_val = req.telefono.clone().flatten();
    let email_provided = req.email.is_some();
    let email_val = req.email.clone().flatten();
    let azienda_provided = req.azienda_id.is_some();
    let azienda_val = req.azienda_id.flatten();
    let note_provided = req.note.is_some();
    let note_val = req.note.clone().flatten();

    let passeggero = sqlx::query_as::<_, Passeggero>(&format!(
        "UPDATE passeggeri
         SET nome       = COALESCE($2, nome),
             cognome    = COALESCE($3, cognome),
             telefono   = CASE WHEN $4 THEN $5 ELSE telefono END,
             email      = CASE WHEN $6 THEN $7 ELSE email END,
             azienda_id = CASE WHEN $8 THEN $9 ELSE azienda_id END,
             note       = CASE WHEN $10 THEN $11 ELSE note END
         WHERE id = $1
         RETURNING {PASSEGGERO_COLS}"
    ))
    .bind(id)
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(telefono_provided)
    .bind(&telefono_val)
    .bind(email_provided)
    .bind(&email_val)
    .bind(azienda_provided)
    .bind(azienda_val)
    .bind(note_provided)
    .bind(&note_val)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Passenger not found".into()))?;

    Ok(Json(passeggero))
}

pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    // A passenger still linked to services fails the FK and surfaces as 409.
    let rows = sqlx::query("DELETE FROM passeggeri WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("Passenger not found".into()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
