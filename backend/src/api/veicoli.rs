use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::veicolo::{CreateVeicoloRequest, UpdateVeicoloRequest, Veicolo},
};

#[derive(Debug, serde::Deserialize)]
pub struct VeicoloListParams {
    pub include_inactive: Option<bool>,
}

const VEICOLO_COLS: &str = "id, targa, marca, modello, posti, note, attivo, created_at";

pub async fn list(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Query(params): Query<VeicoloListParams>,
) -> Result<Json<Vec<Veicolo>>> {
    let active_only = !params.include_inactive.unwrap_or(false);

    let veicoli = sqlx::query_as::<_, Veicolo>(&format!(
        "SELECT {VEICOLO_COLS}
         FROM veicoli
         WHERE ($1 = false OR attivo = true)
         ORDER BY targa"
    ))
    .bind(active_only)
    .fetch_all(&pool)
    .await?;

    Ok(Json(veicoli))
}

pub async fn get_one(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Veicolo>> {
    let veicolo =
        sqlx::query_as::<_, Veicolo>(&format!("SELECT {VEICOLO_COLS} FROM veicoli WHERE id = $1"))
            .bind(id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Vehicle not found".into()))?;

    Ok(Json(veicolo))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateVeicoloRequest>,
) -> Result<Json<Veicolo>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let veicolo = sqlx::query_as::<_, Veicolo>(&format!(
        "INSERT INTO veicoli (id, targa, marca, modello, posti, note)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {VEICOLO_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(req.targa.trim().to_uppercase())
    .bind(&req.marca)
    .bind(&req.modello)
    .bind(req.posti.unwrap_or(4))
    .bind(&req.note)
    .fetch_one(&pool)
    .await?;

    Ok(Json(veicolo))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVeicoloRequest>,
) -> Result<Json<Veicolo>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let targa = req.targa.as_deref().map(|t| t.trim().to_uppercase());
    let note_provided = req.note.is_some();
    let note_val = req.note.clone().flatten();

    let veicolo = sqlx::query_as::<_, Veicolo>(&format!(
        "UPDATE veicoli
         SET targa   = COALESCE($2, targa),
             marca   = COALESCE($3, marca),
             modello = COALESCE($4, modello),
             posti   = COALESCE($5, posti),
             note    = CASE WHEN $6 THEN $7 ELSE note END,
             attivo  = COALESCE($8, attivo)
         WHERE id = $1
         RETURNING {VEICOLO_COLS}"
    ))
    .bind(id)
    .bind(&targa)
    .bind(&req.marca)
    .bind(&req.modello)
    .bind(req.posti)
    .bind(note_provided)
    .bind(&note_val)
    .bind(req.attivo)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Vehicle not found".into()))?;

    Ok(Json(veicolo))
}

pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let rows = sqlx::query("DELETE FROM veicoli WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("Vehicle not found".into()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
