use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::conducente::{ConducenteEsterno, CreateConducenteRequest, UpdateConducenteRequest},
};

#[derive(Debug, serde::Deserialize)]
pub struct ConducenteListParams {
    pub include_inactive: Option<bool>,
}

const CONDUCENTE_COLS: &str = "id, nome, cognome, telefono, email, note, attivo, created_at";

pub async fn list(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Query(params): Query<ConducenteListParams>,
) -> Result<Json<Vec<ConducenteEsterno>>> {
    let active_only = !params.include_inactive.unwrap_or(false);

    let conducenti = sqlx::query_as::<_, ConducenteEsterno>(&format!(
        "SELECT {CONDUCENTE_COLS}
         FROM conducenti_esterni
         WHERE ($1 = false OR attivo = true)
         ORDER BY cognome, nome"
    ))
    .bind(active_only)
    .fetch_all(&pool)
    .await?;

    Ok(Json(conducenti))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateConducenteRequest>,
) -> Result<Json<ConducenteEsterno>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let conducente = sqlx::query_as::<_, ConducenteEsterno>(&format!(
        "INSERT INTO conducenti_esterni (id, nome, cognome, telefono, email, note)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {CONDUCENTE_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(&req.telefono)
    .bind(&req.email)
    .bind(&req.note)
    .fetch_one(&pool)
    .await?;

    Ok(Json(conducente))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConducenteRequest>,
) -> Result<Json<ConducenteEsterno>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let telefono_provided = req.telefono.is_some();
    let telefono_val = req.telefono.clone().flatten();
    let email_provided = req.email.is_some();
    let email_val = req.email.clone().flatten();
    let note_provided = req.note.is_some();
    let note_val = req.note.clone().flatten();

    let conducente = sqlx::query_as::<_, ConducenteEsterno>(&format!(
        "UPDATE conducenti_esterni
         SET nome     = COALESCE($2, nome),
             cognome  = COALESCE($3, cognome),
             telefono = CASE WHEN $4 THEN $5 ELSE telefono END,
             email    = CASE WHEN $6 THEN $7 ELSE email END,
             note     = CASE WHEN $8 THEN $9 ELSE note END,
             attivo   = COALESCE($10, attivo)
         WHERE id = $1
         RETURNING {CONDUCENTE_COLS}"
    ))
    .bind(id)
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(telefono_provided)
    .bind(&telefono_val)
    .bind(email_provided)
    .bind(&email_val)
    .bind(note_provided)
    .bind(&note_val)
    .bind(req.attivo)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("External driver not found".into()))?;

    Ok(Json(conducente))
}

pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let rows = sqlx::query("DELETE FROM conducenti_esterni WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("External driver not found".into()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
