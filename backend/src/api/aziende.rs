use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::azienda::{
        Azienda, CreateAziendaRequest, CreateReferenteRequest, Referente, UpdateAziendaRequest,
        UpdateReferenteRequest,
    },
};

#[derive(Debug, serde::Deserialize)]
pub struct AziendaListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub include_inactive: Option<bool>,
    /// Case-insensitive substring match on the company name.
    pub cerca: Option<String>,
}

impl AziendaListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

const AZIENDA_COLS: &str =
    "id, nome, partita_iva, indirizzo, telefono, email, note, attivo, created_at, updated_at";

pub async fn list(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Query(params): Query<AziendaListParams>,
) -> Result<Json<Vec<Azienda>>> {
    let active_only = !params.include_inactive.unwrap_or(false);
    let cerca = params.cerca.as_deref().map(|s| format!("%{}%", s.trim()));

    let aziende = sqlx::query_as::<_, Azienda>(&format!(
        "SELECT {AZIENDA_COLS}
         FROM aziende
         WHERE ($1 = false OR attivo = true)
           AND ($2::text IS NULL OR nome ILIKE $2)
         ORDER BY nome
         LIMIT $3 OFFSET $4"
    ))
    .bind(active_only)
    .bind(&cerca)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(aziende))
}

pub async fn get_one(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Azienda>> {
    let azienda =
        sqlx::query_as::<_, Azienda>(&format!("SELECT {AZIENDA_COLS} FROM aziende WHERE id = $1"))
            .bind(id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Company not found".into()))?;

    Ok(Json(azienda))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateAziendaRequest>,
) -> Result<Json<Azienda>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let azienda = sqlx::query_as::<_, Azienda>(&format!(
        "INSERT INTO aziende (id, nome, partita_iva, indirizzo, telefono, email, note)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {AZIENDA_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&req.nome)
    .bind(&req.partita_iva)
    .bind(&req.indirizzo)
    .bind(&req.telefono)
    .bind(&req.email)
    .bind(&req.note)
    .fetch_one(&pool)
    .await?;

    Ok(Json(azienda))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAziendaRequest>,
) -> Result<Json<Azienda>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let piva_provided = req.partita_iva.is_some();
    let piva_val = req.partita_iva.clone().flatten();
    let indirizzo_provided = req.indirizzo.is_some();
    let indirizzo_val = req.indirizzo.clone().flatten();
    let telefono_provided = req.telefono.is_some();
    let telefono_val = req.telefono.clone().flatten();
    let email_provided = req.email.is_some();
    let email_val = req.email.clone().flatten();
    let note_provided = req.note.is_some();
    let note_val = req.note.clone().flatten();

    let azienda = sqlx::query_as::<_, Azienda>(&format!(
        "UPDATE aziende
         SET nome        = COALESCE($2, nome),
             partita_iva = CASE WHEN $3 THEN $4 ELSE partita_iva END,
             indirizzo   = CASE WHEN $5 THEN $6 ELSE indirizzo END,
             telefono    = CASE WHEN $7 THEN $8 ELSE telefono END,
             email       = CASE WHEN $9 THEN $10 ELSE email END,
             note        = CASE WHEN $11 THEN $12 ELSE note END,
             attivo      = COALESCE($13, attivo),
             updated_at  = NOW()
         WHERE id = $1
         RETURNING {AZIENDA_COLS}"
    ))
    .bind(id)
    .bind(&req.nome)
    .bind(piva_provided)
    .bind(&piva_val)
    .bind(indirizzo_provided)
    .bind(&indirizzo_val)
    .bind(telefono_provided)
    .bind(&telefono_val)
    .bind(email_provided)
    .bind(&email_val)
    .bind(note_provided)
    .bind(&note_val)
    .bind(req.attivo)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Company not found".into()))?;

    Ok(Json(azienda))
}

/// Hard delete. Referenti go with the company (cascade); services that
/// reference it make the FK fail, which surfaces as 409.
pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let rows = sqlx::query("DELETE FROM aziende WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("Company not found".into()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

const REFERENTE_COLS: &str = "id, azienda_id, nome, cognome, telefono, email, attivo, created_at";

pub async fn list_referenti(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Path(azienda_id): Path<Uuid>,
) -> Result<Json<Vec<Referente>>> {
    // 404 for a missing company rather than an empty list.
    crate::record_guard::verify_azienda(&pool, azienda_id).await?;

    let referenti = sqlx::query_as::<_, Referente>(&format!(
        "SELECT {REFERENTE_COLS}
         FROM referenti
         WHERE azienda_id = $1
         ORDER BY cognome, nome"
    ))
    .bind(azienda_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(referenti))
}

pub async fn create_referente(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(azienda_id): Path<Uuid>,
    Json(req): Json<CreateReferenteRequest>,
) -> Result<Json<Referente>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }
    crate::record_guard::verify_azienda(&pool, azienda_id).await?;

    let referente = sqlx::query_as::<_, Referente>(&format!(
        "INSERT INTO referenti (id, azienda_id, nome, cognome, telefono, email)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {REFERENTE_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(azienda_id)
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(&req.telefono)
    .bind(&req.email)
    .fetch_one(&pool)
    .await?;

    Ok(Json(referente))
}

pub async fn update_referente(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReferenteRequest>,
) -> Result<Json<Referente>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let telefono_provided = req.telefono.is_some();
    let telefono_val = req.telefono.clone().flatten();
    let email_provided = req.email.is_some();
    let email_val = req.email.clone().flatten();

    let referente = sqlx::query_as::<_, Referente>(&format!(
        "UPDATE referenti
         SET nome     = COALESCE($2, nome),
             cognome  = COALESCE($3, cognome),
             telefono = CASE WHEN $4 THEN $5 ELSE telefono END,
             email    = CASE WHEN $6 THEN $7 ELSE email END,
             attivo   = COALESCE($8, attivo)
         WHERE id = $1
         RETURNING {REFERENTE_COLS}"
    ))
    .bind(id)
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(telefono_provided)
    .bind(&telefono_val)
    .bind(email_provided)
    .bind(&email_val)
    .bind(req.attivo)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Contact not found".into()))?;

    Ok(Json(referente))
}

pub async fn delete_referente(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let rows = sqlx::query("DELETE FROM referenti WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("Contact not found".into()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
