use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::movimento::{CreateMovimentoRequest, MovimentoAziendale, TipoMovimento},
};

const MOVIMENTO_COLS: &str =
    "id, data, tipo, categoria, importo, descrizione, stipendio_id, servizio_id, created_at";

#[derive(Debug, Deserialize)]
pub struct MovimentoListParams {
    pub mese: Option<i32>,
    pub anno: Option<i32>,
    pub tipo: Option<TipoMovimento>,
}

// The company ledger is staff-only in both directions.
pub async fn list(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Query(params): Query<MovimentoListParams>,
) -> Result<Json<Vec<MovimentoAziendale>>> {
    if !auth.role.can_manage_payroll() {
        return Err(AppError::Forbidden);
    }

    let movimenti = sqlx::query_as::<_, MovimentoAziendale>(&format!(
        "SELECT {MOVIMENTO_COLS} FROM movimenti_aziendali
         WHERE ($1::int IS NULL OR EXTRACT(MONTH FROM data) = $1)
           AND ($2::int IS NULL OR EXTRACT(YEAR FROM data) = $2)
           AND ($3::tipo_movimento IS NULL OR tipo = $3)
         ORDER BY data DESC, created_at DESC"
    ))
    .bind(params.mese)
    .bind(params.anno)
    .bind(params.tipo)
    .fetch_all(&pool)
    .await?;

    Ok(Json(movimenti))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateMovimentoRequest>,
) -> Result<Json<MovimentoAziendale>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_payroll() {
        return Err(AppError::Forbidden);
    }
    if req.importo <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "importo must be greater than zero".into(),
        ));
    }
    if let Some(servizio_id) = req.servizio_id {
        let esiste =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM servizi WHERE id = $1)")
                .bind(servizio_id)
                .fetch_one(&pool)
                .await?;
        if !esiste {
            return Err(AppError::NotFound("Service not found".into()));
        }
    }

    let movimento = sqlx::query_as::<_, MovimentoAziendale>(&format!(
        "INSERT INTO movimenti_aziendali (id, data, tipo, categoria, importo, descrizione, servizio_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {MOVIMENTO_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(req.data)
    .bind(req.tipo)
    .bind(req.categoria.trim())
    .bind(req.importo)
    .bind(&req.descrizione)
    .bind(req.servizio_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(movimento))
}

pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_payroll() {
        return Err(AppError::Forbidden);
    }

    // Rows written by a payslip payment are part of the payroll record.
    let stipendio_id = sqlx::query_scalar::<_, Option<Uuid>>(
        "SELECT stipendio_id FROM movimenti_aziendali WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Ledger entry not found".into()))?;

    if stipendio_id.is_some() {
        return Err(AppError::Conflict(
            "Ledger entry belongs to a paid payslip and cannot be deleted".into(),
        ));
    }

    sqlx::query("DELETE FROM movimenti_aziendali WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
