use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        common::MeseParams,
        spesa::{CreateSpesaRequest, SpesaPersonale, SpesaRiga, UpdateSpesaRequest},
    },
    record_guard,
};

const SPESA_COLS: &str = "id, user_id, data, importo, categoria, descrizione, created_at";

pub async fn list(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Query(params): Query<MeseParams>,
) -> Result<Json<Vec<SpesaRiga>>> {
    // Employees see their own expenses only.
    let user_filter = if auth.role.can_manage_payroll() {
        params.user_id
    } else {
        Some(auth.id)
    };

    let spese = sqlx::query_as::<_, SpesaRiga>(
        r#"
        SELECT sp.id, sp.user_id, p.nome, p.cognome, sp.data, sp.importo,
               sp.categoria, sp.descrizione
        FROM spese_personali sp
        JOIN profiles p ON p.id = sp.user_id
        WHERE ($1::int IS NULL OR EXTRACT(MONTH FROM sp.data) = $1)
          AND ($2::int IS NULL OR EXTRACT(YEAR FROM sp.data) = $2)
          AND ($3::uuid IS NULL OR sp.user_id = $3)
        ORDER BY sp.data DESC, sp.created_at DESC
        "#,
    )
    .bind(params.mese)
    .bind(params.anno)
    .bind(user_filter)
    .fetch_all(&pool)
    .await?;

    Ok(Json(spese))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateSpesaRequest>,
) -> Result<Json<SpesaPersonale>> {
    use validator::Validate;
    req.validate()?;

    let target = req.user_id.unwrap_or(auth.id);
    if target != auth.id {
        if !auth.role.can_manage_payroll() {
            return Err(AppError::Forbidden);
        }
        record_guard::verify_profile(&pool, target).await?;
    }
    if req.importo <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "importo must be greater than zero".into(),
        ));
    }

    let spesa = sqlx::query_as::<_, SpesaPersonale>(&format!(
        "INSERT INTO spese_personali (id, user_id, data, importo, categoria, descrizione)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {SPESA_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(target)
    .bind(req.data)
    .bind(req.importo)
    .bind(req.categoria.trim())
    .bind(&req.descrizione)
    .fetch_one(&pool)
    .await?;

    Ok(Json(spesa))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSpesaRequest>,
) -> Result<Json<SpesaPersonale>> {
    use validator::Validate;
    req.validate()?;

    if let Some(importo) = req.importo {
        if importo <= Decimal::ZERO {
            return Err(AppError::BadRequest(
                "importo must be greater than zero".into(),
            ));
        }
    }

    let corrente = sqlx::query_as::<_, SpesaPersonale>(&format!(
        "SELECT {SPESA_COLS} FROM spese_personali WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Expense not found".into()))?;

    if corrente.user_id != auth.id && !auth.role.can_manage_payroll() {
        return Err(AppError::NotFound("Expense not found".into()));
    }

    let (descrizione_set, descrizione_val) = match &req.descrizione {
        Some(v) => (true, v.clone()),
        None => (false, None),
    };

    let spesa = sqlx::query_as::<_, SpesaPersonale>(&format!(
        "UPDATE spese_personali
         SET data = COALESCE($2, data),
             importo = COALESCE($3, importo),
             categoria = COALESCE($4, categoria),
             descrizione = CASE WHEN $5 THEN $6 ELSE descrizione END
         WHERE id = $1
         RETURNING {SPESA_COLS}"
    ))
    .bind(id)
    .bind(req.data)
    .bind(req.importo)
    .bind(&req.categoria)
    .bind(descrizione_set)
    .bind(descrizione_val)
    .fetch_one(&pool)
    .await?;

    Ok(Json(spesa))
}

pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let corrente = sqlx::query_as::<_, SpesaPersonale>(&format!(
        "SELECT {SPESA_COLS} FROM spese_personali WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Expense not found".into()))?;

    if corrente.user_id != auth.id && !auth.role.can_manage_payroll() {
        return Err(AppError::NotFound("Expense not found".into()));
    }

    sqlx::query("DELETE FROM spese_personali WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
