use std::time::Duration;

use axum::{extract::State, Json};
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::PgPool;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::impostazioni::{Impostazioni, UpdateImpostazioniRequest},
};

// Settings change rarely but are read on nearly every request that touches
// dates or money, so they sit in a small TTL cache.
static IMPOSTAZIONI_CACHE: Lazy<Cache<&'static str, Impostazioni>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(300))
        .build()
});

async fn invalidate_impostazioni_cache() {
    IMPOSTAZIONI_CACHE.invalidate(&"corrente").await;
}

const IMPOSTAZIONI_COLS: &str = "id, aliquota_iva, tariffa_km, compenso_servizio, tariffa_sosta, \
                                 timezone, email_notifiche_attive, updated_at";

/// Cached read used by every handler that needs rates or the timezone.
pub async fn carica_impostazioni(pool: &PgPool) -> Result<Impostazioni> {
    if let Some(cached) = IMPOSTAZIONI_CACHE.get(&"corrente").await {
        return Ok(cached);
    }

    let impostazioni = sqlx::query_as::<_, Impostazioni>(&format!(
        "SELECT {IMPOSTAZIONI_COLS} FROM impostazioni WHERE id = 1"
    ))
    .fetch_one(pool)
    .await?;

    IMPOSTAZIONI_CACHE
        .insert("corrente", impostazioni.clone())
        .await;
    Ok(impostazioni)
}

pub async fn get(State(pool): State<PgPool>, _auth: AuthUser) -> Result<Json<Impostazioni>> {
    let impostazioni = carica_impostazioni(&pool).await?;
    Ok(Json(impostazioni))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<UpdateImpostazioniRequest>,
) -> Result<Json<Impostazioni>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.is_admin() {
        return Err(AppError::Forbidden);
    }

    // Rates must be non-negative; a zero rate is legal (component drops out).
    for (campo, valore) in [
        ("aliquota_iva", req.aliquota_iva),
        ("tariffa_km", req.tariffa_km),
        ("compenso_servizio", req.compenso_servizio),
        ("tariffa_sosta", req.tariffa_sosta),
    ] {
        if let Some(v) = valore {
            if v.is_sign_negative() {
                return Err(AppError::BadRequest(format!("{campo} must not be negative")));
            }
        }
    }
    if let Some(tz) = &req.timezone {
        if tz.parse::<chrono_tz::Tz>().is_err() {
            return Err(AppError::BadRequest(format!("unknown timezone: {tz}")));
        }
    }

    let impostazioni = sqlx::query_as::<_, Impostazioni>(&format!(
        "UPDATE impostazioni
         SET aliquota_iva           = COALESCE($1, aliquota_iva),
             tariffa_km             = COALESCE($2, tariffa_km),
             compenso_servizio      = COALESCE($3, compenso_servizio),
             tariffa_sosta          = COALESCE($4, tariffa_sosta),
             timezone               = COALESCE($5, timezone),
             email_notifiche_attive = COALESCE($6, email_notifiche_attive),
             updated_at             = NOW()
         WHERE id = 1
         RETURNING {IMPOSTAZIONI_COLS}"
    ))
    .bind(req.aliquota_iva)
    .bind(req.tariffa_km)
    .bind(req.compenso_servizio)
    .bind(req.tariffa_sosta)
    .bind(&req.timezone)
    .bind(req.email_notifiche_attive)
    .fetch_one(&pool)
    .await?;

    invalidate_impostazioni_cache().await;
    Ok(Json(impostazioni))
}
