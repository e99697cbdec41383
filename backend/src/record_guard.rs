//! Reference validation helpers.
//!
//! Handlers call these before wiring a service (or passenger, or payslip)
//! to another record. Each check returns `AppError::NotFound` when the
//! target is missing or deactivated, so a stale id in a request fails with
//! the same error the client would get on a direct fetch.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub async fn verify_profile_attivo(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1 AND attivo = true)",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if !ok {
        return Err(AppError::NotFound("Profile not found".into()));
    }
    Ok(())
}

/// Existence without the active requirement: payroll still refers to
/// profiles that have since been deactivated.
pub async fn verify_profile(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if !ok {
        return Err(AppError::NotFound("Profile not found".into()));
    }
    Ok(())
}

pub async fn verify_azienda(pool: &PgPool, azienda_id: Uuid) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM aziende WHERE id = $1 AND attivo = true)",
    )
    .bind(azienda_id)
    .fetch_one(pool)
    .await?;

    if !ok {
        return Err(AppError::NotFound("Company not found".into()));
    }
    Ok(())
}

/// A referente always belongs to a company; when the caller supplies both,
/// the pair must match.
pub async fn verify_referente(
    pool: &PgPool,
    referente_id: Uuid,
    azienda_id: Option<Uuid>,
) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM referenti
            WHERE id = $1 AND ($2::uuid IS NULL OR azienda_id = $2)
        )
        "#,
    )
    .bind(referente_id)
    .bind(azienda_id)
    .fetch_one(pool)
    .await?;

    if !ok {
        return Err(AppError::NotFound(
            "Contact not found for that company".into(),
        ));
    }
    Ok(())
}

pub async fn verify_passeggero(pool: &PgPool, passeggero_id: Uuid) -> Result<()> {
    let ok =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM passeggeri WHERE id = $1)")
            .bind(passeggero_id)
            .fetch_one(pool)
            .await?;

    if !ok {
        return Err(AppError::NotFound("Passenger not found".into()));
    }
    Ok(())
}

pub async fn verify_veicolo(pool: &PgPool, veicolo_id: Uuid) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM veicoli WHERE id = $1 AND attivo = true)",
    )
    .bind(veicolo_id)
    .fetch_one(pool)
    .await?;

    if !ok {
        return Err(AppError::NotFound("Vehicle not found".into()));
    }
    Ok(())
}

pub async fn verify_conducente(pool: &PgPool, conducente_id: Uuid) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM conducenti_esterni WHERE id = $1 AND attivo = true)",
    )
    .bind(conducente_id)
    .fetch_one(pool)
    .await?;

    if !ok {
        return Err(AppError::NotFound("External driver not found".into()));
    }
    Ok(())
}
