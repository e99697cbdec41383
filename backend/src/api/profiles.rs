use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use rand_core::OsRng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    error::{AppError, Result},
    models::profile::{CreateProfileRequest, ProfileView, UpdateProfileRequest},
};

#[derive(Debug, serde::Deserialize)]
pub struct ProfileListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub include_inactive: Option<bool>,
}

impl ProfileListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 500)
    }
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

const PROFILE_VIEW_COLS: &str =
    "id, nome, cognome, email, telefono, role, data_assunzione, attivo";

pub async fn list(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Query(params): Query<ProfileListParams>,
) -> Result<Json<Vec<ProfileView>>> {
    // Everyone sees the roster (needed for the shift calendar); only staff
    // may include deactivated accounts.
    let active_only = !params.include_inactive.unwrap_or(false) || !auth.role.can_manage_users();

    let profiles = sqlx::query_as::<_, ProfileView>(&format!(
        "SELECT {PROFILE_VIEW_COLS}
         FROM profiles
         WHERE ($1 = false OR attivo = true)
         ORDER BY cognome, nome
         LIMIT $2 OFFSET $3"
    ))
    .bind(active_only)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(profiles))
}

pub async fn get_one(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileView>> {
    if !auth.role.can_manage_users() && auth.id != id {
        return Err(AppError::Forbidden);
    }

    let profile = sqlx::query_as::<_, ProfileView>(&format!(
        "SELECT {PROFILE_VIEW_COLS} FROM profiles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(Json(profile))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateProfileRequest>,
) -> Result<Json<ProfileView>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_users() {
        return Err(AppError::Forbidden);
    }
    // Partners may hire employees but not mint admins.
    if req.role.is_admin() && !auth.role.is_admin() {
        return Err(AppError::Forbidden);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?
        .to_string();

    let profile = sqlx::query_as::<_, ProfileView>(&format!(
        "INSERT INTO profiles (id, nome, cognome, email, telefono, password_hash, role, data_assunzione)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {PROFILE_VIEW_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(&req.email)
    .bind(&req.telefono)
    .bind(&hash)
    .bind(req.role)
    .bind(req.data_assunzione)
    .fetch_one(&pool)
    .await?;

    Ok(Json(profile))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileView>> {
    use validator::Validate;
    req.validate()?;

    // Employees may edit their own contact data; role changes are admin-only.
    let self_edit = auth.id == id;
    if !auth.role.can_manage_users() && !self_edit {
        return Err(AppError::Forbidden);
    }
    if req.role.is_some() && !auth.role.is_admin() {
        return Err(AppError::Forbidden);
    }

    // Prevent self-demotion
    if self_edit {
        if let Some(new_role) = &req.role {
            if !new_role.is_admin() {
                return Err(AppError::BadRequest(
                    "Cannot change your own role. Another admin must do this.".into(),
                ));
            }
        }
    }

    // Prevent demoting the last admin
    if let Some(new_role) = &req.role {
        if !new_role.is_admin() {
            let admin_count = conta_admin_attivi(&pool).await?;
            if admin_count <= 1 {
                let target_is_admin = sqlx::query_scalar::<_, bool>(
                    "SELECT role = 'admin' FROM profiles WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&pool)
                .await?
                .unwrap_or(false);
                if target_is_admin {
                    return Err(AppError::BadRequest(
                        "Cannot remove the last admin. Promote another user to admin first.".into(),
                    ));
                }
            }
        }
    }

    let password_hash = match &req.password {
        Some(password) => {
            let salt = SaltString::generate(&mut OsRng);
            Some(
                Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| {
                        AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e))
                    })?
                    .to_string(),
            )
        }
        None => None,
    };

    // Double-Option nullable fields:
    //   None         => field not sent, keep existing  ($provided = false)
    //   Some(None)   => explicitly null, clear value   ($provided = true, $value = NULL)
    //   Some(Some(v))=> set to v                       ($provided = true, $value = v)
    let telefono_provided = req.telefono.is_some();
    let telefono_val = req.telefono.clone().flatten();
    let assunzione_provided = req.data_assunzione.is_some();
    let assunzione_val = req.data_assunzione.flatten();

    let profile = sqlx::query_as::<_, ProfileView>(&format!(
        "UPDATE profiles
         SET nome            = COALESCE($2, nome),
             cognome         = COALESCE($3, cognome),
             email           = COALESCE($4, email),
             telefono        = CASE WHEN $5 THEN $6 ELSE telefono END,
             role            = COALESCE($7, role),
             data_assunzione = CASE WHEN $8 THEN $9 ELSE data_assunzione END,
             password_hash   = COALESCE($10, password_hash),
             updated_at      = NOW()
         WHERE id = $1
         RETURNING {PROFILE_VIEW_COLS}"
    ))
    .bind(id)
    .bind(&req.nome)
    .bind(&req.cognome)
    .bind(&req.email)
    .bind(telefono_provided)
    .bind(&telefono_val)
    .bind(req.role)
    .bind(assunzione_provided)
    .bind(assunzione_val)
    .bind(&password_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(Json(profile))
}

pub async fn deactivate(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.is_admin() {
        return Err(AppError::Forbidden);
    }

    // Prevent self-deactivation
    if auth.id == id {
        return Err(AppError::BadRequest(
            "Cannot deactivate your own account. Another admin must do this.".into(),
        ));
    }

    let target_role = sqlx::query_scalar::<_, Role>("SELECT role FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    if target_role.is_admin() && conta_admin_attivi(&pool).await? <= 1 {
        return Err(AppError::BadRequest(
            "Cannot deactivate the last admin. Promote another user to admin first.".into(),
        ));
    }

    let rows = sqlx::query("UPDATE profiles SET attivo = false, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("Profile not found".into()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Hard delete. Dependent shifts and expenses go in the same transaction;
/// payroll history blocks the delete, services keep their rows and lose the
/// assignee via ON DELETE SET NULL.
pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.is_admin() {
        return Err(AppError::Forbidden);
    }
    if auth.id == id {
        return Err(AppError::BadRequest(
            "Cannot delete your own account. Another admin must do this.".into(),
        ));
    }

    let stipendi = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM stipendi WHERE user_id = $1",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;
    if stipendi > 0 {
        return Err(AppError::Conflict(
            "Profile has payroll history; deactivate it instead".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM shifts WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM spese_personali WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let rows = sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(AppError::NotFound("Profile not found".into()));
    }

    tx.commit().await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn conta_admin_attivi(pool: &PgPool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM profiles WHERE role = 'admin' AND attivo = true",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}
