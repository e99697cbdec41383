use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    api::impostazioni::carica_impostazioni,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        calendario::{etichetta_giorno, griglia_mese, oggi_in_timezone, CellaGiorno},
        shift::{legenda, Shift, TurnoBadge, UpsertShiftRequest, VoceLegenda},
    },
    record_guard,
};

const SHIFT_COLS: &str =
    "id, user_id, data, tipo, periodo, orario_inizio, orario_fine, note, created_at, updated_at";

/// Shift plus the resolved description used by deletion confirmation prompts.
#[derive(Debug, Serialize)]
pub struct ShiftRisposta {
    #[serde(flatten)]
    pub turno: Shift,
    pub descrizione: String,
}

impl ShiftRisposta {
    fn nuova(turno: Shift, oggi: time::Date) -> Self {
        let descrizione = format!(
            "{} - {}",
            turno.descrizione_breve(),
            etichetta_giorno(turno.data, oggi)
        );
        Self { turno, descrizione }
    }
}

#[derive(Debug, Deserialize)]
pub struct ShiftListParams {
    pub da: Option<time::Date>,
    pub a: Option<time::Date>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarioParams {
    pub anno: i32,
    pub mese: u8,
    pub user_id: Option<Uuid>,
}

/// One grid slot of the month view with the badges that fall on it.
#[derive(Debug, Serialize)]
pub struct CellaConTurni {
    #[serde(flatten)]
    pub cella: CellaGiorno,
    pub turni: Vec<TurnoBadge>,
}

#[derive(Debug, Serialize)]
pub struct CalendarioRisposta {
    pub anno: i32,
    pub mese: u8,
    pub celle: Vec<CellaConTurni>,
    pub legenda: Vec<VoceLegenda>,
}

// The planning roster is shared: every driver sees who is on duty.
pub async fn list(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Query(params): Query<ShiftListParams>,
) -> Result<Json<Vec<ShiftRisposta>>> {
    let turni = sqlx::query_as::<_, Shift>(&format!(
        "SELECT {SHIFT_COLS} FROM shifts
         WHERE ($1::date IS NULL OR data >= $1)
           AND ($2::date IS NULL OR data <= $2)
           AND ($3::uuid IS NULL OR user_id = $3)
         ORDER BY data, created_at"
    ))
    .bind(params.da)
    .bind(params.a)
    .bind(params.user_id)
    .fetch_all(&pool)
    .await?;

    let impostazioni = carica_impostazioni(&pool).await?;
    let oggi = oggi_in_timezone(&impostazioni.timezone);
    Ok(Json(
        turni
            .into_iter()
            .map(|t| ShiftRisposta::nuova(t, oggi))
            .collect(),
    ))
}

/// Plans a day. One shift per driver per day: writing over an existing day
/// replaces its category, period, hours and note.
pub async fn upsert(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<UpsertShiftRequest>,
) -> Result<Json<ShiftRisposta>> {
    use validator::Validate;
    req.validate()?;

    let target = req.user_id.unwrap_or(auth.id);
    if target != auth.id {
        if !auth.role.can_manage_fleet() {
            return Err(AppError::Forbidden);
        }
        record_guard::verify_profile_attivo(&pool, target).await?;
    }

    match (req.tipo.richiede_periodo(), req.periodo) {
        (true, None) => {
            return Err(AppError::BadRequest(
                "periodo is required for mezza_giornata".into(),
            ))
        }
        (false, Some(_)) => {
            return Err(AppError::BadRequest(
                "periodo only applies to mezza_giornata".into(),
            ))
        }
        _ => {}
    }
    if req.tipo.richiede_orari() {
        let (Some(inizio), Some(fine)) = (req.orario_inizio, req.orario_fine) else {
            return Err(AppError::BadRequest(
                "orario_inizio and orario_fine are required for orari_specifici".into(),
            ));
        };
        if fine <= inizio {
            return Err(AppError::BadRequest(
                "orario_fine must be after orario_inizio".into(),
            ));
        }
    } else if req.orario_inizio.is_some() || req.orario_fine.is_some() {
        return Err(AppError::BadRequest(
            "orario_inizio/orario_fine only apply to orari_specifici".into(),
        ));
    }

    let turno = sqlx::query_as::<_, Shift>(&format!(
        "INSERT INTO shifts (id, user_id, data, tipo, periodo, orario_inizio, orario_fine, note)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (user_id, data) DO UPDATE
         SET tipo = EXCLUDED.tipo,
             periodo = EXCLUDED.periodo,
             orario_inizio = EXCLUDED.orario_inizio,
             orario_fine = EXCLUDED.orario_fine,
             note = EXCLUDED.note,
             updated_at = NOW()
         RETURNING {SHIFT_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(target)
    .bind(req.data)
    .bind(req.tipo)
    .bind(req.periodo)
    .bind(req.orario_inizio)
    .bind(req.orario_fine)
    .bind(&req.note)
    .fetch_one(&pool)
    .await?;

    let impostazioni = carica_impostazioni(&pool).await?;
    let oggi = oggi_in_timezone(&impostazioni.timezone);
    Ok(Json(ShiftRisposta::nuova(turno, oggi)))
}

pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let turno = sqlx::query_as::<_, Shift>(&format!("SELECT {SHIFT_COLS} FROM shifts WHERE id = $1"))
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Shift not found".into()))?;

    if turno.user_id != auth.id && !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM shifts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    let impostazioni = carica_impostazioni(&pool).await?;
    let oggi = oggi_in_timezone(&impostazioni.timezone);
    let eliminato = ShiftRisposta::nuova(turno, oggi);
    Ok(Json(serde_json::json!({
        "ok": true,
        "descrizione": eliminato.descrizione,
    })))
}

/// Month grid with one badge per planned driver-day, plus the fixed legend.
/// Filler days of the adjacent months carry their badges too.
pub async fn calendario(
    State(pool): State<PgPool>,
    _auth: AuthUser,
    Query(params): Query<CalendarioParams>,
) -> Result<Json<CalendarioRisposta>> {
    let impostazioni = carica_impostazioni(&pool).await?;
    let oggi = oggi_in_timezone(&impostazioni.timezone);

    let celle = griglia_mese(params.anno, params.mese, oggi).ok_or_else(|| {
        AppError::BadRequest(format!(
            "invalid calendar month {}/{}",
            params.mese, params.anno
        ))
    })?;

    // The grid is never empty: it always holds at least the month itself.
    let da = celle.first().map(|c| c.data).unwrap_or(oggi);
    let a = celle.last().map(|c| c.data).unwrap_or(oggi);

    let turni = sqlx::query_as::<_, Shift>(
        r#"
        SELECT s.id, s.user_id, s.data, s.tipo, s.periodo, s.orario_inizio, s.orario_fine,
               s.note, s.created_at, s.updated_at
        FROM shifts s
        JOIN profiles p ON p.id = s.user_id
        WHERE s.data BETWEEN $1 AND $2
          AND ($3::uuid IS NULL OR s.user_id = $3)
        ORDER BY s.data, p.cognome, p.nome
        "#,
    )
    .bind(da)
    .bind(a)
    .bind(params.user_id)
    .fetch_all(&pool)
    .await?;

    let mut per_giorno: BTreeMap<time::Date, Vec<TurnoBadge>> = BTreeMap::new();
    for turno in &turni {
        per_giorno
            .entry(turno.data)
            .or_default()
            .push(TurnoBadge::from(turno));
    }

    let celle = celle
        .into_iter()
        .map(|cella| CellaConTurni {
            turni: per_giorno.remove(&cella.data).unwrap_or_default(),
            cella,
        })
        .collect();

    Ok(Json(CalendarioRisposta {
        anno: params.anno,
        mese: params.mese,
        celle,
        legenda: legenda(),
    }))
}
