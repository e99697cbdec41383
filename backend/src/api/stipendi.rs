use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    api::impostazioni::carica_impostazioni,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        calendario::oggi_in_timezone,
        common::MeseParams,
        shift::TipoTurno,
        stipendio::{
            calcola_totali, CambioStatoStipendioRequest, GeneraStipendioRequest, StatoStipendio,
            Stipendio, StipendioRiga, TotaliStipendio, TransizioneStipendio, VoceServizio,
        },
    },
    record_guard,
};

const STIPENDIO_COLS: &str = "id, user_id, mese, anno, stato, giorni_lavorati, km_totali, \
                              numero_servizi, ore_sosta_totali, compenso_km, compenso_servizi, \
                              compenso_sosta, totale, movimento_id, created_at, updated_at";

// Derivation inputs, shared by generation and the revert-to-draft recompute.
const TURNI_MESE_SQL: &str = "SELECT tipo FROM shifts WHERE user_id = $1 AND data BETWEEN $2 AND $3";
const VOCI_MESE_SQL: &str = "SELECT COALESCE(km_totali, 0) AS km_totali, \
                                    COALESCE(ore_sosta, 0) AS ore_sosta \
                             FROM servizi \
                             WHERE assegnato_a = $1 AND stato = 'consuntivato' \
                               AND data_servizio BETWEEN $2 AND $3";

fn intervallo_mese(mese: i32, anno: i32) -> Result<(time::Date, time::Date)> {
    let mese = u8::try_from(mese)
        .ok()
        .and_then(|m| time::Month::try_from(m).ok())
        .ok_or_else(|| AppError::BadRequest("mese must be between 1 and 12".into()))?;
    let dal = time::Date::from_calendar_date(anno, mese, 1)
        .map_err(|e| AppError::BadRequest(format!("invalid month: {e}")))?;
    let al = time::Date::from_calendar_date(anno, mese, time::util::days_in_year_month(anno, mese))
        .map_err(|e| AppError::BadRequest(format!("invalid month: {e}")))?;
    Ok((dal, al))
}

pub async fn list(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Query(params): Query<MeseParams>,
) -> Result<Json<Vec<StipendioRiga>>> {
    // Employees see their own payslips only.
    let user_filter = if auth.role.can_manage_payroll() {
        params.user_id
    } else {
        Some(auth.id)
    };

    let righe = sqlx::query_as::<_, StipendioRiga>(
        r#"
        SELECT st.id, st.user_id, p.nome, p.cognome, st.mese, st.anno, st.stato,
               st.giorni_lavorati, st.totale
        FROM stipendi st
        JOIN profiles p ON p.id = st.user_id
        WHERE ($1::int IS NULL OR st.mese = $1)
          AND ($2::int IS NULL OR st.anno = $2)
          AND ($3::uuid IS NULL OR st.user_id = $3)
        ORDER BY st.anno DESC, st.mese DESC, p.cognome, p.nome
        "#,
    )
    .bind(params.mese)
    .bind(params.anno)
    .bind(user_filter)
    .fetch_all(&pool)
    .await?;

    Ok(Json(righe))
}

pub async fn get_one(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Stipendio>> {
    let stipendio = sqlx::query_as::<_, Stipendio>(&format!(
        "SELECT {STIPENDIO_COLS} FROM stipendi WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Payslip not found".into()))?;

    if !auth.role.can_manage_payroll() && stipendio.user_id != auth.id {
        return Err(AppError::NotFound("Payslip not found".into()));
    }

    Ok(Json(stipendio))
}

/// The transitions legally available from the payslip's current state, with
/// the descriptions the UI shows before asking for confirmation.
pub async fn transizioni(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransizioneStipendio>>> {
    let stipendio = sqlx::query_as::<_, Stipendio>(&format!(
        "SELECT {STIPENDIO_COLS} FROM stipendi WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Payslip not found".into()))?;

    if !auth.role.can_manage_payroll() && stipendio.user_id != auth.id {
        return Err(AppError::NotFound("Payslip not found".into()));
    }

    Ok(Json(stipendio.stato.transizioni_disponibili().to_vec()))
}

/// Generates (or regenerates) the draft payslip for an employee and month
/// from the month's shifts and settled services at the current rates.
/// A confirmed or paid month cannot be regenerated.
pub async fn genera(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<GeneraStipendioRequest>,
) -> Result<Json<Stipendio>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_payroll() {
        return Err(AppError::Forbidden);
    }
    // Former employees keep their payroll history; existence is enough here.
    record_guard::verify_profile(&pool, req.user_id).await?;

    let (dal, al) = intervallo_mese(req.mese, req.anno)?;

    let turni_fut = sqlx::query_scalar::<_, TipoTurno>(TURNI_MESE_SQL)
        .bind(req.user_id)
        .bind(dal)
        .bind(al)
        .fetch_all(&pool);
    let voci_fut = sqlx::query_as::<_, VoceServizio>(VOCI_MESE_SQL)
        .bind(req.user_id)
        .bind(dal)
        .bind(al)
        .fetch_all(&pool);
    let (turni, voci) = futures::try_join!(turni_fut, voci_fut)?;

    let impostazioni = carica_impostazioni(&pool).await?;
    let totali = calcola_totali(&turni, &voci, &impostazioni.tariffe());

    // Regenerating overwrites drafts only; the row-level WHERE turns a
    // confirmed or paid month into a no-op we report as a conflict.
    let stipendio = sqlx::query_as::<_, Stipendio>(&format!(
        "INSERT INTO stipendi (id, user_id, mese, anno, stato, giorni_lavorati, km_totali,
                               numero_servizi, ore_sosta_totali, compenso_km, compenso_servizi,
                               compenso_sosta, totale)
         VALUES ($1, $2, $3, $4, 'bozza', $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (user_id, mese, anno) DO UPDATE
         SET giorni_lavorati = EXCLUDED.giorni_lavorati,
             km_totali = EXCLUDED.km_totali,
             numero_servizi = EXCLUDED.numero_servizi,
             ore_sosta_totali = EXCLUDED.ore_sosta_totali,
             compenso_km = EXCLUDED.compenso_km,
             compenso_servizi = EXCLUDED.compenso_servizi,
             compenso_sosta = EXCLUDED.compenso_sosta,
             totale = EXCLUDED.totale,
             updated_at = NOW()
         WHERE stipendi.stato = 'bozza'
         RETURNING {STIPENDIO_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(req.user_id)
    .bind(req.mese)
    .bind(req.anno)
    .bind(totali.giorni_lavorati)
    .bind(totali.km_totali)
    .bind(totali.numero_servizi)
    .bind(totali.ore_sosta_totali)
    .bind(totali.compenso_km)
    .bind(totali.compenso_servizi)
    .bind(totali.compenso_sosta)
    .bind(totali.totale)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| {
        AppError::Conflict(format!(
            "Payslip for {:02}/{} is already confirmed or paid",
            req.mese, req.anno
        ))
    })?;

    Ok(Json(stipendio))
}

pub async fn cambia_stato(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CambioStatoStipendioRequest>,
) -> Result<Json<Stipendio>> {
    if !auth.role.can_manage_payroll() {
        return Err(AppError::Forbidden);
    }

    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, Stipendio>(&format!(
        "SELECT {STIPENDIO_COLS} FROM stipendi WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Payslip not found".into()))?;

    if !corrente.stato.puo_transire(req.stato) {
        return Err(AppError::Conflict(format!(
            "Payslip in state {} cannot move to {}",
            corrente.stato.etichetta(),
            req.stato.etichetta()
        )));
    }

    let stipendio = match req.stato {
        StatoStipendio::Confermato => {
            sqlx::query_as::<_, Stipendio>(&format!(
                "UPDATE stipendi SET stato = 'confermato', updated_at = NOW()
                 WHERE id = $1
                 RETURNING {STIPENDIO_COLS}"
            ))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        }
        StatoStipendio::Pagato => paga(&pool, &mut tx, &corrente).await?,
        StatoStipendio::Bozza => riporta_in_bozza(&pool, &mut tx, &corrente).await?,
    };

    tx.commit().await?;
    Ok(Json(stipendio))
}

/// Marks the payslip paid and writes the linked expense row to the company
/// ledger in the same transaction.
async fn paga(
    pool: &PgPool,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    corrente: &Stipendio,
) -> Result<Stipendio> {
    let impostazioni = carica_impostazioni(pool).await?;
    let oggi = oggi_in_timezone(&impostazioni.timezone);

    let (nome, cognome) =
        sqlx::query_as::<_, (String, String)>("SELECT nome, cognome FROM profiles WHERE id = $1")
            .bind(corrente.user_id)
            .fetch_one(&mut **tx)
            .await?;

    // 1. Ledger entry for the payment
    let movimento_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO movimenti_aziendali (id, data, tipo, categoria, importo, descrizione, stipendio_id)
         VALUES ($1, $2, 'uscita', 'stipendi', $3, $4, $5)",
    )
    .bind(movimento_id)
    .bind(oggi)
    .bind(corrente.totale)
    .bind(format!(
        "Stipendio {:02}/{} {} {}",
        corrente.mese, corrente.anno, nome, cognome
    ))
    .bind(corrente.id)
    .execute(&mut **tx)
    .await?;

    // 2. The payslip points back at its ledger entry
    let stipendio = sqlx::query_as::<_, Stipendio>(&format!(
        "UPDATE stipendi SET stato = 'pagato', movimento_id = $2, updated_at = NOW()
         WHERE id = $1
         RETURNING {STIPENDIO_COLS}"
    ))
    .bind(corrente.id)
    .bind(movimento_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stipendio)
}

/// Reopens a confirmed payslip. The confirmed figures are discarded and
/// rederived from the shift and service rows as they stand today.
async fn riporta_in_bozza(
    pool: &PgPool,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    corrente: &Stipendio,
) -> Result<Stipendio> {
    let (dal, al) = intervallo_mese(corrente.mese, corrente.anno)?;

    let turni = sqlx::query_scalar::<_, TipoTurno>(TURNI_MESE_SQL)
        .bind(corrente.user_id)
        .bind(dal)
        .bind(al)
        .fetch_all(&mut **tx)
        .await?;
    let voci = sqlx::query_as::<_, VoceServizio>(VOCI_MESE_SQL)
        .bind(corrente.user_id)
        .bind(dal)
        .bind(al)
        .fetch_all(&mut **tx)
        .await?;

    let impostazioni = carica_impostazioni(pool).await?;
    let totali: TotaliStipendio = calcola_totali(&turni, &voci, &impostazioni.tariffe());

    let stipendio = sqlx::query_as::<_, Stipendio>(&format!(
        "UPDATE stipendi
         SET stato = 'bozza',
             giorni_lavorati = $2,
             km_totali = $3,
             numero_servizi = $4,
             ore_sosta_totali = $5,
             compenso_km = $6,
             compenso_servizi = $7,
             compenso_sosta = $8,
             totale = $9,
             updated_at = NOW()
         WHERE id = $1
         RETURNING {STIPENDIO_COLS}"
    ))
    .bind(corrente.id)
    .bind(totali.giorni_lavorati)
    .bind(totali.km_totali)
    .bind(totali.numero_servizi)
    .bind(totali.ore_sosta_totali)
    .bind(totali.compenso_km)
    .bind(totali.compenso_servizi)
    .bind(totali.compenso_sosta)
    .bind(totali.totale)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stipendio)
}
