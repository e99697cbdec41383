use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    api::impostazioni::carica_impostazioni,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        calendario::{oggi_in_timezone, raggruppa_per_giorno, GruppoGiorno},
        pagamento::{scorporo_iva, CategoriaPagamento},
        passeggero::Passeggero,
        servizio::{
            valida_incasso_completamento, AssegnaServizioRequest, CompletaServizioRequest,
            ConsuntivaServizioRequest, CreateServizioRequest, FirmaServizioRequest, Servizio,
            ServizioConCategoria, ServizioDettaglio, ServizioRiga, StatoServizio,
            UpdateServizioRequest,
        },
    },
    record_guard, AppState,
};

const SERVIZIO_COLS: &str = "id, data_servizio, orario_servizio, partenza, destinazione, stato, \
                             metodo_pagamento, incasso_ricevuto, km_totali, ore_sosta, \
                             consegna_contanti_a, azienda_id, referente_id, assegnato_a, \
                             conducente_esterno_id, veicolo_id, firma_url, firma_timestamp, \
                             note, created_at, updated_at";

// List/agenda projection with display names resolved. The LEFT JOINs keep
// services whose references were cleared (assignee deleted, company removed).
const RIGA_SELECT: &str = r#"
    SELECT s.id, s.data_servizio, s.orario_servizio, s.partenza, s.destinazione, s.stato,
           s.metodo_pagamento, s.incasso_ricevuto,
           s.azienda_id, a.nome AS azienda_nome,
           s.assegnato_a, p.nome || ' ' || p.cognome AS assegnato_nome,
           s.conducente_esterno_id, c.nome || ' ' || c.cognome AS conducente_nome,
           s.veicolo_id, v.targa AS veicolo_targa
    FROM servizi s
    LEFT JOIN aziende a             ON a.id = s.azienda_id
    LEFT JOIN profiles p            ON p.id = s.assegnato_a
    LEFT JOIN conducenti_esterni c  ON c.id = s.conducente_esterno_id
    LEFT JOIN veicoli v             ON v.id = s.veicolo_id
"#;

/// Row image used by the lifecycle handlers: locked with FOR UPDATE, checked,
/// then updated in the same transaction.
#[derive(sqlx::FromRow)]
struct ServizioLock {
    stato: StatoServizio,
    assegnato_a: Option<Uuid>,
    metodo_pagamento: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServizioListParams {
    pub da: Option<time::Date>,
    pub a: Option<time::Date>,
    pub stato: Option<StatoServizio>,
    pub azienda_id: Option<Uuid>,
    pub assegnato_a: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AgendaParams {
    pub da: Option<time::Date>,
    pub a: Option<time::Date>,
}

pub async fn list(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Query(params): Query<ServizioListParams>,
) -> Result<Json<Vec<ServizioConCategoria>>> {
    // Drivers only ever see their own assignments.
    let assegnato_filter = if auth.role.can_manage_fleet() {
        params.assegnato_a
    } else {
        Some(auth.id)
    };

    let righe = sqlx::query_as::<_, ServizioRiga>(&format!(
        "{RIGA_SELECT}
         WHERE ($1::date IS NULL OR s.data_servizio >= $1)
           AND ($2::date IS NULL OR s.data_servizio <= $2)
           AND ($3::stato_servizio IS NULL OR s.stato = $3)
           AND ($4::uuid IS NULL OR s.azienda_id = $4)
           AND ($5::uuid IS NULL OR s.assegnato_a = $5)
         ORDER BY s.data_servizio, s.orario_servizio, s.created_at
         LIMIT $6 OFFSET $7"
    ))
    .bind(params.da)
    .bind(params.a)
    .bind(params.stato)
    .bind(params.azienda_id)
    .bind(assegnato_filter)
    .bind(params.limit.unwrap_or(100).clamp(1, 500))
    .bind(params.offset.unwrap_or(0).max(0))
    .fetch_all(&pool)
    .await?;

    Ok(Json(
        righe.into_iter().map(ServizioConCategoria::from).collect(),
    ))
}

/// Dispatch board: services grouped by day with OGGI/DOMANI/IERI labels,
/// defaulting to the week starting today in the configured timezone.
pub async fn agenda(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Query(params): Query<AgendaParams>,
) -> Result<Json<Vec<GruppoGiorno<ServizioConCategoria>>>> {
    let impostazioni = carica_impostazioni(&pool).await?;
    let oggi = oggi_in_timezone(&impostazioni.timezone);

    let da = params.da.unwrap_or(oggi);
    let a = params
        .a
        .unwrap_or_else(|| da.saturating_add(time::Duration::days(7)));
    if a < da {
        return Err(AppError::BadRequest(
            "`a` must not be earlier than `da`".into(),
        ));
    }

    let assegnato_filter = if auth.role.can_manage_fleet() {
        None
    } else {
        Some(auth.id)
    };

    let righe = sqlx::query_as::<_, ServizioRiga>(&format!(
        "{RIGA_SELECT}
         WHERE s.data_servizio BETWEEN $1 AND $2
           AND ($3::uuid IS NULL OR s.assegnato_a = $3)
           AND s.stato NOT IN ('annullato', 'non_accettato')
         ORDER BY s.data_servizio, s.orario_servizio, s.created_at"
    ))
    .bind(da)
    .bind(a)
    .bind(assegnato_filter)
    .fetch_all(&pool)
    .await?;

    let servizi: Vec<ServizioConCategoria> = righe.into_iter().map(Into::into).collect();
    let gruppi = raggruppa_per_giorno(servizi, oggi, |s| s.servizio.data_servizio);
    Ok(Json(gruppi))
}

pub async fn get_one(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ServizioDettaglio>> {
    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "SELECT {SERVIZIO_COLS} FROM servizi WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    // A driver asking for someone else's service gets the same answer as for
    // a missing id.
    if !auth.role.can_manage_fleet() && servizio.assegnato_a != Some(auth.id) {
        return Err(AppError::NotFound("Service not found".into()));
    }

    let passeggeri = sqlx::query_as::<_, Passeggero>(
        r#"
        SELECT p.id, p.nome, p.cognome, p.telefono, p.email, p.azienda_id, p.note, p.created_at
        FROM passeggeri p
        JOIN servizi_passeggeri sp ON sp.passeggero_id = p.id
        WHERE sp.servizio_id = $1
        ORDER BY p.cognome, p.nome
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let impostazioni = carica_impostazioni(&pool).await?;
    let categoria_pagamento = CategoriaPagamento::classifica(servizio.metodo_pagamento.as_deref());
    let scorporo_incasso = servizio
        .incasso_ricevuto
        .map(|lordo| scorporo_iva(lordo, impostazioni.aliquota_iva));

    Ok(Json(ServizioDettaglio {
        servizio,
        categoria_pagamento,
        scorporo_incasso,
        passeggeri,
    }))
}

pub async fn create(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Json(req): Json<CreateServizioRequest>,
) -> Result<Json<Servizio>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    if let Some(azienda_id) = req.azienda_id {
        record_guard::verify_azienda(&pool, azienda_id).await?;
    }
    if let Some(referente_id) = req.referente_id {
        record_guard::verify_referente(&pool, referente_id, req.azienda_id).await?;
    }
    if let Some(veicolo_id) = req.veicolo_id {
        record_guard::verify_veicolo(&pool, veicolo_id).await?;
    }
    if let Some(passeggeri) = &req.passeggeri {
        for passeggero_id in passeggeri {
            record_guard::verify_passeggero(&pool, *passeggero_id).await?;
        }
    }

    let mut tx = pool.begin().await?;

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "INSERT INTO servizi (id, data_servizio, orario_servizio, partenza, destinazione,
                              metodo_pagamento, azienda_id, referente_id, veicolo_id, note)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(Uuid::new_v4())
    .bind(req.data_servizio)
    .bind(req.orario_servizio)
    .bind(req.partenza.trim())
    .bind(req.destinazione.trim())
    .bind(&req.metodo_pagamento)
    .bind(req.azienda_id)
    .bind(req.referente_id)
    .bind(req.veicolo_id)
    .bind(&req.note)
    .fetch_one(&mut *tx)
    .await?;

    for passeggero_id in req.passeggeri.iter().flatten() {
        sqlx::query(
            "INSERT INTO servizi_passeggeri (servizio_id, passeggero_id)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(servizio.id)
        .bind(passeggero_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Json(servizio))
}

pub async fn update(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateServizioRequest>,
) -> Result<Json<Servizio>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    if let Some(Some(azienda_id)) = req.azienda_id {
        record_guard::verify_azienda(&pool, azienda_id).await?;
    }
    if let Some(Some(referente_id)) = req.referente_id {
        record_guard::verify_referente(&pool, referente_id, req.azienda_id.flatten()).await?;
    }
    if let Some(Some(veicolo_id)) = req.veicolo_id {
        record_guard::verify_veicolo(&pool, veicolo_id).await?;
    }

    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    if corrente.stato.terminale() {
        return Err(AppError::Conflict(format!(
            "Service is closed ({})",
            corrente.stato.etichetta()
        )));
    }

    // Double-Option: outer None leaves the column alone, inner None clears it.
    let (metodo_set, metodo_val) = match &req.metodo_pagamento {
        Some(v) => (true, v.clone()),
        None => (false, None),
    };
    let (azienda_set, azienda_val) = match req.azienda_id {
        Some(v) => (true, v),
        None => (false, None),
    };
    let (referente_set, referente_val) = match req.referente_id {
        Some(v) => (true, v),
        None => (false, None),
    };
    let (veicolo_set, veicolo_val) = match req.veicolo_id {
        Some(v) => (true, v),
        None => (false, None),
    };
    let (note_set, note_val) = match &req.note {
        Some(v) => (true, v.clone()),
        None => (false, None),
    };

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi
         SET data_servizio    = COALESCE($2, data_servizio),
             orario_servizio  = COALESCE($3, orario_servizio),
             partenza         = COALESCE($4, partenza),
             destinazione     = COALESCE($5, destinazione),
             metodo_pagamento = CASE WHEN $6 THEN $7 ELSE metodo_pagamento END,
             azienda_id       = CASE WHEN $8 THEN $9 ELSE azienda_id END,
             referente_id     = CASE WHEN $10 THEN $11 ELSE referente_id END,
             veicolo_id       = CASE WHEN $12 THEN $13 ELSE veicolo_id END,
             note             = CASE WHEN $14 THEN $15 ELSE note END,
             updated_at       = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .bind(req.data_servizio)
    .bind(req.orario_servizio)
    .bind(&req.partenza)
    .bind(&req.destinazione)
    .bind(metodo_set)
    .bind(metodo_val)
    .bind(azienda_set)
    .bind(azienda_val)
    .bind(referente_set)
    .bind(referente_val)
    .bind(veicolo_set)
    .bind(veicolo_val)
    .bind(note_set)
    .bind(note_val)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(servizio))
}

/// Assigns (or reassigns) the service to exactly one driver, internal or
/// external, optionally updating the vehicle. Notifies internal drivers.
pub async fn assegna(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AssegnaServizioRequest>,
) -> Result<Json<Servizio>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    match (req.assegnato_a, req.conducente_esterno_id) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "assign either an internal or an external driver, not both".into(),
            ))
        }
        (None, None) => {
            return Err(AppError::BadRequest(
                "either assegnato_a or conducente_esterno_id is required".into(),
            ))
        }
        _ => {}
    }

    let pool = &state.pool;
    if let Some(user_id) = req.assegnato_a {
        record_guard::verify_profile_attivo(pool, user_id).await?;
    }
    if let Some(conducente_id) = req.conducente_esterno_id {
        record_guard::verify_conducente(pool, conducente_id).await?;
    }
    if let Some(veicolo_id) = req.veicolo_id {
        record_guard::verify_veicolo(pool, veicolo_id).await?;
    }

    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    // Reassignment of an already assigned service is allowed; anything past
    // that point is not.
    if !matches!(
        corrente.stato,
        StatoServizio::DaAssegnare | StatoServizio::Assegnato
    ) {
        return Err(AppError::Conflict(format!(
            "Service cannot be assigned from state {}",
            corrente.stato.etichetta()
        )));
    }

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi
         SET stato = 'assegnato',
             assegnato_a = $2,
             conducente_esterno_id = $3,
             veicolo_id = COALESCE($4, veicolo_id),
             updated_at = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .bind(req.assegnato_a)
    .bind(req.conducente_esterno_id)
    .bind(req.veicolo_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    // Best effort, after commit: the assignment stands even if the email
    // cannot be dispatched.
    if let Some(driver_id) = servizio.assegnato_a {
        notifica_assegnazione(&state, &servizio, driver_id).await;
    }

    Ok(Json(servizio))
}

async fn notifica_assegnazione(state: &AppState, servizio: &Servizio, driver_id: Uuid) {
    if !state.notifier.enabled() {
        return;
    }
    let attive = match carica_impostazioni(&state.pool).await {
        Ok(imp) => imp.email_notifiche_attive,
        Err(e) => {
            tracing::warn!(error = %e, "could not load settings, skipping notification");
            return;
        }
    };
    if !attive {
        return;
    }

    let email = match sqlx::query_scalar::<_, String>("SELECT email FROM profiles WHERE id = $1")
        .bind(driver_id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(email)) => email,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "could not load driver email, skipping notification");
            return;
        }
    };

    state.notifier.spawn_send(
        "servizio-assegnato",
        serde_json::json!({
            "servizio_id": servizio.id,
            "data_servizio": servizio.data_servizio.to_string(),
            "orario_servizio": format!(
                "{:02}:{:02}",
                servizio.orario_servizio.hour(),
                servizio.orario_servizio.minute()
            ),
            "partenza": servizio.partenza,
            "destinazione": servizio.destinazione,
        }),
        email,
    );
}

/// Marks an assigned service as done. Card and cash services must report the
/// collected amount here; the check runs before any write.
pub async fn completa(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CompletaServizioRequest>,
) -> Result<Json<Servizio>> {
    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    if !auth.role.can_manage_fleet() && corrente.assegnato_a != Some(auth.id) {
        return Err(AppError::NotFound("Service not found".into()));
    }
    if corrente.stato != StatoServizio::Assegnato {
        return Err(AppError::Conflict(format!(
            "Service cannot be completed from state {}",
            corrente.stato.etichetta()
        )));
    }
    valida_incasso_completamento(corrente.metodo_pagamento.as_deref(), req.incasso_ricevuto)
        .map_err(|msg| AppError::BadRequest(msg.into()))?;

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi
         SET stato = 'completato',
             incasso_ricevuto = COALESCE($2, incasso_ricevuto),
             updated_at = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .bind(req.incasso_ricevuto)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(servizio))
}

/// Settlement: records km, waiting hours and the cash hand-over, and may
/// populate the amount for company-invoiced services.
pub async fn consuntiva(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ConsuntivaServizioRequest>,
) -> Result<Json<Servizio>> {
    use validator::Validate;
    req.validate()?;

    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }
    if req.km_totali.is_sign_negative() {
        return Err(AppError::BadRequest("km_totali must not be negative".into()));
    }
    if let Some(ore) = req.ore_sosta {
        if ore.is_sign_negative() {
            return Err(AppError::BadRequest("ore_sosta must not be negative".into()));
        }
    }
    if let Some(incasso) = req.incasso_ricevuto {
        if incasso <= Decimal::ZERO {
            return Err(AppError::BadRequest(
                "incasso_ricevuto must be greater than zero".into(),
            ));
        }
    }

    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    if corrente.stato != StatoServizio::Completato {
        return Err(AppError::Conflict(format!(
            "Service cannot be settled from state {}",
            corrente.stato.etichetta()
        )));
    }

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi
         SET stato = 'consuntivato',
             km_totali = $2,
             ore_sosta = COALESCE($3, ore_sosta),
             incasso_ricevuto = COALESCE($4, incasso_ricevuto),
             consegna_contanti_a = COALESCE($5, consegna_contanti_a),
             updated_at = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .bind(req.km_totali)
    .bind(req.ore_sosta)
    .bind(req.incasso_ricevuto)
    .bind(&req.consegna_contanti_a)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(servizio))
}

pub async fn annulla(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Servizio>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    if !corrente.stato.puo_transire(StatoServizio::Annullato) {
        return Err(AppError::Conflict(format!(
            "Service cannot be cancelled from state {}",
            corrente.stato.etichetta()
        )));
    }

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi SET stato = 'annullato', updated_at = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(servizio))
}

/// The assigned driver turns the job down; dispatch sees it in the refused
/// bucket and starts over with a new service.
pub async fn rifiuta(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Servizio>> {
    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    if !auth.role.can_manage_fleet() && corrente.assegnato_a != Some(auth.id) {
        return Err(AppError::NotFound("Service not found".into()));
    }
    if !corrente.stato.puo_transire(StatoServizio::NonAccettato) {
        return Err(AppError::Conflict(format!(
            "Service cannot be refused from state {}",
            corrente.stato.etichetta()
        )));
    }

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi SET stato = 'non_accettato', updated_at = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(servizio))
}

/// Attaches the customer signature evidence captured on the driver's device.
/// The image itself lives in object storage; only its URL passes through.
pub async fn firma(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<FirmaServizioRequest>,
) -> Result<Json<Servizio>> {
    if req.firma_url.trim().is_empty() {
        return Err(AppError::BadRequest("firma_url is required".into()));
    }

    let mut tx = pool.begin().await?;

    let corrente = sqlx::query_as::<_, ServizioLock>(
        "SELECT stato, assegnato_a, metodo_pagamento FROM servizi WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Service not found".into()))?;

    if !auth.role.can_manage_fleet() && corrente.assegnato_a != Some(auth.id) {
        return Err(AppError::NotFound("Service not found".into()));
    }
    if matches!(
        corrente.stato,
        StatoServizio::Annullato | StatoServizio::NonAccettato
    ) {
        return Err(AppError::Conflict(
            "Cancelled or refused services cannot be signed".into(),
        ));
    }

    let firmato_il = req.firma_timestamp.unwrap_or_else(OffsetDateTime::now_utc);

    let servizio = sqlx::query_as::<_, Servizio>(&format!(
        "UPDATE servizi SET firma_url = $2, firma_timestamp = $3, updated_at = NOW()
         WHERE id = $1
         RETURNING {SERVIZIO_COLS}"
    ))
    .bind(id)
    .bind(req.firma_url.trim())
    .bind(firmato_il)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(servizio))
}

/// Removes the service and its passenger links in one transaction.
pub async fn delete(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let mut tx = pool.begin().await?;

    // 1. Drop the passenger links
    sqlx::query("DELETE FROM servizi_passeggeri WHERE servizio_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    // 2. Drop the service itself
    let result = sqlx::query("DELETE FROM servizi WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Service not found".into()));
    }

    tx.commit().await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn add_passeggero(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<crate::models::passeggero::AggiungiPasseggeroRequest>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let esiste = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM servizi WHERE id = $1)")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    if !esiste {
        return Err(AppError::NotFound("Service not found".into()));
    }
    record_guard::verify_passeggero(&pool, req.passeggero_id).await?;

    sqlx::query(
        "INSERT INTO servizi_passeggeri (servizio_id, passeggero_id)
         VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(id)
    .bind(req.passeggero_id)
    .execute(&pool)
    .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn remove_passeggero(
    State(pool): State<PgPool>,
    auth: AuthUser,
    Path((id, passeggero_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_fleet() {
        return Err(AppError::Forbidden);
    }

    let result =
        sqlx::query("DELETE FROM servizi_passeggeri WHERE servizio_id = $1 AND passeggero_id = $2")
            .bind(id)
            .bind(passeggero_id)
            .execute(&pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Passenger is not linked to that service".into(),
        ));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
