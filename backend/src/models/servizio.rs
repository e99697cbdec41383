use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::pagamento::{CategoriaPagamento, ScorporoIva};
use crate::models::passeggero::Passeggero;

/// Service lifecycle. `consuntivato`, `annullato` and `non_accettato` are
/// absorbing: nothing moves out of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "stato_servizio", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatoServizio {
    DaAssegnare,
    Assegnato,
    Completato,
    Consuntivato,
    Annullato,
    NonAccettato,
}

impl StatoServizio {
    /// States legally reachable from this one.
    pub fn transizioni(&self) -> &'static [StatoServizio] {
        match self {
            Self::DaAssegnare => &[Self::Assegnato, Self::Annullato],
            Self::Assegnato => &[Self::Completato, Self::Annullato, Self::NonAccettato],
            Self::Completato => &[Self::Consuntivato],
            Self::Consuntivato | Self::Annullato | Self::NonAccettato => &[],
        }
    }

    pub fn puo_transire(&self, verso: StatoServizio) -> bool {
        self.transizioni().contains(&verso)
    }

    pub fn terminale(&self) -> bool {
        self.transizioni().is_empty()
    }

    pub fn etichetta(&self) -> &'static str {
        match self {
            Self::DaAssegnare => "Da assegnare",
            Self::Assegnato => "Assegnato",
            Self::Completato => "Completato",
            Self::Consuntivato => "Consuntivato",
            Self::Annullato => "Annullato",
            Self::NonAccettato => "Non accettato",
        }
    }
}

/// Completing a card or cash service requires the collected amount;
/// company-invoiced services may leave it empty.
pub fn valida_incasso_completamento(
    metodo: Option<&str>,
    incasso: Option<Decimal>,
) -> Result<(), &'static str> {
    let categoria = CategoriaPagamento::classifica(metodo);
    if !categoria.richiede_conferma_incasso() {
        return Ok(());
    }
    match incasso {
        Some(v) if v > Decimal::ZERO => Ok(()),
        _ => Err("incasso_ricevuto is required and must be greater than zero for card and cash services"),
    }
}

/// Full service record as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Servizio {
    pub id: Uuid,
    pub data_servizio: time::Date,
    pub orario_servizio: time::Time,
    pub partenza: String,
    pub destinazione: String,
    pub stato: StatoServizio,
    pub metodo_pagamento: Option<String>,
    pub incasso_ricevuto: Option<Decimal>,
    pub km_totali: Option<Decimal>,
    pub ore_sosta: Option<Decimal>,
    pub consegna_contanti_a: Option<String>,
    pub azienda_id: Option<Uuid>,
    pub referente_id: Option<Uuid>,
    pub assegnato_a: Option<Uuid>,
    pub conducente_esterno_id: Option<Uuid>,
    pub veicolo_id: Option<Uuid>,
    pub firma_url: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub firma_timestamp: Option<OffsetDateTime>,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// List/agenda row with display names populated from joins.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServizioRiga {
    pub id: Uuid,
    pub data_servizio: time::Date,
    pub orario_servizio: time::Time,
    pub partenza: String,
    pub destinazione: String,
    pub stato: StatoServizio,
    pub metodo_pagamento: Option<String>,
    pub incasso_ricevuto: Option<Decimal>,
    pub azienda_id: Option<Uuid>,
    pub azienda_nome: Option<String>,
    pub assegnato_a: Option<Uuid>,
    pub assegnato_nome: Option<String>,
    pub conducente_esterno_id: Option<Uuid>,
    pub conducente_nome: Option<String>,
    pub veicolo_id: Option<Uuid>,
    pub veicolo_targa: Option<String>,
}

/// List row plus the payment category derived from the free-text label.
#[derive(Debug, Serialize)]
pub struct ServizioConCategoria {
    #[serde(flatten)]
    pub servizio: ServizioRiga,
    pub categoria_pagamento: CategoriaPagamento,
}

impl From<ServizioRiga> for ServizioConCategoria {
    fn from(servizio: ServizioRiga) -> Self {
        let categoria_pagamento =
            CategoriaPagamento::classifica(servizio.metodo_pagamento.as_deref());
        Self {
            servizio,
            categoria_pagamento,
        }
    }
}

/// Detail response: the record, its derived payment category, the VAT
/// decomposition of the collected amount (display only) and the passengers.
#[derive(Debug, Serialize)]
pub struct ServizioDettaglio {
    #[serde(flatten)]
    pub servizio: Servizio,
    pub categoria_pagamento: CategoriaPagamento,
    pub scorporo_incasso: Option<ScorporoIva>,
    pub passeggeri: Vec<Passeggero>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServizioRequest {
    pub data_servizio: time::Date,
    pub orario_servizio: time::Time,
    #[validate(length(min = 1, max = 300, message = "partenza is required"))]
    pub partenza: String,
    #[validate(length(min = 1, max = 300, message = "destinazione is required"))]
    pub destinazione: String,
    #[validate(length(max = 100))]
    pub metodo_pagamento: Option<String>,
    pub azienda_id: Option<Uuid>,
    pub referente_id: Option<Uuid>,
    pub veicolo_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    /// Passengers to link at creation.
    pub passeggeri: Option<Vec<Uuid>>,
}

/// Partial update of the descriptive fields. Double-Option distinguishes
/// "not sent" from "clear this field".
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateServizioRequest {
    pub data_servizio: Option<time::Date>,
    pub orario_servizio: Option<time::Time>,
    #[validate(length(min = 1, max = 300))]
    pub partenza: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub destinazione: Option<String>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub metodo_pagamento: Option<Option<String>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub azienda_id: Option<Option<Uuid>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub referente_id: Option<Option<Uuid>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub veicolo_id: Option<Option<Uuid>>,
    #[serde(default, with = "crate::models::serde_util::double_option")]
    pub note: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AssegnaServizioRequest {
    /// Exactly one of `assegnato_a` (internal driver) or
    /// `conducente_esterno_id` must be set.
    pub assegnato_a: Option<Uuid>,
    pub conducente_esterno_id: Option<Uuid>,
    pub veicolo_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CompletaServizioRequest {
    pub incasso_ricevuto: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConsuntivaServizioRequest {
    pub km_totali: Decimal,
    pub ore_sosta: Option<Decimal>,
    pub incasso_ricevuto: Option<Decimal>,
    #[validate(length(max = 200))]
    pub consegna_contanti_a: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FirmaServizioRequest {
    pub firma_url: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub firma_timestamp: Option<OffsetDateTime>,
}
