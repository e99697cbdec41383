use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::shift::TipoTurno;

/// Payslip lifecycle: editable draft, confirmed (amounts frozen), paid
/// (ledger entry written, immutable).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "stato_stipendio", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatoStipendio {
    Bozza,
    Confermato,
    Pagato,
}

/// One offered transition, with the text the UI shows before asking for
/// confirmation. `warning` marks transitions that discard confirmed data.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransizioneStipendio {
    pub stato: StatoStipendio,
    pub etichetta: &'static str,
    pub descrizione: &'static str,
    pub warning: bool,
}

const DA_BOZZA: &[TransizioneStipendio] = &[TransizioneStipendio {
    stato: StatoStipendio::Confermato,
    etichetta: "Conferma",
    descrizione: "Congela gli importi calcolati per il mese.",
    warning: false,
}];

const DA_CONFERMATO: &[TransizioneStipendio] = &[
    TransizioneStipendio {
        stato: StatoStipendio::Pagato,
        etichetta: "Segna come pagato",
        descrizione: "Registra il pagamento e crea il movimento aziendale collegato.",
        warning: false,
    },
    TransizioneStipendio {
        stato: StatoStipendio::Bozza,
        etichetta: "Riporta in bozza",
        descrizione: "Ricalcola gli importi da turni e servizi correnti: le cifre confermate andranno perse.",
        warning: true,
    },
];

impl StatoStipendio {
    pub fn transizioni_disponibili(&self) -> &'static [TransizioneStipendio] {
        match self {
            Self::Bozza => DA_BOZZA,
            Self::Confermato => DA_CONFERMATO,
            Self::Pagato => &[],
        }
    }

    pub fn puo_transire(&self, verso: StatoStipendio) -> bool {
        self.transizioni_disponibili()
            .iter()
            .any(|t| t.stato == verso)
    }

    pub fn etichetta(&self) -> &'static str {
        match self {
            Self::Bozza => "Bozza",
            Self::Confermato => "Confermato",
            Self::Pagato => "Pagato",
        }
    }
}

/// Payroll rates snapshot, read from the settings row.
#[derive(Debug, Clone, Copy)]
pub struct TariffeStipendio {
    pub tariffa_km: Decimal,
    pub compenso_servizio: Decimal,
    pub tariffa_sosta: Decimal,
}

/// Per-service inputs to the derivation: only settled services count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VoceServizio {
    pub km_totali: Decimal,
    pub ore_sosta: Decimal,
}

/// Derived monthly figures. Inputs (days, km, service count, waiting hours)
/// plus the amounts computed from them at the given rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotaliStipendio {
    pub giorni_lavorati: Decimal,
    pub km_totali: Decimal,
    pub numero_servizi: i32,
    pub ore_sosta_totali: Decimal,
    pub compenso_km: Decimal,
    pub compenso_servizi: Decimal,
    pub compenso_sosta: Decimal,
    pub totale: Decimal,
}

fn arrotonda(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Recomputes every derived figure from the month's shifts and settled
/// services. A month with no inputs legitimately comes out all zero.
pub fn calcola_totali(
    turni: &[TipoTurno],
    servizi: &[VoceServizio],
    tariffe: &TariffeStipendio,
) -> TotaliStipendio {
    let giorni_lavorati: Decimal = turni.iter().map(|t| t.giorni_equivalenti()).sum();
    let km_totali: Decimal = servizi.iter().map(|v| v.km_totali).sum();
    let ore_sosta_totali: Decimal = servizi.iter().map(|v| v.ore_sosta).sum();
    let numero_servizi = servizi.len() as i32;

    let compenso_km = arrotonda(km_totali * tariffe.tariffa_km);
    let compenso_servizi = arrotonda(Decimal::from(numero_servizi) * tariffe.compenso_servizio);
    let compenso_sosta = arrotonda(ore_sosta_totali * tariffe.tariffa_sosta);
    let totale = compenso_km + compenso_servizi + compenso_sosta;

    TotaliStipendio {
        giorni_lavorati,
        km_totali,
        numero_servizi,
        ore_sosta_totali,
        compenso_km,
        compenso_servizi,
        compenso_sosta,
        totale,
    }
}

/// Payslip as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Stipendio {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mese: i32,
    pub anno: i32,
    pub stato: StatoStipendio,
    pub giorni_lavorati: Decimal,
    pub km_totali: Decimal,
    pub numero_servizi: i32,
    pub ore_sosta_totali: Decimal,
    pub compenso_km: Decimal,
    pub compenso_servizi: Decimal,
    pub compenso_sosta: Decimal,
    pub totale: Decimal,
    pub movimento_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// List row with the employee's name from the join.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StipendioRiga {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nome: String,
    pub cognome: String,
    pub mese: i32,
    pub anno: i32,
    pub stato: StatoStipendio,
    pub giorni_lavorati: Decimal,
    pub totale: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GeneraStipendioRequest {
    pub user_id: Uuid,
    #[validate(range(min = 1, max = 12, message = "mese must be between 1 and 12"))]
    pub mese: i32,
    #[validate(range(min = 2000, max = 2100, message = "anno out of range"))]
    pub anno: i32,
}

#[derive(Debug, Deserialize)]
pub struct CambioStatoStipendioRequest {
    pub stato: StatoStipendio,
}
