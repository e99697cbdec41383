use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// Closed set of shift categories. The calendar legend renders exactly
/// these six, each with a fixed colour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[sqlx(type_name = "tipo_turno", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TipoTurno {
    GiornataIntera,
    MezzaGiornata,
    OrariSpecifici,
    Malattia,
    NonDisponibile,
    Extra,
}

pub const TUTTI_I_TIPI: [TipoTurno; 6] = [
    TipoTurno::GiornataIntera,
    TipoTurno::MezzaGiornata,
    TipoTurno::OrariSpecifici,
    TipoTurno::Malattia,
    TipoTurno::NonDisponibile,
    TipoTurno::Extra,
];

impl TipoTurno {
    pub fn etichetta(&self) -> &'static str {
        match self {
            Self::GiornataIntera => "Giornata intera",
            Self::MezzaGiornata => "Mezza giornata",
            Self::OrariSpecifici => "Orari specifici",
            Self::Malattia => "Malattia",
            Self::NonDisponibile => "Non disponibile",
            Self::Extra => "Extra",
        }
    }

    pub fn colore(&self) -> &'static str {
        match self {
            Self::GiornataIntera => "#22c55e",
            Self::MezzaGiornata => "#84cc16",
            Self::OrariSpecifici => "#3b82f6",
            Self::Malattia => "#ef4444",
            Self::NonDisponibile => "#6b7280",
            Self::Extra => "#a855f7",
        }
    }

    /// Contribution to the worked-days counter on the payslip.
    pub fn giorni_equivalenti(&self) -> Decimal {
        match self {
            Self::GiornataIntera | Self::Extra => Decimal::ONE,
            Self::MezzaGiornata | Self::OrariSpecifici => Decimal::new(5, 1),
            Self::Malattia | Self::NonDisponibile => Decimal::ZERO,
        }
    }

    pub fn richiede_periodo(&self) -> bool {
        matches!(self, Self::MezzaGiornata)
    }

    pub fn richiede_orari(&self) -> bool {
        matches!(self, Self::OrariSpecifici)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[sqlx(type_name = "periodo_turno", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PeriodoTurno {
    Mattina,
    Pomeriggio,
}

impl PeriodoTurno {
    pub fn etichetta(&self) -> &'static str {
        match self {
            Self::Mattina => "mattina",
            Self::Pomeriggio => "pomeriggio",
        }
    }
}

/// One planned shift: a driver, a day, a category. The unique index on
/// (user_id, data) makes every write an upsert.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Shift {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data: time::Date,
    pub tipo: TipoTurno,
    pub periodo: Option<PeriodoTurno>,
    pub orario_inizio: Option<time::Time>,
    pub orario_fine: Option<time::Time>,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Shift {
    /// Short badge text: the category, refined with the half-day period or
    /// the concrete hours where those apply.
    pub fn descrizione_breve(&self) -> String {
        match self.tipo {
            TipoTurno::MezzaGiornata => match self.periodo {
                Some(p) => format!("{} ({})", self.tipo.etichetta(), p.etichetta()),
                None => self.tipo.etichetta().to_string(),
            },
            TipoTurno::OrariSpecifici => match (self.orario_inizio, self.orario_fine) {
                (Some(inizio), Some(fine)) => format!(
                    "{:02}:{:02} - {:02}:{:02}",
                    inizio.hour(),
                    inizio.minute(),
                    fine.hour(),
                    fine.minute()
                ),
                _ => self.tipo.etichetta().to_string(),
            },
            _ => self.tipo.etichetta().to_string(),
        }
    }
}

/// Badge placed on a calendar cell.
#[derive(Debug, Clone, Serialize)]
pub struct TurnoBadge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tipo: TipoTurno,
    pub etichetta: String,
    pub colore: &'static str,
}

impl From<&Shift> for TurnoBadge {
    fn from(turno: &Shift) -> Self {
        Self {
            id: turno.id,
            user_id: turno.user_id,
            tipo: turno.tipo,
            etichetta: turno.descrizione_breve(),
            colore: turno.tipo.colore(),
        }
    }
}

/// Legend entry for the calendar UI.
#[derive(Debug, Clone, Serialize)]
pub struct VoceLegenda {
    pub tipo: TipoTurno,
    pub etichetta: &'static str,
    pub colore: &'static str,
}

pub fn legenda() -> Vec<VoceLegenda> {
    TUTTI_I_TIPI
        .iter()
        .map(|t| VoceLegenda {
            tipo: *t,
            etichetta: t.etichetta(),
            colore: t.colore(),
        })
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertShiftRequest {
    /// Defaults to the caller; staff may plan for anyone.
    pub user_id: Option<Uuid>,
    pub data: time::Date,
    pub tipo: TipoTurno,
    pub periodo: Option<PeriodoTurno>,
    pub orario_inizio: Option<time::Time>,
    pub orario_fine: Option<time::Time>,
    #[validate(length(max = 500, message = "note must be at most 500 characters"))]
    pub note: Option<String>,
}
