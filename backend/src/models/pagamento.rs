use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How a service was (or will be) paid, derived from the operator's
/// free-text label. The stored label is never rewritten; categorisation
/// happens at read time so that legacy rows pick up rule changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CategoriaPagamento {
    /// Invoiced to the client company (bank transfer, cheque) or unlabelled.
    DirettoAzienda,
    /// Card / POS payment, cash-in must be confirmed at completion.
    Carta,
    /// Cash or app wallet collected by the driver, cash-in must be confirmed.
    ContantiUber,
}

const PAROLE_BANCARIE: [&str; 3] = ["bonifico", "assegno", "bancario"];
const PAROLE_CARTA: [&str; 3] = ["carta", "card", "pos"];

impl CategoriaPagamento {
    /// Classifies a free-text payment label. Bank keywords win over card
    /// keywords, card keywords win over the cash fallback, and an empty or
    /// missing label means the company is invoiced directly.
    pub fn classifica(metodo: Option<&str>) -> Self {
        let label = metodo.unwrap_or("").trim().to_lowercase();
        if label.is_empty() {
            return Self::DirettoAzienda;
        }
        if PAROLE_BANCARIE.iter().any(|p| label.contains(p)) {
            return Self::DirettoAzienda;
        }
        if PAROLE_CARTA.iter().any(|p| label.contains(p)) {
            return Self::Carta;
        }
        Self::ContantiUber
    }

    /// Whether completing a service in this category requires the driver to
    /// confirm the amount actually collected.
    pub fn richiede_conferma_incasso(&self) -> bool {
        matches!(self, Self::Carta | Self::ContantiUber)
    }

    pub fn etichetta(&self) -> &'static str {
        match self {
            Self::DirettoAzienda => "Diretto azienda",
            Self::Carta => "Carta",
            Self::ContantiUber => "Contanti / Uber",
        }
    }
}

/// Gross amount split into taxable base and VAT share.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ScorporoIva {
    pub imponibile: Decimal,
    pub iva: Decimal,
}

/// Decomposes a VAT-inclusive amount at the given percentage rate.
/// The base is rounded to 2 decimals (midpoint away from zero) and the VAT
/// share is taken by subtraction so the two parts always sum to the gross.
/// Stored amounts are gross; this exists for display and reporting only.
pub fn scorporo_iva(lordo: Decimal, aliquota: Decimal) -> ScorporoIva {
    let divisore = Decimal::ONE + aliquota / Decimal::ONE_HUNDRED;
    let imponibile =
        (lordo / divisore).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    ScorporoIva {
        imponibile,
        iva: lordo - imponibile,
    }
}
