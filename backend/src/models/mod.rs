pub mod azienda;
pub mod calendario;
pub mod common;
pub mod conducente;
pub mod impostazioni;
pub mod movimento;
pub mod pagamento;
pub mod passeggero;
pub mod profile;
pub mod serde_util;
pub mod servizio;
pub mod shift;
pub mod spesa;
pub mod stipendio;
pub mod veicolo;
