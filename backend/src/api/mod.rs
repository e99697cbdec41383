pub mod auth;
pub mod profiles;
pub mod aziende;
pub mod passeggeri;
pub mod veicoli;
pub mod conducenti;
pub mod servizi;
pub mod shifts;
pub mod stipendi;
pub mod spese;
pub mod movimenti;
pub mod impostazioni;
pub mod notifiche;

use axum::{Router, routing::{get, post, delete, patch, put}};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Profiles
        .route("/api/profiles", get(profiles::list).post(profiles::create))
        .route("/api/profiles/{id}", get(profiles::get_one).put(profiles::update).delete(profiles::delete))
        .route("/api/profiles/{id}/disattiva", post(profiles::deactivate))
        // Companies and their contacts
        .route("/api/aziende", get(aziende::list).post(aziende::create))
        .route("/api/aziende/{id}", get(aziende::get_one).put(aziende::update).delete(aziende::delete))
        .route("/api/aziende/{id}/referenti", get(aziende::list_referenti).post(aziende::create_referente))
        .route("/api/referenti/{id}", put(aziende::update_referente).delete(aziende::delete_referente))
        // Passengers
        .route("/api/passeggeri", get(passeggeri::list).post(passeggeri::create))
        .route("/api/passeggeri/{id}", get(passeggeri::get_one).put(passeggeri::update).delete(passeggeri::delete))
        // Vehicles
        .route("/api/veicoli", get(veicoli::list).post(veicoli::create))
        .route("/api/veicoli/{id}", get(veicoli::get_one).put(veicoli::update).delete(veicoli::delete))
        // External drivers
        .route("/api/conducenti-esterni", get(conducenti::list).post(conducenti::create))
        .route("/api/conducenti-esterni/{id}", put(conducenti::update).delete(conducenti::delete))
        // Services
        .route("/api/servizi", get(servizi::list).post(servizi::create))
        .route("/api/servizi/agenda", get(servizi::agenda))
        .route("/api/servizi/{id}", get(servizi::get_one).put(servizi::update).delete(servizi::delete))
        .route("/api/servizi/{id}/assegna", post(servizi::assegna))
        .route("/api/servizi/{id}/completa", post(servizi::completa))
        .route("/api/servizi/{id}/consuntiva", post(servizi::consuntiva))
        .route("/api/servizi/{id}/annulla", post(servizi::annulla))
        .route("/api/servizi/{id}/rifiuta", post(servizi::rifiuta))
        .route("/api/servizi/{id}/firma", patch(servizi::firma))
        .route("/api/servizi/{id}/passeggeri", post(servizi::add_passeggero))
        .route("/api/servizi/{id}/passeggeri/{passeggero_id}", delete(servizi::remove_passeggero))
        // Shift planning
        .route("/api/shifts", get(shifts::list).post(shifts::upsert))
        .route("/api/shifts/calendario", get(shifts::calendario))
        .route("/api/shifts/{id}", delete(shifts::delete))
        // Payroll
        .route("/api/stipendi", get(stipendi::list).post(stipendi::genera))
        .route("/api/stipendi/{id}", get(stipendi::get_one))
        .route("/api/stipendi/{id}/transizioni", get(stipendi::transizioni))
        .route("/api/stipendi/{id}/stato", post(stipendi::cambia_stato))
        // Personal expenses
        .route("/api/spese", get(spese::list).post(spese::create))
        .route("/api/spese/{id}", put(spese::update).delete(spese::delete))
        // Company ledger
        .route("/api/movimenti", get(movimenti::list).post(movimenti::create))
        .route("/api/movimenti/{id}", delete(movimenti::delete))
        // Settings
        .route("/api/impostazioni", get(impostazioni::get).put(impostazioni::update))
        // Notifications
        .route("/api/notifiche/test", post(notifiche::test))
        .with_state(state)
}
