mod common;

use std::net::SocketAddr;

use rust_decimal::Decimal;
use time::macros::{date, time};
use uuid::Uuid;

fn unique_email(prefix: &str) -> String {
    format!("{}+{}@test.local", prefix, &Uuid::new_v4().to_string()[..8])
}

fn dec(v: &serde_json::Value) -> Decimal {
    v.as_str().unwrap().parse().unwrap()
}

async fn seed_turno(pool: &sqlx::PgPool, user_id: Uuid, data: time::Date, tipo: &str) {
    sqlx::query("INSERT INTO shifts (id, user_id, data, tipo) VALUES ($1, $2, $3, $4::tipo_turno)")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(data)
        .bind(tipo)
        .execute(pool)
        .await
        .unwrap();
}

async fn seed_servizio_consuntivato(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    data: time::Date,
    km: &str,
    ore: &str,
) {
    sqlx::query(
        "INSERT INTO servizi (id, data_servizio, orario_servizio, partenza, destinazione, \
                              stato, assegnato_a, km_totali, ore_sosta) \
         VALUES ($1, $2, $3, 'Sede', 'Cliente', 'consuntivato'::stato_servizio, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(data)
    .bind(time!(08:00))
    .bind(user_id)
    .bind(km.parse::<Decimal>().unwrap())
    .bind(ore.parse::<Decimal>().unwrap())
    .execute(pool)
    .await
    .unwrap();
}

async fn cambia_stato(
    addr: SocketAddr,
    token: &str,
    stipendio_id: &str,
    stato: &str,
) -> reqwest::Response {
    common::http_client()
        .post(format!("http://{}/api/stipendi/{}/stato", addr, stipendio_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "stato": stato }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn payslip_derivation_confirmation_and_payment() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("pay-admin");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let driver_email = unique_email("pay-driver");
    let (driver_id, driver_pw) =
        common::create_test_profile(&pool, "dipendente", &driver_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;
    let driver_token = common::get_auth_token(addr, &driver_email, &driver_pw).await;

    // March 2026: 2 full days + 1 half day + 1 sick day, two settled services.
    seed_turno(&pool, driver_id, date!(2026 - 03 - 02), "giornata_intera").await;
    seed_turno(&pool, driver_id, date!(2026 - 03 - 03), "giornata_intera").await;
    seed_turno(&pool, driver_id, date!(2026 - 03 - 04), "mezza_giornata").await;
    seed_turno(&pool, driver_id, date!(2026 - 03 - 05), "malattia").await;
    seed_servizio_consuntivato(&pool, driver_id, date!(2026 - 03 - 02), "120.5", "1.5").await;
    seed_servizio_consuntivato(&pool, driver_id, date!(2026 - 03 - 03), "30.0", "0").await;

    // Drivers cannot generate payslips.
    let resp = common::http_client()
        .post(format!("http://{}/api/stipendi", addr))
        .header("Authorization", format!("Bearer {}", driver_token))
        .json(&serde_json::json!({ "user_id": driver_id, "mese": 3, "anno": 2026 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = common::http_client()
        .post(format!("http://{}/api/stipendi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({ "user_id": driver_id, "mese": 3, "anno": 2026 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let stipendio_id = body["id"].as_str().unwrap().to_string();

    // Default rates: 0.28/km, 8.00 per service, 15.00 per waiting hour.
    assert_eq!(body["stato"], "bozza");
    assert_eq!(dec(&body["giorni_lavorati"]), Decimal::new(25, 1));
    assert_eq!(dec(&body["km_totali"]), Decimal::new(1505, 1));
    assert_eq!(body["numero_servizi"], 2);
    assert_eq!(dec(&body["ore_sosta_totali"]), Decimal::new(15, 1));
    assert_eq!(dec(&body["compenso_km"]), Decimal::new(4214, 2));
    assert_eq!(dec(&body["compenso_servizi"]), Decimal::new(1600, 2));
    assert_eq!(dec(&body["compenso_sosta"]), Decimal::new(2250, 2));
    assert_eq!(dec(&body["totale"]), Decimal::new(8064, 2));

    // Regenerating a draft recomputes in place: same row, fresh figures.
    seed_servizio_consuntivato(&pool, driver_id, date!(2026 - 03 - 10), "10.0", "0").await;
    let resp = common::http_client()
        .post(format!("http://{}/api/stipendi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({ "user_id": driver_id, "mese": 3, "anno": 2026 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"].as_str().unwrap(), stipendio_id);
    assert_eq!(body["numero_servizi"], 3);
    assert_eq!(dec(&body["totale"]), Decimal::new(9144, 2));

    // The owner can read their payslip, everyone else gets a 404.
    let resp = common::http_client()
        .get(format!("http://{}/api/stipendi/{}", addr, stipendio_id))
        .header("Authorization", format!("Bearer {}", driver_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let intruder_email = unique_email("pay-intruder");
    let (intruder_id, intruder_pw) =
        common::create_test_profile(&pool, "dipendente", &intruder_email).await;
    let intruder_token = common::get_auth_token(addr, &intruder_email, &intruder_pw).await;
    let resp = common::http_client()
        .get(format!("http://{}/api/stipendi/{}", addr, stipendio_id))
        .header("Authorization", format!("Bearer {}", intruder_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // A draft offers exactly one transition: confirmation.
    let resp = common::http_client()
        .get(format!(
            "http://{}/api/stipendi/{}/transizioni",
            addr, stipendio_id
        ))
        .header("Authorization", format!("Bearer {}", driver_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let transizioni: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(transizioni.as_array().unwrap().len(), 1);
    assert_eq!(transizioni[0]["stato"], "confermato");

    // State changes are staff-only.
    let resp = cambia_stato(addr, &driver_token, &stipendio_id, "confermato").await;
    assert_eq!(resp.status(), 403);

    let resp = cambia_stato(addr, &admin_token, &stipendio_id, "confermato").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "confermato");

    // Confirmed figures are frozen: regeneration is refused.
    let resp = common::http_client()
        .post(format!("http://{}/api/stipendi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({ "user_id": driver_id, "mese": 3, "anno": 2026 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // A confirmed payslip offers payment and the flagged return to draft.
    let resp = common::http_client()
        .get(format!(
            "http://{}/api/stipendi/{}/transizioni",
            addr, stipendio_id
        ))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    let transizioni: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(transizioni.as_array().unwrap().len(), 2);
    let ritorno = transizioni
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["stato"] == "bozza")
        .unwrap();
    assert_eq!(ritorno["warning"], true);

    // Returning to draft recomputes from the month as it stands now.
    seed_turno(&pool, driver_id, date!(2026 - 03 - 20), "giornata_intera").await;
    let resp = cambia_stato(addr, &admin_token, &stipendio_id, "bozza").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "bozza");
    assert_eq!(dec(&body["giorni_lavorati"]), Decimal::new(35, 1));
    assert_eq!(dec(&body["totale"]), Decimal::new(9144, 2));

    // Confirm again and pay.
    let resp = cambia_stato(addr, &admin_token, &stipendio_id, "confermato").await;
    assert_eq!(resp.status(), 200);
    let resp = cambia_stato(addr, &admin_token, &stipendio_id, "pagato").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "pagato");
    let movimento_id: Uuid = body["movimento_id"].as_str().unwrap().parse().unwrap();

    // Payment writes the linked ledger entry.
    let (tipo, categoria, importo, mov_stipendio, descrizione): (
        String,
        String,
        Decimal,
        Option<Uuid>,
        Option<String>,
    ) = sqlx::query_as(
        "SELECT tipo::text, categoria, importo, stipendio_id, descrizione \
         FROM movimenti_aziendali WHERE id = $1",
    )
    .bind(movimento_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tipo, "uscita");
    assert_eq!(categoria, "stipendi");
    assert_eq!(importo, Decimal::new(9144, 2));
    assert_eq!(mov_stipendio, Some(stipendio_id.parse().unwrap()));
    let descrizione = descrizione.unwrap();
    assert!(descrizione.contains("Stipendio 03/2026"), "{descrizione}");
    assert!(descrizione.contains("Test Driver"), "{descrizione}");

    // Paid is the end of the line.
    let resp = cambia_stato(addr, &admin_token, &stipendio_id, "bozza").await;
    assert_eq!(resp.status(), 409);
    let resp = common::http_client()
        .post(format!("http://{}/api/stipendi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({ "user_id": driver_id, "mese": 3, "anno": 2026 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // The payment's ledger row is protected from deletion.
    let resp = common::http_client()
        .delete(format!("http://{}/api/movimenti/{}", addr, movimento_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // The ledger itself is invisible to drivers.
    let resp = common::http_client()
        .get(format!("http://{}/api/movimenti", addr))
        .header("Authorization", format!("Bearer {}", driver_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    common::cleanup_profile(&pool, intruder_id).await;
    common::cleanup_profile(&pool, driver_id).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn payslip_list_is_scoped_to_the_caller_for_drivers() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("paylist-admin");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let driver_email = unique_email("paylist-driver");
    let (driver_id, driver_pw) =
        common::create_test_profile(&pool, "dipendente", &driver_email).await;
    let altro_email = unique_email("paylist-altro");
    let (altro_id, _altro_pw) =
        common::create_test_profile(&pool, "dipendente", &altro_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;
    let driver_token = common::get_auth_token(addr, &driver_email, &driver_pw).await;

    // One empty-month draft each; an empty month is legitimately all zero.
    for user in [driver_id, altro_id] {
        let resp = common::http_client()
            .post(format!("http://{}/api/stipendi", addr))
            .header("Authorization", format!("Bearer {}", admin_token))
            .json(&serde_json::json!({ "user_id": user, "mese": 4, "anno": 2026 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(dec(&body["totale"]), Decimal::ZERO);
    }

    let resp = common::http_client()
        .get(format!("http://{}/api/stipendi?mese=4&anno=2026", addr))
        .header("Authorization", format!("Bearer {}", driver_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let righe = body.as_array().unwrap();
    assert!(!righe.is_empty());
    for riga in righe {
        assert_eq!(riga["user_id"].as_str().unwrap(), driver_id.to_string());
    }

    common::cleanup_profile(&pool, altro_id).await;
    common::cleanup_profile(&pool, driver_id).await;
    common::cleanup_profile(&pool, admin_id).await;
}
