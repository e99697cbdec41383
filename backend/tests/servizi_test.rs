mod common;

use std::net::SocketAddr;

use uuid::Uuid;

fn unique_email(prefix: &str) -> String {
    format!("{}+{}@test.local", prefix, &Uuid::new_v4().to_string()[..8])
}

/// Create a service over the API as the given (staff) token. Returns the body.
async fn crea_servizio(
    addr: SocketAddr,
    token: &str,
    metodo_pagamento: Option<&str>,
) -> serde_json::Value {
    let client = common::http_client();
    let resp = client
        .post(format!("http://{}/api/servizi", addr))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "data_servizio": "2026-03-02",
            "orario_servizio": "09:30:00.0",
            "partenza": "Aeroporto Malpensa T1",
            "destinazione": "Hotel Excelsior, Milano",
            "metodo_pagamento": metodo_pagamento,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200, "service creation should succeed");
    resp.json().await.unwrap()
}

async fn posta_transizione(
    addr: SocketAddr,
    token: &str,
    servizio_id: &str,
    azione: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    common::http_client()
        .post(format!(
            "http://{}/api/servizi/{}/{}",
            addr, servizio_id, azione
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn card_service_walks_the_full_lifecycle() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-admin");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let driver_email = unique_email("srv-driver");
    let (driver_id, driver_pw) =
        common::create_test_profile(&pool, "dipendente", &driver_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;
    let driver_token = common::get_auth_token(addr, &driver_email, &driver_pw).await;

    let servizio = crea_servizio(addr, &admin_token, Some("Carta di credito")).await;
    let servizio_id = servizio["id"].as_str().unwrap().to_string();
    assert_eq!(servizio["stato"], "da_assegnare");

    // Assign to the internal driver.
    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({ "assegnato_a": driver_id }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "assegnato");
    assert_eq!(body["assegnato_a"].as_str().unwrap(), driver_id.to_string());

    // A card service cannot be completed without the collected amount.
    let resp = posta_transizione(
        addr,
        &driver_token,
        &servizio_id,
        "completa",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // State must be untouched by the rejected completion.
    let resp = common::http_client()
        .get(format!("http://{}/api/servizi/{}", addr, servizio_id))
        .header("Authorization", format!("Bearer {}", driver_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "assegnato");
    assert_eq!(body["categoria_pagamento"], "carta");

    // With the amount the driver can close the ride.
    let resp = posta_transizione(
        addr,
        &driver_token,
        &servizio_id,
        "completa",
        serde_json::json!({ "incasso_ricevuto": "45.50" }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "completato");

    // Settlement is a staff operation.
    let resp = posta_transizione(
        addr,
        &driver_token,
        &servizio_id,
        "consuntiva",
        serde_json::json!({ "km_totali": "120.5" }),
    )
    .await;
    assert_eq!(resp.status(), 403);

    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "consuntiva",
        serde_json::json!({
            "km_totali": "120.5",
            "ore_sosta": "1.5",
            "consegna_contanti_a": "Cassa sede",
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "consuntivato");
    assert_eq!(body["km_totali"].as_str().unwrap(), "120.5");

    // Settled services are closed for good.
    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "annulla",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 409);

    common::cleanup_servizio(&pool, servizio_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, driver_id).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn invoiced_service_completes_without_an_amount() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-fattura");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;

    let servizio = crea_servizio(addr, &admin_token, Some("Bonifico 30gg")).await;
    let servizio_id = servizio["id"].as_str().unwrap().to_string();

    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({ "assegnato_a": admin_id }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // Invoiced rides carry no cash-in confirmation.
    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "completa",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "completato");
    assert!(body["incasso_ricevuto"].is_null());

    common::cleanup_servizio(&pool, servizio_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn refused_service_cannot_be_reassigned() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-rifiuto");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let driver_email = unique_email("srv-rifiuto-drv");
    let (driver_id, driver_pw) =
        common::create_test_profile(&pool, "dipendente", &driver_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;
    let driver_token = common::get_auth_token(addr, &driver_email, &driver_pw).await;

    let servizio = crea_servizio(addr, &admin_token, Some("contanti")).await;
    let servizio_id = servizio["id"].as_str().unwrap().to_string();

    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({ "assegnato_a": driver_id }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = posta_transizione(
        addr,
        &driver_token,
        &servizio_id,
        "rifiuta",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "non_accettato");

    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({ "assegnato_a": driver_id }),
    )
    .await;
    assert_eq!(resp.status(), 409);

    common::cleanup_servizio(&pool, servizio_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, driver_id).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn cancelled_service_rejects_assignment_and_signature() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-annullo");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;

    let servizio = crea_servizio(addr, &admin_token, None).await;
    let servizio_id = servizio["id"].as_str().unwrap().to_string();

    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "annulla",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["stato"], "annullato");

    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({ "assegnato_a": admin_id }),
    )
    .await;
    assert_eq!(resp.status(), 409);

    let resp = common::http_client()
        .patch(format!("http://{}/api/servizi/{}/firma", addr, servizio_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({ "firma_url": "https://storage.test/firma.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    common::cleanup_servizio(&pool, servizio_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn assignment_requires_exactly_one_driver() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-xor");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;

    let servizio = crea_servizio(addr, &admin_token, None).await;
    let servizio_id = servizio["id"].as_str().unwrap().to_string();

    // Neither driver field set.
    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // Both driver fields set.
    let resp = posta_transizione(
        addr,
        &admin_token,
        &servizio_id,
        "assegna",
        serde_json::json!({
            "assegnato_a": admin_id,
            "conducente_esterno_id": Uuid::new_v4(),
        }),
    )
    .await;
    assert_eq!(resp.status(), 400);

    common::cleanup_servizio(&pool, servizio_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn drivers_only_see_their_own_services() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-vis");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let driver1_email = unique_email("srv-vis-d1");
    let (driver1_id, driver1_pw) =
        common::create_test_profile(&pool, "dipendente", &driver1_email).await;
    let driver2_email = unique_email("srv-vis-d2");
    let (driver2_id, _driver2_pw) =
        common::create_test_profile(&pool, "dipendente", &driver2_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;
    let driver1_token = common::get_auth_token(addr, &driver1_email, &driver1_pw).await;

    let mio = crea_servizio(addr, &admin_token, None).await;
    let mio_id = mio["id"].as_str().unwrap().to_string();
    let altrui = crea_servizio(addr, &admin_token, None).await;
    let altrui_id = altrui["id"].as_str().unwrap().to_string();

    let resp = posta_transizione(
        addr,
        &admin_token,
        &mio_id,
        "assegna",
        serde_json::json!({ "assegnato_a": driver1_id }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let resp = posta_transizione(
        addr,
        &admin_token,
        &altrui_id,
        "assegna",
        serde_json::json!({ "assegnato_a": driver2_id }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // The list is silently scoped to the caller for drivers.
    let resp = common::http_client()
        .get(format!(
            "http://{}/api/servizi?da=2026-03-02&a=2026-03-02",
            addr
        ))
        .header("Authorization", format!("Bearer {}", driver1_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&mio_id.as_str()));
    assert!(!ids.contains(&altrui_id.as_str()));

    // Another driver's service is indistinguishable from a missing one.
    let resp = common::http_client()
        .get(format!("http://{}/api/servizi/{}", addr, altrui_id))
        .header("Authorization", format!("Bearer {}", driver1_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = posta_transizione(
        addr,
        &driver1_token,
        &altrui_id,
        "completa",
        serde_json::json!({ "incasso_ricevuto": "10.00" }),
    )
    .await;
    assert_eq!(resp.status(), 404);

    // Drivers cannot open services at all.
    let resp = common::http_client()
        .post(format!("http://{}/api/servizi", addr))
        .header("Authorization", format!("Bearer {}", driver1_token))
        .json(&serde_json::json!({
            "data_servizio": "2026-03-02",
            "orario_servizio": "10:00:00.0",
            "partenza": "A",
            "destinazione": "B",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    common::cleanup_servizio(&pool, mio_id.parse().unwrap()).await;
    common::cleanup_servizio(&pool, altrui_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, driver1_id).await;
    common::cleanup_profile(&pool, driver2_id).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn agenda_groups_todays_services_under_a_relative_label() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-agenda");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;

    // Same timezone the server resolves "today" in.
    let oggi = chrono::Utc::now()
        .with_timezone(&chrono_tz::Europe::Rome)
        .date_naive()
        .to_string();

    let client = common::http_client();
    let resp = client
        .post(format!("http://{}/api/servizi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "data_servizio": oggi,
            "orario_servizio": "11:00:00.0",
            "partenza": "Stazione Centrale",
            "destinazione": "Linate",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let servizio: serde_json::Value = resp.json().await.unwrap();
    let servizio_id = servizio["id"].as_str().unwrap().to_string();

    // A cancelled ride on the same day must not show up.
    let resp = client
        .post(format!("http://{}/api/servizi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "data_servizio": oggi,
            "orario_servizio": "15:00:00.0",
            "partenza": "Sede",
            "destinazione": "Fiera",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let annullato: serde_json::Value = resp.json().await.unwrap();
    let annullato_id = annullato["id"].as_str().unwrap().to_string();
    let resp = posta_transizione(
        addr,
        &admin_token,
        &annullato_id,
        "annulla",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("http://{}/api/servizi/agenda", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let gruppi: serde_json::Value = resp.json().await.unwrap();
    let gruppo = gruppi
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["data"] == oggi)
        .expect("today should have an agenda group");
    assert!(gruppo["etichetta"].as_str().unwrap().starts_with("OGGI - "));
    let ids: Vec<&str> = gruppo["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&servizio_id.as_str()));
    assert!(!ids.contains(&annullato_id.as_str()));

    common::cleanup_servizio(&pool, servizio_id.parse().unwrap()).await;
    common::cleanup_servizio(&pool, annullato_id.parse().unwrap()).await;
    common::cleanup_profile(&pool, admin_id).await;
}

#[tokio::test]
#[ignore] // needs TEST_DATABASE_URL
async fn service_create_checks_company_and_contact_pairing() {
    let (addr, pool) = common::setup_test_app().await;
    let admin_email = unique_email("srv-ref");
    let (admin_id, admin_pw) = common::create_test_profile(&pool, "admin", &admin_email).await;
    let admin_token = common::get_auth_token(addr, &admin_email, &admin_pw).await;

    let azienda_a = common::create_test_azienda(&pool, "srv-ref-a").await;
    let azienda_b = common::create_test_azienda(&pool, "srv-ref-b").await;

    // Contact person attached to company B.
    let referente_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO referenti (id, azienda_id, nome, cognome) VALUES ($1, $2, 'Anna', 'Bruni')",
    )
    .bind(referente_id)
    .bind(azienda_b)
    .execute(&pool)
    .await
    .unwrap();

    // Creating a service for company A with company B's contact is rejected.
    let resp = common::http_client()
        .post(format!("http://{}/api/servizi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "data_servizio": "2026-03-02",
            "orario_servizio": "08:00:00.0",
            "partenza": "Sede",
            "destinazione": "Fiera",
            "azienda_id": azienda_a,
            "referente_id": referente_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // The matching pair goes through.
    let resp = common::http_client()
        .post(format!("http://{}/api/servizi", addr))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "data_servizio": "2026-03-02",
            "orario_servizio": "08:00:00.0",
            "partenza": "Sede",
            "destinazione": "Fiera",
            "azienda_id": azienda_b,
            "referente_id": referente_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let servizio_id: Uuid = body["id"].as_str().unwrap().parse().unwrap();

    common::cleanup_servizio(&pool, servizio_id).await;
    common::cleanup_azienda(&pool, azienda_b).await;
    common::cleanup_azienda(&pool, azienda_a).await;
    common::cleanup_profile(&pool, admin_id).await;
}
