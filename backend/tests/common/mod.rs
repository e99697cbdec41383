#![allow(dead_code)]
use std::net::SocketAddr;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use taxitime_backend::{api, notifier::Notifier, AppState};

fn database_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set — tests write/delete data and should not run against a shared database")
}
const JWT_SECRET: &str = "test-secret-that-is-at-least-32-chars-long!!";
const JWT_EXPIRY_HOURS: u64 = 12;

/// Spin up a real Axum server on a random port, returning its address and the
/// database pool.  All tests share the same dev database; test isolation comes
/// from creating unique profiles/companies per test and cleaning up afterwards.
pub async fn setup_test_app() -> (SocketAddr, PgPool) {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url())
        .await
        .expect("Failed to connect to test database");

    // Run migrations to ensure schema is up-to-date
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let state = AppState {
        pool: pool.clone(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiry_hours: JWT_EXPIRY_HOURS,
        // No relay configured: notification sends become logged no-ops.
        notifier: Notifier::new(None),
    };

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, pool)
}

/// Create a test profile with Argon2-hashed password. Returns (user_id, plaintext_password).
pub async fn create_test_profile(pool: &PgPool, role: &str, email: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let password = "testpass123";
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();

    sqlx::query(
        "INSERT INTO profiles (id, nome, cognome, email, password_hash, role, attivo) \
         VALUES ($1, 'Test', 'Driver', $2, $3, $4::app_role, true)",
    )
    .bind(user_id)
    .bind(email)
    .bind(&hash)
    .bind(role)
    .execute(pool)
    .await
    .expect("Failed to create test profile");

    (user_id, password.to_string())
}

/// Create a deactivated test profile. Returns (user_id, plaintext_password).
pub async fn create_inactive_profile(pool: &PgPool, email: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let password = "testpass123";
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();

    sqlx::query(
        "INSERT INTO profiles (id, nome, cognome, email, password_hash, role, attivo) \
         VALUES ($1, 'Inactive', 'Driver', $2, $3, 'dipendente'::app_role, false)",
    )
    .bind(user_id)
    .bind(email)
    .bind(&hash)
    .execute(pool)
    .await
    .expect("Failed to create inactive profile");

    (user_id, password.to_string())
}

/// Create a test company. Returns the company ID.
pub async fn create_test_azienda(pool: &PgPool, suffix: &str) -> Uuid {
    let id = Uuid::new_v4();
    let nome = format!("Test SRL {}-{}", suffix, &id.to_string()[..8]);

    sqlx::query("INSERT INTO aziende (id, nome, attivo) VALUES ($1, $2, true)")
        .bind(id)
        .bind(&nome)
        .execute(pool)
        .await
        .expect("Failed to create test company");

    id
}

/// Log in via the HTTP API and return the JWT token.
pub async fn get_auth_token(addr: SocketAddr, email: &str, password: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&serde_json::json!({
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .expect("Login request failed");

    assert_eq!(resp.status(), 200, "Login should return 200");

    let body: serde_json::Value = resp.json().await.expect("Failed to parse login response");
    body["token"]
        .as_str()
        .expect("Response should contain token")
        .to_string()
}

/// Create a JWT token that is already expired (exp in the past).
/// Uses the same secret as the test app.
pub fn create_expired_token(user_id: Uuid) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use taxitime_backend::auth::{Claims, Role};

    let now = time::OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id,
        role: Role::Dipendente,
        exp: (now - time::Duration::hours(1)).unix_timestamp(), // expired 1 hour ago
        iat: (now - time::Duration::hours(2)).unix_timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to create expired token")
}

/// Build a reqwest client (reusable across requests in a test).
pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Clean up everything hanging off a test profile. Call this at the end of tests.
pub async fn cleanup_profile(pool: &PgPool, user_id: Uuid) {
    // Delete in dependency order (child tables first). The circular FK pair
    // between stipendi and movimenti_aziendali is broken by clearing
    // movimento_id before deleting either side.
    let cleanup_queries = [
        "UPDATE stipendi SET movimento_id = NULL WHERE user_id = $1",
        "DELETE FROM movimenti_aziendali WHERE stipendio_id IN (SELECT id FROM stipendi WHERE user_id = $1)",
        "DELETE FROM stipendi WHERE user_id = $1",
        "DELETE FROM spese_personali WHERE user_id = $1",
        "DELETE FROM shifts WHERE user_id = $1",
        "DELETE FROM servizi_passeggeri WHERE servizio_id IN (SELECT id FROM servizi WHERE assegnato_a = $1)",
        "DELETE FROM servizi WHERE assegnato_a = $1",
        "DELETE FROM profiles WHERE id = $1",
    ];

    for q in cleanup_queries {
        let _ = sqlx::query(q).bind(user_id).execute(pool).await;
    }
}

/// Clean up a test company and the records pointing at it.
pub async fn cleanup_azienda(pool: &PgPool, azienda_id: Uuid) {
    let cleanup_queries = [
        "DELETE FROM servizi_passeggeri WHERE servizio_id IN (SELECT id FROM servizi WHERE azienda_id = $1)",
        "DELETE FROM servizi WHERE azienda_id = $1",
        "DELETE FROM passeggeri WHERE azienda_id = $1",
        "DELETE FROM referenti WHERE azienda_id = $1",
        "DELETE FROM aziende WHERE id = $1",
    ];

    for q in cleanup_queries {
        let _ = sqlx::query(q).bind(azienda_id).execute(pool).await;
    }
}

/// Clean up a single service created by a test.
pub async fn cleanup_servizio(pool: &PgPool, servizio_id: Uuid) {
    let _ = sqlx::query("DELETE FROM servizi_passeggeri WHERE servizio_id = $1")
        .bind(servizio_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM servizi WHERE id = $1")
        .bind(servizio_id)
        .execute(pool)
        .await;
}
