use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
    pub mail: Option<MailConfig>,
}

/// Outbound mail relay. Absent when MAIL_ENDPOINT is unset; notification
/// sends then log and skip instead of failing requests.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters for security");
        }
        if jwt_secret.contains("change_me") {
            anyhow::bail!("JWT_SECRET contains placeholder value — set a real secret before running");
        }

        let mail = match std::env::var("MAIL_ENDPOINT") {
            Ok(endpoint) if !endpoint.trim().is_empty() => Some(MailConfig {
                endpoint,
                api_key: std::env::var("MAIL_API_KEY").ok(),
                webhook_secret: std::env::var("MAIL_WEBHOOK_SECRET").ok(),
                from: std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "noreply@taxitime.local".into()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "12".into())
                .parse()
                .context("JWT_EXPIRY_HOURS must be a number")?,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            mail,
        })
    }
}
