use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base64-encoded 32-byte master key for webhook-secret encryption.
    pub master_key: Option<String>,
    /// Bot API endpoint, overridable for self-hosted gateways and tests.
    pub bot_api_base: String,
    pub bot_token: String,
    /// Milliseconds slept between items during bulk delivery recovery.
    pub bulk_delivery_delay_ms: u64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("GATEPASS_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let bulk_delivery_delay_ms: u64 = env::var("BULK_DELIVERY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "gatepass.db".to_string()),
            master_key: env::var("MASTER_KEY").ok(),
            bot_api_base: env::var("BOT_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            bot_token: env::var("BOT_TOKEN").unwrap_or_default(),
            bulk_delivery_delay_ms,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
