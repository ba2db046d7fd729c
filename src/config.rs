use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Ledger policy knobs. The defaults match the values the service has always
/// used; they are configuration so operators can tune them without a rebuild.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub initial_balance: Decimal,
    pub mining_rate_per_second: Decimal,
    pub default_bio: String,
    pub default_country: String,
    /// Usernames allowed to perform administrative actions (warnings, the
    /// global lock). Empty means no administrative access at all.
    pub admin_usernames: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerificationConfig {
    pub api_base: String,
    pub project_id: String,
    pub comment_limit: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.workers", 4)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("ledger.initial_balance", "1000")?
            .set_default("ledger.mining_rate_per_second", "1")?
            .set_default("ledger.default_bio", "New around here!")?
            .set_default("ledger.default_country", "Unknown")?
            .set_default("ledger.admin_usernames", Vec::<String>::new())?
            .set_default("verification.api_base", "https://api.scratch.mit.edu")?
            .set_default("verification.project_id", "")?
            .set_default("verification.comment_limit", 20)?
            .set_default("verification.timeout_seconds", 30)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("CURRENCY_ENGINE")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(port) = env::var("CURRENCY_ENGINE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.ledger.initial_balance < Decimal::ZERO {
            return Err("Initial balance cannot be negative".to_string());
        }

        if self.ledger.mining_rate_per_second <= Decimal::ZERO {
            return Err("Mining rate must be positive".to_string());
        }

        if self.verification.project_id.is_empty() {
            return Err("Verification project id is required".to_string());
        }

        if self.verification.comment_limit == 0 {
            return Err("Verification comment limit must be positive".to_string());
        }

        Ok(())
    }
}
