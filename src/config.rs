use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    pub mining: MiningConfig,
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

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    /// Telegram bot token. Empty disables the bot adapter (HTTP only).
    pub token: String,
    /// Bot username embedded in referral deep links.
    pub username: String,
    /// Mini-app URL offered after /start. Empty skips the button.
    pub webapp_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MiningConfig {
    pub cooldown_secs: i64,
    pub default_rate: String,
    pub referral_bonus: String,
    pub rate_boost_factor: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("bot.token", "")?
            .set_default("bot.username", "XentixMiningBot")?
            .set_default("bot.webapp_url", "")?
            .set_default("mining.cooldown_secs", 60)?
            .set_default("mining.default_rate", "0.01")?
            .set_default("mining.referral_bonus", "1.0")?
            .set_default("mining.rate_boost_factor", "0.001")?;

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
            Environment::with_prefix("MINING_ENGINE")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(token) = env::var("BOT_TOKEN") {
            builder = builder.set_override("bot.token", token)?;
        }

        if let Ok(username) = env::var("BOT_USERNAME") {
            builder = builder.set_override("bot.username", username)?;
        }

        if let Ok(webapp_url) = env::var("WEBAPP_URL") {
            builder = builder.set_override("bot.webapp_url", webapp_url)?;
        }

        if let Ok(port) = env::var("PORT") {
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

        if self.mining.cooldown_secs <= 0 {
            return Err("Mining cooldown must be positive".to_string());
        }

        for (name, value) in [
            ("mining.default_rate", &self.mining.default_rate),
            ("mining.referral_bonus", &self.mining.referral_bonus),
            ("mining.rate_boost_factor", &self.mining.rate_boost_factor),
        ] {
            let parsed = Decimal::from_str(value)
                .map_err(|e| format!("{} is not a valid decimal: {}", name, e))?;
            if parsed < Decimal::ZERO {
                return Err(format!("{} cannot be negative", name));
            }
        }

        if !self.bot.token.is_empty() && self.bot.username.is_empty() {
            return Err("Bot username is required when the bot token is set".to_string());
        }

        Ok(())
    }
}
