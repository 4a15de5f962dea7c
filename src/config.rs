use std::{env, str::FromStr};

use anyhow::{Context, bail};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub shipping_flat_rate: Decimal,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let db_max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(10);

        let shipping_flat_rate = match lookup("SHIPPING_FLAT_RATE") {
            Some(raw) => Decimal::from_str(raw.trim())
                .with_context(|| format!("SHIPPING_FLAT_RATE is not a decimal: {raw}"))?,
            None => Decimal::ZERO,
        };
        if shipping_flat_rate.is_sign_negative() {
            bail!("SHIPPING_FLAT_RATE must not be negative");
        }

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            db_max_connections,
            shipping_flat_rate,
        })
    }
}
