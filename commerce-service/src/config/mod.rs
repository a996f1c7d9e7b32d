use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config::Config as CommonConfig;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct CommerceConfig {
    pub common: CommonConfig,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl CommerceConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("COMMERCE_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("COMMERCE_SERVICE_PORT")
            .unwrap_or_else(|_| "3010".to_string())
            .parse()?;

        let db_url = env::var("COMMERCE_DATABASE_URL").expect("COMMERCE_DATABASE_URL must be set");
        let max_connections = env::var("COMMERCE_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("COMMERCE_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let log_level =
            env::var("RUST_LOG").unwrap_or_else(|_| "info,commerce_service=debug".to_string());
        let otlp_endpoint = env::var("COMMERCE_OTLP_ENDPOINT").ok();

        Ok(Self {
            common: CommonConfig { host, port },
            service_name: "commerce-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level,
            otlp_endpoint,
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
        })
    }
}
