//! Server configuration.
//!
//! Entirely environment-driven, per spec's fixed environment variable
//! list — no config-file layering, since there is nothing here a
//! deployment would reasonably want to override outside the environment.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub webauthn: WebAuthnConfig,
    pub api: ApiSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub is_production: bool,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port).parse().expect("invalid HOST/PORT")
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub postgres_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl From<&DatabaseSettings> for pik_db::DatabaseConfig {
    fn from(s: &DatabaseSettings) -> Self {
        pik_db::DatabaseConfig {
            postgres_url: s.postgres_url.clone(),
            pg_max_connections: s.max_connections,
            pg_min_connections: s.min_connections,
            pg_acquire_timeout_secs: s.acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebAuthnConfig {
    pub rp_name: String,
    pub rp_id: String,
    pub origin: String,
    pub session_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Empty means permissive (non-production only — `ServerConfig::load`
    /// refuses to start in production without at least one origin).
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl ServerConfig {
    /// Loads configuration from the process environment, per spec's
    /// `PORT`, `DATABASE_URL`, `NODE_ENV`, `CORS_ORIGINS`,
    /// `WEBAUTHN_RP_NAME`, `WEBAUTHN_RP_ID`, `WEBAUTHN_ORIGIN`.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let node_env = env_or("NODE_ENV", "development");
        let is_production = node_env == "production";

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if is_production && cors_origins.is_empty() {
            anyhow::bail!("CORS_ORIGINS must be set to at least one origin in production");
        }

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            server: ServerSettings {
                host: env_or("HOST", "0.0.0.0"),
                port: env_parsed("PORT", 8080),
                shutdown_timeout_secs: env_parsed("SHUTDOWN_TIMEOUT_SECS", 30),
                is_production,
            },
            database: DatabaseSettings {
                postgres_url: database_url,
                max_connections: env_parsed("PG_MAX_CONNECTIONS", 20),
                min_connections: env_parsed("PG_MIN_CONNECTIONS", 2),
                acquire_timeout_secs: env_parsed("PG_ACQUIRE_TIMEOUT_SECS", 30),
                run_migrations: env_parsed("RUN_MIGRATIONS", true),
            },
            webauthn: WebAuthnConfig {
                rp_name: env_or("WEBAUTHN_RP_NAME", "PIK"),
                rp_id: env_or("WEBAUTHN_RP_ID", "localhost"),
                origin: env_or("WEBAUTHN_ORIGIN", "http://localhost:8080"),
                session_ttl_secs: env_parsed("SESSION_TTL_SECS", 30 * 24 * 3600),
            },
            api: ApiSettings { cors_origins },
            logging: LoggingConfig {
                level: env_or("LOG_LEVEL", if is_production { "info" } else { "debug" }),
                format: env_or("LOG_FORMAT", if is_production { "json" } else { "pretty" }),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_combines_host_and_port() {
        let settings = ServerSettings { host: "127.0.0.1".into(), port: 9090, shutdown_timeout_secs: 5, is_production: false };
        assert_eq!(settings.socket_addr().to_string(), "127.0.0.1:9090");
    }
}
