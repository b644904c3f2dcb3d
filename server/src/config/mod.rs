use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `RUST_ENV=production` turns on HSTS.
    pub production: bool,
    pub cors_allowed_origins: String,
}

/// Knobs of the pricing and check-in engines.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Clock tolerance applied to both ends of a lot's sale window.
    pub sale_window_skew_secs: i64,
    /// Key id stamped on every issued QR.
    pub qr_key_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sale_window_skew_secs: 60,
            qr_key_id: "k1".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn sale_window_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sale_window_skew_secs)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let engine_defaults = EngineConfig::default();

        Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/ingressos".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3001),
                production: env::var("RUST_ENV")
                    .map(|v| v.eq_ignore_ascii_case("production"))
                    .unwrap_or(false),
                cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            },
            engine: EngineConfig {
                sale_window_skew_secs: env::var("SALE_WINDOW_SKEW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs: &i64| *secs >= 0)
                    .unwrap_or(engine_defaults.sale_window_skew_secs),
                qr_key_id: env::var("QR_KEY_ID")
                    .ok()
                    .filter(|kid| !kid.trim().is_empty())
                    .unwrap_or(engine_defaults.qr_key_id),
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
