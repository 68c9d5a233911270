use chrono::Duration;

/// Application configuration, assembled once at startup and handed to
/// constructors. Nothing reads the environment after `from_env` returns.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings consumed by the auth subsystem: signing secret, token TTLs,
/// issuer and the bcrypt work factor.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: env_parse("SERVER_PORT", 3000),
            },
            auth: AuthConfig {
                secret: env_or("JWT_SECRET", "change-me-in-production"),
                issuer: env_or("JWT_ISSUER", "taskdeck"),
                access_ttl: Duration::seconds(env_parse("ACCESS_TOKEN_TTL_SECS", 900)),
                refresh_ttl: Duration::seconds(env_parse("REFRESH_TOKEN_TTL_SECS", 604_800)),
                bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").ok(),
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL").ok(),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
