use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: AppEnv,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub frontend_url: String,
    pub mail_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env = AppEnv::from_env();
        // The database target follows the declared environment; a production
        // process never silently connects to the development database.
        let database_url = match env {
            AppEnv::Production => std::env::var("DATABASE_URL")?,
            AppEnv::Development => std::env::var("DEV_DATABASE_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))?,
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: parse_or_default(
                "JWT_TTL_MINUTES",
                std::env::var("JWT_TTL_MINUTES").ok(),
                60 * 24 * 7,
            )?,
        };
        Ok(Self {
            env,
            database_url,
            jwt,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            mail_timeout_secs: parse_or_default(
                "MAIL_TIMEOUT_SECS",
                std::env::var("MAIL_TIMEOUT_SECS").ok(),
                10,
            )?,
        })
    }
}

/// An absent variable means the default; a present but unparsable one is a
/// startup error, so a typo cannot silently change a lifetime.
fn parse_or_default<T: std::str::FromStr>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}")),
        None => Ok(default),
    }
}
