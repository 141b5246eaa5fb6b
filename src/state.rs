use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::mail::{LogMailer, Mailer};
use crate::users::store::{PgUserStore, UserStore};

/// Shared per-process state. Both collaborators sit behind traits; the
/// handlers never see the pool or the transport directly.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        tracing::info!(env = ?config.env, "configuration loaded");

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Ok(Self {
            store: Arc::new(PgUserStore::new(db)),
            mailer: Arc::new(LogMailer),
            config,
        })
    }

    pub fn from_parts(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(store: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>) -> Self {
        use crate::config::{AppEnv, JwtConfig};

        let config = Arc::new(AppConfig {
            env: AppEnv::Development,
            database_url: "postgres://unused".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                ttl_minutes: 60,
            },
            frontend_url: "http://localhost:3000".into(),
            mail_timeout_secs: 2,
        });
        Self::from_parts(store, mailer, config)
    }
}
