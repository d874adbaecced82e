use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
#[cfg(test)]
use crate::config::{JwtConfig, MailConfig, TokenConfig};
use crate::mail::{LogMailer, Mailer};
use crate::storage::{memory::MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgStore::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let mailer = Arc::new(LogMailer::new(&config.mail)) as Arc<dyn Mailer>;

        Ok(Self::from_parts(config, store, mailer))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config,
            store,
            mailer,
        }
    }

    /// In-memory state for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_mailer(Arc::new(LogMailer::new(&test_config().mail)))
    }

    #[cfg(test)]
    pub fn fake_with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::from_parts(
            Arc::new(test_config()),
            Arc::new(MemoryStore::new()),
            mailer,
        )
    }
}

#[cfg(test)]
fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        jwt: JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        tokens: TokenConfig {
            ttl_secs: 3600,
            public_url: "http://localhost:8080".into(),
        },
        mail: MailConfig {
            subject_prefix: "[Scribe]".into(),
            sender: "Scribe Admin <noreply@scribe.local>".into(),
        },
        admin_emails: vec!["boss@example.com".into()],
    }
}
