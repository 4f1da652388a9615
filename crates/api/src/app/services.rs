//! Service wiring: one store behind the identity provider, the session
//! enricher and registration.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use shor_auth::{IdentityProvider, SessionEnricher};
use shor_infra::db;
use shor_infra::{
    seed, AppConfig, InMemoryStore, LastLoginHook, LocalIdentityProvider, PostgresStore, Registrar,
    Store, StoreSessionEnricher,
};

use crate::middleware::AuthState;

#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub enricher: Arc<dyn SessionEnricher>,
    pub registrar: Arc<Registrar>,
}

impl AppServices {
    /// Wire services over an existing store.
    pub fn from_store(store: Arc<dyn Store>, config: &AppConfig) -> Self {
        let identity: Arc<dyn IdentityProvider> = Arc::new(
            LocalIdentityProvider::new(store.clone(), config.auth_secret.clone(), config.session)
                .with_hooks(Arc::new(LastLoginHook::new(store.clone()))),
        );
        let enricher: Arc<dyn SessionEnricher> = Arc::new(StoreSessionEnricher::new(store.clone()));
        let registrar = Arc::new(Registrar::new(store.clone(), identity.clone(), enricher.clone()));
        Self {
            store,
            identity,
            enricher,
            registrar,
        }
    }

    /// In-memory backend, seeded immediately.
    pub async fn in_memory(config: &AppConfig) -> anyhow::Result<Self> {
        let store = InMemoryStore::arc();
        seed(store.as_ref()).await.context("seeding in-memory catalog")?;
        Ok(Self::from_store(store, config))
    }

    /// Postgres when `DATABASE_URL` is set, otherwise the in-memory backend.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let Some(url) = config.database_url.as_deref() else {
            info!("DATABASE_URL not set; using in-memory store");
            return Self::in_memory(config).await;
        };

        let pool = db::connect(url, config.max_connections)
            .await
            .context("connecting to postgres")?;
        db::bootstrap_schema(&pool).await.context("bootstrapping schema")?;
        let store = Arc::new(PostgresStore::new(pool));
        if config.seed_on_startup {
            seed(store.as_ref()).await.context("seeding catalog")?;
        }
        Ok(Self::from_store(store, config))
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            identity: self.identity.clone(),
            enricher: self.enricher.clone(),
        }
    }
}
