//! Infrastructure layer: storage backends, identity provider, registration.

pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod identity;
pub mod model;
pub mod provisioning;
pub mod repository;
pub mod seed;

pub use config::{AppConfig, ConfigError, SessionConfig};
pub use enrichment::StoreSessionEnricher;
pub use error::StoreError;
pub use identity::{LastLoginHook, LocalIdentityProvider, TracingNotifier};
pub use provisioning::{Registered, Registrar, Registration, RegistrationError};
pub use repository::{InMemoryStore, PostgresStore, Store};
pub use seed::{seed, SeedError};
