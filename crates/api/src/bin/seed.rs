//! One-shot catalog seeding against Postgres.

use anyhow::Context;

use shor_auth::SeedOutcome;
use shor_infra::{db, seed, AppConfig, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shor_observability::init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for seeding")?;

    let pool = db::connect(url, config.max_connections).await?;
    db::bootstrap_schema(&pool).await?;
    let store = PostgresStore::new(pool);

    match seed(&store).await? {
        SeedOutcome::Seeded {
            roles,
            actions,
            grants,
        } => println!("seeded {roles} roles, {actions} actions, {grants} default grants"),
        SeedOutcome::Skipped => println!("catalog already seeded; nothing to do"),
    }
    Ok(())
}
