mod auth;
mod cache;
mod settings;

use sqlx::migrate::Migrator;
use sqlx::MySqlPool;
use std::path::Path;

pub type DbPool = MySqlPool;

pub use auth::*;
pub use cache::*;
pub use settings::*;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    MySqlPool::connect(database_url).await
}

/// Run migrations from the workspace `migrations/` directory.
/// Call this after connect when the app starts (optional; can also use `sqlx migrate run` CLI).
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // migrations/ is at workspace root: crates/db -> ../../migrations
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into());
    let migrations_path = Path::new(&manifest_dir).join("../../migrations");
    let migrator = Migrator::new(migrations_path).await?;
    migrator.run(pool).await?;
    Ok(())
}
