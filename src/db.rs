use std::time::Duration;

use anyhow::anyhow;
use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::deadpool::{Hook, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::config::DbCfg;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn build_pool(url: &str, cfg: &DbCfg) -> anyhow::Result<Pool<AsyncPgConnection>> {
    let mgr = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);

    info!(max_size = cfg.max_size, "Starting DB pool");
    let pool = Pool::builder(mgr)
        .max_size(cfg.max_size)
        .wait_timeout(cfg.wait_timeout_secs.map(Duration::from_secs))
        .post_create(Hook::sync_fn(|_conn, metrics| {
            tracing::trace!(?metrics, "dbpool: post-create");
            Ok(())
        }))
        .pre_recycle(Hook::sync_fn(|_conn, metrics| {
            tracing::trace!(?metrics, "dbpool: pre-recycle");
            Ok(())
        }))
        .runtime(deadpool::Runtime::Tokio1)
        .build()?;
    Ok(pool)
}

/// Applies pending migrations over a dedicated blocking connection.
pub async fn run_migrations(url: &str) -> anyhow::Result<()> {
    let url = url.to_owned();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&url)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!(e))?;
        for version in applied {
            info!(%version, "applied migration");
        }
        Ok(())
    })
    .await?
}
