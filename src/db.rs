use anyhow::Context;
use sqlx::{migrate::MigrateDatabase, postgres::PgPoolOptions, PgPool, Postgres};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;

/// Name of the database that owns the `users` table.
pub const DATABASE_NAME: &str = "PayPal";

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    if cfg.create_if_missing {
        let exists = Postgres::database_exists(&cfg.url)
            .await
            .context("check database exists")?;
        if exists {
            debug!("database already exists");
        } else {
            Postgres::create_database(&cfg.url)
                .await
                .context("create database")?;
            info!("database created");
        }
    }

    let db = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.url)
        .await
        .context("connect to database")?;

    let name = current_database(&db).await?;
    if name == DATABASE_NAME {
        info!(database = %name, "connected");
    } else {
        warn!(database = %name, expected = DATABASE_NAME, "connected to a differently named database");
    }
    Ok(db)
}

/// Name of the database the pool is connected to, as the server reports it.
pub async fn current_database(db: &PgPool) -> anyhow::Result<String> {
    let name = sqlx::query_scalar::<_, String>("SELECT current_database()::text")
        .fetch_one(db)
        .await
        .context("query current database")?;
    Ok(name)
}

/// Applies the embedded migrations in `./migrations`.
pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    info!("users schema up to date");
    Ok(())
}
