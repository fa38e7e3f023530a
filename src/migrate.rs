use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::CacheConfig;
use crate::db;

/// Opens the cache database and makes sure the schema exists.
pub async fn run_migrations(config: &CacheConfig) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Named buckets, kept in creation order via the rowid
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_buckets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            bucket_id INTEGER NOT NULL,
            url TEXT NOT NULL,
            status INTEGER NOT NULL,
            content_type TEXT,
            body BLOB NOT NULL,
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (bucket_id, url),
            FOREIGN KEY (bucket_id) REFERENCES cache_buckets(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_entries_url ON cache_entries(url)")
        .execute(pool)
        .await?;

    Ok(())
}
