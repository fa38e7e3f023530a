//! Named cache buckets stored in SQLite.
//!
//! A [`CacheStorage`] holds any number of buckets addressed by name (for
//! example `medassist-v1`). Each bucket maps an exact request URL to a
//! [`StoredResponse`]. Lookups across the whole storage search buckets in
//! the order they were created.

use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::fetcher::{FetchError, Fetcher};
use crate::models::StoredResponse;

#[derive(Clone)]
pub struct CacheStorage {
    pool: SqlitePool,
}

impl CacheStorage {
    /// Wraps a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens the bucket called `name`, creating it if needed.
    pub async fn open(&self, name: &str) -> Result<CacheBucket> {
        sqlx::query("INSERT OR IGNORE INTO cache_buckets (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM cache_buckets WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(CacheBucket {
            pool: self.pool.clone(),
            id,
            name: name.to_string(),
        })
    }

    pub async fn has(&self, name: &str) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM cache_buckets WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }

    /// Bucket names in creation order.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM cache_buckets ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Deletes a bucket; its entries go with it through `ON DELETE CASCADE`.
    /// Returns `false` if it did not exist.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_buckets WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Looks `url` up in every bucket, oldest bucket first.
    pub async fn match_url(&self, url: &str) -> Result<Option<StoredResponse>> {
        let row = sqlx::query(
            r#"
            SELECT e.url, e.status, e.content_type, e.body
            FROM cache_entries e
            JOIN cache_buckets b ON b.id = e.bucket_id
            WHERE e.url = ?
            ORDER BY b.id ASC
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_response(&r)))
    }
}

/// One named bucket.
#[derive(Clone)]
pub struct CacheBucket {
    pool: SqlitePool,
    id: i64,
    name: String,
}

impl CacheBucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn put(&self, response: &StoredResponse) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut *conn, self.id, response).await
    }

    pub async fn match_url(&self, url: &str) -> Result<Option<StoredResponse>> {
        let row = sqlx::query(
            "SELECT url, status, content_type, body FROM cache_entries WHERE bucket_id = ? AND url = ?",
        )
        .bind(self.id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_response(&r)))
    }

    /// Cached URLs, sorted.
    pub async fn urls(&self) -> Result<Vec<String>> {
        let urls: Vec<String> = sqlx::query_scalar(
            "SELECT url FROM cache_entries WHERE bucket_id = ? ORDER BY url ASC",
        )
        .bind(self.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(urls)
    }

    pub async fn len(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE bucket_id = ?")
            .bind(self.id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Fetches every URL and stores them as one unit.
    ///
    /// All fetches complete before anything is written. If any of them fails
    /// or comes back non-2xx, nothing is stored and the first failure is
    /// returned. Otherwise every entry is written in a single transaction and
    /// the number written is returned.
    pub async fn add_all(&self, fetcher: &dyn Fetcher, urls: &[String]) -> Result<usize> {
        let mut fetched = Vec::with_capacity(urls.len());
        for url in urls {
            let response = fetcher.fetch(url).await?;
            if !response.is_ok() {
                return Err(FetchError::Status {
                    url: url.clone(),
                    status: response.status,
                }
                .into());
            }
            fetched.push(response);
        }

        let mut tx = self.pool.begin().await?;
        for response in &fetched {
            insert_entry(&mut *tx, self.id, response).await?;
        }
        tx.commit().await?;

        tracing::debug!(bucket = %self.name, count = fetched.len(), "bulk add committed");
        Ok(fetched.len())
    }
}

async fn insert_entry(
    conn: &mut sqlx::SqliteConnection,
    bucket_id: i64,
    response: &StoredResponse,
) -> Result<()> {
    if response.url.is_empty() {
        bail!("cannot cache a response without a URL");
    }
    sqlx::query(
        r#"
        INSERT INTO cache_entries (bucket_id, url, status, content_type, body, cached_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(bucket_id, url) DO UPDATE SET
            status = excluded.status,
            content_type = excluded.content_type,
            body = excluded.body,
            cached_at = excluded.cached_at
        "#,
    )
    .bind(bucket_id)
    .bind(&response.url)
    .bind(response.status as i64)
    .bind(&response.content_type)
    .bind(&response.body)
    .bind(Utc::now().timestamp())
    .execute(conn)
    .await?;
    Ok(())
}

fn row_to_response(row: &sqlx::sqlite::SqliteRow) -> StoredResponse {
    let status: i64 = row.get("status");
    StoredResponse {
        url: row.get("url"),
        status: status as u16,
        content_type: row.get("content_type"),
        body: row.get("body"),
    }
}
