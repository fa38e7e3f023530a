use anyhow::Result;

use crate::config::Config;
use crate::server::build_worker;

/// Install the manifest assets and activate, without serving.
pub async fn run_cache_install(config: &Config) -> Result<()> {
    let worker = build_worker(config).await?;
    let name = worker.manifest().bucket_name();

    let count = worker.install().await?;
    let deleted = worker.activate().await?;

    println!("cache install");
    println!("  bucket:  {}", name);
    println!("  assets:  {}", count);
    if deleted.is_empty() {
        println!("  removed: none");
    } else {
        println!("  removed: {}", deleted.join(", "));
    }

    worker.storage().pool().close().await;
    Ok(())
}

/// Print every bucket and the URLs it holds.
pub async fn run_cache_list(config: &Config) -> Result<()> {
    let worker = build_worker(config).await?;
    let storage = worker.storage();
    let current = worker.manifest().bucket_name();

    let names = storage.keys().await?;
    if names.is_empty() {
        println!("No cache buckets. Run `medassist cache install` first.");
    }

    for name in names {
        let bucket = storage.open(&name).await?;
        let marker = if name == current { " (current)" } else { "" };
        let urls = bucket.urls().await?;
        println!("{}{}  {} entries", name, marker, urls.len());
        for url in urls {
            println!("  {}", url);
        }
    }

    storage.pool().close().await;
    Ok(())
}

/// Delete one bucket by name.
pub async fn run_cache_delete(config: &Config, name: &str) -> Result<()> {
    let worker = build_worker(config).await?;
    let storage = worker.storage();

    if storage.delete(name).await? {
        println!("Deleted cache bucket '{}'.", name);
    } else {
        println!("No cache bucket named '{}'.", name);
    }

    storage.pool().close().await;
    Ok(())
}
