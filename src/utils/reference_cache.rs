use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

/// Reference-image bytes keyed by their asset-store URL. Short TTL: a
/// re-registered face must win quickly, and `invalidate` is called on every
/// profile update anyway.
static REFERENCE_CACHE: Lazy<Cache<String, Arc<Vec<u8>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(512)
        .time_to_live(Duration::from_secs(300))
        .build()
});

/// Returns cached bytes or fetches them from the asset host.
pub async fn get_or_fetch(client: &reqwest::Client, url: &str) -> Result<Arc<Vec<u8>>> {
    if let Some(hit) = REFERENCE_CACHE.get(url).await {
        return Ok(hit);
    }

    let resp = client.get(url).send().await?.error_for_status()?;
    let bytes = Arc::new(resp.bytes().await?.to_vec());

    if bytes.is_empty() {
        return Err(anyhow!("reference image at {} is empty", url));
    }

    REFERENCE_CACHE.insert(url.to_string(), bytes.clone()).await;
    Ok(bytes)
}

/// Drops a stale entry after a subject re-registers their face.
pub async fn invalidate(url: &str) {
    REFERENCE_CACHE.invalidate(url).await;
}

/// Pre-fetches reference images for active employees so the first check-in
/// of the day does not pay the asset-host round trip. Best effort: a failed
/// fetch is logged and skipped.
pub async fn warmup_reference_cache(
    pool: &MySqlPool,
    client: &reqwest::Client,
    batch_size: usize,
) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT face_image_url
        FROM employees
        WHERE face_image_url IS NOT NULL AND status = 'active'
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (url,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
        batch.push(url);
        total += 1;

        if batch.len() == batch_size {
            prefetch_batch(client, &batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        prefetch_batch(client, &batch).await;
    }

    log::info!("Reference cache warmup complete: {} images", total);
    Ok(())
}

async fn prefetch_batch(client: &reqwest::Client, urls: &[String]) {
    let fetches: Vec<_> = urls.iter().map(|u| get_or_fetch(client, u)).collect();

    for (url, result) in urls.iter().zip(futures::future::join_all(fetches).await) {
        if let Err(e) = result {
            log::warn!("Reference prefetch failed for {}: {}", url, e);
        }
    }
}
