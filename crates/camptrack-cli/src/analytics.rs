//! Ad-hoc batch fetch and cache maintenance.

use std::sync::Arc;

use camptrack_core::ContentMetrics;
use camptrack_fetcher::FetcherRegistry;
use camptrack_pipeline::{BatchAggregator, PgCache, ResponseCache};

/// Fetch a batch of URLs through the Postgres-backed response cache and
/// print the per-item results followed by campaign totals.
///
/// # Errors
///
/// Returns an error if fetcher credentials are missing or JSON output
/// cannot be serialized. Per-URL failures are printed, not propagated.
pub(crate) async fn run_fetch(
    pool: &sqlx::PgPool,
    config: &camptrack_core::AppConfig,
    urls: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let registry = FetcherRegistry::from_config(config)?;
    let cache = Arc::new(PgCache::new(pool.clone()));
    let aggregator = BatchAggregator::from_config(Arc::new(registry), cache, config);

    let items = aggregator.fetch_batch(urls).await;
    let totals = BatchAggregator::aggregate(&items);

    if json {
        let out = serde_json::json!({ "items": items, "totals": totals });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_items(&items);
    println!();
    println!(
        "total views: {}  total engagement: {}  average rate: {:.2}%  failed: {}/{}",
        totals.total_views,
        totals.total_engagement,
        totals.average_rate,
        totals.failed_count,
        totals.item_count
    );
    Ok(())
}

pub(crate) fn print_items(items: &[ContentMetrics]) {
    println!(
        "{:<11}{:>12}{:>12}{:>9}  URL",
        "PLATFORM", "VIEWS", "ENGAGEMENT", "RATE"
    );
    for item in items {
        let m = &item.metrics;
        match &m.error {
            None => println!(
                "{:<11}{:>12}{:>12}{:>8.2}%  {}",
                item.platform.as_str(), m.views, m.engagement, m.rate, item.url
            ),
            Some(e) => println!(
                "{:<11}{:>12}{:>12}{:>9}  {}  (error: {e})",
                item.platform.as_str(), "\u{2014}", "\u{2014}", "\u{2014}", item.url
            ),
        }
    }
}

/// Delete expired response cache entries.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub(crate) async fn run_purge_cache(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let purged = PgCache::new(pool.clone()).purge_expired().await?;
    println!("purged {purged} expired cache entries");
    Ok(())
}
