//! Campaign content registration and snapshot display.

use camptrack_pipeline::PgStore;

/// Register content URLs for a campaign.
///
/// # Errors
///
/// Returns an error if any URL is empty or unsupported (nothing is stored
/// in that case), or if a write fails.
pub(crate) async fn run_register(
    pool: &sqlx::PgPool,
    campaign_id: &str,
    urls: &[String],
) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let references = camptrack_pipeline::register_content(&store, campaign_id, urls).await?;

    println!(
        "registered {} content URLs for campaign {campaign_id}",
        references.len()
    );
    for reference in &references {
        println!("  {:<11}{}", reference.platform.as_str(), reference.url);
    }
    Ok(())
}

/// Print a campaign's analytics snapshot, optionally recomputing it first.
///
/// # Errors
///
/// Returns an error if the campaign has no snapshot yet, or a query fails.
pub(crate) async fn run_snapshot(
    pool: &sqlx::PgPool,
    campaign_id: &str,
    refresh: bool,
) -> anyhow::Result<()> {
    let store = PgStore::new(pool.clone());
    let snapshot = if refresh {
        camptrack_pipeline::refresh_snapshot(&store, campaign_id).await?
    } else {
        camptrack_pipeline::campaign_snapshot(&store, campaign_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no snapshot for campaign '{campaign_id}'; run `process` or `snapshot --refresh` first"
                )
            })?
    };

    let totals = &snapshot.totals;
    println!("Campaign: {}", snapshot.campaign_id);
    println!(
        "Last updated: {}",
        snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Views: {}  Engagement: {}  Average rate: {:.2}%  Items: {}",
        totals.total_views, totals.total_engagement, totals.average_rate, totals.item_count
    );
    println!();
    crate::analytics::print_items(&snapshot.per_item);
    Ok(())
}
