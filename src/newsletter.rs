//! Periodic newsletter: re-scrapes each watched topic and delivers only the
//! posts a subscriber has not seen yet.

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::courier;
use crate::db::Database;
use crate::delivery::{ImageTransport, TelegramClient};
use crate::scrape::{Post, ThreadScraper};
use crate::store::{ImageCache, Subscription, SubscriptionStore};

/// Run the newsletter loop forever.
pub async fn run_loop(config: Config, db: Database, transport: TelegramClient) {
    let scraper = ThreadScraper::new(&config);

    let mut ticker = tokio::time::interval(config.newsletter_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match run_once(&config, &scraper, &db, &db, &transport).await {
            Ok(0) => debug!("Newsletter cycle complete, nothing new"),
            Ok(delivered) => info!(delivered, "Newsletter cycle complete"),
            Err(e) => error!("Newsletter cycle failed: {e:#}"),
        }
    }
}

/// Run one newsletter cycle over every configured topic. Returns the number
/// of delivered posts.
///
/// A topic whose window cannot be built is skipped for this cycle only; the
/// remaining topics still run.
///
/// # Errors
///
/// Returns an error when the subscription store fails.
pub async fn run_once(
    config: &Config,
    scraper: &ThreadScraper,
    cache: &dyn ImageCache,
    subscriptions: &dyn SubscriptionStore,
    transport: &dyn ImageTransport,
) -> Result<usize> {
    let mut delivered_total = 0usize;

    for topic in &config.topics {
        debug!(topic = %topic.name, "checking topic for updates");

        let window = match scraper
            .get_window(cache, &topic.path, config.photo_count, 0)
            .await
        {
            Ok(window) => window,
            Err(e) => {
                // One broken topic must not starve the others this cycle.
                warn!(topic = %topic.name, "skipping topic: {e}");
                continue;
            }
        };

        for subscription in subscriptions.subscriptions_for_topic(&topic.path).await? {
            delivered_total +=
                deliver_updates(cache, subscriptions, transport, &subscription, &window).await?;
        }
    }

    Ok(delivered_total)
}

/// Send one subscriber everything in the window newer than their watermark,
/// oldest first, advancing the watermark after each delivered post.
async fn deliver_updates(
    cache: &dyn ImageCache,
    subscriptions: &dyn SubscriptionStore,
    transport: &dyn ImageTransport,
    subscription: &Subscription,
    window: &[Post],
) -> Result<usize> {
    let mut delivered = 0usize;

    for post in window
        .iter()
        .filter(|post| post.seen_at() > subscription.last_seen_at)
    {
        match courier::deliver_post(transport, cache, subscription.chat_id, post).await {
            Ok(_) => {
                subscriptions
                    .advance_watermark(subscription.id, post.seen_at())
                    .await?;
                delivered += 1;
            }
            Err(e) => {
                // Preserve delivery order: leave the watermark at the last
                // delivered post and retry from here next cycle.
                warn!(
                    chat = subscription.chat_id,
                    post = %post.permalink,
                    "delivery failed, deferring rest of cycle: {e:#}"
                );
                break;
            }
        }
    }

    Ok(delivered)
}
