use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::config;
use crate::error::AppResult;

use super::billing::ApprovalFeeGateway;
use super::registry::CampaignRegistry;
use super::service::A2pSyncService;
use super::store;

/// key: a2p-poll-scheduler -> drive not-yet-ready profiles toward registry truth
///
/// Webhook delivery is unreliable; this loop (and the cron endpoint that runs
/// the same tick) is the retry mechanism for the whole workflow.
pub fn spawn(
    pool: PgPool,
    registry: Arc<dyn CampaignRegistry>,
    billing: Arc<dyn ApprovalFeeGateway>,
) {
    let interval = Duration::from_secs(*config::A2P_POLL_INTERVAL_SECS);
    let batch = *config::A2P_POLL_BATCH_SIZE;
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        loop {
            ticker.tick().await;
            match process_tick(&pool, registry.clone(), billing.clone(), batch).await {
                Ok(summary) if summary.checked == 0 => {
                    debug!("a2p poll tick found no pending profiles");
                }
                Ok(summary) => info!(
                    checked = summary.checked,
                    newly_ready = summary.newly_ready,
                    errored = summary.errored,
                    "a2p poll tick complete"
                ),
                Err(err) => warn!(?err, "a2p poll tick failed"),
            }
        }
    });
}

#[derive(Debug, Default, Serialize)]
pub struct TickSummary {
    pub checked: usize,
    pub newly_ready: usize,
    pub errored: usize,
}

/// key: a2p-poll-scheduler -> tick handler
pub async fn process_tick(
    pool: &PgPool,
    registry: Arc<dyn CampaignRegistry>,
    billing: Arc<dyn ApprovalFeeGateway>,
    limit: i64,
) -> AppResult<TickSummary> {
    let service = A2pSyncService::new(pool.clone(), registry, billing);
    let pending = store::pending_profiles(pool, limit).await?;

    let mut summary = TickSummary::default();
    for profile in pending {
        summary.checked += 1;
        match service.sync_profile(profile.id).await {
            Ok(outcome) if outcome.first_ready => summary.newly_ready += 1,
            Ok(_) => {}
            Err(err) => {
                summary.errored += 1;
                warn!(?err, profile = %profile.id, "a2p profile sync failed");
                if let Err(store_err) =
                    store::record_error(pool, profile.id, &err.to_string()).await
                {
                    warn!(?store_err, profile = %profile.id, "failed to record sync error");
                }
            }
        }
    }
    Ok(summary)
}
