use std::sync::Arc;

use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::billing::ApprovalFeeGateway;
use super::models::{A2pProfile, CandidateRecord, SyncOutcome};
use super::registry::CampaignRegistry;
use super::selector::{self, CurrentSelection};
use super::store;
use super::transition;

/// key: a2p-sync-service -> the reconciliation workflow behind every entry point
///
/// Webhook deliveries and poll ticks for the same profile may run
/// concurrently; every write here is a partial update and the billing gate is
/// a conditional one, so overlapping invocations converge instead of
/// clobbering each other.
#[derive(Clone)]
pub struct A2pSyncService {
    pool: PgPool,
    registry: Arc<dyn CampaignRegistry>,
    billing: Arc<dyn ApprovalFeeGateway>,
}

/// Status fields one entry point already knows. The webhook carries them in
/// its payload; the polling path asks the registry instead.
#[derive(Debug, Default)]
struct StatusSnapshot {
    brand_status: Option<String>,
    campaign_status: Option<String>,
    consult_registry: bool,
}

struct CanonicalResolution {
    adopted: Option<CandidateRecord>,
    campaign_status: Option<String>,
    error: Option<String>,
}

impl A2pSyncService {
    pub fn new(
        pool: PgPool,
        registry: Arc<dyn CampaignRegistry>,
        billing: Arc<dyn ApprovalFeeGateway>,
    ) -> Self {
        Self {
            pool,
            registry,
            billing,
        }
    }

    /// Polling and on-demand entry point: the registry is consulted for both
    /// the canonical record and the current statuses.
    pub async fn sync_profile(&self, profile_id: Uuid) -> AppResult<SyncOutcome> {
        let profile = store::find_profile(&self.pool, profile_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.reconcile(
            profile,
            StatusSnapshot {
                consult_registry: true,
                ..Default::default()
            },
        )
        .await
    }

    /// Webhook entry point: statuses come straight from the notification
    /// payload; the registry is only consulted when the stored identifiers
    /// are incomplete.
    pub async fn apply_status_callback(
        &self,
        profile: A2pProfile,
        brand_status: Option<String>,
        campaign_status: Option<String>,
    ) -> AppResult<SyncOutcome> {
        let consult_registry =
            profile.campaign_sid.is_none() || profile.messaging_service_sid.is_none();
        self.reconcile(
            profile,
            StatusSnapshot {
                brand_status,
                campaign_status,
                consult_registry,
            },
        )
        .await
    }

    async fn reconcile(
        &self,
        profile: A2pProfile,
        incoming: StatusSnapshot,
    ) -> AppResult<SyncOutcome> {
        let mut brand_sid = profile.brand_sid.clone();
        let mut brand_status = incoming.brand_status.or_else(|| profile.brand_status.clone());
        let mut campaign_status = incoming
            .campaign_status
            .or_else(|| profile.campaign_status.clone());
        let mut registry_error: Option<String> = None;
        let mut switched = false;

        if incoming.consult_registry {
            let resolution = self
                .resolve_canonical(&profile, campaign_status.as_deref())
                .await;
            registry_error = resolution.error;
            if let Some(freshest) = resolution.campaign_status {
                campaign_status = Some(freshest);
            }

            if let Some(candidate) = resolution.adopted {
                // Both sids are guaranteed by the selector's adoptability filter.
                if let (Some(ms), Some(campaign)) = (
                    candidate.messaging_service_sid.as_deref(),
                    candidate.campaign_sid.as_deref(),
                ) {
                    let adopted_brand = candidate
                        .brand_sid
                        .as_deref()
                        .filter(|sid| sid.starts_with("BN"));
                    info!(
                        profile = %profile.id,
                        campaign,
                        messaging_service = ms,
                        "switching to canonical registry campaign"
                    );
                    if let Err(err) = store::adopt_identifiers(
                        &self.pool,
                        profile.id,
                        ms,
                        campaign,
                        adopted_brand,
                    )
                    .await
                    {
                        // Non-fatal: the status reconciliation below still
                        // runs and a later pass retries the switch.
                        warn!(?err, profile = %profile.id, "failed to persist canonical identifiers");
                    }
                    if let Some(brand) = adopted_brand {
                        brand_sid = Some(brand.to_string());
                    }
                    if candidate.status.is_some() {
                        campaign_status = candidate.status.clone();
                    }
                    switched = true;
                }
            }

            // Refresh brand approval from the registry; the poll path has no
            // payload to learn it from.
            if let Some(brand) = brand_sid.as_deref() {
                match self.registry.fetch_brand_status(brand).await {
                    Ok(Some(fresh)) => brand_status = Some(fresh),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(?err, profile = %profile.id, brand, "brand status fetch failed; using last known state");
                        registry_error
                            .get_or_insert_with(|| format!("brand status fetch failed: {err:#}"));
                    }
                }
            }
        }

        let decision = transition::detect(
            brand_status.as_deref(),
            campaign_status.as_deref(),
            profile.approval_notified_at.is_some(),
        );

        // The one write whose failure fails the workflow.
        store::record_status(
            &self.pool,
            profile.id,
            brand_status.as_deref(),
            campaign_status.as_deref(),
            decision.ready,
            registry_error.as_deref(),
        )
        .await?;

        let mut first_ready = false;
        if decision.first_time {
            match store::mark_approval_notified(&self.pool, profile.id).await {
                Ok(true) => {
                    first_ready = true;
                    info!(
                        profile = %profile.id,
                        user_id = profile.user_id,
                        "profile is messaging-ready for the first time"
                    );
                    self.charge_approval_fee(profile.user_id).await;
                }
                Ok(false) => {
                    debug!(profile = %profile.id, "concurrent sync already claimed the approval notification");
                }
                Err(err) => {
                    // Gate write failed outright; lean on the gateway's own
                    // idempotency key rather than dropping the charge.
                    warn!(?err, profile = %profile.id, "failed to set approval notification gate");
                    self.charge_approval_fee(profile.user_id).await;
                }
            }
        }

        Ok(SyncOutcome {
            profile_id: profile.id,
            brand_status,
            campaign_status,
            messaging_ready: decision.ready,
            switched_campaign: switched,
            first_ready,
        })
    }

    /// Billing is a side effect of the ready transition, never a gate on it:
    /// every failure is logged and swallowed.
    async fn charge_approval_fee(&self, user_id: i32) {
        let customer = match store::billing_customer(&self.pool, user_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                warn!(user_id, "no billing customer on file; skipping approval fee");
                return;
            }
            Err(err) => {
                warn!(?err, user_id, "billing customer lookup failed; skipping approval fee");
                return;
            }
        };
        match self.billing.charge_approval_fee_if_needed(&customer).await {
            Ok(true) => info!(user_id, "one-time approval fee charged"),
            Ok(false) => debug!(user_id, "approval fee already charged"),
            Err(err) => warn!(?err, user_id, "approval fee charge failed (non-fatal)"),
        }
    }

    /// Registry truth: refresh the stored record's status and consider
    /// switching to a better candidate. Every failure in here degrades to
    /// "no switch"; this path never fails the caller.
    async fn resolve_canonical(
        &self,
        profile: &A2pProfile,
        baseline_status: Option<&str>,
    ) -> CanonicalResolution {
        let mut resolution = CanonicalResolution {
            adopted: None,
            campaign_status: None,
            error: None,
        };

        if let (Some(ms), Some(campaign)) = (
            profile.messaging_service_sid.as_deref(),
            profile.campaign_sid.as_deref(),
        ) {
            match self.registry.fetch_campaign(ms, campaign).await {
                Ok(Some(record)) => resolution.campaign_status = record.status,
                Ok(None) => {
                    debug!(profile = %profile.id, campaign, "stored campaign no longer present in registry");
                }
                Err(err) => {
                    warn!(?err, profile = %profile.id, "stored campaign fetch failed");
                    resolution.error = Some(format!("campaign fetch failed: {err:#}"));
                }
            }
        }

        let candidates = match profile.brand_sid.as_deref() {
            Some(brand) => match self.registry.scan_brand_campaigns(brand).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(?err, profile = %profile.id, brand, "registry scan failed; keeping stored identifiers");
                    resolution
                        .error
                        .get_or_insert_with(|| format!("registry scan failed: {err:#}"));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let current = CurrentSelection {
            campaign_sid: profile.campaign_sid.as_deref(),
            messaging_service_sid: profile.messaging_service_sid.as_deref(),
            status: resolution.campaign_status.as_deref().or(baseline_status),
        };
        resolution.adopted = selector::select_canonical(&current, &candidates).cloned();
        resolution
    }
}
