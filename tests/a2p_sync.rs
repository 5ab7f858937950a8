use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use a2p_registrar::a2p::{
    A2pProfile, A2pSyncService, ApprovalFeeGateway, CampaignRegistry, CandidateRecord,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

// key: a2p-sync-tests -> canonical selection, idempotent billing, failure isolation

#[derive(Default)]
struct ScriptedRegistry {
    current: Option<CandidateRecord>,
    candidates: Vec<CandidateRecord>,
    brand_status: Option<String>,
    fail: bool,
}

#[async_trait]
impl CampaignRegistry for ScriptedRegistry {
    async fn fetch_campaign(
        &self,
        _messaging_service_sid: &str,
        _campaign_sid: &str,
    ) -> Result<Option<CandidateRecord>> {
        if self.fail {
            bail!("registry offline");
        }
        Ok(self.current.clone())
    }

    async fn scan_brand_campaigns(&self, _brand_sid: &str) -> Result<Vec<CandidateRecord>> {
        if self.fail {
            bail!("registry offline");
        }
        Ok(self.candidates.clone())
    }

    async fn fetch_brand_status(&self, _brand_sid: &str) -> Result<Option<String>> {
        if self.fail {
            bail!("registry offline");
        }
        Ok(self.brand_status.clone())
    }
}

#[derive(Default)]
struct CountingBilling {
    attempts: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl ApprovalFeeGateway for CountingBilling {
    async fn charge_approval_fee_if_needed(&self, _customer_id: &str) -> Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("billing gateway down");
        }
        Ok(true)
    }
}

fn candidate(campaign: &str, messaging_service: &str, status: &str) -> CandidateRecord {
    CandidateRecord {
        campaign_sid: Some(campaign.to_string()),
        messaging_service_sid: Some(messaging_service.to_string()),
        brand_sid: Some("BN123".to_string()),
        status: Some(status.to_string()),
        last_updated: None,
    }
}

async fn seed_user(pool: &PgPool, email: &str, customer: Option<&str>) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (email, stripe_customer_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(email)
    .bind(customer)
    .fetch_one(pool)
    .await
    .expect("user")
}

async fn seed_profile(
    pool: &PgPool,
    user_id: i32,
    brand_sid: Option<&str>,
    messaging_service_sid: Option<&str>,
    campaign_sid: Option<&str>,
    brand_status: Option<&str>,
    campaign_status: Option<&str>,
) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO a2p_profiles
            (id, user_id, brand_sid, messaging_service_sid, campaign_sid, brand_status, campaign_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(brand_sid)
    .bind(messaging_service_sid)
    .bind(campaign_sid)
    .bind(brand_status)
    .bind(campaign_status)
    .fetch_one(pool)
    .await
    .expect("profile")
}

async fn load_profile(pool: &PgPool, id: Uuid) -> A2pProfile {
    sqlx::query_as::<_, A2pProfile>("SELECT * FROM a2p_profiles WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("profile row")
}

fn service(
    pool: &PgPool,
    registry: ScriptedRegistry,
    billing: Arc<CountingBilling>,
) -> A2pSyncService {
    A2pSyncService::new(pool.clone(), Arc::new(registry), billing)
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn adopts_scanned_candidate_and_bills_exactly_once(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "adopt@example.com", Some("cus_adopt")).await;
    let profile_id = seed_profile(&pool, user_id, Some("BN123"), None, None, None, None).await;

    let registry = ScriptedRegistry {
        candidates: vec![candidate("CM-new", "MG-new", "approved")],
        brand_status: Some("approved".to_string()),
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling::default());
    let service = service(&pool, registry, billing.clone());

    let outcome = service.sync_profile(profile_id).await.unwrap();
    assert!(outcome.switched_campaign);
    assert!(outcome.messaging_ready);
    assert!(outcome.first_ready);

    let stored = load_profile(&pool, profile_id).await;
    assert_eq!(stored.campaign_sid.as_deref(), Some("CM-new"));
    assert_eq!(stored.messaging_service_sid.as_deref(), Some("MG-new"));
    assert!(stored.messaging_ready);
    assert!(stored.approval_notified_at.is_some());
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);

    // Re-running the workflow with identical inputs is a no-op for billing.
    let second = service.sync_profile(profile_id).await.unwrap();
    assert!(!second.first_ready);
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn approved_campaign_is_not_abandoned_for_pending_candidate(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "keep@example.com", Some("cus_keep")).await;
    let profile_id = seed_profile(
        &pool,
        user_id,
        Some("BN123"),
        Some("MG-a"),
        Some("CM-a"),
        Some("approved"),
        Some("approved"),
    )
    .await;

    let registry = ScriptedRegistry {
        current: Some(candidate("CM-a", "MG-a", "approved")),
        candidates: vec![candidate("CM-b", "MG-b", "pending")],
        brand_status: Some("approved".to_string()),
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling::default());
    let service = service(&pool, registry, billing.clone());

    let outcome = service.sync_profile(profile_id).await.unwrap();
    assert!(!outcome.switched_campaign);

    let stored = load_profile(&pool, profile_id).await;
    assert_eq!(stored.campaign_sid.as_deref(), Some("CM-a"));
    assert_eq!(stored.messaging_service_sid.as_deref(), Some("MG-a"));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn concurrent_syncs_bill_at_most_once(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "race@example.com", Some("cus_race")).await;
    let profile_id = seed_profile(
        &pool,
        user_id,
        Some("BN123"),
        Some("MG-a"),
        Some("CM-a"),
        None,
        None,
    )
    .await;

    let registry = ScriptedRegistry {
        current: Some(candidate("CM-a", "MG-a", "approved")),
        brand_status: Some("approved".to_string()),
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling::default());
    let service = service(&pool, registry, billing.clone());

    let (first, second) = tokio::join!(
        service.sync_profile(profile_id),
        service.sync_profile(profile_id)
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    // Both observe the ready state; the conditional gate lets only one bill.
    assert!(first.messaging_ready && second.messaging_ready);
    assert_eq!(
        usize::from(first.first_ready) + usize::from(second.first_ready),
        1
    );
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);

    let stored = load_profile(&pool, profile_id).await;
    assert!(stored.approval_notified_at.is_some());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn billing_outage_never_blocks_reconciliation(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "outage@example.com", Some("cus_outage")).await;
    let profile_id = seed_profile(
        &pool,
        user_id,
        Some("BN123"),
        Some("MG-a"),
        Some("CM-a"),
        None,
        None,
    )
    .await;

    let registry = ScriptedRegistry {
        current: Some(candidate("CM-a", "MG-a", "approved")),
        brand_status: Some("approved".to_string()),
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling {
        fail: true,
        ..Default::default()
    });
    let service = service(&pool, registry, billing.clone());

    let outcome = service.sync_profile(profile_id).await.unwrap();
    assert!(outcome.messaging_ready);
    assert!(outcome.first_ready);
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);

    // The gate stays claimed by the first acquisition even though the charge
    // failed; the gateway-side key is what a later replay would lean on.
    let stored = load_profile(&pool, profile_id).await;
    assert!(stored.messaging_ready);
    assert!(stored.approval_notified_at.is_some());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn registry_outage_falls_back_to_local_state(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "offline@example.com", Some("cus_offline")).await;
    let profile_id = seed_profile(
        &pool,
        user_id,
        Some("BN123"),
        Some("MG-a"),
        Some("CM-a"),
        Some("pending"),
        Some("pending"),
    )
    .await;

    let registry = ScriptedRegistry {
        fail: true,
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling::default());
    let service = service(&pool, registry, billing.clone());

    let outcome = service.sync_profile(profile_id).await.unwrap();
    assert!(!outcome.messaging_ready);
    assert_eq!(outcome.campaign_status.as_deref(), Some("pending"));
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 0);

    let stored = load_profile(&pool, profile_id).await;
    assert_eq!(stored.campaign_sid.as_deref(), Some("CM-a"));
    assert!(stored.last_error.is_some());
    assert!(stored.last_synced_at.is_some());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn status_callback_payload_drives_first_ready(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "callback@example.com", Some("cus_callback")).await;
    let profile_id = seed_profile(
        &pool,
        user_id,
        Some("BN123"),
        Some("MG-a"),
        Some("CM-a"),
        Some("pending"),
        Some("pending"),
    )
    .await;

    // Identifiers are complete, so the webhook path never touches the
    // registry; a scripted outage proves it.
    let registry = ScriptedRegistry {
        fail: true,
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling::default());
    let service = service(&pool, registry, billing.clone());

    let profile = load_profile(&pool, profile_id).await;
    let outcome = service
        .apply_status_callback(
            profile,
            Some("approved".to_string()),
            Some("approved".to_string()),
        )
        .await
        .unwrap();
    assert!(outcome.messaging_ready);
    assert!(outcome.first_ready);
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);

    // Redelivery of the same notification reconciles but does not re-bill.
    let profile = load_profile(&pool, profile_id).await;
    let redelivered = service
        .apply_status_callback(
            profile,
            Some("approved".to_string()),
            Some("approved".to_string()),
        )
        .await
        .unwrap();
    assert!(redelivered.messaging_ready);
    assert!(!redelivered.first_ready);
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn approval_gate_survives_status_downgrades(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "downgrade@example.com", Some("cus_down")).await;
    let profile_id = seed_profile(
        &pool,
        user_id,
        Some("BN123"),
        Some("MG-a"),
        Some("CM-a"),
        None,
        None,
    )
    .await;

    let ready_registry = ScriptedRegistry {
        current: Some(candidate("CM-a", "MG-a", "approved")),
        brand_status: Some("approved".to_string()),
        ..Default::default()
    };
    let billing = Arc::new(CountingBilling::default());
    service(&pool, ready_registry, billing.clone())
        .sync_profile(profile_id)
        .await
        .unwrap();
    let notified_at = load_profile(&pool, profile_id)
        .await
        .approval_notified_at
        .expect("gate set");

    // Registry later reports the campaign back in review.
    let regressed_registry = ScriptedRegistry {
        current: Some(candidate("CM-a", "MG-a", "in_review")),
        brand_status: Some("approved".to_string()),
        ..Default::default()
    };
    let outcome = service(&pool, regressed_registry, billing.clone())
        .sync_profile(profile_id)
        .await
        .unwrap();
    assert!(!outcome.messaging_ready);

    let stored = load_profile(&pool, profile_id).await;
    assert!(!stored.messaging_ready);
    assert_eq!(stored.approval_notified_at, Some(notified_at));
    assert_eq!(billing.attempts.load(Ordering::SeqCst), 1);
}
