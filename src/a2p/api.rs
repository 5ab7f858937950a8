use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::error::{AppError, AppResult};

use super::billing::ApprovalFeeGateway;
use super::models::{A2pProfile, SyncOutcome};
use super::registry::CampaignRegistry;
use super::scheduler::{self, TickSummary};
use super::service::A2pSyncService;
use super::store;

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: i32,
    pub brand_sid: Option<String>,
    pub messaging_service_sid: Option<String>,
    pub campaign_sid: Option<String>,
}

pub async fn create_profile(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<A2pProfile>)> {
    let result = store::create_profile(
        &pool,
        payload.user_id,
        payload.brand_sid.as_deref(),
        payload.messaging_service_sid.as_deref(),
        payload.campaign_sid.as_deref(),
    )
    .await;
    match result {
        Ok(profile) => Ok((StatusCode::CREATED, Json(profile))),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("a2p_profiles_user_id_key") {
                    return Err(AppError::BadRequest(
                        "profile already exists for user".into(),
                    ));
                }
            }
            Err(AppError::Db(e))
        }
    }
}

pub async fn get_profile(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<A2pProfile>> {
    let profile = store::find_profile(&pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(profile))
}

/// On-demand sync for one profile; same workflow the poll loop runs.
pub async fn sync_profile(
    Extension(pool): Extension<PgPool>,
    Extension(registry): Extension<Arc<dyn CampaignRegistry>>,
    Extension(billing): Extension<Arc<dyn ApprovalFeeGateway>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SyncOutcome>> {
    let service = A2pSyncService::new(pool, registry, billing);
    Ok(Json(service.sync_profile(id).await?))
}

/// key: a2p-webhook -> inbound registry status notification
#[derive(Debug, Deserialize)]
pub struct StatusCallbackRequest {
    pub brand_sid: Option<String>,
    pub messaging_service_sid: Option<String>,
    pub campaign_sid: Option<String>,
    pub brand_status: Option<String>,
    pub campaign_status: Option<String>,
}

/// Responds success once reconciliation completes; billing never affects the
/// response. Notifications we cannot attribute to a profile are acknowledged
/// so the registry does not redeliver them forever.
pub async fn status_callback(
    Extension(pool): Extension<PgPool>,
    Extension(registry): Extension<Arc<dyn CampaignRegistry>>,
    Extension(billing): Extension<Arc<dyn ApprovalFeeGateway>>,
    Json(payload): Json<StatusCallbackRequest>,
) -> AppResult<Json<Value>> {
    let profile = store::find_by_callback_identifiers(
        &pool,
        payload.brand_sid.as_deref(),
        payload.messaging_service_sid.as_deref(),
        payload.campaign_sid.as_deref(),
    )
    .await?;
    let Some(profile) = profile else {
        info!(
            brand = ?payload.brand_sid,
            campaign = ?payload.campaign_sid,
            "status callback for unknown profile ignored"
        );
        return Ok(Json(json!({ "ok": true, "matched": false })));
    };

    let service = A2pSyncService::new(pool, registry, billing);
    let outcome = service
        .apply_status_callback(profile, payload.brand_status, payload.campaign_status)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "matched": true,
        "messaging_ready": outcome.messaging_ready,
    })))
}

/// Polling trigger. The shared secret may arrive through any of these
/// channels; any single match authorizes.
pub async fn check_pending(
    Extension(pool): Extension<PgPool>,
    Extension(registry): Extension<Arc<dyn CampaignRegistry>>,
    Extension(billing): Extension<Arc<dyn ApprovalFeeGateway>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<TickSummary>> {
    if !cron_authorized(config::CRON_SECRET.as_deref(), &headers, &query) {
        return Err(AppError::Unauthorized);
    }
    let summary =
        scheduler::process_tick(&pool, registry, billing, *config::A2P_POLL_BATCH_SIZE).await?;
    Ok(Json(summary))
}

/// Ordered extraction strategies for the trigger secret: query param, the two
/// legacy header names, then a standard bearer token.
fn presented_secrets(headers: &HeaderMap, query: &HashMap<String, String>) -> Vec<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::to_string);

    [
        query.get("token").cloned(),
        header_value("x-cron-token"),
        header_value("x-cron-key"),
        bearer,
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn cron_authorized(
    secret: Option<&str>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> bool {
    match secret {
        Some(secret) => presented_secrets(headers, query)
            .iter()
            .any(|candidate| candidate == secret),
        // Nothing configured to check against.
        None => true,
    }
}
