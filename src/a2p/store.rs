use sqlx::PgPool;
use uuid::Uuid;

use super::models::A2pProfile;

pub async fn create_profile(
    pool: &PgPool,
    user_id: i32,
    brand_sid: Option<&str>,
    messaging_service_sid: Option<&str>,
    campaign_sid: Option<&str>,
) -> Result<A2pProfile, sqlx::Error> {
    sqlx::query_as::<_, A2pProfile>(
        r#"
        INSERT INTO a2p_profiles (id, user_id, brand_sid, messaging_service_sid, campaign_sid)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(brand_sid)
    .bind(messaging_service_sid)
    .bind(campaign_sid)
    .fetch_one(pool)
    .await
}

pub async fn find_profile(pool: &PgPool, id: Uuid) -> Result<Option<A2pProfile>, sqlx::Error> {
    sqlx::query_as::<_, A2pProfile>("SELECT * FROM a2p_profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Status callbacks do not carry our profile id; match on any identifier the
/// registry presented.
pub async fn find_by_callback_identifiers(
    pool: &PgPool,
    brand_sid: Option<&str>,
    messaging_service_sid: Option<&str>,
    campaign_sid: Option<&str>,
) -> Result<Option<A2pProfile>, sqlx::Error> {
    sqlx::query_as::<_, A2pProfile>(
        r#"
        SELECT * FROM a2p_profiles
        WHERE ($1::text IS NOT NULL AND brand_sid = $1)
           OR ($2::text IS NOT NULL AND messaging_service_sid = $2)
           OR ($3::text IS NOT NULL AND campaign_sid = $3)
        ORDER BY updated_at DESC
        LIMIT 1
        "#,
    )
    .bind(brand_sid)
    .bind(messaging_service_sid)
    .bind(campaign_sid)
    .fetch_optional(pool)
    .await
}

/// Profiles the poll loop should still be driving: registered with the
/// registry but not yet messaging-ready. Least-recently-synced first.
pub async fn pending_profiles(pool: &PgPool, limit: i64) -> Result<Vec<A2pProfile>, sqlx::Error> {
    sqlx::query_as::<_, A2pProfile>(
        r#"
        SELECT * FROM a2p_profiles
        WHERE messaging_ready = FALSE AND brand_sid IS NOT NULL
        ORDER BY last_synced_at ASC NULLS FIRST
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Point the profile at the canonical registry record. Clears `last_error` in
/// the same statement so a recovered profile stops reporting a stale failure.
pub async fn adopt_identifiers(
    pool: &PgPool,
    id: Uuid,
    messaging_service_sid: &str,
    campaign_sid: &str,
    brand_sid: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE a2p_profiles
        SET messaging_service_sid = $2,
            campaign_sid = $3,
            brand_sid = COALESCE($4, brand_sid),
            last_error = NULL,
            last_synced_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(messaging_service_sid)
    .bind(campaign_sid)
    .bind(brand_sid)
    .execute(pool)
    .await?;
    Ok(())
}

/// The partial status write every reconciliation pass lands on. Incoming
/// `None` statuses keep the stored value; `last_error` is only touched when a
/// new error is being recorded (the adopt path is what clears it).
pub async fn record_status(
    pool: &PgPool,
    id: Uuid,
    brand_status: Option<&str>,
    campaign_status: Option<&str>,
    messaging_ready: bool,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE a2p_profiles
        SET brand_status = COALESCE($2, brand_status),
            campaign_status = COALESCE($3, campaign_status),
            messaging_ready = $4,
            last_error = COALESCE($5, last_error),
            last_synced_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(brand_status)
    .bind(campaign_status)
    .bind(messaging_ready)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_error(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE a2p_profiles SET last_error = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Check-and-set on the durable billing gate: only the invocation that flips
/// NULL -> NOW() may trigger the approval fee. Returns whether this call won.
pub async fn mark_approval_notified(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE a2p_profiles
        SET approval_notified_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND approval_notified_at IS NULL
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn billing_customer(pool: &PgPool, user_id: i32) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<String>>("SELECT stripe_customer_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map(Option::flatten)
}
