use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::models::CandidateRecord;
use crate::config;

/// key: a2p-registry -> read-only view of the carrier compliance registry
///
/// The registry is the source of truth for approval state; this interface is
/// deliberately narrow and injected into the sync workflow rather than
/// reached as ambient state.
#[async_trait]
pub trait CampaignRegistry: Send + Sync {
    /// Fetch the record the stored identifiers point at, if it still exists.
    async fn fetch_campaign(
        &self,
        messaging_service_sid: &str,
        campaign_sid: &str,
    ) -> Result<Option<CandidateRecord>>;

    /// Enumerate every campaign record the registry holds for a brand, in
    /// discovery order (not sorted by status).
    async fn scan_brand_campaigns(&self, brand_sid: &str) -> Result<Vec<CandidateRecord>>;

    /// Current approval state of the brand itself.
    async fn fetch_brand_status(&self, brand_sid: &str) -> Result<Option<String>>;
}

/// key: a2p-registry-http -> reqwest implementation against the registry API
pub struct HttpCampaignRegistry {
    base: String,
    account_sid: Option<String>,
    auth_token: Option<String>,
    client: Client,
}

impl HttpCampaignRegistry {
    pub fn from_env() -> Self {
        Self::new(
            config::REGISTRY_BASE_URL.clone(),
            config::REGISTRY_ACCOUNT_SID.clone(),
            config::REGISTRY_AUTH_TOKEN.clone(),
        )
    }

    pub fn new(
        base: impl Into<String>,
        account_sid: Option<String>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            client: Client::builder()
                .timeout(Duration::from_secs(*config::REGISTRY_TIMEOUT_SECS))
                .build()
                .expect("client build"),
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let url = format!("{}/{}", self.base, path);
        let mut req = self.client.get(&url);
        if let Some(account_sid) = &self.account_sid {
            req = req.basic_auth(account_sid, self.auth_token.as_deref());
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("registry request {url} failed"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("registry request {url} rejected"))?;
        let value = resp
            .json()
            .await
            .context("registry returned malformed JSON")?;
        Ok(Some(value))
    }
}

#[async_trait]
impl CampaignRegistry for HttpCampaignRegistry {
    async fn fetch_campaign(
        &self,
        messaging_service_sid: &str,
        campaign_sid: &str,
    ) -> Result<Option<CandidateRecord>> {
        let path = format!("v1/services/{messaging_service_sid}/campaigns/{campaign_sid}");
        Ok(self
            .get(&path)
            .await?
            .map(|value| CandidateRecord::from_value(&value)))
    }

    async fn scan_brand_campaigns(&self, brand_sid: &str) -> Result<Vec<CandidateRecord>> {
        let path = format!("v1/brands/{brand_sid}/campaigns");
        let Some(value) = self.get(&path).await? else {
            return Ok(Vec::new());
        };
        Ok(value
            .get("campaigns")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(CandidateRecord::from_value).collect())
            .unwrap_or_default())
    }

    async fn fetch_brand_status(&self, brand_sid: &str) -> Result<Option<String>> {
        let path = format!("v1/brands/{brand_sid}");
        Ok(self.get(&path).await?.and_then(|value| {
            value
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
        }))
    }
}
