use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config;

/// Customer-metadata flag the payment gateway keys the one-time fee on.
const CHARGED_FLAG: &str = "a2p_approval_charged";

/// key: a2p-billing -> one-time approval fee, idempotent on the gateway side
///
/// Safe to call redundantly: the gateway-held flag makes a replayed call a
/// no-op, which is what makes a lost local gate write survivable.
#[async_trait]
pub trait ApprovalFeeGateway: Send + Sync {
    /// Charge the one-time approval fee unless the customer already carries
    /// the charged marker. Returns whether a charge was created.
    async fn charge_approval_fee_if_needed(&self, customer_id: &str) -> Result<bool>;
}

/// key: a2p-billing-stripe -> metadata-flag implementation
pub struct StripeLikeGateway {
    base: String,
    api_key: Option<String>,
    client: Client,
}

impl StripeLikeGateway {
    pub fn from_env() -> Self {
        Self::new(
            config::BILLING_BASE_URL.clone(),
            config::BILLING_API_KEY.clone(),
        )
    }

    pub fn new(base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("client build"),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}/{}", self.base, path));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[async_trait]
impl ApprovalFeeGateway for StripeLikeGateway {
    async fn charge_approval_fee_if_needed(&self, customer_id: &str) -> Result<bool> {
        let customer: Value = self
            .request(reqwest::Method::GET, &format!("v1/customers/{customer_id}"))
            .send()
            .await
            .context("billing customer lookup failed")?
            .error_for_status()
            .context("billing customer lookup rejected")?
            .json()
            .await
            .context("billing customer payload malformed")?;

        let already_charged = customer
            .pointer(&format!("/metadata/{CHARGED_FLAG}"))
            .and_then(Value::as_str)
            == Some("true");
        if already_charged {
            return Ok(false);
        }

        let amount = config::A2P_APPROVAL_FEE_CENTS.to_string();
        self.request(reqwest::Method::POST, "v1/charges")
            .form(&[
                ("customer", customer_id),
                ("amount", amount.as_str()),
                ("currency", "usd"),
                ("description", "A2P registration approval fee"),
            ])
            .send()
            .await
            .context("approval fee charge failed")?
            .error_for_status()
            .context("approval fee charge rejected")?;

        // Marker is written only after a successful charge so a failed
        // charge stays retryable on the next ready transition.
        self.request(reqwest::Method::POST, &format!("v1/customers/{customer_id}"))
            .form(&[(format!("metadata[{CHARGED_FLAG}]"), "true")])
            .send()
            .await
            .context("charged marker update failed")?
            .error_for_status()
            .context("charged marker update rejected")?;

        Ok(true)
    }
}
