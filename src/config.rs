use once_cell::sync::Lazy;

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// key: a2p-config -> shared secret for the polling trigger endpoint
///
/// Accepted via query param, `x-cron-token`, `x-cron-key`, or a bearer token.
/// When unset the endpoint is open; production deployments set it.
pub static CRON_SECRET: Lazy<Option<String>> = Lazy::new(|| read_optional_env("CRON_SECRET"));

/// key: a2p-config -> poll cadence for not-yet-ready profiles
pub static A2P_POLL_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("A2P_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(300)
});

/// key: a2p-config -> max profiles reconciled per poll tick
pub static A2P_POLL_BATCH_SIZE: Lazy<i64> = Lazy::new(|| {
    std::env::var("A2P_POLL_BATCH_SIZE")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(50)
});

/// Base URL of the carrier compliance registry API.
pub static REGISTRY_BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("REGISTRY_BASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "http://127.0.0.1:8787".to_string())
});

/// Account identifier presented to the registry as the basic-auth username.
pub static REGISTRY_ACCOUNT_SID: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("REGISTRY_ACCOUNT_SID"));

/// Auth token paired with `REGISTRY_ACCOUNT_SID`.
pub static REGISTRY_AUTH_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("REGISTRY_AUTH_TOKEN"));

/// Timeout for registry fetches and scans, in seconds.
pub static REGISTRY_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("REGISTRY_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(10)
});

/// Base URL of the payment gateway API.
pub static BILLING_BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("BILLING_BASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "https://api.stripe.com".to_string())
});

/// API key presented to the payment gateway.
pub static BILLING_API_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("BILLING_API_KEY"));

/// key: a2p-config -> one-time registration approval fee, in cents
pub static A2P_APPROVAL_FEE_CENTS: Lazy<i64> = Lazy::new(|| {
    std::env::var("A2P_APPROVAL_FEE_CENTS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(1500)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
