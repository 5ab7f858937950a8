use super::status;

/// key: a2p-transition -> readiness decision for one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyTransition {
    pub ready: bool,
    pub first_time: bool,
}

/// `ready` requires both the brand and the campaign to be approved.
/// `first_time` additionally requires that the durable approval-notification
/// gate has never been set. This only reports the decision; the caller owns
/// the conditional write that actually claims the gate.
pub fn detect(
    brand_status: Option<&str>,
    campaign_status: Option<&str>,
    previously_notified: bool,
) -> ReadyTransition {
    let ready = status::is_approved(brand_status) && status::is_approved(campaign_status);
    ReadyTransition {
        ready,
        first_time: ready && !previously_notified,
    }
}
