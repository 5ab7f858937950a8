use super::models::CandidateRecord;
use super::status;

/// The identifiers and status the profile currently points at, possibly
/// incomplete.
#[derive(Debug, Default)]
pub struct CurrentSelection<'a> {
    pub campaign_sid: Option<&'a str>,
    pub messaging_service_sid: Option<&'a str>,
    pub status: Option<&'a str>,
}

/// key: a2p-selector -> pick the canonical registry record
///
/// Registry scans are unordered and resubmits leave stale records behind, so
/// the best candidate is the top-scoring one, newest first within a score tie.
/// A switch happens when local identifiers are missing, when a candidate
/// strictly outranks the current record, or when a different campaign exists
/// and the current one is not yet approved. An approved campaign is never
/// abandoned for a lower-or-equal candidate.
pub fn select_canonical<'c>(
    current: &CurrentSelection<'_>,
    candidates: &'c [CandidateRecord],
) -> Option<&'c CandidateRecord> {
    let best = candidates
        .iter()
        .filter(|c| c.campaign_sid.is_some() && c.messaging_service_sid.is_some())
        .max_by(|a, b| {
            status::score(a.status.as_deref())
                .cmp(&status::score(b.status.as_deref()))
                .then(a.last_updated.cmp(&b.last_updated))
        })?;

    if current.campaign_sid.is_none() || current.messaging_service_sid.is_none() {
        return Some(best);
    }

    if status::score(best.status.as_deref()) > status::score(current.status) {
        return Some(best);
    }

    if best.campaign_sid.as_deref() != current.campaign_sid
        && !status::is_approved(current.status)
    {
        return Some(best);
    }

    None
}
