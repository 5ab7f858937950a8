fn normalize(status: Option<&str>) -> String {
    status.unwrap_or("").trim().to_ascii_lowercase()
}

/// The registry reports several spellings of "approved" depending on the
/// record type and API version; all of them permit messaging.
pub fn is_approved(status: Option<&str>) -> bool {
    matches!(
        normalize(status).as_str(),
        "approved" | "verified" | "registered" | "success"
    )
}

pub fn is_pending(status: Option<&str>) -> bool {
    matches!(
        normalize(status).as_str(),
        "pending" | "submitted" | "in_progress" | "in_review"
    )
}

/// key: a2p-status-score -> rank a status for canonical-record comparison
///
/// Approved beats pending beats everything else (rejected, unknown, empty).
/// Only ever used relatively; never persisted.
pub fn score(status: Option<&str>) -> u8 {
    if is_approved(status) {
        2
    } else if is_pending(status) {
        1
    } else {
        0
    }
}
