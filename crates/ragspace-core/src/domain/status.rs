//! Ingestion status state machine.
//!
//! Every move goes through the repository's compare-and-set primitive; this
//! module only names the legal from-sets so callers cannot invent their own.

use super::entities::DocumentStatus;

/// `from` sets use `Option<DocumentStatus>`: `None` matches a document whose
/// status column is still NULL (never enqueued).
pub type StatusSet = &'static [Option<DocumentStatus>];

/// Enqueue or reprocess: anything except an in-flight job may go PENDING.
pub const ENQUEUE_FROM: StatusSet = &[
    None,
    Some(DocumentStatus::Pending),
    Some(DocumentStatus::Ready),
    Some(DocumentStatus::Failed),
];

/// Worker claim: only unclaimed documents may go PROCESSING.
pub const CLAIM_FROM: StatusSet = &[
    None,
    Some(DocumentStatus::Pending),
    Some(DocumentStatus::Failed),
];

/// Success and failure both leave PROCESSING only.
pub const FINISH_FROM: StatusSet = &[Some(DocumentStatus::Processing)];

pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Truncate an error message to what the status column stores.
pub fn truncate_error(message: &str) -> String {
    let value = message.trim();
    if value.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return value.to_string();
    }
    let cut: String = value.chars().take(MAX_ERROR_MESSAGE_LEN - 3).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_from_excludes_terminal_ready() {
        assert!(!CLAIM_FROM.contains(&Some(DocumentStatus::Ready)));
        assert!(CLAIM_FROM.contains(&None));
        assert!(CLAIM_FROM.contains(&Some(DocumentStatus::Failed)));
    }

    #[test]
    fn truncate_error_caps_length() {
        let long = "x".repeat(1200);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_LEN);
        assert!(truncated.ends_with("..."));

        assert_eq!(truncate_error("  short  "), "short");
    }
}
