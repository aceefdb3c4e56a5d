use osync_ledger::LedgerError;

use crate::state_machine::TransitionError;

/// Per-order and per-pass failure kinds.
///
/// `is_retriable()` decides whether a failed order stays PENDING (picked up
/// by the next pass) or moves to FAILED.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Network, timeout, 5xx or 429 from a ledger.
    Transient(String),
    /// One message per source position whose article has no catalog mapping.
    Unresolvable(Vec<String>),
    /// SyncConfig missing or inactive.
    Configuration(String),
    /// Source document unusable as-is (bad position values, undecodable body).
    Malformed(String),
    /// Ledger refused the request and would refuse it again.
    Rejected(String),
    /// Create call sent but its result is unknown (garbled 2xx body). The
    /// document may exist; the next attempt looks it up by external code
    /// before creating.
    Unconfirmed(String),
    /// No tracked order with that id.
    NotFound(String),
    /// Manual resync of an order that already has a target document.
    AlreadySynced(String),
    /// Another task currently owns this order.
    Busy(String),
    /// Operator command not legal in the order's current state.
    InvalidTransition(TransitionError),
    /// Record store failure.
    Store(String),
}

impl SyncError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SyncError::Transient(_) | SyncError::Unresolvable(_) | SyncError::Unconfirmed(_)
        )
    }

    /// Classify a ledger failure seen while working on one order.
    pub fn from_ledger(err: LedgerError) -> Self {
        match err {
            LedgerError::Transport(_) | LedgerError::Unavailable { .. } => {
                SyncError::Transient(err.to_string())
            }
            LedgerError::Decode(_) => SyncError::Malformed(err.to_string()),
            LedgerError::Rejected { .. } | LedgerError::NotFound(_) => {
                SyncError::Rejected(err.to_string())
            }
        }
    }

    /// Classify a failed purchase-document create. An undecodable success
    /// body says nothing about the source document.
    pub fn from_create(err: LedgerError) -> Self {
        match err {
            LedgerError::Decode(_) => SyncError::Unconfirmed(err.to_string()),
            other => SyncError::from_ledger(other),
        }
    }

    pub fn store(err: anyhow::Error) -> Self {
        SyncError::Store(format!("{err:#}"))
    }

    /// Stable machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Transient(_) => "transient",
            SyncError::Unresolvable(_) => "unresolvable",
            SyncError::Configuration(_) => "configuration",
            SyncError::Malformed(_) => "malformed",
            SyncError::Rejected(_) => "rejected",
            SyncError::Unconfirmed(_) => "unconfirmed",
            SyncError::NotFound(_) => "not_found",
            SyncError::AlreadySynced(_) => "already_synced",
            SyncError::Busy(_) => "busy",
            SyncError::InvalidTransition(_) => "invalid_transition",
            SyncError::Store(_) => "store",
        }
    }

    /// Text written to `error_msg`.
    pub fn message(&self) -> String {
        match self {
            SyncError::Unresolvable(items) => items.join("\n"),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Transient(m) => write!(f, "transient: {m}"),
            SyncError::Unresolvable(items) => {
                write!(f, "unresolvable items: {}", items.join("; "))
            }
            SyncError::Configuration(m) => write!(f, "configuration: {m}"),
            SyncError::Malformed(m) => write!(f, "malformed source document: {m}"),
            SyncError::Rejected(m) => write!(f, "rejected: {m}"),
            SyncError::Unconfirmed(m) => write!(f, "purchase document create unconfirmed: {m}"),
            SyncError::NotFound(m) => write!(f, "not found: {m}"),
            SyncError::AlreadySynced(m) => write!(f, "already synced: {m}"),
            SyncError::Busy(m) => write!(f, "busy: {m}"),
            SyncError::InvalidTransition(e) => write!(f, "{e}"),
            SyncError::Store(m) => write!(f, "store: {m}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<TransitionError> for SyncError {
    fn from(e: TransitionError) -> Self {
        SyncError::InvalidTransition(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_classified() {
        assert!(SyncError::from_ledger(LedgerError::Transport("t".into())).is_retriable());
        assert!(SyncError::from_ledger(LedgerError::Unavailable {
            status: 429,
            message: String::new()
        })
        .is_retriable());
        assert!(!SyncError::from_ledger(LedgerError::Rejected {
            status: 400,
            message: String::new()
        })
        .is_retriable());
        assert!(matches!(
            SyncError::from_ledger(LedgerError::Decode("x".into())),
            SyncError::Malformed(_)
        ));
    }

    #[test]
    fn garbled_create_response_is_unconfirmed_not_malformed() {
        let e = SyncError::from_create(LedgerError::Decode("expected value".into()));
        assert!(matches!(e, SyncError::Unconfirmed(_)));
        assert!(e.is_retriable());
        assert!(!e.to_string().contains("source document"));
        assert!(matches!(
            SyncError::from_create(LedgerError::Rejected { status: 412, message: String::new() }),
            SyncError::Rejected(_)
        ));
    }

    #[test]
    fn unresolvable_message_is_newline_joined() {
        let e = SyncError::Unresolvable(vec!["a".into(), "b".into()]);
        assert!(e.is_retriable());
        assert_eq!(e.message(), "a\nb");
    }
}
