//! Pending-attachment holder
//!
//! Short-lived link between a manual-gateway submission and the receipt
//! photo expected next from the same member. No durable row exists until
//! the receipt binds: a new submission overwrites and abandons any
//! unresolved draft from the same member, so half-built records are
//! never persisted.
//!
//! [`DashMap::remove`] makes the lookup-then-bind atomic per submitter:
//! two receipts racing for the same draft resolve to exactly one bind.

use dashmap::DashMap;

use crate::payments::PaymentStatus;
use crate::payments::report::ValidatedReport;

/// A validated manual-gateway submission waiting for its receipt.
/// Carries every field needed to finish the insert once the file
/// arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    pub report: ValidatedReport,
    pub created_at: String,
}

impl PendingSubmission {
    /// Lifecycle status of a draft; always pre-attachment by
    /// construction.
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::AwaitingAttachment
    }
}

/// Keyed store of pending submissions, one slot per submitter.
#[derive(Debug, Default)]
pub struct PendingPayments {
    inner: DashMap<i64, PendingSubmission>,
}

impl PendingPayments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a draft for this submitter. Returns the draft it replaced,
    /// if any, so the caller can log the abandonment.
    pub fn park(&self, submitter_id: i64, report: ValidatedReport) -> Option<PendingSubmission> {
        let draft = PendingSubmission {
            report,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.inner.insert(submitter_id, draft)
    }

    /// Atomically consume this submitter's draft. Exactly one caller
    /// gets `Some` per parked draft; everyone else sees `None`.
    pub fn take(&self, submitter_id: i64) -> Option<PendingSubmission> {
        self.inner.remove(&submitter_id).map(|(_, draft)| draft)
    }

    /// Whether a draft is currently parked for this submitter.
    pub fn contains(&self, submitter_id: i64) -> bool {
        self.inner.contains_key(&submitter_id)
    }
}
