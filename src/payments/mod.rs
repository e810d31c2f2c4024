//! Payment workflow core: intake, pending receipts, approval, tiers.
//!
//! Everything in this module is transport-free; Telegram specifics stay
//! behind the [`crate::telegram::notifications::Notifier`] trait.

pub mod approval;
pub mod intake;
pub mod pending;
pub mod report;
pub mod tier;

use strum::{Display, EnumString};

/// Payment record lifecycle.
///
/// ```text
/// AWAITING_ATTACHMENT -> AWAIT_APPROVAL -> { APPROVED | REJECTED }
/// ```
///
/// `AwaitingAttachment` is the status of a manual-gateway draft sitting in
/// the pending holder; digital submissions skip it. Terminal states are
/// sinks: once a record is APPROVED or REJECTED it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum PaymentStatus {
    #[strum(serialize = "AWAITING_ATTACHMENT")]
    AwaitingAttachment,
    #[strum(serialize = "AWAIT_APPROVAL")]
    AwaitApproval,
    #[strum(serialize = "APPROVED")]
    Approved,
    #[strum(serialize = "REJECTED")]
    Rejected,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Approved | PaymentStatus::Rejected)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (AwaitingAttachment, AwaitApproval) | (AwaitApproval, Approved) | (AwaitApproval, Rejected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentStatus::*;

    #[test]
    fn only_forward_transitions_are_reachable() {
        let all = [AwaitingAttachment, AwaitApproval, Approved, Rejected];
        for from in all {
            for to in all {
                let allowed = from.can_transition_to(to);
                let expected = matches!(
                    (from, to),
                    (AwaitingAttachment, AwaitApproval) | (AwaitApproval, Approved) | (AwaitApproval, Rejected)
                );
                assert_eq!(allowed, expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_states_are_sinks() {
        let all = [AwaitingAttachment, AwaitApproval, Approved, Rejected];
        for terminal in [Approved, Rejected] {
            assert!(terminal.is_terminal());
            for to in all {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }
}
