//! Purchase status state machine.
//!
//! A purchase is recorded the first time any event for its key is seen and
//! only ever moves forward:
//!
//! ```text
//! pending ──► completed ──► refunded
//!    │
//!    └──────► failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Lifecycle status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Checkout created or payment in flight. No access.
    Pending,

    /// Payment captured. Grants full access.
    Completed,

    /// Payment declined, cancelled or expired. Terminal.
    Failed,

    /// Captured payment returned to the buyer. Terminal.
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
            PurchaseStatus::Refunded => "refunded",
        }
    }

    /// The single status a row must hold for a conditional write into `self`.
    pub fn predecessor(&self) -> Option<PurchaseStatus> {
        match self {
            PurchaseStatus::Pending => None,
            PurchaseStatus::Completed | PurchaseStatus::Failed => Some(PurchaseStatus::Pending),
            PurchaseStatus::Refunded => Some(PurchaseStatus::Completed),
        }
    }

    /// True if `self` lies on the path from `pending` to `other`.
    ///
    /// An event carrying such a status describes a state the row has
    /// already passed through.
    pub fn precedes(&self, other: &PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, other),
            (Pending, Completed) | (Pending, Failed) | (Pending, Refunded) | (Completed, Refunded)
        )
    }

    /// Classifies an incoming target status against the current one.
    pub fn classify(&self, target: PurchaseStatus) -> TransitionDecision {
        if *self == target {
            TransitionDecision::Duplicate
        } else if target.precedes(self) {
            TransitionDecision::Stale
        } else if self.can_transition_to(&target) {
            TransitionDecision::Advance
        } else {
            TransitionDecision::Illegal
        }
    }
}

impl StateMachine for PurchaseStatus {
    fn successors(&self) -> &'static [Self] {
        use PurchaseStatus::*;
        match self {
            Pending => &[Completed, Failed],
            Completed => &[Refunded],
            Failed | Refunded => &[],
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "completed" => Ok(PurchaseStatus::Completed),
            "failed" => Ok(PurchaseStatus::Failed),
            "refunded" => Ok(PurchaseStatus::Refunded),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown purchase status '{}'", other),
            )),
        }
    }
}

/// Outcome of comparing an event's status with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// Same status again. No write.
    Duplicate,
    /// Status the row already moved past. No write.
    Stale,
    /// Legal forward step. Conditional write.
    Advance,
    /// Contradicts the stored state.
    Illegal,
}

/// Provider status mapped into the canonical vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Completed,
    Failed,
    Refunded,
    /// Created, authorized, awaiting capture and the like.
    Other,
}

impl CanonicalStatus {
    /// Ledger status this event drives a row towards.
    pub fn target(&self) -> PurchaseStatus {
        match self {
            CanonicalStatus::Completed => PurchaseStatus::Completed,
            CanonicalStatus::Failed => PurchaseStatus::Failed,
            CanonicalStatus::Refunded => PurchaseStatus::Refunded,
            CanonicalStatus::Other => PurchaseStatus::Pending,
        }
    }
}
