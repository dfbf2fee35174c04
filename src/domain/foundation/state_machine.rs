//! Forward-only lifecycle contract for status enums.

use std::fmt::Debug;
use thiserror::Error;

/// A step that is not an edge of the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct IllegalTransition<S: Debug> {
    pub from: S,
    pub to: S,
}

/// Status enum whose legal edges are a static successor table.
///
/// ```ignore
/// let next = PurchaseStatus::Pending.transition_to(PurchaseStatus::Completed)?;
/// assert!(PurchaseStatus::Refunded.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + Debug + 'static {
    /// States directly reachable from `self`.
    fn successors(&self) -> &'static [Self];

    fn can_transition_to(&self, target: &Self) -> bool {
        self.successors().contains(target)
    }

    fn transition_to(&self, target: Self) -> Result<Self, IllegalTransition<Self>> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(IllegalTransition {
                from: *self,
                to: target,
            })
        }
    }

    fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}
