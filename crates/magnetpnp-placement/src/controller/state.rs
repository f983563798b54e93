//! Operation state
//!
//! `current_part` is set exactly when the phase is not `Idle`; the only way
//! to change either is through the transition methods below.

use magnetpnp_core::{OperationPhase, PartId};

/// Phase and part of the operation in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationState {
    phase: OperationPhase,
    current_part: Option<PartId>,
}

impl OperationState {
    /// Current phase
    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    /// Part being handled, if any
    pub fn current_part(&self) -> Option<PartId> {
        self.current_part
    }

    /// Whether no operation is in flight
    pub fn is_idle(&self) -> bool {
        self.phase == OperationPhase::Idle
    }

    /// Start an operation for `part` in `phase`
    pub(crate) fn begin(&mut self, phase: OperationPhase, part: PartId) {
        debug_assert!(self.is_idle());
        debug_assert!(phase != OperationPhase::Idle);
        self.phase = phase;
        self.current_part = Some(part);
    }

    /// Move the running operation to its next phase
    pub(crate) fn advance(&mut self, phase: OperationPhase) {
        debug_assert!(!self.is_idle());
        debug_assert!(phase != OperationPhase::Idle);
        self.phase = phase;
    }

    /// Return to `Idle` and forget the part
    pub(crate) fn finish(&mut self) {
        self.phase = OperationPhase::Idle;
        self.current_part = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_set_only_while_busy() {
        let mut state = OperationState::default();
        assert!(state.is_idle());
        assert_eq!(state.current_part(), None);

        state.begin(OperationPhase::Picking, 42);
        assert_eq!(state.phase(), OperationPhase::Picking);
        assert_eq!(state.current_part(), Some(42));

        state.advance(OperationPhase::Aligning);
        assert_eq!(state.current_part(), Some(42));

        state.finish();
        assert!(state.is_idle());
        assert_eq!(state.current_part(), None);
    }
}
