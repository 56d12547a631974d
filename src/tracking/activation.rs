//! Activation gate — holds the current selection and dispatches triggers.
//!
//! The selection is the most recently hovered target, held until another
//! hover hit overwrites it.  It is deliberately NOT cleared when the
//! pointer leaves all targets or disappears: an external trigger always
//! fires on the last known hovered target.  This sticky behavior is a
//! confirmed policy choice, not an accident.

use tracing::{debug, info};

/// A single activation dispatched to the external action dispatcher.
/// Fire-and-forget: nothing in the core waits for the action's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationEvent {
    pub target_id: u64,
}

/// Owns the process-wide selection value.
///
/// Single writer (the hover stage of frame processing), single reader
/// (the trigger path).  Both run on the event loop, so a trigger always
/// observes a consistent snapshot.
#[derive(Debug, Default)]
pub struct ActivationGate {
    selection: Option<u64>,
    /// Activations dispatched this session.
    activations: u64,
}

impl ActivationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently (or most recently) hovered target, if any.
    pub fn selection(&self) -> Option<u64> {
        self.selection
    }

    /// Overwrite the selection with a freshly hovered target.
    /// Returns true if the selection changed.
    pub fn select(&mut self, target_id: u64) -> bool {
        if self.selection == Some(target_id) {
            return false;
        }
        debug!(target_id, previous = ?self.selection, "selection updated");
        self.selection = Some(target_id);
        true
    }

    /// Dispatch an activation for the held selection.
    ///
    /// With no selection (nothing has ever been hovered this session)
    /// this is a no-op, not an error.  The selection survives the
    /// trigger; repeated triggers re-activate the same target.
    pub fn trigger(&mut self) -> Option<ActivationEvent> {
        let target_id = self.selection?;
        self.activations += 1;
        info!(target_id, "activation dispatched");
        Some(ActivationEvent { target_id })
    }

    /// S-expression form for IPC status queries.
    pub fn status_sexp(&self) -> String {
        let selection = self
            .selection
            .map(|id| id.to_string())
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:selection {} :activations {})",
            selection, self.activations
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_without_selection_is_noop() {
        let mut gate = ActivationGate::new();
        assert!(gate.trigger().is_none());
        assert!(gate.status_sexp().contains(":selection nil"));
    }

    #[test]
    fn test_select_then_trigger() {
        let mut gate = ActivationGate::new();
        assert!(gate.select(3));
        let evt = gate.trigger().unwrap();
        assert_eq!(evt.target_id, 3);
        // Selection survives the trigger.
        assert_eq!(gate.selection(), Some(3));
    }

    #[test]
    fn test_select_same_target_reports_unchanged() {
        let mut gate = ActivationGate::new();
        assert!(gate.select(5));
        assert!(!gate.select(5));
        assert!(gate.select(6));
        assert_eq!(gate.selection(), Some(6));
    }

    #[test]
    fn test_repeated_triggers() {
        let mut gate = ActivationGate::new();
        gate.select(1);
        assert!(gate.trigger().is_some());
        assert!(gate.trigger().is_some());
        assert!(gate.status_sexp().contains(":activations 2"));
    }

    #[test]
    fn test_status_sexp_with_selection() {
        let mut gate = ActivationGate::new();
        gate.select(9);
        let sexp = gate.status_sexp();
        assert!(sexp.contains(":selection 9"));
        assert!(sexp.contains(":activations 0"));
    }
}
