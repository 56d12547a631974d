//! Interactive targets and hover detection.
//!
//! Targets are rectangular canvas regions with stable identity, registered
//! as a whole set by the UI layer before tracking starts.  Hover testing
//! uses the pointer glyph's center point against exclusive rectangle
//! bounds, first registered target winning on overlap.

use tracing::debug;

// ── Targets ────────────────────────────────────────────────

/// A registered rectangular region that can be hovered and activated.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveTarget {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl InteractiveTarget {
    pub fn new(id: u64, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
        }
    }

    /// Whether a point falls strictly inside this target.  Bounds are
    /// exclusive: a point exactly on an edge does not count.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px > self.x && px < self.x + self.width && py > self.y && py < self.y + self.height
    }

    /// S-expression form for IPC listings.
    pub fn sexp(&self) -> String {
        format!(
            "(:id {} :x {:.0} :y {:.0} :w {:.0} :h {:.0})",
            self.id, self.x, self.y, self.width, self.height
        )
    }
}

// ── Hover feedback ─────────────────────────────────────────

/// Per-frame visual feedback for the pointer glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverFeedback {
    /// The glyph center is inside a target.
    Hovering,
    /// The glyph is visible but over no target.
    Released,
}

impl HoverFeedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hovering => "hovering",
            Self::Released => "released",
        }
    }
}

// ── Registry ───────────────────────────────────────────────

/// The set of interactive targets, in registration order.
///
/// Populated once at startup and read-only during steady-state tracking,
/// so frame processing needs no locking around it.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<InteractiveTarget>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered set.  An empty set is legal; hover testing
    /// then always misses.
    pub fn register(&mut self, targets: Vec<InteractiveTarget>) {
        debug!(count = targets.len(), "target set registered");
        self.targets = targets;
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InteractiveTarget> {
        self.targets.iter()
    }

    pub fn get(&self, id: u64) -> Option<&InteractiveTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Find the target whose rectangle strictly contains the point.
    /// Registration order breaks ties between overlapping targets.
    pub fn hit_test(&self, px: f64, py: f64) -> Option<&InteractiveTarget> {
        self.targets.iter().find(|t| t.contains(px, py))
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_interior() {
        let t = InteractiveTarget::new(1, 100.0, 100.0, 50.0, 50.0);
        assert!(t.contains(130.0, 130.0));
        assert!(t.contains(100.1, 100.1));
        assert!(t.contains(149.9, 149.9));
    }

    #[test]
    fn test_contains_edges_excluded() {
        let t = InteractiveTarget::new(1, 100.0, 100.0, 50.0, 50.0);
        assert!(!t.contains(100.0, 130.0)); // left edge
        assert!(!t.contains(150.0, 130.0)); // right edge
        assert!(!t.contains(130.0, 100.0)); // top edge
        assert!(!t.contains(130.0, 150.0)); // bottom edge
        assert!(!t.contains(100.0, 100.0)); // corner
    }

    #[test]
    fn test_hit_test_miss() {
        let mut reg = TargetRegistry::new();
        reg.register(vec![InteractiveTarget::new(1, 0.0, 0.0, 10.0, 10.0)]);
        assert!(reg.hit_test(50.0, 50.0).is_none());
    }

    #[test]
    fn test_hit_test_registration_order_wins() {
        let mut reg = TargetRegistry::new();
        reg.register(vec![
            InteractiveTarget::new(7, 0.0, 0.0, 100.0, 100.0),
            InteractiveTarget::new(8, 0.0, 0.0, 100.0, 100.0),
        ]);
        // Both contain the point; the first registered wins.
        assert_eq!(reg.hit_test(50.0, 50.0).unwrap().id, 7);
    }

    #[test]
    fn test_empty_registry_is_legal() {
        let reg = TargetRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.hit_test(0.0, 0.0).is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut reg = TargetRegistry::new();
        reg.register(vec![InteractiveTarget::new(1, 0.0, 0.0, 10.0, 10.0)]);
        reg.register(vec![
            InteractiveTarget::new(2, 0.0, 0.0, 10.0, 10.0),
            InteractiveTarget::new(3, 20.0, 0.0, 10.0, 10.0),
        ]);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(1).is_none());
        assert!(reg.get(2).is_some());
    }

    #[test]
    fn test_target_sexp() {
        let t = InteractiveTarget::new(4, 10.0, 20.0, 30.0, 40.0);
        assert_eq!(t.sexp(), "(:id 4 :x 10 :y 20 :w 30 :h 40)");
    }

    #[test]
    fn test_feedback_as_str() {
        assert_eq!(HoverFeedback::Hovering.as_str(), "hovering");
        assert_eq!(HoverFeedback::Released.as_str(), "released");
    }
}
