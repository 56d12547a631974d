//! Frame data model — bodies, joints, and tracking confidence.
//!
//! A `Body` is one tracked person's skeleton for a single frame.  Bodies
//! are rebuilt from raw sensor data every frame, never mutated afterward,
//! and discarded when the frame is done; no cross-frame identity exists.

// ── Position ───────────────────────────────────────────────

/// Sensor-space position in meters.  `z` is depth (distance from sensor).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// ── Tracking state ─────────────────────────────────────────

/// Tracking confidence for a body or joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// Position observed directly by the sensor.
    Tracked,
    /// Position estimated from neighboring joints.
    Inferred,
    /// No position available this frame.
    NotTracked,
}

impl TrackingState {
    /// String representation for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracked => "tracked",
            Self::Inferred => "inferred",
            Self::NotTracked => "not-tracked",
        }
    }

    /// Parse a tracking state from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "tracked" => Some(Self::Tracked),
            "inferred" => Some(Self::Inferred),
            "not-tracked" => Some(Self::NotTracked),
            _ => None,
        }
    }
}

// ── Hand enum ──────────────────────────────────────────────

/// Which physical hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ── Joint identifiers ──────────────────────────────────────

/// Skeletal landmark identifiers delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointId {
    HandLeft,
    HandRight,
    Head,
    SpineBase,
}

impl JointId {
    /// String representation for IPC.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandLeft => "hand-left",
            Self::HandRight => "hand-right",
            Self::Head => "head",
            Self::SpineBase => "spine-base",
        }
    }

    /// Parse a joint identifier from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "hand-left" => Some(Self::HandLeft),
            "hand-right" => Some(Self::HandRight),
            "head" => Some(Self::Head),
            "spine-base" => Some(Self::SpineBase),
            _ => None,
        }
    }

    /// Which hand this joint belongs to, if it is a hand joint.
    pub fn hand(&self) -> Option<Hand> {
        match self {
            Self::HandLeft => Some(Hand::Left),
            Self::HandRight => Some(Hand::Right),
            _ => None,
        }
    }
}

// ── Joint ──────────────────────────────────────────────────

/// A single skeletal landmark with position and tracking confidence.
#[derive(Debug, Clone, Copy)]
pub struct Joint {
    pub id: JointId,
    pub position: Position3,
    pub state: TrackingState,
}

impl Joint {
    pub fn new(id: JointId, position: Position3, state: TrackingState) -> Self {
        Self {
            id,
            position,
            state,
        }
    }

    /// Placeholder joint for landmarks the sensor did not deliver.
    pub fn not_tracked(id: JointId) -> Self {
        Self {
            id,
            position: Position3::ZERO,
            state: TrackingState::NotTracked,
        }
    }

    /// Whether this joint has any usable position (tracked or inferred).
    pub fn has_position(&self) -> bool {
        self.state != TrackingState::NotTracked
    }

    /// Depth of this joint (distance from sensor, meters).
    pub fn depth(&self) -> f32 {
        self.position.z
    }
}

// ── Body ───────────────────────────────────────────────────

/// One tracked skeleton for one frame.
#[derive(Debug, Clone)]
pub struct Body {
    /// Tracking state of the body as a whole.
    pub state: TrackingState,
    /// Root position (spine base), used for body disambiguation.
    pub position: Position3,
    joints: Vec<Joint>,
}

impl Body {
    pub fn new(state: TrackingState, position: Position3, joints: Vec<Joint>) -> Self {
        Self {
            state,
            position,
            joints,
        }
    }

    /// An untracked placeholder body.
    pub fn not_tracked() -> Self {
        Self {
            state: TrackingState::NotTracked,
            position: Position3::ZERO,
            joints: Vec::new(),
        }
    }

    /// Whether the sensor considers this body tracked.
    pub fn is_tracked(&self) -> bool {
        self.state == TrackingState::Tracked
    }

    /// Depth of the body root (distance from sensor, meters).
    pub fn depth(&self) -> f32 {
        self.position.z
    }

    /// Look up a joint by identifier.
    ///
    /// The sensor contract is a fixed joint array per body; a landmark
    /// missing from the frame is reported as a NotTracked placeholder
    /// rather than an error.
    pub fn joint(&self, id: JointId) -> Joint {
        self.joints
            .iter()
            .copied()
            .find(|j| j.id == id)
            .unwrap_or_else(|| Joint::not_tracked(id))
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked_joint(id: JointId, z: f32) -> Joint {
        Joint::new(id, Position3::new(0.0, 0.0, z), TrackingState::Tracked)
    }

    #[test]
    fn test_joint_lookup() {
        let body = Body::new(
            TrackingState::Tracked,
            Position3::new(0.0, 0.0, 2.0),
            vec![tracked_joint(JointId::HandRight, 1.8)],
        );

        let right = body.joint(JointId::HandRight);
        assert_eq!(right.state, TrackingState::Tracked);
        assert!((right.depth() - 1.8).abs() < f32::EPSILON);

        // Missing landmark comes back as a NotTracked placeholder
        let left = body.joint(JointId::HandLeft);
        assert_eq!(left.state, TrackingState::NotTracked);
        assert_eq!(left.id, JointId::HandLeft);
    }

    #[test]
    fn test_not_tracked_body() {
        let body = Body::not_tracked();
        assert!(!body.is_tracked());
        assert!(body.joints().is_empty());
        assert!(!body.joint(JointId::HandLeft).has_position());
    }

    #[test]
    fn test_tracking_state_roundtrip() {
        for state in [
            TrackingState::Tracked,
            TrackingState::Inferred,
            TrackingState::NotTracked,
        ] {
            assert_eq!(TrackingState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(TrackingState::from_str("bogus"), None);
    }

    #[test]
    fn test_joint_id_roundtrip() {
        for id in [
            JointId::HandLeft,
            JointId::HandRight,
            JointId::Head,
            JointId::SpineBase,
        ] {
            assert_eq!(JointId::from_str(id.as_str()), Some(id));
        }
        assert_eq!(JointId::from_str("elbow-left"), None);
    }

    #[test]
    fn test_joint_id_hand() {
        assert_eq!(JointId::HandLeft.hand(), Some(Hand::Left));
        assert_eq!(JointId::HandRight.hand(), Some(Hand::Right));
        assert_eq!(JointId::Head.hand(), None);
    }

    #[test]
    fn test_inferred_has_position() {
        let joint = Joint::new(
            JointId::Head,
            Position3::new(0.0, 0.5, 2.0),
            TrackingState::Inferred,
        );
        assert!(joint.has_position());
    }
}
