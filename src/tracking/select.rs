//! Body and hand disambiguation — which skeleton and which hand to follow.
//!
//! Both policies are proximity-based: the body nearest the sensor is
//! assumed to be the operator, and the hand nearest the sensor is assumed
//! to be the intentionally raised one.

use tracing::trace;

use super::skeleton::{Body, Joint, JointId, TrackingState};

/// Select the primary body for this frame: the tracked body with minimum
/// root depth.  First encountered wins on exact depth equality.
///
/// Returns `None` when the frame has no tracked body, which the pipeline
/// treats as a normal "nothing to show" outcome.
pub fn primary_body(bodies: &[Body]) -> Option<&Body> {
    let mut primary: Option<&Body> = None;
    for body in bodies {
        if !body.is_tracked() {
            continue;
        }
        match primary {
            Some(best) if body.depth() >= best.depth() => {}
            _ => primary = Some(body),
        }
    }
    if let Some(body) = primary {
        trace!(depth = body.depth(), "primary body selected");
    }
    primary
}

/// Select the primary hand joint of a body.
///
/// The left hand is the default candidate.  The right hand takes over when
/// the left is untracked, or when the right is strictly nearer the sensor;
/// exact depth equality keeps the left (the historical tie-break).
///
/// The returned joint may itself be NotTracked — callers must check
/// `has_position` before using it.
pub fn primary_hand(body: &Body) -> Joint {
    let mut primary = body.joint(JointId::HandLeft);
    let right = body.joint(JointId::HandRight);

    if right.state != TrackingState::NotTracked {
        if primary.state == TrackingState::NotTracked || right.depth() < primary.depth() {
            primary = right;
        }
    }

    primary
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::skeleton::Position3;

    fn body_at_depth(z: f32) -> Body {
        Body::new(TrackingState::Tracked, Position3::new(0.0, 0.0, z), vec![])
    }

    fn body_with_hands(left: Option<(f32, TrackingState)>, right: Option<(f32, TrackingState)>) -> Body {
        let mut joints = Vec::new();
        if let Some((z, state)) = left {
            joints.push(Joint::new(JointId::HandLeft, Position3::new(-0.2, 0.0, z), state));
        }
        if let Some((z, state)) = right {
            joints.push(Joint::new(JointId::HandRight, Position3::new(0.2, 0.0, z), state));
        }
        Body::new(TrackingState::Tracked, Position3::new(0.0, 0.0, 2.0), joints)
    }

    #[test]
    fn test_primary_body_nearest_wins() {
        let bodies = vec![body_at_depth(2.5), body_at_depth(1.5), body_at_depth(3.0)];
        let primary = primary_body(&bodies).unwrap();
        assert!((primary.depth() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_primary_body_skips_untracked() {
        let mut near = body_at_depth(1.0);
        near.state = TrackingState::NotTracked;
        let bodies = vec![near, body_at_depth(2.0)];
        let primary = primary_body(&bodies).unwrap();
        assert!((primary.depth() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_primary_body_empty_frame() {
        assert!(primary_body(&[]).is_none());
    }

    #[test]
    fn test_primary_body_all_untracked() {
        let bodies = vec![Body::not_tracked(), Body::not_tracked()];
        assert!(primary_body(&bodies).is_none());
    }

    #[test]
    fn test_primary_body_tie_keeps_first() {
        let bodies = vec![body_at_depth(2.0), body_at_depth(2.0)];
        let primary = primary_body(&bodies).unwrap();
        assert!(std::ptr::eq(primary, &bodies[0]));
    }

    #[test]
    fn test_primary_hand_default_left() {
        let body = body_with_hands(
            Some((1.8, TrackingState::Tracked)),
            None,
        );
        assert_eq!(primary_hand(&body).id, JointId::HandLeft);
    }

    #[test]
    fn test_primary_hand_right_only() {
        let body = body_with_hands(
            Some((1.8, TrackingState::NotTracked)),
            Some((1.9, TrackingState::Tracked)),
        );
        assert_eq!(primary_hand(&body).id, JointId::HandRight);
    }

    #[test]
    fn test_primary_hand_closer_right_wins() {
        let body = body_with_hands(
            Some((1.8, TrackingState::Tracked)),
            Some((1.5, TrackingState::Tracked)),
        );
        assert_eq!(primary_hand(&body).id, JointId::HandRight);
    }

    #[test]
    fn test_primary_hand_closer_left_stays() {
        let body = body_with_hands(
            Some((1.4, TrackingState::Tracked)),
            Some((1.6, TrackingState::Tracked)),
        );
        assert_eq!(primary_hand(&body).id, JointId::HandLeft);
    }

    #[test]
    fn test_primary_hand_equal_depth_keeps_left() {
        let body = body_with_hands(
            Some((1.5, TrackingState::Tracked)),
            Some((1.5, TrackingState::Tracked)),
        );
        assert_eq!(primary_hand(&body).id, JointId::HandLeft);
    }

    #[test]
    fn test_primary_hand_inferred_right_counts() {
        // Inferred is not NotTracked, so a nearer inferred right hand wins.
        let body = body_with_hands(
            Some((1.8, TrackingState::Tracked)),
            Some((1.5, TrackingState::Inferred)),
        );
        assert_eq!(primary_hand(&body).id, JointId::HandRight);
    }

    #[test]
    fn test_primary_hand_both_missing() {
        let body = body_with_hands(None, None);
        let hand = primary_hand(&body);
        assert_eq!(hand.id, JointId::HandLeft);
        assert!(!hand.has_position());
    }
}
