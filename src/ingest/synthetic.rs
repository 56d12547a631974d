//! Synthetic frame source — a scripted hand sweep for CI and demos.
//!
//! Generates one tracked body whose right hand sweeps horizontally in
//! front of the sensor as a triangle wave.  Fully deterministic: the same
//! step always produces the same frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use calloop::channel::Sender;
use tracing::{debug, info};

use crate::tracking::skeleton::{Joint, JointId, Position3, TrackingState};
use crate::tracking::Body;

/// Sweep half-width in meters.
const SWEEP_EXTENT_M: f32 = 0.35;

/// Seconds per full left-right-left sweep cycle.
const SWEEP_PERIOD_S: f32 = 4.0;

/// Hand depth in meters (closer than the body root).
const HAND_DEPTH_M: f32 = 1.6;

/// Body root depth in meters.
const BODY_DEPTH_M: f32 = 2.0;

/// Build the frame for a given step at a given rate.
pub fn frame_at_step(step: u64, rate_hz: u32) -> Vec<Body> {
    let steps_per_cycle = (SWEEP_PERIOD_S * rate_hz as f32).max(1.0);
    let phase = (step as f32 % steps_per_cycle) / steps_per_cycle;

    // Triangle wave across [-extent, extent].
    let x = if phase < 0.5 {
        -SWEEP_EXTENT_M + 2.0 * SWEEP_EXTENT_M * (phase * 2.0)
    } else {
        SWEEP_EXTENT_M - 2.0 * SWEEP_EXTENT_M * ((phase - 0.5) * 2.0)
    };

    let joints = vec![
        Joint::new(
            JointId::HandRight,
            Position3::new(x, 0.1, HAND_DEPTH_M),
            TrackingState::Tracked,
        ),
        Joint::new(
            JointId::HandLeft,
            Position3::new(-0.3, -0.4, BODY_DEPTH_M),
            TrackingState::Tracked,
        ),
        Joint::new(
            JointId::Head,
            Position3::new(0.0, 0.6, BODY_DEPTH_M),
            TrackingState::Tracked,
        ),
    ];

    vec![Body::new(
        TrackingState::Tracked,
        Position3::new(0.0, 0.0, BODY_DEPTH_M),
        joints,
    )]
}

/// Spawn the capture thread.  Frames go over the calloop channel and are
/// processed serially by the event loop; the thread stops when `stop` is
/// set or the receiving side goes away.
pub fn spawn(tx: Sender<Vec<Body>>, rate_hz: u32, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    let rate = rate_hz.max(1);
    info!(rate_hz = rate, "synthetic frame source started");
    thread::spawn(move || {
        let tick = Duration::from_secs_f64(1.0 / rate as f64);
        let mut step: u64 = 0;
        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if tx.send(frame_at_step(step, rate)).is_err() {
                debug!("frame channel closed, stopping synthetic source");
                break;
            }
            step += 1;
            thread::sleep(tick);
        }
        info!(frames = step, "synthetic frame source stopped");
    })
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::select::{primary_body, primary_hand};

    #[test]
    fn test_frame_is_deterministic() {
        let a = frame_at_step(17, 30);
        let b = frame_at_step(17, 30);
        let ha = a[0].joint(JointId::HandRight);
        let hb = b[0].joint(JointId::HandRight);
        assert_eq!(ha.position, hb.position);
    }

    #[test]
    fn test_frame_is_trackable() {
        let frame = frame_at_step(0, 30);
        let body = primary_body(&frame).expect("body should be tracked");
        let hand = primary_hand(body);
        // The right hand is nearer the sensor, so it is primary.
        assert_eq!(hand.id, JointId::HandRight);
        assert!(hand.has_position());
    }

    #[test]
    fn test_sweep_stays_in_extent() {
        for step in 0..300 {
            let frame = frame_at_step(step, 30);
            let x = frame[0].joint(JointId::HandRight).position.x;
            assert!(
                (-SWEEP_EXTENT_M..=SWEEP_EXTENT_M).contains(&x),
                "step {} out of extent: {}",
                step,
                x
            );
        }
    }

    #[test]
    fn test_sweep_returns_to_start() {
        let cycle = (SWEEP_PERIOD_S * 30.0) as u64;
        let start = frame_at_step(0, 30)[0].joint(JointId::HandRight).position.x;
        let wrapped = frame_at_step(cycle, 30)[0]
            .joint(JointId::HandRight)
            .position
            .x;
        assert!((start - wrapped).abs() < 0.001);
    }
}
