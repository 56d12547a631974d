//! Per-frame tracking pipeline — body selection through hover detection.
//!
//! One `process_frame` call runs the whole chain synchronously:
//! primary body -> primary hand -> depth-plane projection -> canvas
//! mapping -> hover test -> selection update.  The call never blocks, and
//! every failure is frame-scoped: a frame that produces no pointer leaves
//! the selection exactly as it was.

use std::time::Instant;

use tracing::debug;

use super::activation::ActivationGate;
use super::hover::{HoverFeedback, TargetRegistry};
use super::project::{DepthProject, PinholeProjector, PlanePoint, ScreenMapper};
use super::select::{primary_body, primary_hand};
use super::skeleton::{Body, Hand};
use super::stats::FrameStats;

// ── Pointer state ──────────────────────────────────────────

/// The derived on-screen pointer for one frame.
///
/// `x`/`y` are the glyph's top-left canvas position.  `hand` keeps its
/// last value while the pointer is hidden so the UI's glyph image does
/// not flicker between hands on tracking dropouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub x: i32,
    pub y: i32,
    pub visible: bool,
    pub hand: Hand,
}

impl PointerState {
    fn hidden() -> Self {
        Self {
            x: 0,
            y: 0,
            visible: false,
            hand: Hand::Left,
        }
    }

    /// S-expression form for IPC.
    pub fn sexp(&self) -> String {
        format!(
            "(:x {} :y {} :visible {} :hand :{})",
            self.x,
            self.y,
            if self.visible { "t" } else { "nil" },
            self.hand.as_str(),
        )
    }
}

// ── Events ─────────────────────────────────────────────────

/// Transition events produced by frame processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    /// The pointer became visible.
    Shown,
    /// The pointer became hidden (no trackable hand this frame).
    Hidden,
    /// The glyph center entered a target.
    HoverStarted { target_id: u64 },
    /// The glyph center left the target it was over.
    HoverEnded { target_id: u64 },
}

/// Everything one frame produced.
#[derive(Debug)]
pub struct FrameResult {
    pub pointer: PointerState,
    pub feedback: HoverFeedback,
    pub events: Vec<PointerEvent>,
}

// ── Pipeline ───────────────────────────────────────────────

/// Geometry and smoothing configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canvas size in pixels.
    pub canvas_w: f64,
    pub canvas_h: f64,
    /// Pointer glyph size in pixels.
    pub glyph_w: f64,
    pub glyph_h: f64,
    /// Exponential smoothing factor for the projected hand position
    /// (0.0 = off).  Off by default: most sensors smooth upstream, and
    /// frame processing stays idempotent.
    pub smoothing: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_w: 1280.0,
            canvas_h: 720.0,
            glyph_w: 64.0,
            glyph_h: 64.0,
            smoothing: 0.0,
        }
    }
}

/// The per-frame gesture-tracking pipeline.
pub struct TrackingPipeline {
    projector: Box<dyn DepthProject>,
    mapper: ScreenMapper,
    smoothing: f32,
    /// Smoothed depth-plane position, reset whenever the pointer hides.
    smoothed: Option<(f32, f32)>,
    /// Pointer state of the most recent frame.
    pointer: PointerState,
    /// Target the glyph center was inside last frame (geometric hover,
    /// distinct from the gate's sticky selection).
    hovered: Option<u64>,
    pub stats: FrameStats,
}

impl TrackingPipeline {
    pub fn new(projector: Box<dyn DepthProject>, config: PipelineConfig) -> Self {
        let mapper = ScreenMapper::new(
            (config.canvas_w, config.canvas_h),
            projector.plane_size(),
            (config.glyph_w, config.glyph_h),
        );
        Self {
            projector,
            mapper,
            smoothing: config.smoothing,
            smoothed: None,
            pointer: PointerState::hidden(),
            hovered: None,
            stats: FrameStats::default(),
        }
    }

    /// Pipeline with the default pinhole projector.
    pub fn with_defaults(config: PipelineConfig) -> Self {
        Self::new(Box::<PinholeProjector>::default(), config)
    }

    /// Process one frame of bodies to completion.
    ///
    /// Called once per frame tick from a single execution context; frames
    /// are never processed concurrently.
    pub fn process_frame(
        &mut self,
        bodies: &[Body],
        registry: &TargetRegistry,
        gate: &mut ActivationGate,
    ) -> FrameResult {
        let started = Instant::now();
        let result = self.track(bodies, registry, gate);
        self.stats.record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn track(
        &mut self,
        bodies: &[Body],
        registry: &TargetRegistry,
        gate: &mut ActivationGate,
    ) -> FrameResult {
        // ── Stage 1+2: primary body, primary hand ──
        let projected = primary_body(bodies).and_then(|body| {
            let hand = primary_hand(body);
            if !hand.has_position() {
                return None;
            }
            // ── Stage 3: depth-plane projection ──
            match self.projector.project(hand.position) {
                Ok(plane) => Some((plane, hand.id.hand().unwrap_or(Hand::Left))),
                Err(err) => {
                    debug!(%err, "projection unavailable this frame");
                    None
                }
            }
        });

        let Some((plane, hand)) = projected else {
            return self.hidden_frame();
        };

        // ── Stage 4: canvas mapping (with optional smoothing) ──
        let plane = self.smooth(plane);
        let top_left = self.mapper.map(plane);
        let (cx, cy) = self.mapper.glyph_center(top_left);

        // ── Stage 5: hover test against the registry ──
        let hit = registry.hit_test(cx, cy).map(|t| t.id);

        let mut events = Vec::new();
        if !self.pointer.visible {
            events.push(PointerEvent::Shown);
        }
        match (self.hovered, hit) {
            (Some(old), Some(new)) if old != new => {
                events.push(PointerEvent::HoverEnded { target_id: old });
                events.push(PointerEvent::HoverStarted { target_id: new });
            }
            (Some(old), None) => events.push(PointerEvent::HoverEnded { target_id: old }),
            (None, Some(new)) => events.push(PointerEvent::HoverStarted { target_id: new }),
            _ => {}
        }

        // ── Stage 6: selection update ──
        // A hit overwrites the gate's selection; a miss leaves it alone so
        // a trigger still activates the last hovered target.
        let feedback = match hit {
            Some(target_id) => {
                gate.select(target_id);
                HoverFeedback::Hovering
            }
            None => HoverFeedback::Released,
        };

        self.hovered = hit;
        self.pointer = PointerState {
            x: top_left.0,
            y: top_left.1,
            visible: true,
            hand,
        };

        FrameResult {
            pointer: self.pointer,
            feedback,
            events,
        }
    }

    /// A frame with no trackable hand: hide the pointer, drop geometric
    /// hover, leave the selection untouched.
    fn hidden_frame(&mut self) -> FrameResult {
        let mut events = Vec::new();
        if self.pointer.visible {
            events.push(PointerEvent::Hidden);
        }
        if let Some(old) = self.hovered.take() {
            events.push(PointerEvent::HoverEnded { target_id: old });
        }
        self.smoothed = None;
        self.pointer.visible = false;
        FrameResult {
            pointer: self.pointer,
            feedback: HoverFeedback::Released,
            events,
        }
    }

    fn smooth(&mut self, plane: PlanePoint) -> PlanePoint {
        if self.smoothing <= 0.0 {
            self.smoothed = Some((plane.x, plane.y));
            return plane;
        }
        let alpha = self.smoothing.min(1.0);
        let (x, y) = match self.smoothed {
            Some((px, py)) => (
                px + (plane.x - px) * (1.0 - alpha),
                py + (plane.y - py) * (1.0 - alpha),
            ),
            None => (plane.x, plane.y),
        };
        self.smoothed = Some((x, y));
        PlanePoint { x, y }
    }

    // ── Accessors and runtime configuration ────────────────

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn set_canvas(&mut self, w: f64, h: f64) {
        self.mapper.canvas_w = w;
        self.mapper.canvas_h = h;
    }

    pub fn set_glyph(&mut self, w: f64, h: f64) {
        self.mapper.glyph_w = w;
        self.mapper.glyph_h = h;
    }

    pub fn set_smoothing(&mut self, alpha: f32) {
        self.smoothing = alpha.clamp(0.0, 1.0);
        self.smoothed = None;
    }

    /// S-expression form of the pipeline configuration for IPC.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:canvas (:w {:.0} :h {:.0}) :glyph (:w {:.0} :h {:.0}) :plane (:w {:.0} :h {:.0}) :smoothing {:.2})",
            self.mapper.canvas_w,
            self.mapper.canvas_h,
            self.mapper.glyph_w,
            self.mapper.glyph_h,
            self.mapper.plane_w,
            self.mapper.plane_h,
            self.smoothing,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
