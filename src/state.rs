//! Daemon state — the central struct holding all mutable state.
//!
//! Single `AirpointState` struct owns everything (pipeline, target
//! registry, activation gate, IPC server) and is passed as `&mut self`
//! through the event loop, so frame processing, IPC commands, and
//! triggers are serialized on one logical execution context.

use tracing::info;

use crate::ipc::dispatch::format_event;
use crate::ipc::IpcServer;
use crate::tracking::pipeline::PointerEvent;
use crate::tracking::{ActivationGate, Body, PipelineConfig, TargetRegistry, TrackingPipeline};

/// Central daemon state.
pub struct AirpointState {
    // Tracking core
    pub pipeline: TrackingPipeline,
    pub registry: TargetRegistry,
    pub gate: ActivationGate,

    // IPC
    pub ipc_server: IpcServer,

    // Shutdown flag
    pub running: bool,
}

impl AirpointState {
    pub fn new(config: PipelineConfig) -> Self {
        info!("airpoint state initialized");
        Self {
            pipeline: TrackingPipeline::with_defaults(config),
            registry: TargetRegistry::new(),
            gate: ActivationGate::new(),
            ipc_server: IpcServer::new(IpcServer::default_socket_path()),
            running: true,
        }
    }

    /// Process one incoming body frame and broadcast the results.
    ///
    /// Called from the event loop only — either from the frame-source
    /// channel or from a `frame-inject` IPC command — so frames are never
    /// processed concurrently.
    pub fn handle_frame(&mut self, bodies: Vec<Body>) {
        let result = self
            .pipeline
            .process_frame(&bodies, &self.registry, &mut self.gate);

        for event in &result.events {
            let sexp = match event {
                PointerEvent::Shown => format_event("pointer-shown", &[]),
                PointerEvent::Hidden => format_event("pointer-hidden", &[]),
                PointerEvent::HoverStarted { target_id } => {
                    format_event("hover-started", &[("target-id", &target_id.to_string())])
                }
                PointerEvent::HoverEnded { target_id } => {
                    format_event("hover-ended", &[("target-id", &target_id.to_string())])
                }
            };
            self.ipc_server.broadcast_event(&sexp);
        }

        // Per-frame pointer update for the UI layer's glyph.
        let sexp = format_event(
            "pointer-updated",
            &[
                ("x", &result.pointer.x.to_string()),
                ("y", &result.pointer.y.to_string()),
                ("visible", if result.pointer.visible { "t" } else { "nil" }),
                ("hand", &format!(":{}", result.pointer.hand.as_str())),
                ("feedback", &format!(":{}", result.feedback.as_str())),
            ],
        );
        self.ipc_server.broadcast_event(&sexp);
    }

    /// Dispatch an activation for the held selection, notifying the
    /// external action dispatcher via event broadcast.  Returns the
    /// activated target id, or None when nothing was ever hovered.
    pub fn trigger_activation(&mut self) -> Option<u64> {
        let event = self.gate.trigger()?;
        let sexp = format_event(
            "target-activated",
            &[("target-id", &event.target_id.to_string())],
        );
        self.ipc_server.broadcast_event(&sexp);
        Some(event.target_id)
    }
}
