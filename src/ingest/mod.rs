//! Frame ingestion — sources that deliver body frames, and the run loop
//! that serializes them into the pipeline.
//!
//! Frame delivery may originate on a capture thread, but all pipeline
//! state is mutated only from the calloop event loop: capture threads
//! send frames over a channel and the loop drains it in order, so no two
//! frames are ever processed concurrently and IPC triggers observe a
//! consistent selection snapshot.

pub mod synthetic;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use calloop::channel::{self, Channel};
use calloop::EventLoop;
use tracing::info;

use crate::ipc::IpcServer;
use crate::state::AirpointState;
use crate::tracking::{Body, PipelineConfig};

/// Event loop poll interval; bounds IPC latency when no frames arrive.
const POLL_INTERVAL_MS: u64 = 10;

/// How often the idle status line is logged.
const STATUS_INTERVAL_SECS: u64 = 60;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

// ── Source selection ───────────────────────────────────────

/// Frame source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Frames are injected by an external sensor adapter over IPC.
    Ipc,
    /// Frames come from the in-process scripted sweep.
    Synthetic,
}

impl SourceType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ipc" => Some(Self::Ipc),
            "synthetic" => Some(Self::Synthetic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Synthetic => "synthetic",
        }
    }
}

// ── Run configuration ──────────────────────────────────────

/// Everything the run loop needs, assembled from the CLI.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: SourceType,
    pub socket_path: Option<std::path::PathBuf>,
    pub ipc_trace: bool,
    /// Exit after N seconds (CI runs).
    pub exit_after: Option<u64>,
    pub pipeline: PipelineConfig,
    /// Synthetic source frame rate.
    pub frame_rate_hz: u32,
}

impl RunConfig {
    /// Parse a "WxH" geometry string.  Returns (width, height) or None.
    pub fn parse_geometry(s: &str) -> Option<(f64, f64)> {
        let (w, h) = s.split_once('x')?;
        let w = w.parse::<f64>().ok()?;
        let h = h.parse::<f64>().ok()?;
        if w > 0.0 && h > 0.0 {
            Some((w, h))
        } else {
            None
        }
    }
}

// ── Signal handling ────────────────────────────────────────

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

// ── Run loop ───────────────────────────────────────────────

/// Register the frame channel with the event loop.
fn register_frame_channel(
    event_loop: &EventLoop<'static, AirpointState>,
    frames: Channel<Vec<Body>>,
) -> anyhow::Result<()> {
    event_loop
        .handle()
        .insert_source(frames, |event, _, state| {
            if let channel::Event::Msg(bodies) = event {
                state.handle_frame(bodies);
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to register frame channel: {e}"))?;
    Ok(())
}

/// Run the daemon with the selected frame source until shutdown.
pub fn run(config: RunConfig) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<AirpointState>::try_new()?;
    let mut state = AirpointState::new(config.pipeline.clone());

    // IPC socket
    state.ipc_server.ipc_trace = config.ipc_trace;
    let ipc_path = config
        .socket_path
        .clone()
        .unwrap_or_else(IpcServer::default_socket_path);
    state.ipc_server.socket_path = ipc_path.clone();
    IpcServer::bind(&ipc_path, &event_loop.handle())?;

    // Frame channel: capture threads send, the loop processes serially.
    let (tx, frames) = channel::channel::<Vec<Body>>();
    register_frame_channel(&event_loop, frames)?;

    let capture_stop = Arc::new(AtomicBool::new(false));
    let capture_thread = match config.source {
        SourceType::Synthetic => Some(synthetic::spawn(
            tx,
            config.frame_rate_hz,
            capture_stop.clone(),
        )),
        SourceType::Ipc => {
            // Frames arrive via the frame-inject command instead.
            drop(tx);
            None
        }
    };

    install_signal_handlers();

    let start_time = Instant::now();
    let exit_duration = config.exit_after.map(Duration::from_secs);
    let mut last_status_log = Instant::now();
    let status_interval = Duration::from_secs(STATUS_INTERVAL_SECS);
    let poll_interval = Duration::from_millis(POLL_INTERVAL_MS);

    info!(
        source = config.source.as_str(),
        "airpoint initialized, entering event loop"
    );

    while state.running {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("shutdown signal received, exiting");
            state.running = false;
            break;
        }

        if let Some(dur) = exit_duration {
            if start_time.elapsed() >= dur {
                info!("exit timer fired after {}s", dur.as_secs());
                state.running = false;
                break;
            }
        }

        if last_status_log.elapsed() >= status_interval {
            info!(
                "status: {} frame(s) processed, {} target(s), {} IPC client(s)",
                state.pipeline.stats.total_frames,
                state.registry.len(),
                state.ipc_server.clients.len(),
            );
            last_status_log = Instant::now();
        }

        IpcServer::poll_clients(&mut state);
        event_loop.dispatch(Some(poll_interval), &mut state)?;
    }

    // Stop the capture thread before tearing the loop down.
    capture_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = capture_thread {
        let _ = handle.join();
    }

    let _ = std::fs::remove_file(&state.ipc_server.socket_path);

    info!(
        "airpoint shutting down ({} frame(s) processed, {} IPC client(s))",
        state.pipeline.stats.total_frames,
        state.ipc_server.clients.len(),
    );
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────
