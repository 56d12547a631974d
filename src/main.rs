//! Airpoint — touchless gesture pointer daemon.
//!
//! Tracks a hand through a depth sensor's body frames and drives a
//! virtual pointer over registered on-screen targets.

mod ingest;
pub mod ipc;
mod state;
pub mod tracking;

use clap::Parser;
use tracing::info;

use ingest::{RunConfig, SourceType};
use tracking::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "airpoint", about = "Touchless gesture pointer daemon")]
struct Cli {
    /// Frame source: ipc or synthetic
    #[arg(long, default_value = "ipc")]
    source: String,

    /// Canvas size in pixels, as WxH
    #[arg(long, default_value = "1280x720")]
    canvas: String,

    /// Pointer glyph size in pixels, as WxH
    #[arg(long, default_value = "64x64")]
    glyph: String,

    /// Synthetic source frame rate in Hz
    #[arg(long, default_value_t = 30)]
    frame_rate: u32,

    /// IPC socket path (default: $XDG_RUNTIME_DIR/airpoint-ipc.sock)
    #[arg(long)]
    ipc_socket: Option<String>,

    /// Log all IPC messages to stderr
    #[arg(long)]
    ipc_trace: bool,

    /// Exit after N seconds (CI testing)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("airpoint {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airpoint=info".into()),
        )
        .init();

    info!("airpoint v{} starting", env!("CARGO_PKG_VERSION"));

    let source = match SourceType::from_str(&cli.source) {
        Some(s) => s,
        None => {
            eprintln!("Unknown source: {}. Use: ipc or synthetic", cli.source);
            std::process::exit(1);
        }
    };

    let Some((canvas_w, canvas_h)) = RunConfig::parse_geometry(&cli.canvas) else {
        eprintln!("Invalid --canvas geometry: {} (use WxH)", cli.canvas);
        std::process::exit(1);
    };
    let Some((glyph_w, glyph_h)) = RunConfig::parse_geometry(&cli.glyph) else {
        eprintln!("Invalid --glyph geometry: {} (use WxH)", cli.glyph);
        std::process::exit(1);
    };

    info!(source = source.as_str(), canvas = %cli.canvas, glyph = %cli.glyph, "configuration");

    ingest::run(RunConfig {
        source,
        socket_path: cli.ipc_socket.map(std::path::PathBuf::from),
        ipc_trace: cli.ipc_trace,
        exit_after: cli.exit_after,
        pipeline: PipelineConfig {
            canvas_w,
            canvas_h,
            glyph_w,
            glyph_h,
            smoothing: 0.0,
        },
        frame_rate_hz: cli.frame_rate,
    })
}
