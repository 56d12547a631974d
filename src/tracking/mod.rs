//! Gesture-tracking subsystem — per-frame pipeline from raw bodies to an
//! on-screen pointer and target activation.
//!
//! Provides:
//! - `skeleton`: frame data model (bodies, joints, tracking states)
//! - `select`: primary body / primary hand disambiguation
//! - `project`: depth-plane projection and canvas mapping
//! - `hover`: interactive target registry and hit testing
//! - `activation`: sticky selection and trigger dispatch
//! - `pipeline`: the per-frame orchestrator
//! - `stats`: frame processing time statistics

pub mod activation;
pub mod hover;
pub mod pipeline;
pub mod project;
pub mod select;
pub mod skeleton;
pub mod stats;

pub use activation::ActivationGate;
pub use hover::{InteractiveTarget, TargetRegistry};
pub use pipeline::{PipelineConfig, TrackingPipeline};
pub use skeleton::Body;
