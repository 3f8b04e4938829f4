//! # Trace Pipeline
//!
//! Per-view frame orchestration for a path tracer whose noisy output is
//! cleaned up by an external, natively implemented spatio-temporal denoiser.
//!
//! Each frame of each view runs a fixed stage sequence:
//!
//! ```text
//! Setup → PrimaryTrace → Denoise → Composition → SecondaryTrace → TemporalFilter → Display
//! ```
//!
//! The denoiser executes asynchronously on the GPU timeline, so the CPU
//! hands it a pointer into a ring of frame descriptors rather than a copy.
//! An optional ray reconstruction pass runs between `TemporalFilter` and
//! `Display` with a descriptor ring of its own.
//!
//! # Modules
//!
//! - [`denoiser`]: the native library boundary and descriptor layout
//! - [`gpu`]: texture handles, formats, command streams, wgpu backend
//! - [`scene`]: camera, view and acceleration structure inputs
//! - [`pipeline`]: resource pool, snapshot ring, sequencer, feature
//! - [`settings`]: user-facing and structural configuration
//! - [`errors`]: [`PipelineError`] and the crate [`Result`]

pub mod denoiser;
pub mod errors;
pub mod gpu;
pub mod pipeline;
pub mod scene;
pub mod settings;

pub use errors::{PipelineError, Result};
pub use pipeline::{
    FrameOutcome, FrameReport, FrameStage, PathTracingFeature, PipelineStage, ResourceChannel,
    ResourcePool, StageSet,
};
pub use settings::{DisplayMode, PathTracingSettings, PipelineConfig};
