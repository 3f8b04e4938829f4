//! Frame Pipeline
//!
//! The orchestration core, leaves first:
//!
//! - [`resource_pool`]: per-view intermediate images and their denoiser wrappers
//! - [`snapshot_ring`]: ring of frame descriptors read by the denoiser
//! - [`reconstruction`]: descriptors of the optional ray reconstruction pass
//! - [`sequencer`]: the fixed stage order of one frame
//! - [`feature`]: per-view state and the host entry point
//!
//! Supporting modules hold the channel table, kernel constants, stage
//! definitions, TAA history selection and display selection.

pub mod channel;
pub mod constants;
pub mod display;
pub mod feature;
pub mod reconstruction;
pub mod resource_pool;
pub mod sequencer;
pub mod snapshot_ring;
pub mod stage;
pub mod temporal;

pub use channel::{CHANNEL_COUNT, CHANNEL_TABLE, ChannelInfo, ResourceChannel, SHARED_CHANNEL_COUNT};
pub use constants::TraceConstants;
pub use display::DisplaySelection;
pub use feature::PathTracingFeature;
pub use reconstruction::{
    ReconstructionInputs, ReconstructionRing, ReconstructionSlotView, build_reconstruction_descriptor,
};
pub use resource_pool::{EnsureOutcome, PooledTexture, ResourcePool, SharedResources};
pub use sequencer::{FrameOutcome, FrameReport, FrameServices, SkipReason, StageSequencer};
pub use snapshot_ring::{
    DEFAULT_RING_DEPTH, DescriptorRing, EventPayload, FrameInputs, FrameSlotView, FrameSnapshotRing,
    PreviousFrameContext, SlotView,
};
pub use stage::{FrameStage, PipelineStage, StageContext, StageSet};
pub use temporal::{HistoryBuffer, HistoryPair, taa_destination, taa_source};
