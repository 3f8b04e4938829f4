//! Pipeline Stage Definitions
//!
//! [`PipelineStage`] fixes the order of one traced frame. The tracing,
//! composition and temporal kernels are host-provided [`FrameStage`]s; the
//! sequencer itself performs Setup, Denoise, Reconstruct and Display.

use crate::denoiser::frame_data::FrameDescriptor;
use crate::errors::Result;
use crate::gpu::command::CommandStream;
use crate::gpu::texture::GpuTexture;
use crate::pipeline::channel::ResourceChannel;
use crate::pipeline::constants::TraceConstants;
use crate::pipeline::resource_pool::ResourcePool;
use crate::pipeline::temporal::HistoryPair;
use crate::scene::accel::SceneBindings;
use crate::scene::camera::{CameraState, ViewId};
use crate::settings::PathTracingSettings;

/// Stages of one frame, in execution order.
///
/// | Stage | Runs | Writes |
/// |-------|------|--------|
/// | `Setup` | sequencer | resources, frame descriptor |
/// | `PrimaryTrace` | host kernel | G-buffer, noisy radiance, penumbra, direct light |
/// | `Denoise` | native library | denoised radiance, shadow |
/// | `Composition` | host kernel | composed diffuse / specular |
/// | `SecondaryTrace` | host kernel | composed image with transparents |
/// | `TemporalFilter` | host kernel | TAA history |
/// | `Reconstruct` | native library, when enabled | reconstruction output |
/// | `Display` | sequencer | view target |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(u8)]
pub enum PipelineStage {
    Setup = 0,
    PrimaryTrace = 1,
    /// Asynchronous: only enqueued on the command stream.
    Denoise = 2,
    Composition = 3,
    SecondaryTrace = 4,
    TemporalFilter = 5,
    /// Asynchronous, like `Denoise`. Skipped unless reconstruction is enabled.
    Reconstruct = 6,
    Display = 7,
}

impl PipelineStage {
    pub const ALL: [Self; 8] = [
        Self::Setup,
        Self::PrimaryTrace,
        Self::Denoise,
        Self::Composition,
        Self::SecondaryTrace,
        Self::TemporalFilter,
        Self::Reconstruct,
        Self::Display,
    ];

    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Stage name (debug group label).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Setup => "Setup",
            Self::PrimaryTrace => "PrimaryTrace",
            Self::Denoise => "Denoise",
            Self::Composition => "Composition",
            Self::SecondaryTrace => "SecondaryTrace",
            Self::TemporalFilter => "TemporalFilter",
            Self::Reconstruct => "Reconstruct",
            Self::Display => "Display",
        }
    }

    /// Whether the stage is a host-provided kernel.
    #[inline]
    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(
            self,
            Self::PrimaryTrace | Self::Composition | Self::SecondaryTrace | Self::TemporalFilter
        )
    }
}

/// Everything a stage may read while recording.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub stage: PipelineStage,
    pub view: ViewId,
    /// Denoiser frame index of this frame.
    pub frame_index: u32,
    /// Ring write sequence of this frame.
    pub sequence: u64,
    pub camera: &'a CameraState,
    pub settings: &'a PathTracingSettings,
    pub constants: &'a TraceConstants,
    pub scene: &'a SceneBindings,
    pub descriptor: &'a FrameDescriptor,
    pub history: HistoryPair,
    pub(crate) pool: &'a ResourcePool,
}

impl<'a> StageContext<'a> {
    /// Texture bound to `channel`.
    pub fn texture(&self, channel: ResourceChannel) -> Result<&'a GpuTexture> {
        Ok(&self.pool.texture(channel)?.texture)
    }

    /// TAA history read this frame.
    pub fn history_source(&self) -> Result<&'a GpuTexture> {
        self.texture(self.history.source.channel())
    }

    /// TAA history written this frame.
    pub fn history_destination(&self) -> Result<&'a GpuTexture> {
        self.texture(self.history.destination.channel())
    }

    #[must_use]
    pub fn for_stage(mut self, stage: PipelineStage) -> Self {
        self.stage = stage;
        self
    }
}

/// A host-provided kernel invoked with bound resources.
///
/// Implementations only record work; they must not block.
pub trait FrameStage {
    fn name(&self) -> &str;

    fn execute(&self, ctx: &StageContext<'_>, commands: &mut dyn CommandStream) -> Result<()>;
}

/// The four external kernels of a traced frame.
pub struct StageSet {
    pub primary_trace: Box<dyn FrameStage>,
    pub composition: Box<dyn FrameStage>,
    pub secondary_trace: Box<dyn FrameStage>,
    pub temporal_filter: Box<dyn FrameStage>,
}

impl StageSet {
    /// The kernel for an external stage; `None` for sequencer-run stages.
    #[must_use]
    pub fn stage(&self, stage: PipelineStage) -> Option<&dyn FrameStage> {
        match stage {
            PipelineStage::PrimaryTrace => Some(self.primary_trace.as_ref()),
            PipelineStage::Composition => Some(self.composition.as_ref()),
            PipelineStage::SecondaryTrace => Some(self.secondary_trace.as_ref()),
            PipelineStage::TemporalFilter => Some(self.temporal_filter.as_ref()),
            PipelineStage::Setup
            | PipelineStage::Denoise
            | PipelineStage::Reconstruct
            | PipelineStage::Display => None,
        }
    }
}

impl std::fmt::Debug for StageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSet")
            .field("primary_trace", &self.primary_trace.name())
            .field("composition", &self.composition.name())
            .field("secondary_trace", &self.secondary_trace.name())
            .field("temporal_filter", &self.temporal_filter.name())
            .finish()
    }
}
