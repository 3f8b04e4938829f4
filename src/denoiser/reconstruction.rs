//! Ray Reconstruction Boundary
//!
//! A second per-view denoiser that reconstructs (and optionally upscales)
//! the composed image from the tracer's guide buffers. It lives in the same
//! native plugin as the spatio-temporal denoiser and shares its execution
//! entry point, but keeps its own instances and reads its own descriptor
//! type when [`RECONSTRUCT_EVENT_ID`] fires.
//!
//! ```text
//! offset  size  field
//! ──────  ────  ─────────────────────────────────────
//!      0    64  textures        [u64; 8] native handles
//!     64    64  world_to_view   column-major
//!    128    64  view_to_clip    column-major
//!    192     8  output / render size (u16 x 4)
//!    200     8  camera_jitter
//!    208     4  instance_id
//!    212     1  upscaler_mode
//!    213     3  padding
//! ──────  ────
//!    216
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};
use crate::pipeline::channel::ResourceChannel;

use super::InstanceId;
use super::native::{CreateInstanceFn, DestroyInstanceFn, NativeEntryPoints};

/// Event id the execution entry point interprets as "reconstruct this frame".
pub const RECONSTRUCT_EVENT_ID: i32 = 2;

/// Number of textures a reconstruction descriptor references.
pub const RECONSTRUCTION_TEXTURE_COUNT: usize = 8;

/// Channels behind [`ReconstructionDescriptor::textures`], in ABI order.
pub const RECONSTRUCTION_CHANNELS: [ResourceChannel; RECONSTRUCTION_TEXTURE_COUNT] = [
    ResourceChannel::Composed,
    ResourceChannel::ReconstructionOutput,
    ResourceChannel::MotionVector,
    ResourceChannel::ViewZ,
    ResourceChannel::GuideDiffuseAlbedo,
    ResourceChannel::GuideSpecularAlbedo,
    ResourceChannel::NormalRoughness,
    ResourceChannel::GuideSpecularHitDistance,
];

/// Quality preset of the upscaler, in native ABI order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum UpscalerMode {
    /// Render at output resolution.
    #[default]
    Native = 0,
    UltraQuality = 1,
    Quality = 2,
    Balanced = 3,
    Performance = 4,
    UltraPerformance = 5,
}

impl UpscalerMode {
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Native),
            1 => Some(Self::UltraQuality),
            2 => Some(Self::Quality),
            3 => Some(Self::Balanced),
            4 => Some(Self::Performance),
            5 => Some(Self::UltraPerformance),
            _ => None,
        }
    }
}

/// Everything the reconstruction pass needs for one frame of one view.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ReconstructionDescriptor {
    /// Native handles, ordered as [`RECONSTRUCTION_CHANNELS`].
    pub textures: [u64; RECONSTRUCTION_TEXTURE_COUNT],
    pub world_to_view: [f32; 16],
    pub view_to_clip: [f32; 16],
    pub output_width: u16,
    pub output_height: u16,
    /// Traced region inside the inputs, before upscaling.
    pub render_width: u16,
    pub render_height: u16,
    /// Jitter as the tracer applied it; the library negates it.
    pub camera_jitter: [f32; 2],
    pub instance_id: i32,
    pub upscaler_mode: u8,
    pub _pad: [u8; 3],
}

const _: () = assert!(std::mem::size_of::<ReconstructionDescriptor>() == 216);

impl Default for ReconstructionDescriptor {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array();
        Self {
            textures: [0; RECONSTRUCTION_TEXTURE_COUNT],
            world_to_view: identity,
            view_to_clip: identity,
            output_width: 0,
            output_height: 0,
            render_width: 0,
            render_height: 0,
            camera_jitter: [0.0; 2],
            instance_id: 0,
            upscaler_mode: UpscalerMode::Native as u8,
            _pad: [0; 3],
        }
    }
}

impl ReconstructionDescriptor {
    #[inline]
    #[must_use]
    pub fn output_size(&self) -> (u32, u32) {
        (u32::from(self.output_width), u32::from(self.output_height))
    }

    #[inline]
    #[must_use]
    pub fn render_size(&self) -> (u32, u32) {
        (u32::from(self.render_width), u32::from(self.render_height))
    }

    #[must_use]
    pub fn upscaler_mode(&self) -> Option<UpscalerMode> {
        UpscalerMode::from_raw(self.upscaler_mode)
    }

    #[must_use]
    pub fn jitter(&self) -> Vec2 {
        Vec2::from_array(self.camera_jitter)
    }

    /// Native handle recorded for `channel`, if the pass reads or writes it.
    #[must_use]
    pub fn texture(&self, channel: ResourceChannel) -> Option<u64> {
        RECONSTRUCTION_CHANNELS
            .iter()
            .position(|c| *c == channel)
            .map(|i| self.textures[i])
    }
}

/// Instance management of the reconstruction denoiser.
///
/// Dispatch goes through the [`DenoiserLibrary`](super::DenoiserLibrary)'s
/// execution entry point; this trait only covers instance lifetime.
pub trait ReconstructionLibrary {
    /// Returns a new instance id; a non-positive id signals failure.
    fn create_instance(&mut self) -> InstanceId;

    fn destroy_instance(&mut self, instance: InstanceId);
}

/// [`ReconstructionLibrary`] backed by the loaded native plugin.
#[derive(Debug)]
pub struct NativeReconstructionLibrary {
    create_instance: CreateInstanceFn,
    destroy_instance: DestroyInstanceFn,
}

impl NativeReconstructionLibrary {
    /// # Safety
    ///
    /// Same contract as [`NativeDenoiserLibrary::new`](super::native::NativeDenoiserLibrary::new).
    pub unsafe fn new(exports: &NativeEntryPoints) -> Result<Self> {
        Ok(Self {
            create_instance: exports
                .create_reconstruction_instance
                .ok_or(PipelineError::MissingEntryPoint("CreateDLRRInstance"))?,
            destroy_instance: exports
                .destroy_reconstruction_instance
                .ok_or(PipelineError::MissingEntryPoint("DestroyDLRRInstance"))?,
        })
    }
}

impl ReconstructionLibrary for NativeReconstructionLibrary {
    fn create_instance(&mut self) -> InstanceId {
        // SAFETY: export validated in `new`.
        InstanceId(unsafe { (self.create_instance)() })
    }

    fn destroy_instance(&mut self, instance: InstanceId) {
        // SAFETY: export validated in `new`.
        unsafe { (self.destroy_instance)(instance.0) }
    }
}
