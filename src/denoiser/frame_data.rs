//! Frame Descriptor Layout
//!
//! [`FrameDescriptor`] is the block the native library reads when a denoise
//! event fires. It is plain old data with an explicit `repr(C)` layout and no
//! implicit padding, so the library can read it straight out of a ring slot.
//!
//! ```text
//! offset  size  field
//! ──────  ────  ─────────────────────────────────────
//!      0    64  resources   [u64; 8] native texture handles
//!     64   328  common      matrices, jitter, sizes, thresholds
//!    392    20  shadow      light direction, stabilization
//!    412    48  radiance    hit distance model, accumulation
//!    460     4  width, height (u16)
//!    464     4  instance_id
//!    468     4  padding
//! ──────  ────
//!    472
//! ```

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::pipeline::channel::{ResourceChannel, SHARED_CHANNEL_COUNT};

/// How the denoiser should treat its temporal history this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum AccumulationMode {
    #[default]
    Continue = 0,
    /// Ignore history; used on the first frame and after a resize.
    Restart = 1,
    /// Ignore history and clear the library's internal buffers.
    ClearAndRestart = 2,
}

impl AccumulationMode {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Continue),
            1 => Some(Self::Restart),
            2 => Some(Self::ClearAndRestart),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn resets_history(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

bitflags! {
    /// Optional inputs and behaviors advertised to the denoiser.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilityFlags: u32 {
        const MOTION_VECTORS_IN_WORLD_SPACE = 1 << 0;
        const HISTORY_CONFIDENCE            = 1 << 1;
        const DISOCCLUSION_THRESHOLD_MIX    = 1 << 2;
        const BASE_COLOR_METALNESS          = 1 << 3;
        const VALIDATION                    = 1 << 4;
    }
}

/// Camera and buffer state shared by every denoiser in the library.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CommonParams {
    pub view_to_clip: [f32; 16],
    pub view_to_clip_prev: [f32; 16],
    pub world_to_view: [f32; 16],
    pub world_to_view_prev: [f32; 16],
    pub motion_vector_scale: [f32; 3],
    pub camera_jitter: [f32; 2],
    pub camera_jitter_prev: [f32; 2],
    pub resource_size: [u16; 2],
    pub resource_size_prev: [u16; 2],
    pub rect_size: [u16; 2],
    pub rect_size_prev: [u16; 2],
    pub denoising_range: f32,
    pub disocclusion_threshold: f32,
    pub disocclusion_threshold_alternate: f32,
    pub split_screen: f32,
    pub frame_index: u32,
    pub accumulation_mode: u32,
    pub flags: u32,
}

impl Default for CommonParams {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array();
        Self {
            view_to_clip: identity,
            view_to_clip_prev: identity,
            world_to_view: identity,
            world_to_view_prev: identity,
            motion_vector_scale: [1.0, 1.0, 0.0],
            camera_jitter: [0.0; 2],
            camera_jitter_prev: [0.0; 2],
            resource_size: [0; 2],
            resource_size_prev: [0; 2],
            rect_size: [0; 2],
            rect_size_prev: [0; 2],
            denoising_range: 500_000.0,
            disocclusion_threshold: 0.01,
            disocclusion_threshold_alternate: 0.05,
            split_screen: 0.0,
            frame_index: 0,
            accumulation_mode: AccumulationMode::Continue as u32,
            flags: 0,
        }
    }
}

/// Parameters for the shadow denoiser.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadowDenoiseParams {
    /// Direction towards the light, world space.
    pub light_direction: [f32; 3],
    pub plane_distance_sensitivity: f32,
    pub max_stabilized_frame_num: u32,
}

impl Default for ShadowDenoiseParams {
    fn default() -> Self {
        Self {
            light_direction: [0.0; 3],
            plane_distance_sensitivity: 0.02,
            max_stabilized_frame_num: 5,
        }
    }
}

/// Parameters for the diffuse radiance denoiser.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RadianceDenoiseParams {
    /// `(A, B, C, D)` of the hit distance normalization model.
    pub hit_distance_params: [f32; 4],
    pub max_accumulated_frame_num: u32,
    pub max_fast_accumulated_frame_num: u32,
    pub history_fix_frame_num: u32,
    pub lobe_angle_fraction: f32,
    pub roughness_fraction: f32,
    pub min_blur_radius: f32,
    pub max_blur_radius: f32,
    pub enable_anti_firefly: u32,
}

impl Default for RadianceDenoiseParams {
    fn default() -> Self {
        Self {
            hit_distance_params: [3.0, 0.1, 20.0, -25.0],
            max_accumulated_frame_num: 30,
            max_fast_accumulated_frame_num: 6,
            history_fix_frame_num: 3,
            lobe_angle_fraction: 0.15,
            roughness_fraction: 0.15,
            min_blur_radius: 1.0,
            max_blur_radius: 30.0,
            enable_anti_firefly: 0,
        }
    }
}

/// Everything the denoiser needs for one frame of one view.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameDescriptor {
    /// Native handles of the shared channels, indexed by
    /// [`ResourceChannel::shared_index`].
    pub resources: [u64; SHARED_CHANNEL_COUNT],
    pub common: CommonParams,
    pub shadow: ShadowDenoiseParams,
    pub radiance: RadianceDenoiseParams,
    pub width: u16,
    pub height: u16,
    pub instance_id: i32,
    pub _pad: u32,
}

const _: () = assert!(std::mem::size_of::<FrameDescriptor>() == 472);
const _: () = assert!(std::mem::size_of::<CommonParams>() == 328);

impl Default for FrameDescriptor {
    fn default() -> Self {
        Self {
            resources: [0; SHARED_CHANNEL_COUNT],
            common: CommonParams::default(),
            shadow: ShadowDenoiseParams::default(),
            radiance: RadianceDenoiseParams::default(),
            width: 0,
            height: 0,
            instance_id: 0,
            _pad: 0,
        }
    }
}

impl FrameDescriptor {
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.common.frame_index
    }

    /// `None` if the raw field holds an unknown value.
    #[must_use]
    pub fn accumulation_mode(&self) -> Option<AccumulationMode> {
        AccumulationMode::from_raw(self.common.accumulation_mode)
    }

    #[must_use]
    pub fn capabilities(&self) -> CapabilityFlags {
        CapabilityFlags::from_bits_truncate(self.common.flags)
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (u32::from(self.width), u32::from(self.height))
    }

    #[must_use]
    pub fn resource_size(&self) -> (u32, u32) {
        let [w, h] = self.common.resource_size;
        (u32::from(w), u32::from(h))
    }

    #[must_use]
    pub fn previous_resource_size(&self) -> (u32, u32) {
        let [w, h] = self.common.resource_size_prev;
        (u32::from(w), u32::from(h))
    }

    #[must_use]
    pub fn world_to_view(&self) -> Mat4 {
        Mat4::from_cols_array(&self.common.world_to_view)
    }

    #[must_use]
    pub fn previous_world_to_view(&self) -> Mat4 {
        Mat4::from_cols_array(&self.common.world_to_view_prev)
    }

    #[must_use]
    pub fn view_to_clip(&self) -> Mat4 {
        Mat4::from_cols_array(&self.common.view_to_clip)
    }

    #[must_use]
    pub fn previous_view_to_clip(&self) -> Mat4 {
        Mat4::from_cols_array(&self.common.view_to_clip_prev)
    }

    #[must_use]
    pub fn jitter(&self) -> Vec2 {
        Vec2::from_array(self.common.camera_jitter)
    }

    #[must_use]
    pub fn previous_jitter(&self) -> Vec2 {
        Vec2::from_array(self.common.camera_jitter_prev)
    }

    #[must_use]
    pub fn motion_vector_scale(&self) -> Vec3 {
        Vec3::from_array(self.common.motion_vector_scale)
    }

    #[must_use]
    pub fn light_direction(&self) -> Vec3 {
        Vec3::from_array(self.shadow.light_direction)
    }

    /// Native handle recorded for a shared channel; `None` for internal ones.
    #[must_use]
    pub fn resource(&self, channel: ResourceChannel) -> Option<u64> {
        channel.shared_index().map(|i| self.resources[i])
    }
}
