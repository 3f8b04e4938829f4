//! Pipeline Settings
//!
//! Two configuration surfaces:
//!
//! - [`PathTracingSettings`]: user-facing tracing, denoising and display
//!   parameters. Serializable, with every field defaulted so partial JSON
//!   files load cleanly. Can change between frames.
//! - [`PipelineConfig`]: structural parameters fixed at feature creation.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut settings = PathTracingSettings::from_json_str(r#"{ "sample_count": 4 }"#)?;
//! settings.display_mode = DisplayMode::Shadow;
//! ```

use std::path::Path;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::denoiser::frame_data::{CapabilityFlags, RadianceDenoiseParams, ShadowDenoiseParams};
use crate::denoiser::reconstruction::UpscalerMode;
use crate::errors::{PipelineError, Result};

// ============================================================================
// Display
// ============================================================================

/// Which buffer the display stage shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Leave the view target untouched.
    None,
    BaseColor,
    Metalness,
    Normal,
    Roughness,
    Shadow,
    Diffuse,
    Specular,
    DirectLight,
    Emissive,
    RawOutput,
    ComposedDiffuse,
    ComposedSpecular,
    Taa,
    #[default]
    Final,
    /// Output of the ray reconstruction pass.
    Reconstructed,
}

// ============================================================================
// Nested blocks
// ============================================================================

/// Shadow denoiser tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowDenoiseSettings {
    pub plane_distance_sensitivity: f32,
    /// Temporal stabilization length, in frames.
    pub max_stabilized_frame_num: u32,
}

impl Default for ShadowDenoiseSettings {
    fn default() -> Self {
        let defaults = ShadowDenoiseParams::default();
        Self {
            plane_distance_sensitivity: defaults.plane_distance_sensitivity,
            max_stabilized_frame_num: defaults.max_stabilized_frame_num,
        }
    }
}

/// Radiance denoiser tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadianceDenoiseSettings {
    pub hit_distance_params: [f32; 4],
    pub max_accumulated_frame_num: u32,
    pub max_fast_accumulated_frame_num: u32,
    pub history_fix_frame_num: u32,
    pub lobe_angle_fraction: f32,
    pub roughness_fraction: f32,
    pub min_blur_radius: f32,
    pub max_blur_radius: f32,
    pub anti_firefly: bool,
}

impl Default for RadianceDenoiseSettings {
    fn default() -> Self {
        let d = RadianceDenoiseParams::default();
        Self {
            hit_distance_params: d.hit_distance_params,
            max_accumulated_frame_num: d.max_accumulated_frame_num,
            max_fast_accumulated_frame_num: d.max_fast_accumulated_frame_num,
            history_fix_frame_num: d.history_fix_frame_num,
            lobe_angle_fraction: d.lobe_angle_fraction,
            roughness_fraction: d.roughness_fraction,
            min_blur_radius: d.min_blur_radius,
            max_blur_radius: d.max_blur_radius,
            anti_firefly: d.enable_anti_firefly != 0,
        }
    }
}

impl RadianceDenoiseSettings {
    #[must_use]
    pub fn to_params(&self) -> RadianceDenoiseParams {
        RadianceDenoiseParams {
            hit_distance_params: self.hit_distance_params,
            max_accumulated_frame_num: self.max_accumulated_frame_num,
            max_fast_accumulated_frame_num: self.max_fast_accumulated_frame_num,
            history_fix_frame_num: self.history_fix_frame_num,
            lobe_angle_fraction: self.lobe_angle_fraction,
            roughness_fraction: self.roughness_fraction,
            min_blur_radius: self.min_blur_radius,
            max_blur_radius: self.max_blur_radius,
            enable_anti_firefly: u32::from(self.anti_firefly),
        }
    }
}

/// The optional ray reconstruction pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionSettings {
    /// Issue the reconstruction event each frame. Needs a reconstruction
    /// library attached to the feature.
    pub enabled: bool,
    /// Traced fraction of the output size per axis, in (0, 1].
    pub resolution_scale: f32,
    pub upscaler_mode: UpscalerMode,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            resolution_scale: 1.0,
            upscaler_mode: UpscalerMode::Native,
        }
    }
}

impl ReconstructionSettings {
    /// Traced region for an output of `width` x `height`, rounded to the
    /// nearest pixel and never empty.
    #[must_use]
    pub fn render_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.resolution_scale + 0.5) as u32).clamp(1, v.max(1));
        (scale(width), scale(height))
    }
}

/// Replaces camera-derived denoiser inputs with fixed values.
///
/// Used to debug the denoiser against known matrices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonOverride {
    pub enabled: bool,
    pub view_to_clip: Mat4,
    pub view_to_clip_prev: Mat4,
    pub world_to_view: Mat4,
    pub world_to_view_prev: Mat4,
    pub motion_vector_scale: Vec3,
}

impl Default for CommonOverride {
    fn default() -> Self {
        Self {
            enabled: false,
            view_to_clip: Mat4::IDENTITY,
            view_to_clip_prev: Mat4::IDENTITY,
            world_to_view: Mat4::IDENTITY,
            world_to_view_prev: Mat4::IDENTITY,
            motion_vector_scale: Vec3::new(1.0, 1.0, 0.0),
        }
    }
}

// ============================================================================
// PathTracingSettings
// ============================================================================

/// Tracing, denoising and display parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTracingSettings {
    // === Tracing ===
    /// Maximum bounces through opaque surfaces (1..=10).
    pub bounce_count_opaque: u32,
    /// Maximum bounces through transparent surfaces (1..=10).
    pub bounce_count_transparent: u32,
    /// Paths per pixel per frame (at least 1).
    pub sample_count: u32,
    /// Ray origin offset along the surface normal.
    pub light_offset: f32,
    /// Sun angular radius in degrees.
    pub sun_angular_radius: f32,
    /// Skip tracing when the packed scene buffers are empty.
    pub use_packed_data: bool,

    // === Denoiser common ===
    /// View-space depth beyond which pixels are not denoised.
    pub denoising_range: f32,
    pub disocclusion_threshold: f32,
    pub disocclusion_threshold_alternate: f32,
    /// Fraction of the screen (from the left) shown without denoising, in [0, 1].
    pub split_screen: f32,
    /// Motion vectors carry only screen-space XY.
    pub motion_vectors_2d: bool,
    pub motion_vectors_in_world_space: bool,
    pub history_confidence: bool,
    pub disocclusion_threshold_mix: bool,
    pub base_color_metalness: bool,
    pub validation: bool,
    /// Drop temporal history on the next frame and clear library buffers.
    pub force_history_reset: bool,
    pub common_override: CommonOverride,
    /// Replaces the sun direction fed to the shadow denoiser.
    pub light_direction_override: Option<Vec3>,

    // === Per-denoiser ===
    pub shadow: ShadowDenoiseSettings,
    pub radiance: RadianceDenoiseSettings,
    pub reconstruction: ReconstructionSettings,

    // === Display ===
    pub display_mode: DisplayMode,
    /// Draw motion vectors over the displayed image.
    pub show_motion_vectors: bool,
    /// Draw the denoiser validation layer over the displayed image.
    pub show_validation: bool,
}

impl Default for PathTracingSettings {
    fn default() -> Self {
        Self {
            bounce_count_opaque: 5,
            bounce_count_transparent: 5,
            sample_count: 1,
            light_offset: 0.0001,
            sun_angular_radius: 0.25,
            use_packed_data: false,

            denoising_range: 500_000.0,
            disocclusion_threshold: 0.01,
            disocclusion_threshold_alternate: 0.05,
            split_screen: 0.0,
            motion_vectors_2d: false,
            motion_vectors_in_world_space: false,
            history_confidence: false,
            disocclusion_threshold_mix: false,
            base_color_metalness: false,
            validation: false,
            force_history_reset: false,
            common_override: CommonOverride::default(),
            light_direction_override: None,

            shadow: ShadowDenoiseSettings::default(),
            radiance: RadianceDenoiseSettings::default(),
            reconstruction: ReconstructionSettings::default(),

            display_mode: DisplayMode::Final,
            show_motion_vectors: false,
            show_validation: false,
        }
    }
}

impl PathTracingSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        log::debug!("Loaded path tracing settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        fn invalid(name: &'static str, reason: String) -> Result<()> {
            Err(PipelineError::InvalidSetting { name, reason })
        }

        if self.sample_count == 0 {
            return invalid("sample_count", "must be at least 1".into());
        }
        for (name, value) in [
            ("bounce_count_opaque", self.bounce_count_opaque),
            ("bounce_count_transparent", self.bounce_count_transparent),
        ] {
            if !(1..=10).contains(&value) {
                return invalid(name, format!("{value} is outside 1..=10"));
            }
        }
        if !(0.0..=1.0).contains(&self.split_screen) {
            return invalid("split_screen", format!("{} is outside [0, 1]", self.split_screen));
        }
        if self.denoising_range <= 0.0 {
            return invalid("denoising_range", "must be positive".into());
        }
        if self.sun_angular_radius < 0.0 {
            return invalid("sun_angular_radius", "must not be negative".into());
        }
        let scale = self.reconstruction.resolution_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return invalid("reconstruction.resolution_scale", format!("{scale} is outside (0, 1]"));
        }
        Ok(())
    }

    /// Capability bits advertised to the denoiser.
    #[must_use]
    pub fn capability_flags(&self) -> CapabilityFlags {
        let mut flags = CapabilityFlags::empty();
        flags.set(
            CapabilityFlags::MOTION_VECTORS_IN_WORLD_SPACE,
            self.motion_vectors_in_world_space,
        );
        flags.set(CapabilityFlags::HISTORY_CONFIDENCE, self.history_confidence);
        flags.set(
            CapabilityFlags::DISOCCLUSION_THRESHOLD_MIX,
            self.disocclusion_threshold_mix,
        );
        flags.set(CapabilityFlags::BASE_COLOR_METALNESS, self.base_color_metalness);
        flags.set(CapabilityFlags::VALIDATION, self.validation);
        flags
    }
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// Structural configuration, fixed for the lifetime of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of frame descriptor slots per view.
    ///
    /// Must be greater than `max_frames_in_flight`, otherwise the CPU could
    /// overwrite a descriptor the GPU has yet to consume.
    pub ring_depth: usize,

    /// Frames the host lets the GPU queue before blocking.
    pub max_frames_in_flight: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ring_depth: 3,
            max_frames_in_flight: 2,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ring_depth == 0 {
            return Err(PipelineError::ZeroRingDepth);
        }
        if self.ring_depth <= self.max_frames_in_flight {
            return Err(PipelineError::RingTooShallow {
                depth: self.ring_depth,
                in_flight: self.max_frames_in_flight,
            });
        }
        Ok(())
    }
}
