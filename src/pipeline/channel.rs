//! Resource Channels
//!
//! Every intermediate image a view owns is a *channel*. All per-channel
//! facts live in one table, [`CHANNEL_TABLE`], indexed by the channel's
//! discriminant:
//!
//! | Channel | Format | Denoiser slot | First frame | Steady |
//! |---------|--------|---------------|-------------|--------|
//! | `MotionVector` | RGBA16F | 0 | storage | shader read |
//! | `ViewZ` | R32F | 2 | storage | shader read |
//! | `NormalRoughness` | RGB10A2 | 1 | storage | shader read |
//! | `Penumbra` | R16F | 16 | storage | shader read |
//! | `ShadowTranslucency` | R16F | 28 | storage | storage |
//! | `DiffuseRadianceIn` | RGBA16F | 7 | color attachment | shader read |
//! | `DiffuseRadianceOut` | RGBA16F | 19 | color attachment | storage |
//! | `Validation` | RGBA8 | 30 | storage | storage |
//!
//! Channels without a denoiser slot are internal to the tracer and are never
//! wrapped for the library. The reconstruction pass reads its guides and
//! writes its output through plain native handles, so its channels are
//! internal too.

use crate::denoiser::state::ResourceState;
use crate::gpu::format::PixelFormat;

/// Number of channels shared with the denoiser.
pub const SHARED_CHANNEL_COUNT: usize = 8;

/// Total number of channels owned by a resource pool.
pub const CHANNEL_COUNT: usize = 22;

/// Intermediate images of one view.
///
/// Shared channels come first so their discriminant doubles as their index
/// into [`FrameDescriptor::resources`](crate::denoiser::frame_data::FrameDescriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ResourceChannel {
    // Shared with the denoiser
    MotionVector = 0,
    ViewZ = 1,
    NormalRoughness = 2,
    Penumbra = 3,
    ShadowTranslucency = 4,
    DiffuseRadianceIn = 5,
    DiffuseRadianceOut = 6,
    Validation = 7,

    // Tracer only
    BaseColorMetalness = 8,
    DirectLighting = 9,
    DirectEmission = 10,
    SpecularRadiance = 11,
    RawOutput = 12,
    ComposedDiffuse = 13,
    ComposedSpecular = 14,
    Composed = 15,
    TaaHistoryA = 16,
    TaaHistoryB = 17,

    // Ray reconstruction
    GuideDiffuseAlbedo = 18,
    GuideSpecularAlbedo = 19,
    GuideSpecularHitDistance = 20,
    ReconstructionOutput = 21,
}

/// Static description of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel: ResourceChannel,
    pub label: &'static str,
    pub format: PixelFormat,
    /// The denoiser's resource slot id, for shared channels.
    pub library_slot: Option<u32>,
    /// State declared on the first frame after (re)allocation.
    pub first_frame_state: ResourceState,
    pub steady_state: ResourceState,
}

const fn shared(
    channel: ResourceChannel,
    label: &'static str,
    format: PixelFormat,
    library_slot: u32,
    first_frame_state: ResourceState,
    steady_state: ResourceState,
) -> ChannelInfo {
    ChannelInfo {
        channel,
        label,
        format,
        library_slot: Some(library_slot),
        first_frame_state,
        steady_state,
    }
}

const fn internal(channel: ResourceChannel, label: &'static str, format: PixelFormat) -> ChannelInfo {
    ChannelInfo {
        channel,
        label,
        format,
        library_slot: None,
        first_frame_state: ResourceState::STORAGE,
        steady_state: ResourceState::STORAGE,
    }
}

use PixelFormat as F;
use ResourceChannel as C;
use ResourceState as S;

/// Per-channel facts, indexed by `channel as usize`.
pub static CHANNEL_TABLE: [ChannelInfo; CHANNEL_COUNT] = [
    shared(C::MotionVector, "pt.motion_vector", F::Rgba16Float, 0, S::STORAGE, S::SHADER_READ),
    shared(C::ViewZ, "pt.view_z", F::R32Float, 2, S::STORAGE, S::SHADER_READ),
    shared(C::NormalRoughness, "pt.normal_roughness", F::Rgb10a2Unorm, 1, S::STORAGE, S::SHADER_READ),
    shared(C::Penumbra, "pt.penumbra", F::R16Float, 16, S::STORAGE, S::SHADER_READ),
    shared(C::ShadowTranslucency, "pt.shadow_translucency", F::R16Float, 28, S::STORAGE, S::STORAGE),
    shared(C::DiffuseRadianceIn, "pt.diffuse_radiance_in", F::Rgba16Float, 7, S::COLOR_ATTACHMENT, S::SHADER_READ),
    shared(C::DiffuseRadianceOut, "pt.diffuse_radiance_out", F::Rgba16Float, 19, S::COLOR_ATTACHMENT, S::STORAGE),
    shared(C::Validation, "pt.validation", F::Rgba8Unorm, 30, S::STORAGE, S::STORAGE),
    internal(C::BaseColorMetalness, "pt.base_color_metalness", F::Rgba8Unorm),
    internal(C::DirectLighting, "pt.direct_lighting", F::Rg11b10Float),
    internal(C::DirectEmission, "pt.direct_emission", F::Rg11b10Float),
    internal(C::SpecularRadiance, "pt.specular_radiance", F::Rgba16Float),
    internal(C::RawOutput, "pt.raw_output", F::Rgba16Float),
    internal(C::ComposedDiffuse, "pt.composed_diffuse", F::Rgba16Float),
    internal(C::ComposedSpecular, "pt.composed_specular", F::Rgba16Float),
    internal(C::Composed, "pt.composed", F::Rgba16Float),
    internal(C::TaaHistoryA, "pt.taa_history_a", F::Rgba16Float),
    internal(C::TaaHistoryB, "pt.taa_history_b", F::Rgba16Float),
    internal(C::GuideDiffuseAlbedo, "pt.rr_diffuse_albedo", F::Rgba8Unorm),
    internal(C::GuideSpecularAlbedo, "pt.rr_specular_albedo", F::Rgba8Unorm),
    internal(C::GuideSpecularHitDistance, "pt.rr_specular_hit_distance", F::R32Float),
    internal(C::ReconstructionOutput, "pt.rr_output", F::Rgba16Float),
];

impl ResourceChannel {
    pub const ALL: [Self; CHANNEL_COUNT] = [
        C::MotionVector,
        C::ViewZ,
        C::NormalRoughness,
        C::Penumbra,
        C::ShadowTranslucency,
        C::DiffuseRadianceIn,
        C::DiffuseRadianceOut,
        C::Validation,
        C::BaseColorMetalness,
        C::DirectLighting,
        C::DirectEmission,
        C::SpecularRadiance,
        C::RawOutput,
        C::ComposedDiffuse,
        C::ComposedSpecular,
        C::Composed,
        C::TaaHistoryA,
        C::TaaHistoryB,
        C::GuideDiffuseAlbedo,
        C::GuideSpecularAlbedo,
        C::GuideSpecularHitDistance,
        C::ReconstructionOutput,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub fn info(self) -> &'static ChannelInfo {
        &CHANNEL_TABLE[self.index()]
    }

    #[inline]
    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.index() < SHARED_CHANNEL_COUNT
    }

    /// Index into the descriptor's resource array.
    #[inline]
    #[must_use]
    pub const fn shared_index(self) -> Option<usize> {
        if self.is_shared() { Some(self.index()) } else { None }
    }

    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        self.info().label
    }

    #[inline]
    #[must_use]
    pub fn format(self) -> PixelFormat {
        self.info().format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoiser::state::AccessBits;

    #[test]
    fn table_is_indexed_by_discriminant() {
        for (i, info) in CHANNEL_TABLE.iter().enumerate() {
            assert_eq!(info.channel.index(), i, "{:?}", info.channel);
            assert_eq!(ResourceChannel::ALL[i], info.channel);
        }
    }

    #[test]
    fn shared_channels_have_library_slots() {
        for channel in ResourceChannel::ALL {
            assert_eq!(channel.is_shared(), channel.info().library_slot.is_some(), "{channel:?}");
        }
        let shared = ResourceChannel::ALL.iter().filter(|c| c.is_shared()).count();
        assert_eq!(shared, SHARED_CHANNEL_COUNT);
    }

    #[test]
    fn inputs_start_writable_then_become_readable() {
        for channel in [C::MotionVector, C::ViewZ, C::NormalRoughness, C::Penumbra] {
            let info = channel.info();
            assert_eq!(info.first_frame_state.access, AccessBits::SHADER_RESOURCE_STORAGE);
            assert_eq!(info.steady_state.access, AccessBits::SHADER_RESOURCE);
        }
        assert_eq!(C::DiffuseRadianceOut.info().steady_state, ResourceState::STORAGE);
    }

    #[test]
    fn denoiser_outputs_stay_writable() {
        for channel in [C::ShadowTranslucency, C::Validation] {
            let info = channel.info();
            assert_eq!(info.first_frame_state, ResourceState::STORAGE, "{channel:?}");
            assert_eq!(info.steady_state, ResourceState::STORAGE, "{channel:?}");
        }
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<_> = CHANNEL_TABLE.iter().map(|i| i.label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), CHANNEL_COUNT);
    }
}
