//! Display Selection
//!
//! Maps the configured [`DisplayMode`] to the channel blitted to the view
//! target, and lists the debug overlays drawn on top.

use smallvec::SmallVec;

use crate::gpu::command::BlitDecode;
use crate::pipeline::channel::ResourceChannel;
use crate::pipeline::temporal::HistoryPair;
use crate::settings::{DisplayMode, PathTracingSettings};

/// A channel and how to decode it onto the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySelection {
    pub channel: ResourceChannel,
    pub decode: BlitDecode,
}

impl DisplaySelection {
    const fn new(channel: ResourceChannel, decode: BlitDecode) -> Self {
        Self { channel, decode }
    }
}

/// The buffer shown for `mode`. `None` leaves the target untouched.
///
/// `Taa` and `Final` both show this frame's TAA output.
#[must_use]
pub fn select(mode: DisplayMode, history: HistoryPair) -> Option<DisplaySelection> {
    use BlitDecode as D;
    use ResourceChannel as C;

    let selection = match mode {
        DisplayMode::None => return None,
        DisplayMode::BaseColor => DisplaySelection::new(C::BaseColorMetalness, D::BaseColor),
        DisplayMode::Metalness => DisplaySelection::new(C::BaseColorMetalness, D::Metalness),
        DisplayMode::Normal => DisplaySelection::new(C::NormalRoughness, D::Normal),
        DisplayMode::Roughness => DisplaySelection::new(C::NormalRoughness, D::Roughness),
        DisplayMode::Shadow => DisplaySelection::new(C::ShadowTranslucency, D::Grayscale),
        DisplayMode::Diffuse => DisplaySelection::new(C::DiffuseRadianceOut, D::Radiance),
        DisplayMode::Specular => DisplaySelection::new(C::SpecularRadiance, D::Radiance),
        DisplayMode::DirectLight => DisplaySelection::new(C::DirectLighting, D::Copy),
        DisplayMode::Emissive => DisplaySelection::new(C::DirectEmission, D::Copy),
        DisplayMode::RawOutput => DisplaySelection::new(C::RawOutput, D::Copy),
        DisplayMode::ComposedDiffuse => DisplaySelection::new(C::ComposedDiffuse, D::Copy),
        DisplayMode::ComposedSpecular => DisplaySelection::new(C::ComposedSpecular, D::Copy),
        DisplayMode::Taa | DisplayMode::Final => {
            DisplaySelection::new(history.destination.channel(), D::Copy)
        }
        DisplayMode::Reconstructed => DisplaySelection::new(C::ReconstructionOutput, D::Copy),
    };
    Some(selection)
}

/// Overlays enabled in `settings`, in draw order.
#[must_use]
pub fn overlays(settings: &PathTracingSettings) -> SmallVec<[DisplaySelection; 2]> {
    let mut out = SmallVec::new();
    if settings.show_motion_vectors {
        out.push(DisplaySelection::new(
            ResourceChannel::MotionVector,
            BlitDecode::MotionVectors,
        ));
    }
    if settings.show_validation {
        out.push(DisplaySelection::new(ResourceChannel::Validation, BlitDecode::Overlay));
    }
    out
}
