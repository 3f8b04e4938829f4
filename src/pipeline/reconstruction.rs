//! Ray Reconstruction Descriptors
//!
//! Builds the per-frame [`ReconstructionDescriptor`] and names the ring that
//! keeps it alive until the GPU timeline reaches the reconstruction event.
//! The ring is separate from the denoiser's: the two descriptors differ in
//! type and the two events fire at different points of the frame.

use crate::denoiser::InstanceId;
use crate::denoiser::reconstruction::{RECONSTRUCTION_TEXTURE_COUNT, ReconstructionDescriptor};
use crate::gpu::texture::NativeHandle;
use crate::pipeline::snapshot_ring::{DescriptorRing, SlotView, size_u16};
use crate::scene::camera::CameraState;
use crate::settings::ReconstructionSettings;

/// Ring of reconstruction descriptors.
pub type ReconstructionRing = DescriptorRing<ReconstructionDescriptor>;

/// View of a reconstruction descriptor slot.
pub type ReconstructionSlotView = SlotView<ReconstructionDescriptor>;

/// Inputs of [`build_reconstruction_descriptor`].
#[derive(Debug, Clone, Copy)]
pub struct ReconstructionInputs<'a> {
    pub instance: InstanceId,
    pub camera: &'a CameraState,
    /// Pool size; the pass writes its output at this size.
    pub output_size: (u32, u32),
    /// Ordered as [`RECONSTRUCTION_CHANNELS`](crate::denoiser::reconstruction::RECONSTRUCTION_CHANNELS).
    pub textures: [NativeHandle; RECONSTRUCTION_TEXTURE_COUNT],
    pub settings: &'a ReconstructionSettings,
}

/// Builds the reconstruction descriptor for one frame.
#[must_use]
pub fn build_reconstruction_descriptor(inputs: &ReconstructionInputs<'_>) -> ReconstructionDescriptor {
    let (width, height) = inputs.output_size;
    let [output_width, output_height] = size_u16(inputs.output_size);
    let [render_width, render_height] = size_u16(inputs.settings.render_size(width, height));

    ReconstructionDescriptor {
        textures: inputs.textures.map(|h| h.0),
        world_to_view: inputs.camera.world_to_view.to_cols_array(),
        view_to_clip: inputs.camera.view_to_clip.to_cols_array(),
        output_width,
        output_height,
        render_width,
        render_height,
        camera_jitter: inputs.camera.jitter.to_array(),
        instance_id: inputs.instance.0,
        upscaler_mode: inputs.settings.upscaler_mode as u8,
        _pad: [0; 3],
    }
}
