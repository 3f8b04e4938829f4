//! Trace Kernel Constants
//!
//! One uniform block per frame shared by the trace and composition kernels.
//! Layout is std140-compatible: matrices first, then `vec4`-aligned vectors,
//! then scalars padded to a 16-byte multiple.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::pipeline::snapshot_ring::PreviousFrameContext;
use crate::scene::camera::CameraState;
use crate::settings::PathTracingSettings;

/// Per-frame constants for the tracing kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TraceConstants {
    pub world_to_view: [f32; 16],
    pub world_to_clip: [f32; 16],
    pub world_to_view_prev: [f32; 16],
    pub world_to_clip_prev: [f32; 16],
    pub view_to_world: [f32; 16],
    pub clip_to_view: [f32; 16],

    /// xyz: camera position, w: unused.
    pub camera_position: [f32; 4],
    /// xyz: direction towards the sun, w: unused.
    pub sun_direction: [f32; 4],
    pub sun_basis_x: [f32; 4],
    pub sun_basis_y: [f32; 4],

    pub rect_size: [f32; 2],
    pub jitter: [f32; 2],

    /// `tan(fov / 2)`.
    pub zoom: f32,
    pub tan_pixel_angular_radius: f32,
    /// Converts view depth to a pixel footprint.
    pub unproject: f32,
    pub tan_sun_angular_radius: f32,

    pub light_offset: f32,
    pub sample_count: u32,
    pub bounce_count_opaque: u32,
    pub bounce_count_transparent: u32,
    /// Denoiser frame index; restarts after a reallocation.
    pub convergence_step: u32,
    /// Host frame counter.
    pub frame_index: u32,
    pub _pad: [u32; 2],
}

const _: () = assert!(std::mem::size_of::<TraceConstants>() % 16 == 0);

/// Orthonormal basis perpendicular to `direction`.
///
/// Falls back to an arbitrary perpendicular when `direction` is parallel to +Y.
#[must_use]
pub fn sun_basis(direction: Vec3) -> (Vec3, Vec3) {
    let x = Vec3::Y
        .cross(direction)
        .try_normalize()
        .unwrap_or_else(|| direction.any_orthonormal_vector());
    let y = direction.cross(x).normalize_or_zero();
    (x, y)
}

impl TraceConstants {
    #[must_use]
    pub fn new(
        camera: &CameraState,
        previous: &PreviousFrameContext,
        sun_direction: Vec3,
        settings: &PathTracingSettings,
        convergence_step: u32,
        frame_index: u32,
    ) -> Self {
        let view_to_world = camera.view_to_world();
        let sun = sun_direction.try_normalize().unwrap_or(Vec3::Y);
        let (basis_x, basis_y) = sun_basis(sun);

        let width = camera.pixel_width.max(1) as f32;
        let height = camera.pixel_height.max(1) as f32;
        let m11 = camera.view_to_clip.y_axis.y;

        Self {
            world_to_view: camera.world_to_view.to_cols_array(),
            world_to_clip: camera.world_to_clip().to_cols_array(),
            world_to_view_prev: previous.world_to_view.to_cols_array(),
            world_to_clip_prev: previous.world_to_clip().to_cols_array(),
            view_to_world: view_to_world.to_cols_array(),
            clip_to_view: camera.view_to_clip.inverse().to_cols_array(),

            camera_position: view_to_world.w_axis.truncate().extend(1.0).to_array(),
            sun_direction: sun.extend(0.0).to_array(),
            sun_basis_x: basis_x.extend(0.0).to_array(),
            sun_basis_y: basis_y.extend(0.0).to_array(),

            rect_size: [width, height],
            jitter: camera.jitter.to_array(),

            zoom: (camera.vertical_fov * 0.5).tan(),
            tan_pixel_angular_radius: (0.5 * camera.vertical_fov / width).tan(),
            unproject: if m11 == 0.0 { 0.0 } else { 1.0 / (0.5 * height * m11) },
            tan_sun_angular_radius: settings.sun_angular_radius.to_radians().tan(),

            light_offset: settings.light_offset,
            sample_count: settings.sample_count,
            bounce_count_opaque: settings.bounce_count_opaque,
            bounce_count_transparent: settings.bounce_count_transparent,
            convergence_step,
            frame_index,
            _pad: [0; 2],
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
