//! Camera and View Inputs
//!
//! A *view* is one camera eye that the host renders. Stereo cameras yield
//! one view per eye; each view owns its own resources and history.

use glam::{Mat4, Vec2, Vec3};

use crate::gpu::texture::GpuTexture;

/// Eye offset used when folding the eye index into a view id.
const EYE_STRIDE: i64 = 100_000;

/// Stable identity of a view across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(i64);

impl ViewId {
    /// Mono view of a camera.
    #[must_use]
    pub const fn mono(camera_id: i32) -> Self {
        Self::eye(camera_id, 0)
    }

    /// One eye of a (possibly stereo) camera.
    #[must_use]
    pub const fn eye(camera_id: i32, eye_index: u32) -> Self {
        Self(camera_id as i64 + eye_index as i64 * EYE_STRIDE)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }
}

/// Display label for a view: the camera name, suffixed per eye in stereo.
#[must_use]
pub fn view_label(camera_name: &str, eye_index: u32, stereo: bool) -> String {
    if stereo {
        format!("{camera_name}_Eye{eye_index}")
    } else {
        camera_name.to_owned()
    }
}

/// What the host camera is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraKind {
    #[default]
    Game,
    SceneView,
    /// Thumbnail and inspector previews.
    Preview,
    /// Reflection probe captures.
    Reflection,
}

impl CameraKind {
    /// Preview and reflection cameras never get path traced.
    #[inline]
    #[must_use]
    pub const fn is_traced(self) -> bool {
        matches!(self, Self::Game | Self::SceneView)
    }
}

/// Camera state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub kind: CameraKind,
    pub world_to_view: Mat4,
    /// GPU projection (depth 0..1).
    pub view_to_clip: Mat4,
    /// Sub-pixel jitter in pixels.
    pub jitter: Vec2,
    /// Vertical field of view in radians.
    pub vertical_fov: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl CameraState {
    /// Perspective camera looking from `eye` towards `target`.
    #[must_use]
    pub fn perspective(eye: Vec3, target: Vec3, vertical_fov: f32, pixel_width: u32, pixel_height: u32) -> Self {
        let aspect = pixel_width as f32 / pixel_height.max(1) as f32;
        Self {
            kind: CameraKind::Game,
            world_to_view: Mat4::look_at_rh(eye, target, Vec3::Y),
            view_to_clip: Mat4::perspective_rh(vertical_fov, aspect, 0.1, 1000.0),
            jitter: Vec2::ZERO,
            vertical_fov,
            pixel_width,
            pixel_height,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: CameraKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    #[must_use]
    pub fn view_to_world(&self) -> Mat4 {
        self.world_to_view.inverse()
    }

    #[inline]
    #[must_use]
    pub fn world_to_clip(&self) -> Mat4 {
        self.view_to_clip * self.world_to_view
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.view_to_world().w_axis.truncate()
    }

    #[inline]
    #[must_use]
    pub const fn pixel_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }
}

/// One render request from the host.
#[derive(Debug, Clone)]
pub struct RenderView<'a> {
    pub id: ViewId,
    pub label: &'a str,
    pub camera: CameraState,
    /// Direction towards the sun, world space.
    pub sun_direction: Vec3,
    /// Texture the display stage writes to.
    pub output: GpuTexture,
    /// Host frame counter, used to decorrelate sampling.
    pub frame_count: u32,
}
