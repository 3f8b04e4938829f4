//! Host-provided inputs: cameras, views and the ray tracing scene.

pub mod accel;
pub mod camera;

pub use accel::{
    BufferHandle, InstanceFlags, InstanceRecord, PrimitiveRecord, SceneAccelerationStructure,
    SceneBindings, TlasHandle, validate_instance_alignment,
};
pub use camera::{CameraKind, CameraState, RenderView, ViewId, view_label};
