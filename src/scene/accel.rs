//! Scene Acceleration Structure
//!
//! The tracer consumes three scene inputs: the top-level acceleration
//! structure and two structured buffers describing instances and their
//! triangles. Building them is the host's job; the pipeline only binds them
//! and checks that instance order lines up with the TLAS, because the trace
//! kernels index the instance buffer with the TLAS instance index.

use bytemuck::{Pod, Zeroable};
use half::f16;

use crate::errors::{PipelineError, Result};

/// Top-level acceleration structure handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TlasHandle(pub u64);

/// Structured buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferHandle(pub u64);

/// Scene-side data the trace stages bind.
pub trait SceneAccelerationStructure {
    fn tlas(&self) -> TlasHandle;

    /// Buffer of [`InstanceRecord`]s.
    fn instance_buffer(&self) -> BufferHandle;

    /// Buffer of [`PrimitiveRecord`]s.
    fn primitive_buffer(&self) -> BufferHandle;

    fn instance_count(&self) -> u32;

    /// TLAS instance index of the `instance`-th record, if it is in the TLAS.
    fn tlas_instance_index(&self, instance: u32) -> Option<u32>;
}

/// Scene bindings captured for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneBindings {
    pub tlas: TlasHandle,
    pub instances: BufferHandle,
    pub primitives: BufferHandle,
    pub instance_count: u32,
}

impl SceneBindings {
    #[must_use]
    pub fn capture(scene: &dyn SceneAccelerationStructure) -> Self {
        Self {
            tlas: scene.tlas(),
            instances: scene.instance_buffer(),
            primitives: scene.primitive_buffer(),
            instance_count: scene.instance_count(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.instance_count == 0
    }
}

/// Checks that record `i` is TLAS instance `i` for every record.
pub fn validate_instance_alignment(scene: &dyn SceneAccelerationStructure) -> Result<()> {
    for instance in 0..scene.instance_count() {
        let tlas_index = scene.tlas_instance_index(instance);
        if tlas_index != Some(instance) {
            return Err(PipelineError::InstanceMisaligned {
                instance,
                tlas_index,
            });
        }
    }
    Ok(())
}

// ─── GPU Records ──────────────────────────────────────────────────────────────

/// Per-instance record read by the trace kernels.
///
/// `overloaded_matrix` holds the object-to-world rows for static instances
/// and is reused for morph data on skinned ones.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub overloaded_matrix: [[f32; 4]; 3],
    pub base_color_metalness_scale: [f16; 4],
    pub emission_roughness_scale: [f16; 4],
    pub normal_uv_scale: [f16; 2],
    /// Low 16 bits: texture table offset. High 16 bits: [`InstanceFlags`].
    pub texture_offset_and_flags: u32,
    pub primitive_offset: u32,
    pub scale: f32,
    pub morph_primitive_offset: u32,
    pub _unused: [u32; 3],
}

const _: () = assert!(std::mem::size_of::<InstanceRecord>() == 96);

bitflags::bitflags! {
    /// Bits stored in the high half of `texture_offset_and_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstanceFlags: u16 {
        const NON_TRANSPARENT = 1 << 0;
        const TRANSPARENT     = 1 << 1;
        const FORCED_EMISSION = 1 << 2;
        const STATIC          = 1 << 3;
        const HAIR            = 1 << 4;
        const LEAF            = 1 << 5;
        const SKIN            = 1 << 6;
        const MORPH           = 1 << 7;
    }
}

impl InstanceRecord {
    #[must_use]
    pub fn pack_texture_offset(offset: u16, flags: InstanceFlags) -> u32 {
        u32::from(offset) | (u32::from(flags.bits()) << 16)
    }

    #[must_use]
    pub fn texture_offset(&self) -> u16 {
        (self.texture_offset_and_flags & 0xFFFF) as u16
    }

    #[must_use]
    pub fn flags(&self) -> InstanceFlags {
        InstanceFlags::from_bits_truncate((self.texture_offset_and_flags >> 16) as u16)
    }
}

/// Per-triangle attributes read by the trace kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PrimitiveRecord {
    pub uv0: [f16; 2],
    pub uv1: [f16; 2],
    pub uv2: [f16; 2],
    pub world_area: f32,
    pub n0: [f16; 2],
    pub n1: [f16; 2],
    pub n2: [f16; 2],
    pub uv_area: f32,
    pub t0: [f16; 2],
    pub t1: [f16; 2],
    pub t2: [f16; 2],
    pub bitangent_sign: f32,
}

const _: () = assert!(std::mem::size_of::<PrimitiveRecord>() == 48);
