//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`PipelineError`] covers every failure mode the
//! orchestrator surfaces to its caller:
//! - Invalid configuration (resolution, ring depth, settings)
//! - Precondition violations during stage sequencing
//! - Failures reported by the native denoiser library or the GPU allocator
//! - Settings file I/O and parsing
//!
//! Errors are never retried internally. A frame that fails before its
//! descriptor is recorded leaves the view's state untouched. Once the
//! descriptor has been handed to the denoiser the frame counts toward the
//! view's history even if a later stage fails.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PipelineError>`.

use thiserror::Error;

use crate::gpu::format::PixelFormat;
use crate::pipeline::channel::ResourceChannel;
use crate::scene::camera::ViewId;

/// The main error type for the trace pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Resources were requested with a zero dimension.
    #[error("Invalid resolution {width}x{height}: both dimensions must be non-zero")]
    InvalidResolution {
        /// Requested width in pixels
        width: u32,
        /// Requested height in pixels
        height: u32,
    },

    /// The denoiser descriptor stores sizes as 16-bit values.
    #[error("Resolution {width}x{height} exceeds the denoiser limit of {max}")]
    ResolutionTooLarge {
        /// Requested width in pixels
        width: u32,
        /// Requested height in pixels
        height: u32,
        /// Largest supported dimension
        max: u32,
    },

    /// A snapshot ring needs at least one slot.
    #[error("Frame snapshot ring depth must be at least 1")]
    ZeroRingDepth,

    /// The ring would recycle a slot the GPU may still be reading.
    #[error("Frame snapshot ring depth {depth} must exceed the {in_flight} frames in flight")]
    RingTooShallow {
        /// Configured ring depth
        depth: usize,
        /// Maximum number of frames the GPU may queue
        in_flight: usize,
    },

    /// A settings value is outside of its accepted range.
    #[error("Invalid setting `{name}`: {reason}")]
    InvalidSetting {
        /// Field name
        name: &'static str,
        /// What is wrong with the value
        reason: String,
    },

    /// The device cannot create a channel's format with the usages the
    /// pipeline needs.
    #[error("Channel {channel:?} ({format:?}) lacks usages {missing:?} on this device")]
    UnsupportedFormat {
        /// First channel that failed the check
        channel: ResourceChannel,
        /// Its pixel format
        format: PixelFormat,
        /// Requested usages the format does not allow
        missing: wgpu::TextureUsages,
    },

    // ========================================================================
    // Sequencing Errors
    // ========================================================================
    /// A stage asked for a channel before the pool allocated it.
    #[error("Resource channel {0:?} is not allocated")]
    ResourceNotReady(ResourceChannel),

    /// A pooled texture does not match the size recorded for the pool.
    #[error("Resource channel {channel:?} is {actual:?}, expected {expected:?}")]
    DescriptorSizeMismatch {
        /// Offending channel
        channel: ResourceChannel,
        /// Size the pool was allocated at
        expected: (u32, u32),
        /// Size of the texture found in the slot
        actual: (u32, u32),
    },

    /// A snapshot view no longer refers to the data it was created for.
    #[error("Frame snapshot (slot {slot}, sequence {sequence}) has been overwritten")]
    StaleSnapshot {
        /// Ring slot index
        slot: usize,
        /// Write sequence the view was created with
        sequence: u64,
    },

    /// Scene instance order disagrees with the TLAS instance order.
    #[error("Scene instance {instance} maps to TLAS instance {tlas_index:?}")]
    InstanceMisaligned {
        /// Index into the instance record buffer
        instance: u32,
        /// Index reported by the acceleration structure, if any
        tlas_index: Option<u32>,
    },

    /// A stage kernel reported a failure.
    #[error("Stage `{stage}` failed: {reason}")]
    StageFailed {
        /// Stage name
        stage: &'static str,
        /// Failure description
        reason: String,
    },

    /// The feature was used after `dispose`.
    #[error("Pipeline feature has been disposed")]
    Disposed,

    // ========================================================================
    // Native Library & GPU Errors
    // ========================================================================
    /// The native library handed back an invalid instance id.
    #[error("Denoiser instance creation failed for view {view:?}: {reason}")]
    InstanceCreationFailed {
        /// View that requested the instance
        view: ViewId,
        /// Failure description
        reason: String,
    },

    /// The native library refused to wrap a texture.
    #[error("Denoiser could not wrap texture for channel {0:?}")]
    TextureWrapFailed(ResourceChannel),

    /// A required native entry point is missing.
    #[error("Native denoiser entry point `{0}` is missing")]
    MissingEntryPoint(&'static str),

    /// The texture allocator could not create a texture.
    #[error("Texture allocation failed: {0}")]
    AllocationFailed(String),

    // ========================================================================
    // I/O & Parsing Errors
    // ========================================================================
    /// Settings file I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Settings JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;
