//! GPU-facing primitives: texture handles, formats, command streams and the
//! wgpu implementations of them.

pub mod command;
pub mod format;
pub mod texture;
pub mod tracked;
pub mod wgpu_backend;

pub use command::{BlitDecode, CommandStream, RecordedCommand, RecordingCommandStream};
pub use format::PixelFormat;
pub use texture::{GpuTexture, NativeHandle, TextureAllocator, TextureDesc};
pub use tracked::Tracked;
pub use wgpu_backend::{
    PendingNativeEvent, WgpuCommandStream, WgpuTextureAllocator, check_channel_formats,
};
