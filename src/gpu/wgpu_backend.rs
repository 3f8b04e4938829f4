//! wgpu Backend
//!
//! Real-GPU implementations of [`TextureAllocator`] and [`CommandStream`].
//!
//! - [`WgpuTextureAllocator`] creates one `wgpu::Texture` per request and
//!   keys it by its [`Tracked`] id. The id doubles as the native handle; a
//!   host bridging to a native plugin resolves it to the backend resource.
//!   Channel kernels write through storage bindings, which several channel
//!   formats (`Rgb10a2Unorm`, `R16Float`, `Rg11b10Ufloat`) only allow with
//!   `Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES`. Construction checks
//!   every channel up front so a missing feature is an error, not a
//!   validation panic mid-frame.
//! - [`WgpuCommandStream`] records into a `wgpu::CommandEncoder`. Plain
//!   copies become `copy_texture_to_texture`; decoding blits belong to the
//!   host's display shaders and are reported, not recorded. Native events
//!   cannot be expressed in a wgpu command buffer, so they are queued and
//!   must be dispatched by the host right after the encoder is submitted.

use rustc_hash::FxHashMap;

use crate::denoiser::ExecutionEntryPoint;
use crate::errors::{PipelineError, Result};
use crate::gpu::command::{BlitDecode, CommandStream};
use crate::gpu::format::PixelFormat;
use crate::gpu::texture::{GpuTexture, TextureAllocator, TextureDesc};
use crate::gpu::tracked::Tracked;
use crate::pipeline::channel::CHANNEL_TABLE;
use crate::pipeline::snapshot_ring::EventPayload;

// ─── Texture Allocation ───────────────────────────────────────────────────────

/// Checks that every pool channel's format allows [`TextureDesc::CHANNEL_USAGE`].
///
/// `supported` reports the usages a format may be created with.
pub fn check_channel_formats(supported: impl Fn(PixelFormat) -> wgpu::TextureUsages) -> Result<()> {
    for info in &CHANNEL_TABLE {
        let missing = TextureDesc::CHANNEL_USAGE.difference(supported(info.format));
        if !missing.is_empty() {
            return Err(PipelineError::UnsupportedFormat {
                channel: info.channel,
                format: info.format,
                missing,
            });
        }
    }
    Ok(())
}

/// Owns the `wgpu::Texture`s behind every [`GpuTexture`] it hands out.
pub struct WgpuTextureAllocator {
    device: wgpu::Device,
    textures: FxHashMap<u64, Tracked<wgpu::Texture>>,
    /// Usages each format may be created with on `device`.
    allowed_usages: FxHashMap<PixelFormat, wgpu::TextureUsages>,
}

impl WgpuTextureAllocator {
    /// Fails with [`PipelineError::UnsupportedFormat`] if `device` cannot
    /// create some channel with storage access.
    pub fn new(device: wgpu::Device, adapter: &wgpu::Adapter) -> Result<Self> {
        let features = device.features();
        let adapter_specific = features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
        let allowed_usages: FxHashMap<_, _> = PixelFormat::ALL
            .into_iter()
            .map(|format| {
                let format_features = if adapter_specific {
                    adapter.get_texture_format_features(format.to_wgpu())
                } else {
                    format.to_wgpu().guaranteed_format_features(features)
                };
                (format, format_features.allowed_usages)
            })
            .collect();

        check_channel_formats(|format| {
            allowed_usages
                .get(&format)
                .copied()
                .unwrap_or(wgpu::TextureUsages::empty())
        })?;

        Ok(Self {
            device,
            textures: FxHashMap::default(),
            allowed_usages,
        })
    }

    /// Registers an externally created texture, e.g. a view's output target.
    pub fn import(&mut self, texture: wgpu::Texture) -> Result<GpuTexture> {
        let format = PixelFormat::from_wgpu(texture.format()).ok_or_else(|| {
            PipelineError::AllocationFailed(format!("unsupported format {:?}", texture.format()))
        })?;
        Ok(self.register(texture, format))
    }

    fn register(&mut self, texture: wgpu::Texture, format: PixelFormat) -> GpuTexture {
        let tracked = Tracked::new(texture);
        let handle = GpuTexture {
            id: tracked.id(),
            native: tracked.native(),
            width: tracked.width(),
            height: tracked.height(),
            format,
        };
        self.textures.insert(handle.id, tracked);
        handle
    }

    #[must_use]
    pub fn get(&self, texture: &GpuTexture) -> Option<&wgpu::Texture> {
        self.textures.get(&texture.id).map(|t| &**t)
    }

    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.textures.len()
    }
}

impl TextureAllocator for WgpuTextureAllocator {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<GpuTexture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PipelineError::AllocationFailed(format!(
                "{}: zero-sized texture {}x{}",
                desc.label, desc.width, desc.height
            )));
        }
        let allowed = self
            .allowed_usages
            .get(&desc.format)
            .copied()
            .unwrap_or(wgpu::TextureUsages::empty());
        if !allowed.contains(desc.usage) {
            return Err(PipelineError::AllocationFailed(format!(
                "{}: {:?} does not allow {:?}",
                desc.label,
                desc.format,
                desc.usage.difference(allowed)
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.to_wgpu(),
            usage: desc.usage,
            view_formats: &[],
        });

        log::debug!("Created {} ({}x{}, {:?})", desc.label, desc.width, desc.height, desc.format);
        Ok(self.register(texture, desc.format))
    }

    fn destroy_texture(&mut self, texture: &GpuTexture) {
        if let Some(tracked) = self.textures.remove(&texture.id) {
            tracked.destroy();
        }
    }
}

// ─── Command Recording ────────────────────────────────────────────────────────

/// A native event waiting for its command buffer to be submitted.
#[derive(Debug, Clone, Copy)]
pub struct PendingNativeEvent {
    pub entry: ExecutionEntryPoint,
    pub event_id: i32,
    pub payload: EventPayload,
}

impl PendingNativeEvent {
    /// Invokes the native callback.
    ///
    /// # Safety
    ///
    /// The snapshot ring that produced `payload` must still be alive.
    pub unsafe fn dispatch(self) {
        // SAFETY: forwarded to the caller.
        unsafe { self.entry.invoke(self.event_id, self.payload) }
    }
}

/// Records pipeline commands into a wgpu encoder.
pub struct WgpuCommandStream<'a> {
    encoder: &'a mut wgpu::CommandEncoder,
    textures: &'a WgpuTextureAllocator,
    pending: Vec<PendingNativeEvent>,
    skipped_blits: u32,
}

impl<'a> WgpuCommandStream<'a> {
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, textures: &'a WgpuTextureAllocator) -> Self {
        Self {
            encoder,
            textures,
            pending: Vec::new(),
            skipped_blits: 0,
        }
    }

    /// Native events to dispatch after submitting the encoder, in order.
    #[must_use]
    pub fn into_pending_events(self) -> Vec<PendingNativeEvent> {
        if self.skipped_blits > 0 {
            log::debug!("{} decoding blits left to the host", self.skipped_blits);
        }
        self.pending
    }
}

impl CommandStream for WgpuCommandStream<'_> {
    fn push_debug_group(&mut self, label: &str) {
        self.encoder.push_debug_group(label);
    }

    fn pop_debug_group(&mut self) {
        self.encoder.pop_debug_group();
    }

    fn issue_native_event(&mut self, entry: ExecutionEntryPoint, event_id: i32, payload: EventPayload) {
        self.pending.push(PendingNativeEvent {
            entry,
            event_id,
            payload,
        });
    }

    fn blit(&mut self, source: &GpuTexture, target: &GpuTexture, decode: BlitDecode) {
        if decode != BlitDecode::Copy || source.format != target.format {
            self.skipped_blits += 1;
            return;
        }
        let (Some(src), Some(dst)) = (self.textures.get(source), self.textures.get(target)) else {
            log::warn!("Blit between unknown textures {} -> {}", source.id, target.id);
            return;
        };

        self.encoder.copy_texture_to_texture(
            src.as_image_copy(),
            dst.as_image_copy(),
            wgpu::Extent3d {
                width: source.width.min(target.width),
                height: source.height.min(target.height),
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::ResourceChannel;

    fn guaranteed(features: wgpu::Features) -> impl Fn(PixelFormat) -> wgpu::TextureUsages {
        move |format| format.to_wgpu().guaranteed_format_features(features).allowed_usages
    }

    #[test]
    fn default_device_lacks_storage_for_packed_formats() {
        let err = check_channel_formats(guaranteed(wgpu::Features::empty())).unwrap_err();
        match err {
            PipelineError::UnsupportedFormat {
                channel,
                format,
                missing,
            } => {
                assert_eq!(channel, ResourceChannel::NormalRoughness);
                assert_eq!(format, PixelFormat::Rgb10a2Unorm);
                assert_eq!(missing, wgpu::TextureUsages::STORAGE_BINDING);
            }
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn storage_capable_formats_pass() {
        for format in [PixelFormat::Rgba16Float, PixelFormat::R32Float, PixelFormat::Rgba8Unorm] {
            let usages = guaranteed(wgpu::Features::empty())(format);
            assert!(usages.contains(TextureDesc::CHANNEL_USAGE), "{format:?}");
        }
        assert!(check_channel_formats(|_| wgpu::TextureUsages::all()).is_ok());
    }

    #[test]
    fn first_unsupported_channel_is_reported() {
        let err = check_channel_formats(|format| {
            if format == PixelFormat::R16Float {
                wgpu::TextureUsages::TEXTURE_BINDING
            } else {
                wgpu::TextureUsages::all()
            }
        })
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedFormat {
                channel: ResourceChannel::Penumbra,
                ..
            }
        ));
    }
}
