//! Command Recording
//!
//! Every GPU-visible action the sequencer takes goes through a
//! [`CommandStream`]: debug groups around each stage, display blits, and the
//! native denoise and reconstruction events. Native events carry an
//! [`EventPayload`] pointing into a descriptor ring rather than a copy of the
//! descriptor; the library reads the ring slot when the GPU timeline reaches
//! the event.
//!
//! [`RecordingCommandStream`] keeps every call as a [`RecordedCommand`], which
//! is what tests and headless tools inspect.

use crate::denoiser::ExecutionEntryPoint;
use crate::gpu::texture::GpuTexture;
use crate::pipeline::snapshot_ring::EventPayload;

/// How a blit interprets its source before writing the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitDecode {
    /// Straight copy.
    Copy,
    /// Base color from the packed base color / metalness channel.
    BaseColor,
    /// Metalness from the alpha of the packed base color channel.
    Metalness,
    /// World normal from the packed normal / roughness channel.
    Normal,
    /// Roughness from the alpha of the packed normal channel.
    Roughness,
    /// Single-channel value broadcast to gray.
    Grayscale,
    /// Radiance stored with hit distance in alpha; alpha is dropped.
    Radiance,
    /// Screen-space motion vectors as a color overlay.
    MotionVectors,
    /// Denoiser validation overlay blended over the target.
    Overlay,
}

/// Sink for recorded GPU work.
pub trait CommandStream {
    fn push_debug_group(&mut self, label: &str);
    fn pop_debug_group(&mut self);

    /// Queues a native plugin callback. `payload` must stay valid until the
    /// GPU timeline reaches this point.
    fn issue_native_event(&mut self, entry: ExecutionEntryPoint, event_id: i32, payload: EventPayload);

    fn blit(&mut self, source: &GpuTexture, target: &GpuTexture, decode: BlitDecode);
}

/// A single call captured by [`RecordingCommandStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    PushDebugGroup(String),
    PopDebugGroup,
    NativeEvent {
        entry: ExecutionEntryPoint,
        event_id: i32,
        payload: EventPayload,
    },
    Blit {
        source: GpuTexture,
        target: GpuTexture,
        decode: BlitDecode,
    },
}

/// In-memory command stream.
#[derive(Debug, Default)]
pub struct RecordingCommandStream {
    commands: Vec<RecordedCommand>,
}

impl RecordingCommandStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Native events in submission order.
    pub fn native_events(&self) -> impl Iterator<Item = (i32, EventPayload)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            RecordedCommand::NativeEvent {
                event_id, payload, ..
            } => Some((*event_id, *payload)),
            _ => None,
        })
    }

    /// Debug group labels in submission order, i.e. the stage order.
    pub fn debug_groups(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            RecordedCommand::PushDebugGroup(label) => Some(label.as_str()),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandStream for RecordingCommandStream {
    fn push_debug_group(&mut self, label: &str) {
        self.commands
            .push(RecordedCommand::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.commands.push(RecordedCommand::PopDebugGroup);
    }

    fn issue_native_event(&mut self, entry: ExecutionEntryPoint, event_id: i32, payload: EventPayload) {
        self.commands.push(RecordedCommand::NativeEvent {
            entry,
            event_id,
            payload,
        });
    }

    fn blit(&mut self, source: &GpuTexture, target: &GpuTexture, decode: BlitDecode) {
        self.commands.push(RecordedCommand::Blit {
            source: *source,
            target: *target,
            decode,
        });
    }
}
