//! Single-slot hand-off of finished animation frames between threads
//!
//! The logic thread builds a complete [`SkinnedFrame`] and publishes it; the
//! render thread takes ownership of the newest one. A frame is only ever
//! visible whole. Publishing over an unconsumed frame replaces it, so a slow
//! reader skips frames instead of queueing them.

use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::foundation::math::{Mat4, Vec3};

/// Vertex buffers of one skinned mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshFrame {
    /// Skinned positions
    pub positions: Vec<Vec3>,
    /// Skinned normals
    pub normals: Vec<Vec3>,
}

/// Everything a renderer needs from one controller update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedFrame {
    /// Update counter of the controller that produced the frame
    pub sequence: u64,
    /// Controller clock at the time of the update
    pub time: f32,
    /// Per-joint skinning matrices
    pub skin_transforms: Vec<Mat4>,
    /// Buffers of each attached mesh, in attachment order
    pub meshes: Vec<MeshFrame>,
}

#[derive(Debug, Default)]
struct Slot {
    frame: Option<SkinnedFrame>,
    skipped: u64,
    closed: bool,
}

/// Writing half of a frame channel
#[derive(Debug)]
pub struct FramePublisher {
    slot: Arc<Mutex<Slot>>,
}

/// Reading half of a frame channel
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    slot: Arc<Mutex<Slot>>,
}

/// Create a connected publisher/receiver pair
pub fn frame_channel() -> (FramePublisher, FrameReceiver) {
    let slot = Arc::new(Mutex::new(Slot::default()));
    (
        FramePublisher {
            slot: Arc::clone(&slot),
        },
        FrameReceiver { slot },
    )
}

impl FramePublisher {
    /// Publish a finished frame, returning the unconsumed frame it replaced
    pub fn publish(&self, frame: SkinnedFrame) -> Option<SkinnedFrame> {
        let mut slot = self.slot.lock();
        let replaced = slot.frame.replace(frame);
        if let Some(old) = &replaced {
            slot.skipped += 1;
            trace!("Frame {} replaced before it was consumed", old.sequence);
        }
        replaced
    }
}

impl Drop for FramePublisher {
    fn drop(&mut self) {
        self.slot.lock().closed = true;
    }
}

impl FrameReceiver {
    /// Take the newest published frame, if one arrived since the last take
    pub fn take_latest(&self) -> Option<SkinnedFrame> {
        self.slot.lock().frame.take()
    }

    /// Whether the publisher is still alive
    pub fn is_connected(&self) -> bool {
        !self.slot.lock().closed
    }

    /// Number of frames overwritten before any reader took them
    pub fn skipped_frames(&self) -> u64 {
        self.slot.lock().skipped
    }
}
