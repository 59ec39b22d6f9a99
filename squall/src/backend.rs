// The backend interface
//
// A backend is whatever consumes FrameSnapshots and turns them into
// pixels: a GPU tile rasterizer, a software fallback, or the headless
// validator used in tests. The core never assumes a capability, it
// only reads what the backend self-reports.
//
// Austin Shafer - 2025
use crate::scheduler::FrameSnapshot;
use crate::Result;

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Features a backend self-reports
    pub struct Capabilities: u32 {
        /// Consumes per-tile work records rather than raw instructions
        const TILE_RENDERING = 1;
        /// Can redraw only the dirty regions of a frame
        const INCREMENTAL_UPDATE = 1 << 1;
        /// Rasterizes with compute kernels
        const COMPUTE_SHADERS = 1 << 2;
        /// Keeps tile contents across frames
        const TILE_CACHING = 1 << 3;
        /// Applies clip rectangles in fixed function hardware
        const HARDWARE_CLIP = 1 << 4;
    }
}

/// What happened during one frame submission
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize)]
pub struct FrameResult {
    pub submit_time_ns: u64,
    pub gpu_time_ns: u64,
    pub draw_calls: u32,
    pub tiles_rendered: u32,
    pub tiles_cached: u32,
    pub gpu_memory_bytes: u64,
}

/// A consumer of frame snapshots
///
/// The snapshot handed to `submit` is immutable and only valid for
/// the duration of the call, a backend that wants to defer work must
/// copy what it needs before returning.
pub trait Backend {
    /// Translate one frame snapshot into backend work
    fn submit(&mut self, snapshot: &FrameSnapshot) -> Result<FrameResult>;

    /// Flip the most recently submitted frame to the output
    fn present(&mut self);

    fn capabilities(&self) -> Capabilities;

    /// The output surface changed size
    fn resize(&mut self, width: u32, height: u32);

    /// Drop any cached tile contents
    fn invalidate_cache(&mut self);
}

/// Runtime-polymorphic backend handle
///
/// Pairs the backend state with its method table so hosts can pick
/// a backend at startup without monomorphizing the render path.
/// Dropping the handle tears the backend down.
pub struct BackendHandle {
    b_backend: Box<dyn Backend>,
}

impl BackendHandle {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self { b_backend: backend }
    }

    pub fn submit(&mut self, snapshot: &FrameSnapshot) -> Result<FrameResult> {
        self.b_backend.submit(snapshot)
    }

    pub fn present(&mut self) {
        self.b_backend.present()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.b_backend.capabilities()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.b_backend.resize(width, height)
    }

    pub fn invalidate_cache(&mut self) {
        self.b_backend.invalidate_cache()
    }
}
