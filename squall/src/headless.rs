// Headless backend
//
// Austin Shafer - 2025
use crate::backend::{Backend, Capabilities, FrameResult};
use crate::scheduler::FrameSnapshot;
use crate::tile::GPUTileWork;
use crate::{Result, SquallError};

use utils::log;
use utils::timing::StopWatch;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// A backend with no output device
///
/// For now this is simply used for testing and as the reference
/// host's default. It walks every submitted snapshot the way a GPU
/// backend would, packing the upload records and accounting for the
/// memory they would occupy, then throws the work away.
pub struct HeadlessBackend {
    h_width: u32,
    h_height: u32,
    /// Packed records from the last submission, what a real backend
    /// would have uploaded to its tile SSBO
    h_upload: Vec<GPUTileWork>,
    h_frames_submitted: u64,
    h_cache_valid: bool,
}

impl HeadlessBackend {
    /// Create a headless backend. Defaults to a 640x480 surface.
    pub fn new() -> Self {
        Self {
            h_width: WIDTH,
            h_height: HEIGHT,
            h_upload: Vec::new(),
            h_frames_submitted: 0,
            h_cache_valid: false,
        }
    }

    pub fn get_resolution(&self) -> (u32, u32) {
        (self.h_width, self.h_height)
    }

    pub fn frames_submitted(&self) -> u64 {
        self.h_frames_submitted
    }

    /// Whether the retained upload still matches the last submission
    pub fn is_cache_valid(&self) -> bool {
        self.h_cache_valid
    }
}

impl Backend for HeadlessBackend {
    fn submit(&mut self, snapshot: &FrameSnapshot) -> Result<FrameResult> {
        let mut stop = StopWatch::new();
        stop.start();

        if snapshot.viewport_width == 0 || snapshot.viewport_height == 0 {
            return Err(SquallError::INVALID_SURFACE_SIZE);
        }

        // Pack the upload exactly like a GPU backend would
        self.h_upload.clear();
        self.h_upload
            .extend(snapshot.tile_work.iter().map(GPUTileWork::from));

        let gpu_memory_bytes = (self.h_upload.len() * std::mem::size_of::<GPUTileWork>()
            + snapshot.segments.len() * std::mem::size_of::<crate::tile::GPUSegment>())
            as u64;

        self.h_frames_submitted += 1;
        self.h_cache_valid = true;
        stop.end();

        log::verbose!(
            "headless: frame {} submitted with {} tiles",
            snapshot.frame_number,
            snapshot.tile_work.len()
        );

        Ok(FrameResult {
            submit_time_ns: stop.get_duration().as_nanos() as u64,
            gpu_time_ns: 0,
            draw_calls: snapshot.tile_work.len() as u32,
            tiles_rendered: snapshot.stats.tile_count,
            tiles_cached: 0,
            gpu_memory_bytes: gpu_memory_bytes,
        })
    }

    fn present(&mut self) {
        // no-op here, nothing to present
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TILE_RENDERING | Capabilities::INCREMENTAL_UPDATE
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.h_width = width;
        self.h_height = height;
        self.h_cache_valid = false;
    }

    fn invalidate_cache(&mut self) {
        self.h_cache_valid = false;
        self.h_upload.clear();
    }
}
