// The Squall tile renderer core
//
// Squall turns an ordered render instruction stream into per-tile
// GPU work records. The IRBuffer holds the instruction stream for
// one frame, the TileScheduler bins and merges it into TileWork,
// and a Backend consumes the resulting immutable FrameSnapshot.
//
// Austin Shafer - 2025
#[macro_use]
extern crate memoffset;
extern crate utils;

mod backend;
mod damage;
mod headless;
mod ir;
mod scheduler;
mod tile;


pub use backend::{Backend, BackendHandle, Capabilities, FrameResult};
pub use damage::DirtyRegion;
pub use headless::HeadlessBackend;
pub use ir::{ClipKey, IRBuffer, IRInstruction, PaintKey, TextRef};
pub use ir::{MAX_CLIP_DEPTH, MAX_INLINE_TEXT, MAX_IR_INSTRUCTIONS};
pub use scheduler::{FrameSnapshot, FrameStats, TileScheduler};
pub use scheduler::{MAX_CLIPS, MAX_DIRTY_REGIONS, MAX_PAINTS, MAX_SEGMENTS, MAX_TILES_PER_FRAME};
pub use tile::{GPUSegment, GPUTileWork, Segment, TileClass, TileCoord, TileWork, TILE_SIZE};

use thiserror::Error;

/// Squall errors
///
/// These are the typed failures the frame pipeline can report. All of
/// them are fatal for the frame being built: the caller drops the frame,
/// resets the pipeline, and may try again with less work.
#[allow(non_camel_case_types)]
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum SquallError {
    #[error("The IR buffer is out of instruction slots")]
    IR_BUFFER_OVERFLOW,
    #[error("pop_state was called with no matching push_state")]
    STATE_STACK_UNDERFLOW,
    #[error("Clip nesting exceeds the supported depth")]
    CLIP_STACK_OVERFLOW,
    #[error("end_clip was called with no matching begin_clip")]
    CLIP_STACK_UNDERFLOW,
    #[error("The frame requires more tiles than the scheduler can track")]
    TILE_BUFFER_OVERFLOW,
    #[error("The paint table is out of entries")]
    PAINT_TABLE_OVERFLOW,
    #[error("The clip table is out of entries")]
    CLIP_TABLE_OVERFLOW,
    #[error("The segment buffer is out of entries")]
    SEGMENT_BUFFER_OVERFLOW,
    #[error("The requested surface size is invalid")]
    INVALID_SURFACE_SIZE,
}

pub type Result<T> = std::result::Result<T, SquallError>;
