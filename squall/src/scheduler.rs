// The tile scheduler
//
// This consumes one frame's IRBuffer and produces the per-tile work
// records a backend dispatches. Scheduling runs four ordered phases:
// bin (instructions to tiles), sort (cache-coherent GPU order), merge
// (solid occlusion), classify (frame statistics). The results are
// exposed as an immutable FrameSnapshot borrowing the scheduler's
// arenas, valid until the next schedule or reset.
//
// Austin Shafer - 2025
use crate::damage::DirtyRegion;
use crate::ir::{ClipKey, IRBuffer, IRInstruction, PaintKey};
use crate::tile::{GPUSegment, GPUTileWork, Segment, TileClass, TileCoord, TileWork, TILE_SIZE};
use crate::{Result, SquallError};

use niebla as nb;
use serde::Serialize;
use utils::region::Bounds;
use utils::{log, Context};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hard ceiling on tile work records in one frame
pub const MAX_TILES_PER_FRAME: usize = 16384;
/// Segment slots, sized for roughly sixteen segments per tile
pub const MAX_SEGMENTS: usize = MAX_TILES_PER_FRAME * 16;
/// Distinct paints per frame
pub const MAX_PAINTS: usize = 1024;
/// Distinct clips per frame
pub const MAX_CLIPS: usize = 256;
/// Dirty region hints tracked per frame
pub const MAX_DIRTY_REGIONS: usize = 256;

/// A linear-probed dedup table
///
/// Keys are value identities (paints, clips). Interning an existing
/// key returns its old index, so the table never holds two entries
/// that compare equal.
struct DedupTable<K> {
    /// Probe slots, twice the key capacity so a free slot always exists
    d_slots: Vec<Option<u16>>,
    d_keys: nb::Arena<K>,
}

impl<K: Hash + PartialEq + Copy> DedupTable<K> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            d_slots: vec![None; capacity * 2],
            d_keys: nb::Arena::with_capacity(capacity),
        }
    }

    fn intern(&mut self, key: K) -> std::result::Result<u16, nb::ArenaError> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let mut slot = hasher.finish() as usize % self.d_slots.len();

        loop {
            match self.d_slots[slot] {
                Some(index) if self.d_keys[index as usize] == key => return Ok(index),
                Some(_) => slot = (slot + 1) % self.d_slots.len(),
                None => {
                    let index = self.d_keys.push(key)? as u16;
                    self.d_slots[slot] = Some(index);
                    return Ok(index);
                }
            }
        }
    }

    fn keys(&self) -> &[K] {
        self.d_keys.as_slice()
    }

    fn len(&self) -> usize {
        self.d_keys.len()
    }

    fn clear(&mut self) {
        for slot in self.d_slots.iter_mut() {
            *slot = None;
        }
        self.d_keys.clear();
    }
}

/// Per-frame scheduling statistics
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize)]
pub struct FrameStats {
    pub tile_count: u32,
    pub solid_tiles: u32,
    pub edge_tiles: u32,
    pub segment_count: u32,
    pub paint_count: u32,
    pub clip_count: u32,
}

/// An immutable view of one scheduled frame
///
/// Every slice borrows a scheduler or IR arena. The snapshot is
/// valid until the next `schedule`/`reset` call, a backend must
/// finish its submission (or copy out) before then.
#[derive(Debug)]
pub struct FrameSnapshot<'a> {
    pub frame_number: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub instructions: &'a [IRInstruction],
    pub tile_work: &'a [TileWork],
    pub segments: &'a [Segment],
    pub paint_table: &'a [PaintKey],
    pub clip_table: &'a [ClipKey],
    pub dirty_regions: &'a [DirtyRegion],
    pub stats: FrameStats,
}

/// On-disk form of a frame snapshot for offline debugging
#[derive(Serialize)]
struct SnapshotDump {
    frame_number: u64,
    viewport_width: u32,
    viewport_height: u32,
    tiles_x: u32,
    tiles_y: u32,
    stats: FrameStats,
    tile_work: Vec<GPUTileWork>,
    segments: Vec<GPUSegment>,
}

pub struct TileScheduler {
    t_tile_work: nb::Arena<TileWork>,
    t_segments: nb::Arena<Segment>,
    t_paints: DedupTable<PaintKey>,
    t_clips: DedupTable<ClipKey>,
    t_dirty: nb::Arena<DirtyRegion>,
    t_stats: FrameStats,
    t_viewport: (u32, u32),
}

impl TileScheduler {
    pub fn new() -> Self {
        Self {
            t_tile_work: nb::Arena::with_capacity(MAX_TILES_PER_FRAME),
            t_segments: nb::Arena::with_capacity(MAX_SEGMENTS),
            t_paints: DedupTable::with_capacity(MAX_PAINTS),
            t_clips: DedupTable::with_capacity(MAX_CLIPS),
            t_dirty: nb::Arena::with_capacity(MAX_DIRTY_REGIONS),
            t_stats: FrameStats::default(),
            t_viewport: (0, 0),
        }
    }

    /// Schedule one frame of IR into tile work
    ///
    /// Runs bin, sort, merge and classify in order. On error the
    /// frame is unusable and should be dropped, the caller can reset
    /// and schedule a smaller scene.
    pub fn schedule(&mut self, ir: &IRBuffer, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(SquallError::INVALID_SURFACE_SIZE);
        }

        self.t_viewport = (width, height);
        self.t_tile_work.clear();
        self.t_segments.clear();
        self.t_paints.clear();
        self.t_clips.clear();
        self.t_stats = FrameStats::default();

        self.bin(ir)?;
        self.sort();
        self.merge();
        self.classify();

        Ok(())
    }

    /// Throw away all scheduled state, including dirty hints
    pub fn reset(&mut self) {
        self.t_tile_work.clear();
        self.t_segments.clear();
        self.t_paints.clear();
        self.t_clips.clear();
        self.t_dirty.clear();
        self.t_stats = FrameStats::default();
    }

    /// Record a damage hint for incremental backends
    ///
    /// The hint list is bounded, additional regions past the limit
    /// are dropped. Dropping a hint can only cost a backend extra
    /// redrawing, never correctness.
    pub fn mark_dirty(&mut self, bounds: Bounds, source_node: u64, frame: u64) {
        if self
            .t_dirty
            .push(DirtyRegion::new(bounds, source_node, frame))
            .is_err()
        {
            log::verbose!("Dropping dirty region hint, tracking list is full");
        }
    }

    /// Forget the dirty hints, called once a backend has seen them
    pub fn clear_dirty(&mut self) {
        self.t_dirty.clear();
    }

    pub fn stats(&self) -> FrameStats {
        self.t_stats
    }

    /// Phase 1: assign draw instructions to the tiles they touch
    ///
    /// State, clip and cache instructions do not produce tile work.
    /// Clip keys are still interned here so the snapshot's clip table
    /// describes the frame, but clip bounds are not yet propagated
    /// into the per-tile records.
    fn bin(&mut self, ir: &IRBuffer) -> Result<()> {
        let mut z_order: u16 = 0;

        for inst in ir.instructions().iter() {
            let (bounds, paint_key) = match inst {
                IRInstruction::DrawRect {
                    bounds, paint_key, ..
                } => (*bounds, *paint_key),
                IRInstruction::DrawText {
                    bounds, paint_key, ..
                } => (*bounds, *paint_key),
                IRInstruction::BeginClip { clip_key, .. } => {
                    self.t_clips
                        .intern(*clip_key)
                        .or(Err(SquallError::CLIP_TABLE_OVERFLOW))?;
                    continue;
                }
                _ => continue,
            };

            // Degenerate or fully negative-side draws touch no tile
            if bounds.width <= 0
                || bounds.height <= 0
                || bounds.x + bounds.width <= 0
                || bounds.y + bounds.height <= 0
            {
                continue;
            }

            let paint_index = self
                .t_paints
                .intern(paint_key)
                .or(Err(SquallError::PAINT_TABLE_OVERFLOW))?;

            let start = TileCoord::from_pixel(bounds.x, bounds.y);
            let end = TileCoord::from_pixel(
                bounds.x + bounds.width - 1,
                bounds.y + bounds.height - 1,
            );

            for ty in start.y..=end.y {
                for tx in start.x..=end.x {
                    let tile_x = tx as i32 * TILE_SIZE;
                    let tile_y = ty as i32 * TILE_SIZE;
                    // Solid means the draw covers every pixel of the tile
                    let solid = bounds.x <= tile_x
                        && bounds.y <= tile_y
                        && bounds.x + bounds.width >= tile_x + TILE_SIZE
                        && bounds.y + bounds.height >= tile_y + TILE_SIZE;

                    self.t_tile_work
                        .push(TileWork {
                            coord: TileCoord::new(tx, ty),
                            classification: match solid {
                                true => TileClass::Solid,
                                false => TileClass::Edge,
                            },
                            solid_color: paint_key.color,
                            segment_start: 0,
                            segment_count: 0,
                            clip_index: 0,
                            paint_index: paint_index,
                            z_order: z_order,
                        })
                        .or(Err(SquallError::TILE_BUFFER_OVERFLOW))?;
                }
            }

            z_order = z_order.wrapping_add(1);
        }

        Ok(())
    }

    /// Phase 2: order tile work for cache-coherent GPU access
    ///
    /// The sort is stable so equal keys keep their binning order.
    fn sort(&mut self) {
        self.t_tile_work
            .as_mut_slice()
            .sort_by_key(|work| (work.coord.pack(), work.z_order));
    }

    /// Phase 3: drop tile work hidden behind opaque solids
    ///
    /// A later solid record with full alpha at the same coordinate
    /// completely covers an earlier solid one, so the earlier record
    /// is overwritten in place. Every other pairing keeps both.
    fn merge(&mut self) {
        let work = self.t_tile_work.as_mut_slice();
        let mut write = 0;

        for read in 0..work.len() {
            let cur = work[read];

            if write > 0 {
                let prev = work[write - 1];
                if prev.coord == cur.coord
                    && prev.classification == TileClass::Solid
                    && cur.classification == TileClass::Solid
                    && cur.solid_color.is_opaque()
                {
                    work[write - 1] = cur;
                    continue;
                }
            }

            work[write] = cur;
            write += 1;
        }

        self.t_tile_work.truncate(write);
    }

    /// Phase 4: snapshot the per-classification totals
    fn classify(&mut self) {
        let mut stats = FrameStats::default();

        for work in self.t_tile_work.iter() {
            match work.classification {
                TileClass::Solid => stats.solid_tiles += 1,
                TileClass::Edge => stats.edge_tiles += 1,
            }
        }
        stats.tile_count = self.t_tile_work.len() as u32;
        stats.segment_count = self.t_segments.len() as u32;
        stats.paint_count = self.t_paints.len() as u32;
        stats.clip_count = self.t_clips.len() as u32;

        self.t_stats = stats;
    }

    /// Build the immutable view a backend submits from
    pub fn build_snapshot<'a>(&'a self, ir: &'a IRBuffer) -> FrameSnapshot<'a> {
        FrameSnapshot {
            frame_number: ir.frame_number(),
            viewport_width: self.t_viewport.0,
            viewport_height: self.t_viewport.1,
            tiles_x: (self.t_viewport.0 + TILE_SIZE as u32 - 1) / TILE_SIZE as u32,
            tiles_y: (self.t_viewport.1 + TILE_SIZE as u32 - 1) / TILE_SIZE as u32,
            instructions: ir.instructions(),
            tile_work: self.t_tile_work.as_slice(),
            segments: self.t_segments.as_slice(),
            paint_table: self.t_paints.keys(),
            clip_table: self.t_clips.keys(),
            dirty_regions: self.t_dirty.as_slice(),
            stats: self.t_stats,
        }
    }

    /// Serialize the GPU-visible state of the current frame
    ///
    /// This writes the packed records a backend would upload, which
    /// makes it possible to inspect a misbehaving frame offline.
    pub fn dump_snapshot(&self, ir: &IRBuffer, path: &str) -> utils::Result<()> {
        let snapshot = self.build_snapshot(ir);
        let dump = SnapshotDump {
            frame_number: snapshot.frame_number,
            viewport_width: snapshot.viewport_width,
            viewport_height: snapshot.viewport_height,
            tiles_x: snapshot.tiles_x,
            tiles_y: snapshot.tiles_y,
            stats: snapshot.stats,
            tile_work: snapshot.tile_work.iter().map(GPUTileWork::from).collect(),
            segments: snapshot.segments.iter().map(GPUSegment::from).collect(),
        };

        let file = std::fs::File::create(path)
            .context("Could not create snapshot dump file")?;
        bincode::serialize_into(file, &dump).context("Could not serialize frame snapshot")?;

        Ok(())
    }
}
