// The render instruction stream
//
// Lowering walks the scene tree and appends instructions here in
// draw order, in world coordinates. The buffer owns everything it
// references: text bodies are copied inline or interned, so the
// scene tree can be mutated freely once lowering returns.
//
// Austin Shafer - 2025
use crate::tile::TileCoord;
use crate::{Result, SquallError};

use niebla as nb;
use utils::region::{Bounds, Color, Matrix};

/// Instruction slots available per frame
pub const MAX_IR_INSTRUCTIONS: usize = 65536;
/// Deepest supported clip nesting
pub const MAX_CLIP_DEPTH: usize = 32;
/// Longest text body copied directly into an instruction
pub const MAX_INLINE_TEXT: usize = 64;

/// Value identity of a fill style
///
/// Two draws with equal paint keys share a paint table entry. For
/// now a paint is a solid color, image and gradient fills will grow
/// this struct without changing the dedup contract.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub struct PaintKey {
    pub color: Color,
}

impl PaintKey {
    pub fn solid(color: Color) -> Self {
        Self { color: color }
    }

    /// Dedup equality for the scheduler's paint table
    pub fn eql(&self, other: &Self) -> bool {
        self == other
    }
}

/// Value identity of a clip region
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub struct ClipKey {
    pub bounds: Bounds,
}

impl ClipKey {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds: bounds }
    }

    pub fn eql(&self, other: &Self) -> bool {
        self == other
    }
}

/// A self-contained reference to a text body
///
/// Short bodies are copied into the instruction so that the stream
/// holds no scene-tree borrows. Longer bodies get a slot in the
/// buffer's intern table, which backends resolve at draw time.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum TextRef {
    Inline { data: [u8; MAX_INLINE_TEXT], len: u8 },
    Interned { index: u32 },
}

impl TextRef {
    /// Get the inline body back as a string
    ///
    /// Returns None for interned references, those resolve through
    /// `IRBuffer::interned_text`.
    pub fn as_inline_str(&self) -> Option<&str> {
        match self {
            TextRef::Inline { data, len } => std::str::from_utf8(&data[..*len as usize]).ok(),
            TextRef::Interned { .. } => None,
        }
    }
}

/// One render instruction in world coordinates
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum IRInstruction {
    DrawRect {
        node_id: u64,
        bounds: Bounds,
        paint_key: PaintKey,
        corner_radius: u16,
    },
    DrawText {
        node_id: u64,
        bounds: Bounds,
        text_ref: TextRef,
        paint_key: PaintKey,
        text_size: u16,
    },
    PushState,
    PopState,
    SetTransform {
        matrix: Matrix,
    },
    BeginClip {
        clip_id: u64,
        bounds: Bounds,
        clip_key: ClipKey,
    },
    EndClip,
    BeginCacheGroup {
        group_id: u64,
        bounds: Bounds,
        content_hash: u64,
    },
    EndCacheGroup,
    TileHint {
        start_tile: TileCoord,
        end_tile: TileCoord,
    },
    TileBoundary(TileCoord),
    Nop,
}

/// The per-frame instruction buffer
///
/// `next_frame` must be called before lowering a frame into this.
/// The state stack bookkeeping here is what guarantees that a
/// successfully lowered frame is balanced: every push has its pop
/// and every clip its end by the time the caller checks depths.
pub struct IRBuffer {
    i_instructions: nb::Arena<IRInstruction>,
    i_frame_number: u64,
    /// Current push_state/pop_state nesting
    i_state_depth: u32,
    /// Ids of the currently open clips, innermost last
    i_clip_stack: [u64; MAX_CLIP_DEPTH],
    i_clip_depth: usize,
    /// Text bodies too long to inline. Entries live for the life of
    /// the buffer and are deduplicated by content.
    i_interned: Vec<String>,
}

impl IRBuffer {
    pub fn new() -> Self {
        Self {
            i_instructions: nb::Arena::with_capacity(MAX_IR_INSTRUCTIONS),
            i_frame_number: 0,
            i_state_depth: 0,
            i_clip_stack: [0; MAX_CLIP_DEPTH],
            i_clip_depth: 0,
            i_interned: Vec::new(),
        }
    }

    /// Begin a new frame
    ///
    /// Bumps the frame number and throws away the previous frame's
    /// instructions and stack state. Interned text is kept, it is
    /// not per-frame data.
    pub fn next_frame(&mut self) {
        self.i_frame_number += 1;
        self.i_instructions.clear();
        self.i_state_depth = 0;
        self.i_clip_depth = 0;
    }

    pub fn frame_number(&self) -> u64 {
        self.i_frame_number
    }

    pub fn instructions(&self) -> &[IRInstruction] {
        self.i_instructions.as_slice()
    }

    pub fn state_depth(&self) -> u32 {
        self.i_state_depth
    }

    pub fn clip_depth(&self) -> usize {
        self.i_clip_depth
    }

    fn emit(&mut self, inst: IRInstruction) -> Result<()> {
        self.i_instructions
            .push(inst)
            .map(|_| ())
            .or(Err(SquallError::IR_BUFFER_OVERFLOW))
    }

    pub fn draw_rect(
        &mut self,
        node_id: u64,
        bounds: Bounds,
        paint_key: PaintKey,
        corner_radius: u16,
    ) -> Result<()> {
        self.emit(IRInstruction::DrawRect {
            node_id: node_id,
            bounds: bounds,
            paint_key: paint_key,
            corner_radius: corner_radius,
        })
    }

    pub fn draw_text(
        &mut self,
        node_id: u64,
        bounds: Bounds,
        body: &str,
        paint_key: PaintKey,
        text_size: u16,
    ) -> Result<()> {
        let text_ref = self.make_text_ref(body);
        self.emit(IRInstruction::DrawText {
            node_id: node_id,
            bounds: bounds,
            text_ref: text_ref,
            paint_key: paint_key,
            text_size: text_size,
        })
    }

    pub fn push_state(&mut self) -> Result<()> {
        self.emit(IRInstruction::PushState)?;
        self.i_state_depth += 1;
        Ok(())
    }

    pub fn pop_state(&mut self) -> Result<()> {
        if self.i_state_depth == 0 {
            return Err(SquallError::STATE_STACK_UNDERFLOW);
        }

        self.emit(IRInstruction::PopState)?;
        self.i_state_depth -= 1;
        Ok(())
    }

    pub fn set_transform(&mut self, matrix: Matrix) -> Result<()> {
        self.emit(IRInstruction::SetTransform { matrix: matrix })
    }

    pub fn begin_clip(&mut self, clip_id: u64, bounds: Bounds) -> Result<()> {
        if self.i_clip_depth >= MAX_CLIP_DEPTH {
            return Err(SquallError::CLIP_STACK_OVERFLOW);
        }

        self.emit(IRInstruction::BeginClip {
            clip_id: clip_id,
            bounds: bounds,
            clip_key: ClipKey::new(bounds),
        })?;
        self.i_clip_stack[self.i_clip_depth] = clip_id;
        self.i_clip_depth += 1;
        Ok(())
    }

    pub fn end_clip(&mut self) -> Result<()> {
        if self.i_clip_depth == 0 {
            return Err(SquallError::CLIP_STACK_UNDERFLOW);
        }

        self.emit(IRInstruction::EndClip)?;
        self.i_clip_depth -= 1;
        Ok(())
    }

    pub fn begin_cache_group(
        &mut self,
        group_id: u64,
        bounds: Bounds,
        content_hash: u64,
    ) -> Result<()> {
        self.emit(IRInstruction::BeginCacheGroup {
            group_id: group_id,
            bounds: bounds,
            content_hash: content_hash,
        })
    }

    pub fn end_cache_group(&mut self) -> Result<()> {
        self.emit(IRInstruction::EndCacheGroup)
    }

    pub fn tile_hint(&mut self, start_tile: TileCoord, end_tile: TileCoord) -> Result<()> {
        self.emit(IRInstruction::TileHint {
            start_tile: start_tile,
            end_tile: end_tile,
        })
    }

    pub fn tile_boundary(&mut self, coord: TileCoord) -> Result<()> {
        self.emit(IRInstruction::TileBoundary(coord))
    }

    pub fn nop(&mut self) -> Result<()> {
        self.emit(IRInstruction::Nop)
    }

    /// Resolve an interned text body
    pub fn interned_text(&self, index: u32) -> Option<&str> {
        self.i_interned.get(index as usize).map(|s| s.as_str())
    }

    fn make_text_ref(&mut self, body: &str) -> TextRef {
        if body.len() <= MAX_INLINE_TEXT {
            let mut data = [0; MAX_INLINE_TEXT];
            data[..body.len()].copy_from_slice(body.as_bytes());
            return TextRef::Inline {
                data: data,
                len: body.len() as u8,
            };
        }

        // Long bodies are deduplicated by content so repeated frames
        // do not grow the table
        let index = match self.i_interned.iter().position(|s| s == body) {
            Some(i) => i,
            None => {
                self.i_interned.push(body.to_string());
                self.i_interned.len() - 1
            }
        };

        TextRef::Interned {
            index: index as u32,
        }
    }
}
