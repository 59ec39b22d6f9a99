// Dirty region tracking
//
// Austin Shafer - 2025
use utils::region::Bounds;

/// A region of the frame whose content changed
///
/// These are hints for incremental backends. The scheduler records
/// them as reported and does not intersect them with tile work, a
/// backend may use the list or fall back to a full-frame redraw.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct DirtyRegion {
    pub bounds: Bounds,
    /// The node whose mutation caused the damage, 0 if unknown
    pub source_node: u64,
    /// The frame on which the damage was reported
    pub frame: u64,
}

impl DirtyRegion {
    pub fn new(bounds: Bounds, source_node: u64, frame: u64) -> Self {
        Self {
            bounds: bounds,
            source_node: source_node,
            frame: frame,
        }
    }
}
