/// Scene lowering and the render front end
///
/// This walks the retained scene tree and lowers it into Squall's
/// instruction stream, then drives the tile scheduler and backend.
/// It is the step that turns declarative nodes into draw order:
/// parents draw before children, siblings draw in list order.
///
/// Austin Shafer - 2025
use crate::dom::{Desktop, Node, NodeIndex};
use crate::scene::Scene;

use squall as sq;
use utils::log;
use utils::region::{Bounds, Vector};
use utils::{anyhow, Context, Result};

/// Lower the desktop into the instruction buffer
///
/// Starts a new frame and emits every visible, root-filtered node.
/// On success the buffer's state stacks are balanced.
pub fn lower_desktop(scene: &Scene, desktop: &Desktop, ir: &mut sq::IRBuffer) -> sq::Result<()> {
    ir.next_frame();

    for index in desktop.nodes.iter() {
        lower_node(scene, *index, Vector::new(0, 0), ir)?;
    }

    Ok(())
}

/// Lower one node and its children
///
/// `offset` is the displacement of the whole subtree being lowered,
/// zero for the desktop layer. The parse-time `local_position`
/// already accumulates every ancestor inside the subtree, so the
/// world origin is `local_position + position + offset` and children
/// recurse with the same offset.
fn lower_node(
    scene: &Scene,
    index: NodeIndex,
    offset: Vector,
    ir: &mut sq::IRBuffer,
) -> sq::Result<()> {
    let node = scene.node(index);
    if !scene.is_visible(node.node_id()) {
        return Ok(());
    }

    match node {
        Node::Rect(rect) => {
            let world = rect.local_position + rect.position + offset;
            if let Some(background) = rect.background {
                ir.draw_rect(
                    rect.node_id,
                    Bounds::new(world.x, world.y, rect.size.x, rect.size.y),
                    sq::PaintKey::solid(background),
                    0,
                )?;
            }

            for child in rect.children.iter() {
                lower_node(scene, *child, offset, ir)?;
            }
        }
        Node::Text(text) => {
            let world = text.local_position + text.position + offset;
            // Estimated bounds until font metrics land
            let width = text.body.len() as i32 * text.text_size as i32 / 2;
            ir.draw_text(
                text.node_id,
                Bounds::new(world.x, world.y, width, text.text_size as i32),
                &text.body,
                sq::PaintKey::solid(text.color),
                text.text_size,
            )?;
        }
        Node::Transform(transform) => {
            let mut pushed = false;
            if let Some(matrix) = transform.matrix {
                ir.push_state()?;
                ir.set_transform(matrix)?;
                pushed = true;
            }

            for child in transform.children.iter() {
                lower_node(scene, *child, offset, ir)?;
            }

            if pushed {
                ir.pop_state()?;
            }
        }
    }

    Ok(())
}

/// The compile-time polymorphic render front end
///
/// Owns a backend of static type `B` along with the IR buffer and
/// tile scheduler it feeds. `render_desktop` is the whole per-frame
/// pipeline: lower, schedule, submit.
pub struct Renderer<B: sq::Backend> {
    r_backend: B,
    r_ir: sq::IRBuffer,
    r_sched: sq::TileScheduler,
    /// Viewport told to the backend on the last frame
    r_resolution: (u32, u32),
}

impl<B: sq::Backend> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            r_backend: backend,
            r_ir: sq::IRBuffer::new(),
            r_sched: sq::TileScheduler::new(),
            r_resolution: (0, 0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.r_backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.r_backend
    }

    pub fn capabilities(&self) -> sq::Capabilities {
        self.r_backend.capabilities()
    }

    /// The viewport of the most recent frame
    pub fn resolution(&self) -> (u32, u32) {
        self.r_resolution
    }

    /// Render one frame of the scene's desktop
    ///
    /// Returns the backend's accounting of the submission. The
    /// desktop's size is the viewport. A frame that overflows the
    /// pipeline's arenas is dropped and reported.
    pub fn render_desktop(&mut self, scene: &mut Scene) -> Result<sq::FrameResult> {
        let (width, height) = {
            let desktop = scene
                .desktop()
                .ok_or(anyhow!("No scene loaded to render"))?;
            (desktop.size.x as u32, desktop.size.y as u32)
        };

        // Track output size changes for the backend
        if self.r_resolution != (width, height) {
            self.r_backend.resize(width, height);
            self.r_resolution = (width, height);
        }

        {
            let desktop = scene.desktop().unwrap();
            lower_desktop(scene, desktop, &mut self.r_ir)
                .context("Could not lower the scene into IR")?;
        }

        self.r_sched
            .schedule(&self.r_ir, width, height)
            .context("Could not schedule the frame")?;

        // Report damage accumulated since the last frame
        let frame = self.r_ir.frame_number();
        for (bounds, node_id) in scene.take_dirty() {
            self.r_sched.mark_dirty(bounds, node_id, frame);
        }

        let result = {
            let snapshot = self.r_sched.build_snapshot(&self.r_ir);
            self.r_backend
                .submit(&snapshot)
                .context("Backend rejected the frame")?
        };
        self.r_backend.present();
        self.r_sched.clear_dirty();

        log::profiling!(
            "frame {}: {} tiles in {} ns",
            frame,
            result.tiles_rendered,
            result.submit_time_ns
        );

        Ok(result)
    }
}
