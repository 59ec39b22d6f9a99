/// Nimbus UI compositor core
///
/// Nimbus is the front half of the swen compositor: it parses swen
/// markup into a retained scene tree, owns that tree on behalf of
/// apps, and lowers it into Squall's render IR every frame. Apps
/// mutate their subtrees through patch ops, the host drives the
/// pump_events/render_frame loop.
///
/// Austin Shafer - 2025
extern crate niebla as nb;
extern crate squall as sq;
extern crate utils;

pub use sq::{Backend, Capabilities, FrameResult, HeadlessBackend, SquallError};
pub use utils::region::{Bounds, Color, Matrix, Vector};
pub use utils::{anyhow, Context, Error, Result};

pub mod dom;
pub mod event;
pub mod lexer;
pub mod parser;
pub mod patch;
pub mod render;
pub mod scene;

#[cfg(test)]
mod tests;

pub use dom::{Node, NodeId, NodeIndex};
pub use event::{Event, EventSystem};
pub use lexer::{Lexer, Span, Token, TokenTag};
pub use patch::{BatchResult, PatchConfig, PatchError, PatchOp};
pub use render::{lower_desktop, Renderer};
pub use scene::Scene;

use thiserror::Error as ThisError;

/// Everything that can go wrong turning swen text into a scene
///
/// Lexer and parser failures are fatal for the file. Every variant
/// that points at source carries the span it happened at.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{span}: invalid number literal")]
    InvalidNumber { span: Span },
    #[error("{span}: unterminated string literal")]
    InvalidString { span: Span },
    #[error("{span}: expected {expected}, found '{found}'")]
    ExpectedToken {
        expected: &'static str,
        found: String,
        span: Span,
    },
    #[error("{span}: expected a color of four 8-bit channels")]
    ExpectedColor { span: Span },
    #[error("{span}: missing required property '{property}'")]
    MissingProperty {
        property: &'static str,
        span: Span,
    },
    #[error("{span}: duplicate property '{property}'")]
    DuplicateProperty {
        property: &'static str,
        span: Span,
    },
    #[error("{span}: duplicate node '{node}'")]
    DuplicateNode { node: &'static str, span: Span },
    #[error("missing required node '{node}'")]
    MissingRequiredNode { node: &'static str },
    #[error("{span}: size dimensions must be positive")]
    InvalidSize { span: Span },
    #[error("{span}: position must be declared before nodes")]
    InvalidPosition { span: Span },
    #[error("{span}: a matrix takes exactly six numbers")]
    InvalidMatrix { span: Span },
    #[error("{span}: text size must be greater than zero")]
    InvalidTextSize { span: Span },
    #[error("{span}: id '{id}' is already declared in this subtree")]
    DuplicateId { id: String, span: Span },
    #[error("out of arena capacity: {0}")]
    OutOfMemory(#[from] nb::ArenaError),
}

/// The compositor context
///
/// Owns the retained scene, the render front end and the global
/// event queue. A host's loop alternates `pump_events` and
/// `render_frame`; apps reach the scene through `apply_patch_batch`.
pub struct Nimbus<B: Backend> {
    n_scene: Scene,
    n_renderer: Renderer<B>,
    n_events: EventSystem,
    n_patch_config: PatchConfig,
}

impl<B: Backend> Nimbus<B> {
    pub fn new(backend: B) -> Self {
        Self {
            n_scene: Scene::new(),
            n_renderer: Renderer::new(backend),
            n_events: EventSystem::new(),
            n_patch_config: PatchConfig::default(),
        }
    }

    pub fn set_patch_config(&mut self, config: PatchConfig) {
        self.n_patch_config = config;
    }

    /// Parse a swen document into the retained scene
    pub fn load_str(&mut self, src: &str) -> std::result::Result<(), ParseError> {
        self.n_scene.load_str(src)?;

        if let Some(desktop) = self.n_scene.desktop() {
            self.n_events.add_event_window_resized(desktop.size);
        }
        Ok(())
    }

    pub fn scene(&self) -> &Scene {
        &self.n_scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.n_scene
    }

    pub fn renderer(&self) -> &Renderer<B> {
        &self.n_renderer
    }

    /// Take every event observed since the last pump
    ///
    /// Non-blocking: an empty queue returns an empty list.
    pub fn pump_events(&mut self) -> Vec<Event> {
        self.n_events.drain()
    }

    /// Render one frame of the current scene
    pub fn render_frame(&mut self) -> Result<FrameResult> {
        let result = self.n_renderer.render_desktop(&mut self.n_scene)?;
        self.n_events.add_event_window_redraw_complete();
        Ok(result)
    }

    /// Apply a batch of patch ops on behalf of an app
    ///
    /// A hard failure tears the app down: its session is over and an
    /// AppClosed event is queued for the host.
    pub fn apply_patch_batch(
        &mut self,
        app_id: &str,
        ops: &[PatchOp],
    ) -> std::result::Result<BatchResult, PatchError> {
        let config = self.n_patch_config;
        let result = self.n_scene.apply_patch_batch(app_id, &config, ops);

        match &result {
            Ok(batch) if batch.close_requested => {
                self.n_events.add_event_app_closed(app_id.to_string());
            }
            Err(PatchError::SessionTerminated(_)) => {
                self.n_events.add_event_app_closed(app_id.to_string());
            }
            _ => {}
        }

        result
    }
}
