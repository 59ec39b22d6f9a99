//! The retained scene
//!
//! This owns the node arena the parser fills in, the root of the
//! tree, and the per-node state that patch ops drive. Scenes are
//! self-contained: everything the lowerer needs to produce a frame
//! is reachable from here.
//!
// Austin Shafer - 2025
use crate::dom::{self, App, Desktop, Node, NodeId, NodeIndex, Root};
use crate::lexer::{Lexer, Token};
use crate::parser::Parser;
use crate::ParseError;

use niebla as nb;
use utils::log;
use utils::region::{Bounds, Vector};

use std::collections::HashMap;

/// Ceiling on scene nodes in one parse. This also bounds the root
/// filter's presence bitset, node ids always fit inside it.
pub const MAX_NODES: usize = 4096;
/// Ceiling on tokens in one document
pub const MAX_TOKENS: usize = 16384;

/// Root filtering
///
/// Given the arena range `[range_start, nodes.len())` that one node
/// list parsed into, return only the indices whose node is not
/// referenced as a child of another node in the same range. This is
/// what enforces tree purity over the flat arena: a node can appear
/// in at most one parent's children list, so anything claimed as a
/// child cannot also be a list root.
pub fn root_filter(
    nodes: &nb::Arena<Node>,
    range_start: usize,
) -> Result<Vec<NodeIndex>, ParseError> {
    let mut present = nb::Bitset::with_capacity(MAX_NODES);

    for index in range_start..nodes.len() {
        for child in nodes[index].children() {
            // Ids are assigned from 1, the bitset is indexed from 0
            present.set((nodes[*child].node_id() - 1) as usize)?;
        }
    }

    let mut roots = Vec::new();
    for index in range_start..nodes.len() {
        if !present.get((nodes[index].node_id() - 1) as usize) {
            roots.push(index);
        }
    }

    Ok(roots)
}

#[derive(Debug)]
pub struct Scene {
    /// The flat node arena. Parents reference children by index.
    s_nodes: nb::Arena<Node>,
    s_root: Option<Root>,
    /// The next node id a mutation would mint, carried over from the
    /// parser so ids stay unique for the life of the scene
    s_id_cursor: NodeId,
    /// node_id to arena index
    s_index: HashMap<NodeId, NodeIndex>,
    /// djb2 hash of a declared id string to the node that declared it
    s_stable: HashMap<NodeId, NodeId>,

    // Patch-driven per-node state
    // --------------------------------------
    s_visibility: HashMap<NodeId, bool>,
    s_enabled: HashMap<NodeId, bool>,
    s_values: HashMap<NodeId, String>,
    s_properties: HashMap<NodeId, HashMap<String, String>>,
    s_focus: Option<NodeId>,
    /// Patch violations seen so far, drives hard-fail escalation
    s_violations: u32,

    /// Damage accumulated since the last frame
    s_dirty: Vec<(Bounds, NodeId)>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            s_nodes: nb::Arena::with_capacity(MAX_NODES),
            s_root: None,
            s_id_cursor: 1,
            s_index: HashMap::new(),
            s_stable: HashMap::new(),
            s_visibility: HashMap::new(),
            s_enabled: HashMap::new(),
            s_values: HashMap::new(),
            s_properties: HashMap::new(),
            s_focus: None,
            s_violations: 0,
            s_dirty: Vec::new(),
        }
    }

    /// Parse a swen document, replacing the current scene
    ///
    /// Parsing happens into fresh arenas so a failed load leaves the
    /// retained scene untouched.
    pub fn load_str(&mut self, src: &str) -> Result<(), ParseError> {
        let mut tokens: nb::Arena<Token> = nb::Arena::with_capacity(MAX_TOKENS);
        Lexer::lex_into(src, &mut tokens)?;

        let mut nodes: nb::Arena<Node> = nb::Arena::with_capacity(MAX_NODES);
        let mut parser = Parser::new(tokens.as_slice());
        let root = parser.parse_root(&mut nodes)?;

        log::debug!("Loaded scene with {} nodes", nodes.len());

        self.s_nodes = nodes;
        self.s_root = Some(root);
        self.s_id_cursor = parser.id_cursor();
        self.s_visibility.clear();
        self.s_enabled.clear();
        self.s_values.clear();
        self.s_properties.clear();
        self.s_focus = None;
        self.s_dirty.clear();
        self.rebuild_index();

        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.s_index.clear();
        self.s_stable.clear();

        for (index, node) in self.s_nodes.iter().enumerate() {
            self.s_index.insert(node.node_id(), index);
            if let Some(declared) = node.declared_id() {
                self.s_stable.insert(dom::stable_id(declared), node.node_id());
            }
        }
    }

    pub fn root(&self) -> Option<&Root> {
        self.s_root.as_ref()
    }

    pub fn desktop(&self) -> Option<&Desktop> {
        self.s_root.as_ref().map(|r| &r.desktop)
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.s_nodes[index]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.s_nodes[index]
    }

    pub fn node_count(&self) -> usize {
        self.s_nodes.len()
    }

    /// Find a node's arena index from its id
    pub fn lookup(&self, node_id: NodeId) -> Option<NodeIndex> {
        self.s_index.get(&node_id).copied()
    }

    /// Find the node that declared this string id
    ///
    /// Resolution goes through the djb2 hash, which is the identity
    /// apps hold across re-parses.
    pub fn lookup_declared(&self, declared: &str) -> Option<NodeId> {
        self.s_stable.get(&dom::stable_id(declared)).copied()
    }

    /// The world origin of a node
    pub fn world_position(&self, index: NodeIndex) -> Vector {
        self.s_nodes[index].world_position()
    }

    /// The world-space extent of a node, used for damage tracking
    pub fn node_bounds(&self, index: NodeIndex) -> Bounds {
        let node = &self.s_nodes[index];
        let world = node.world_position();
        match node {
            Node::Rect(rect) => Bounds::new(world.x, world.y, rect.size.x, rect.size.y),
            // Same estimate the lowerer uses, pending font metrics
            Node::Text(text) => Bounds::new(
                world.x,
                world.y,
                text.body.len() as i32 * text.text_size as i32 / 2,
                text.text_size as i32,
            ),
            Node::Transform(_) => Bounds::new(world.x, world.y, 0, 0),
        }
    }

    /// Find an app subtree by its declared id
    ///
    /// Apps may live in the system layer or in any workspace.
    pub fn find_app(&self, app_id: &str) -> Option<&App> {
        let root = self.s_root.as_ref()?;

        root.system
            .apps
            .iter()
            .chain(root.desktop.workspaces.iter().flat_map(|w| w.apps.iter()))
            .find(|app| app.id == app_id)
    }

    pub(crate) fn find_app_mut(&mut self, app_id: &str) -> Option<&mut App> {
        let root = self.s_root.as_mut()?;

        root.system
            .apps
            .iter_mut()
            .chain(
                root.desktop
                    .workspaces
                    .iter_mut()
                    .flat_map(|w| w.apps.iter_mut()),
            )
            .find(|app| app.id == app_id)
    }

    /// Does this app's subtree contain the node
    pub fn app_owns(&self, app: &App, node_id: NodeId) -> bool {
        let mut stack: Vec<NodeIndex> = app.children.clone();

        while let Some(index) = stack.pop() {
            let node = &self.s_nodes[index];
            if node.node_id() == node_id {
                return true;
            }
            stack.extend_from_slice(node.children());
        }

        false
    }

    /// Is `needle` inside the subtree rooted at `index` (inclusive)
    pub fn subtree_contains(&self, index: NodeIndex, needle: NodeId) -> bool {
        let node = &self.s_nodes[index];
        if node.node_id() == needle {
            return true;
        }

        node.children()
            .iter()
            .any(|child| self.subtree_contains(*child, needle))
    }

    /// Unlink a node from whatever parent references it
    ///
    /// The node stays in the arena, reclamation is per-arena.
    pub(crate) fn unlink(&mut self, app_id: &str, node_id: NodeId) {
        let index = match self.lookup(node_id) {
            Some(index) => index,
            None => return,
        };

        if let Some(app) = self.find_app_mut(app_id) {
            app.children.retain(|c| *c != index);
        }
        for node in self.s_nodes.as_mut_slice().iter_mut() {
            if let Some(children) = node.children_mut() {
                children.retain(|c| *c != index);
            }
        }
    }

    // Patch-driven state
    // --------------------------------------

    pub fn is_visible(&self, node_id: NodeId) -> bool {
        self.s_visibility.get(&node_id).copied().unwrap_or(true)
    }

    pub fn set_visibility(&mut self, node_id: NodeId, visible: bool) {
        self.s_visibility.insert(node_id, visible);
    }

    pub fn is_enabled(&self, node_id: NodeId) -> bool {
        self.s_enabled.get(&node_id).copied().unwrap_or(true)
    }

    pub fn set_enabled(&mut self, node_id: NodeId, enabled: bool) {
        self.s_enabled.insert(node_id, enabled);
    }

    pub fn value(&self, node_id: NodeId) -> Option<&str> {
        self.s_values.get(&node_id).map(|v| v.as_str())
    }

    pub fn set_value(&mut self, node_id: NodeId, value: String) {
        self.s_values.insert(node_id, value);
    }

    pub fn property(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.s_properties
            .get(&node_id)
            .and_then(|props| props.get(name))
            .map(|v| v.as_str())
    }

    pub fn set_property(&mut self, node_id: NodeId, name: String, value: String) {
        self.s_properties
            .entry(node_id)
            .or_default()
            .insert(name, value);
    }

    pub fn focus(&self) -> Option<NodeId> {
        self.s_focus
    }

    pub fn set_focus(&mut self, node_id: Option<NodeId>) {
        self.s_focus = node_id;
    }

    pub(crate) fn violations(&self) -> u32 {
        self.s_violations
    }

    pub(crate) fn record_violation(&mut self) {
        self.s_violations += 1;
    }

    // Damage tracking
    // --------------------------------------

    /// Note that a node's pixels changed
    pub fn mark_dirty(&mut self, bounds: Bounds, node_id: NodeId) {
        self.s_dirty.push((bounds, node_id));
    }

    /// Hand the accumulated damage to the renderer
    pub fn take_dirty(&mut self) -> Vec<(Bounds, NodeId)> {
        std::mem::take(&mut self.s_dirty)
    }
}
