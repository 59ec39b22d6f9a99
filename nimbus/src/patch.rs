/// The patch-op surface
///
/// Patch ops are the only way an app mutates its subtree once it is
/// retained by the compositor. A batch is validated against the
/// app's ownership scope before anything is applied: cross-app
/// reaches, unknown nodes and structural cycles are rejected per-op,
/// and repeated violations can escalate to session termination.
///
/// Austin Shafer - 2025
use crate::dom::{Node, NodeId, NodeIndex};
use crate::scene::Scene;

use thiserror::Error;
use utils::log;
use utils::region::{Color, Matrix, Vector};

/// A single high-level mutation of an app's subtree
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    SetText { node: NodeId, body: String },
    SetBackground { node: NodeId, color: Color },
    SetPosition { node: NodeId, position: Vector },
    SetSize { node: NodeId, size: Vector },
    SetTransform { node: NodeId, matrix: Option<Matrix> },
    SetVisibility { node: NodeId, visible: bool },
    SetEnabled { node: NodeId, enabled: bool },
    SetValue { node: NodeId, value: String },
    SetProperty { node: NodeId, name: String, value: String },
    InsertChild { parent: NodeId, child: NodeId },
    RemoveNode { node: NodeId },
    ReplaceChildren { parent: NodeId, children: Vec<NodeId> },
    RequestFocus { node: NodeId },
    ClearFocus,
    RequestClose,
}

impl PatchOp {
    /// The node this op targets, if it addresses one
    fn target(&self) -> Option<NodeId> {
        match self {
            PatchOp::SetText { node, .. }
            | PatchOp::SetBackground { node, .. }
            | PatchOp::SetPosition { node, .. }
            | PatchOp::SetSize { node, .. }
            | PatchOp::SetTransform { node, .. }
            | PatchOp::SetVisibility { node, .. }
            | PatchOp::SetEnabled { node, .. }
            | PatchOp::SetValue { node, .. }
            | PatchOp::SetProperty { node, .. }
            | PatchOp::RemoveNode { node }
            | PatchOp::RequestFocus { node } => Some(*node),
            PatchOp::InsertChild { parent, .. } | PatchOp::ReplaceChildren { parent, .. } => {
                Some(*parent)
            }
            PatchOp::ClearFocus | PatchOp::RequestClose => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("app '{0}' does not exist")]
    UnknownApp(String),
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("app '{app}' does not own node {node}")]
    CrossAppMutation { app: String, node: NodeId },
    #[error("inserting {child} under {parent} would create a cycle")]
    StructuralCycle { parent: NodeId, child: NodeId },
    #[error("the op does not apply to node {0}'s type")]
    InvalidTarget(NodeId),
    #[error("invalid value for node {0}")]
    InvalidValue(NodeId),
    #[error("session terminated after {0} patch violations")]
    SessionTerminated(u32),
}

/// Escalation policy for patch violations
///
/// Soft failure is the default: a bad op is rejected and logged and
/// the rest of the batch continues. Setting `hard_fail_threshold`
/// above zero terminates the app's session once that many violations
/// accumulate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    pub hard_fail_threshold: u32,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            hard_fail_threshold: 0,
        }
    }
}

/// The outcome of one patch batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    pub applied: u32,
    /// Rejected ops by batch index, with the reason
    pub rejected: Vec<(usize, PatchError)>,
    /// The app asked its session to be closed
    pub close_requested: bool,
}

impl Scene {
    /// Apply a batch of patch ops on behalf of an app
    ///
    /// The batch is validated first and then applied in declared
    /// order, so a clean batch is all-or-nothing. Ops that fail
    /// validation are skipped and reported in the result. If the
    /// config's hard-fail threshold is crossed nothing is applied
    /// and the session is terminated.
    pub fn apply_patch_batch(
        &mut self,
        app_id: &str,
        config: &PatchConfig,
        ops: &[PatchOp],
    ) -> Result<BatchResult, PatchError> {
        if self.find_app(app_id).is_none() {
            return Err(PatchError::UnknownApp(app_id.to_string()));
        }

        let mut result = BatchResult::default();
        let mut valid = Vec::with_capacity(ops.len());

        for (i, op) in ops.iter().enumerate() {
            match self.validate_op(app_id, op) {
                Ok(()) => valid.push((i, op)),
                Err(err) => {
                    log::error!("patch op {} from '{}' rejected: {}", i, app_id, err);
                    self.record_violation();
                    result.rejected.push((i, err));
                }
            }
        }

        if config.hard_fail_threshold > 0 && self.violations() >= config.hard_fail_threshold {
            return Err(PatchError::SessionTerminated(self.violations()));
        }

        for (i, op) in valid {
            match self.apply_op(app_id, op) {
                Ok(()) => result.applied += 1,
                // Structural interactions within the batch can only
                // be caught at apply time
                Err(err) => {
                    log::error!("patch op {} from '{}' failed to apply: {}", i, app_id, err);
                    self.record_violation();
                    result.rejected.push((i, err));
                }
            }

            if let PatchOp::RequestClose = op {
                result.close_requested = true;
            }
        }

        Ok(result)
    }

    /// Check one op against the app's ownership scope
    fn validate_op(&self, app_id: &str, op: &PatchOp) -> Result<(), PatchError> {
        let app = self
            .find_app(app_id)
            .ok_or(PatchError::UnknownApp(app_id.to_string()))?;

        // Every addressed node must exist and be owned by the app
        if let Some(target) = op.target() {
            if self.lookup(target).is_none() {
                return Err(PatchError::UnknownNode(target));
            }
            if !self.app_owns(app, target) {
                return Err(PatchError::CrossAppMutation {
                    app: app_id.to_string(),
                    node: target,
                });
            }
        }

        match op {
            PatchOp::SetText { node, .. } => match self.node(self.lookup(*node).unwrap()) {
                Node::Text(_) => Ok(()),
                _ => Err(PatchError::InvalidTarget(*node)),
            },
            PatchOp::SetBackground { node, .. } => match self.node(self.lookup(*node).unwrap()) {
                Node::Rect(_) => Ok(()),
                _ => Err(PatchError::InvalidTarget(*node)),
            },
            PatchOp::SetSize { node, size } => match self.node(self.lookup(*node).unwrap()) {
                Node::Rect(_) => match size.x > 0 && size.y > 0 {
                    true => Ok(()),
                    false => Err(PatchError::InvalidValue(*node)),
                },
                _ => Err(PatchError::InvalidTarget(*node)),
            },
            PatchOp::SetTransform { node, .. } => match self.node(self.lookup(*node).unwrap()) {
                Node::Transform(_) => Ok(()),
                _ => Err(PatchError::InvalidTarget(*node)),
            },
            PatchOp::InsertChild { parent, child } => {
                self.validate_structural(app_id, app, *parent, *child)
            }
            PatchOp::ReplaceChildren { parent, children } => {
                for child in children.iter() {
                    self.validate_structural(app_id, app, *parent, *child)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn validate_structural(
        &self,
        app_id: &str,
        app: &crate::dom::App,
        parent: NodeId,
        child: NodeId,
    ) -> Result<(), PatchError> {
        let child_index = self
            .lookup(child)
            .ok_or(PatchError::UnknownNode(child))?;
        if !self.app_owns(app, child) {
            return Err(PatchError::CrossAppMutation {
                app: app_id.to_string(),
                node: child,
            });
        }

        let parent_index = self.lookup(parent).unwrap();
        match self.node(parent_index).children_mut_allowed() {
            true => {}
            false => return Err(PatchError::InvalidTarget(parent)),
        }

        // The parent may not live inside the child being adopted
        if parent == child || self.subtree_contains(child_index, parent) {
            return Err(PatchError::StructuralCycle {
                parent: parent,
                child: child,
            });
        }

        Ok(())
    }

    /// Apply one validated op
    fn apply_op(&mut self, app_id: &str, op: &PatchOp) -> Result<(), PatchError> {
        match op {
            PatchOp::SetText { node, body } => {
                let index = self.lookup(*node).unwrap();
                self.mark_dirty(self.node_bounds(index), *node);
                if let Node::Text(text) = self.node_mut(index) {
                    text.body = body.clone();
                }
                self.mark_dirty(self.node_bounds(index), *node);
            }
            PatchOp::SetBackground { node, color } => {
                let index = self.lookup(*node).unwrap();
                if let Node::Rect(rect) = self.node_mut(index) {
                    rect.background = Some(*color);
                }
                self.mark_dirty(self.node_bounds(index), *node);
            }
            PatchOp::SetPosition { node, position } => {
                let index = self.lookup(*node).unwrap();
                self.mark_dirty(self.node_bounds(index), *node);

                let old = self.node(index).position();
                self.node_mut(index).set_position(*position);
                // Descendant locals were accumulated from the old
                // position and need to follow the move
                let delta = Vector::new(position.x - old.x, position.y - old.y);
                self.shift_children(index, delta);

                self.mark_dirty(self.node_bounds(index), *node);
            }
            PatchOp::SetSize { node, size } => {
                let index = self.lookup(*node).unwrap();
                self.mark_dirty(self.node_bounds(index), *node);
                if let Node::Rect(rect) = self.node_mut(index) {
                    rect.size = *size;
                }
                self.mark_dirty(self.node_bounds(index), *node);
            }
            PatchOp::SetTransform { node, matrix } => {
                let index = self.lookup(*node).unwrap();
                if let Node::Transform(transform) = self.node_mut(index) {
                    transform.matrix = *matrix;
                }
                self.mark_dirty(self.node_bounds(index), *node);
            }
            PatchOp::SetVisibility { node, visible } => {
                self.set_visibility(*node, *visible);
                let index = self.lookup(*node).unwrap();
                self.mark_dirty(self.node_bounds(index), *node);
            }
            PatchOp::SetEnabled { node, enabled } => {
                self.set_enabled(*node, *enabled);
            }
            PatchOp::SetValue { node, value } => {
                self.set_value(*node, value.clone());
            }
            PatchOp::SetProperty { node, name, value } => {
                self.set_property(*node, name.clone(), value.clone());
            }
            PatchOp::InsertChild { parent, child } => {
                self.insert_child(app_id, *parent, *child)?;
            }
            PatchOp::RemoveNode { node } => {
                let index = self.lookup(*node).unwrap();
                self.mark_dirty(self.node_bounds(index), *node);
                self.unlink(app_id, *node);
            }
            PatchOp::ReplaceChildren { parent, children } => {
                let parent_index = self.lookup(*parent).unwrap();
                // Clear the old list first so re-parenting is clean
                if let Some(list) = self.node_mut(parent_index).children_mut() {
                    list.clear();
                }
                for child in children.iter() {
                    self.insert_child(app_id, *parent, *child)?;
                }
                self.mark_dirty(self.node_bounds(parent_index), *parent);
            }
            PatchOp::RequestFocus { node } => {
                self.set_focus(Some(*node));
            }
            PatchOp::ClearFocus => {
                self.set_focus(None);
            }
            PatchOp::RequestClose => {}
        }

        Ok(())
    }

    fn insert_child(&mut self, app_id: &str, parent: NodeId, child: NodeId) -> Result<(), PatchError> {
        let parent_index = self.lookup(parent).unwrap();
        let child_index = self.lookup(child).unwrap();

        // Inserts earlier in the batch may have changed the topology
        // since validation, re-check before linking
        if parent == child || self.subtree_contains(child_index, parent) {
            return Err(PatchError::StructuralCycle {
                parent: parent,
                child: child,
            });
        }

        self.unlink(app_id, child);

        // Re-accumulate the adopted subtree's local coordinates
        let parent_node = self.node(parent_index);
        let new_local = parent_node.local_position() + parent_node.position();
        let old_local = self.node(child_index).local_position();
        let delta = Vector::new(new_local.x - old_local.x, new_local.y - old_local.y);
        self.shift_node(child_index, delta);

        if let Some(children) = self.node_mut(parent_index).children_mut() {
            children.push(child_index);
        }

        self.mark_dirty(self.node_bounds(child_index), child);
        Ok(())
    }

    /// Move a node's local coordinate and its whole subtree with it
    fn shift_node(&mut self, index: NodeIndex, delta: Vector) {
        let node = self.node_mut(index);
        let local = node.local_position();
        let shifted = local + delta;
        match node {
            Node::Rect(n) => n.local_position = shifted,
            Node::Text(n) => n.local_position = shifted,
            Node::Transform(n) => n.local_position = shifted,
        }

        self.shift_children(index, delta);
    }

    fn shift_children(&mut self, index: NodeIndex, delta: Vector) {
        if delta == Vector::new(0, 0) {
            return;
        }

        let children: Vec<NodeIndex> = self.node(index).children().to_vec();
        for child in children {
            self.shift_node(child, delta);
        }
    }
}

impl Node {
    /// Can this node type hold children
    fn children_mut_allowed(&self) -> bool {
        match self {
            Node::Rect(_) | Node::Transform(_) => true,
            Node::Text(_) => false,
        }
    }
}
