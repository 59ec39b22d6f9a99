/// Define the scene tree node types and the swen data model
///
/// Austin Shafer - 2025
use utils::region::{Color, Matrix, Vector};

/// The stable identity of a scene node
///
/// Ids are assigned by the parser from a monotonic cursor starting
/// at 1 and are unique within one parse. 0 means "no stable id".
pub type NodeId = u64;

/// Index of a node in the scene's node arena
///
/// Ownership lives in the arena, parents reference their children
/// by index. The arena is the unit of reclamation.
pub type NodeIndex = usize;

/// djb2 hash of a declared id string
///
/// Nodes that declare a string id get a deterministic identity that
/// survives re-parses, which is what apps address patch ops against.
pub fn stable_id(declared: &str) -> NodeId {
    let mut hash: u64 = 5381;
    for byte in declared.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(*byte as u64);
    }
    hash
}

/// A colored rectangle, the workhorse of the scene tree
///
/// `local_position` is the coordinate accumulated from all ancestors
/// at parse time, excluding this node's own `position`. The world
/// origin is always `local_position + position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub node_id: NodeId,
    pub id: Option<String>,
    pub size: Vector,
    pub position: Vector,
    pub local_position: Vector,
    pub background: Option<Color>,
    pub children: Vec<NodeIndex>,
}

/// A block of text
///
/// Text nodes are leaves. Their draw bounds are estimated from the
/// body length until font metrics are wired in.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub node_id: NodeId,
    pub id: Option<String>,
    pub body: String,
    pub color: Color,
    pub position: Vector,
    pub local_position: Vector,
    pub text_size: u16,
}

/// A coordinate-space node
///
/// Transforms emit no geometry of their own, they bracket their
/// children with a state push and an affine matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub node_id: NodeId,
    pub id: Option<String>,
    pub position: Vector,
    pub local_position: Vector,
    pub matrix: Option<Matrix>,
    pub children: Vec<NodeIndex>,
}

/// A drawable scene node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rect(Rect),
    Text(Text),
    Transform(Transform),
}

impl Node {
    pub fn node_id(&self) -> NodeId {
        match self {
            Node::Rect(n) => n.node_id,
            Node::Text(n) => n.node_id,
            Node::Transform(n) => n.node_id,
        }
    }

    pub fn declared_id(&self) -> Option<&str> {
        match self {
            Node::Rect(n) => n.id.as_deref(),
            Node::Text(n) => n.id.as_deref(),
            Node::Transform(n) => n.id.as_deref(),
        }
    }

    pub fn position(&self) -> Vector {
        match self {
            Node::Rect(n) => n.position,
            Node::Text(n) => n.position,
            Node::Transform(n) => n.position,
        }
    }

    pub fn set_position(&mut self, position: Vector) {
        match self {
            Node::Rect(n) => n.position = position,
            Node::Text(n) => n.position = position,
            Node::Transform(n) => n.position = position,
        }
    }

    pub fn local_position(&self) -> Vector {
        match self {
            Node::Rect(n) => n.local_position,
            Node::Text(n) => n.local_position,
            Node::Transform(n) => n.local_position,
        }
    }

    /// The world origin of this node
    pub fn world_position(&self) -> Vector {
        self.local_position() + self.position()
    }

    pub fn children(&self) -> &[NodeIndex] {
        match self {
            Node::Rect(n) => n.children.as_slice(),
            Node::Text(_) => &[],
            Node::Transform(n) => n.children.as_slice(),
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeIndex>> {
        match self {
            Node::Rect(n) => Some(&mut n.children),
            Node::Text(_) => None,
            Node::Transform(n) => Some(&mut n.children),
        }
    }
}

/// An application's subtree
///
/// Apps declare their UI under a workspace or the system layer. The
/// compositor owns the tree, the app may only mutate it through
/// patch ops scoped to its own subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct App {
    pub id: String,
    pub size: Vector,
    pub position: Vector,
    pub background: Color,
    pub children: Vec<NodeIndex>,
}

/// A group of apps sharing the desktop
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workspace {
    pub apps: Vec<App>,
}

/// The system layer: privileged apps like bars and lock screens
#[derive(Debug, Clone, PartialEq, Default)]
pub struct System {
    pub apps: Vec<App>,
}

/// The desktop: the drawable layer plus its workspaces
#[derive(Debug, Clone, PartialEq)]
pub struct Desktop {
    pub size: Vector,
    pub background: Option<Color>,
    /// Index into `workspaces` of the one currently shown
    pub active_workspace: Option<usize>,
    pub workspaces: Vec<Workspace>,
    /// The drawable layer, root filtered
    pub nodes: Vec<NodeIndex>,
}

/// The root of the retained scene
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub desktop: Desktop,
    pub system: System,
}
