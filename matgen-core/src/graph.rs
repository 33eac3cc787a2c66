//! The material node graph consumed by the generator.
//!
//! Nodes are polymorphic over [`NodeKind`], a closed variant set. Pins belong
//! to exactly one node; links are (output pin -> input pin) pairs registered
//! on both endpoints so dependency walks and value resolution both see them.
//! The generator reads the graph, it never mutates it.

use crate::error::Result;
use crate::types::{ScalarKind, SType, TextureKind};
use crate::bail_graph;
use serde::{Deserialize, Serialize};

/// Stable identity of a node within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinKind {
    Input,
    Output,
}

/// A directed edge from an output pin to an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from_node: NodeId,
    pub from_pin: usize,
    pub to_node: NodeId,
    pub to_pin: usize,
}

/// A typed port on a node.
///
/// Input pins normally carry at most one link or fall back to their default
/// literal; output pins fan out to any number of links. An output pin with a
/// `member` projects one field or component of the node's value (`base.uv`,
/// `base.x`) instead of the whole value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    pub kind: PinKind,
    #[serde(default)]
    pub ty: Option<SType>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub member: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Pin {
    pub fn input(name: impl Into<String>) -> Self {
        Pin {
            name: name.into(),
            kind: PinKind::Input,
            ty: None,
            default: None,
            member: None,
            links: Vec::new(),
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Pin {
            name: name.into(),
            kind: PinKind::Output,
            ty: None,
            default: None,
            member: None,
            links: Vec::new(),
        }
    }

    pub fn typed(mut self, ty: SType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Mark this output as projecting a member/component of the node value.
    pub fn projecting(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

/// What a node computes. One variant per node kind the generator understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The function input parameter; its output pins project struct members.
    Input,
    /// Output marker/collector: its input pins mirror the output signature.
    /// Claimed by no analyzer, it emits nothing itself.
    Output,
    /// Literal value; `values` holds up to four components, `ty` selects the
    /// active width (float..float4).
    Constant { values: [f32; 4], ty: SType },
    /// Explicit conversion of the linked input to `target`. Widening
    /// conversions pad with `append`.
    Convert { target: SType, append: f32 },
    /// Swizzle extraction, e.g. mask `xyz` on a float4 input.
    ComponentMask { mask: String },
    /// Exposes the linked vector's components on projected output pins.
    Split,
    /// Assembles a vector from scalar component inputs.
    Pack { ty: SType },
    /// Binary operator over the `left`/`right` input pins.
    Operator { op: String, ty: SType },
    /// Call to a known intrinsic/function, arguments from input pins in order.
    FuncCall { func: String, ty: SType },
    /// Call whose result is not consumed (e.g. `clip`).
    FuncCallVoid { func: String },
    /// Call to a function whose definition is emitted into the header first.
    FuncCallDeclaration {
        func: String,
        ty: SType,
        params: Vec<(String, SType)>,
        body: String,
    },
    /// Texture sample; registers an SRV and a sampler slot.
    TextureSample { texture: TextureKind },
    /// Raw expression escape hatch.
    Code { expr: String, ty: SType },
}

impl NodeKind {
    /// The node's declared output type, when it has a single well-known one.
    pub fn value_type(&self) -> Option<SType> {
        match self {
            NodeKind::Input => None,
            NodeKind::Output => None,
            NodeKind::Constant { ty, .. } => Some(ty.clone()),
            NodeKind::Convert { target, .. } => Some(target.clone()),
            NodeKind::ComponentMask { mask } => Some(mask_type(mask)),
            NodeKind::Split => None,
            NodeKind::Pack { ty } => Some(ty.clone()),
            NodeKind::Operator { ty, .. } => Some(ty.clone()),
            NodeKind::FuncCall { ty, .. } => Some(ty.clone()),
            NodeKind::FuncCallVoid { .. } => Some(SType::Void),
            NodeKind::FuncCallDeclaration { ty, .. } => Some(ty.clone()),
            NodeKind::TextureSample { .. } => Some(SType::float4()),
            NodeKind::Code { ty, .. } => Some(ty.clone()),
        }
    }
}

/// The type a swizzle mask produces: one char is a scalar, more a vector.
pub fn mask_type(mask: &str) -> SType {
    match mask.len() {
        1 => SType::float(),
        n @ 2..=4 => SType::vector(ScalarKind::Float, n as u8),
        _ => SType::Unknown,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub pins: Vec<Pin>,
}

impl Node {
    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn pin_index(&self, name: &str) -> Option<usize> {
        self.pins.iter().position(|p| p.name == name)
    }

    pub fn input_pins(&self) -> impl Iterator<Item = &Pin> + '_ {
        self.pins.iter().filter(|p| p.kind == PinKind::Input)
    }

    /// A node with no links anywhere is an orphan and never emitted.
    pub fn is_linked(&self) -> bool {
        self.pins.iter().any(|p| !p.links.is_empty())
    }

    /// Links for which this node is the consumer.
    pub fn incoming_links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.pins
            .iter()
            .filter(|p| p.kind == PinKind::Input)
            .flat_map(|p| p.links.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    next_id: u32,
}

impl Graph {
    pub fn new() -> Self {
        Graph { nodes: Vec::new(), next_id: 0 }
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind, pins: Vec<Pin>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push(Node { id, name: name.into(), kind, pins });
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Connect an output pin to an input pin by pin name. The link is
    /// registered on both endpoints.
    pub fn connect(&mut self, from: NodeId, from_pin: &str, to: NodeId, to_pin: &str) -> Result<()> {
        let (from_idx, to_idx) = {
            let from_node = match self.node(from) {
                Some(n) => n,
                None => bail_graph!("no node with id {:?}", from),
            };
            let to_node = match self.node(to) {
                Some(n) => n,
                None => bail_graph!("no node with id {:?}", to),
            };
            let from_idx = match from_node.pin_index(from_pin) {
                Some(i) if from_node.pins[i].kind == PinKind::Output => i,
                Some(_) => bail_graph!(
                    "pin '{}' on node '{}' is not an output",
                    from_pin,
                    from_node.name
                ),
                None => bail_graph!("node '{}' has no pin '{}'", from_node.name, from_pin),
            };
            let to_idx = match to_node.pin_index(to_pin) {
                Some(i) if to_node.pins[i].kind == PinKind::Input => i,
                Some(_) => {
                    bail_graph!("pin '{}' on node '{}' is not an input", to_pin, to_node.name)
                }
                None => bail_graph!("node '{}' has no pin '{}'", to_node.name, to_pin),
            };
            (from_idx, to_idx)
        };

        let link = Link { from_node: from, from_pin: from_idx, to_node: to, to_pin: to_idx };
        for node in self.nodes.iter_mut() {
            if node.id == from {
                node.pins[from_idx].links.push(link);
            } else if node.id == to {
                node.pins[to_idx].links.push(link);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_registers_link_on_both_endpoints() {
        let mut graph = Graph::new();
        let a = graph.add_node(
            "one",
            NodeKind::Constant { values: [1.0, 0.0, 0.0, 0.0], ty: SType::float() },
            vec![Pin::output("out")],
        );
        let b = graph.add_node(
            "add",
            NodeKind::Operator { op: "+".into(), ty: SType::float() },
            vec![Pin::input("left"), Pin::input("right"), Pin::output("out")],
        );
        graph.connect(a, "out", b, "left").unwrap();

        assert_eq!(graph.node(a).unwrap().pins[0].links.len(), 1);
        assert_eq!(graph.node(b).unwrap().pins[0].links.len(), 1);
        assert_eq!(graph.node(b).unwrap().incoming_links().count(), 1);
        assert!(graph.node(a).unwrap().is_linked());
    }

    #[test]
    fn test_connect_rejects_wrong_direction() {
        let mut graph = Graph::new();
        let a = graph.add_node(
            "one",
            NodeKind::Constant { values: [1.0, 0.0, 0.0, 0.0], ty: SType::float() },
            vec![Pin::output("out")],
        );
        let b = graph.add_node(
            "two",
            NodeKind::Constant { values: [2.0, 0.0, 0.0, 0.0], ty: SType::float() },
            vec![Pin::output("out")],
        );
        assert!(graph.connect(a, "out", b, "out").is_err());
    }

    #[test]
    fn test_mask_type_widths() {
        assert_eq!(mask_type("x"), SType::float());
        assert_eq!(mask_type("xy"), SType::float2());
        assert_eq!(mask_type("xyzw"), SType::float4());
        assert_eq!(mask_type(""), SType::Unknown);
    }
}
