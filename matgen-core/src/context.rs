//! Per-generation mutable state and the lookup helpers that turn pins and
//! links into the text appearing in generated expressions.
//!
//! A context is built fresh for every `generate` call and dropped with it;
//! nothing is reused across generations.

use crate::error::{GeneratorError, Result};
use crate::graph::{Graph, Link, Node, NodeId, Pin, PinKind};
use crate::table::{Operation, SamplerState, ShaderResourceView, StructDef, VariableTable};
use crate::types::{needs_per_component_cast, SType};
use crate::bail_graph;
use log::debug;
use std::collections::HashMap;

/// Where a resolved value lives: a bare identifier (or literal), or a member
/// of a struct-typed variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Bare(String),
    Member { base: String, field: String },
}

impl Resolved {
    pub fn text(&self) -> String {
        match self {
            Resolved::Bare(name) => name.clone(),
            Resolved::Member { base, field } => format!("{}.{}", base, field),
        }
    }
}

/// A resolved pin value together with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub value: Resolved,
    pub ty: SType,
}

impl Definition {
    pub fn bare(text: impl Into<String>, ty: SType) -> Self {
        Definition { value: Resolved::Bare(text.into()), ty }
    }

    pub fn member(base: impl Into<String>, field: impl Into<String>, ty: SType) -> Self {
        Definition {
            value: Resolved::Member { base: base.into(), field: field.into() },
            ty,
        }
    }

    pub fn text(&self) -> String {
        self.value.text()
    }
}

/// Mutable state of one generation pass.
#[derive(Debug, Default)]
pub struct GenerationContext {
    pub table: VariableTable,
    /// Node -> generation ordinal, assigned in topological order.
    pub mapping: HashMap<NodeId, usize>,
    pub texture_slots: HashMap<NodeId, u32>,
    pub sampler_slots: HashMap<NodeId, u32>,

    pub input: StructDef,
    pub input_var: String,
    pub input_type: SType,
    pub output: StructDef,
    pub output_type: SType,

    /// Generation ordinal of the node currently being analyzed.
    pub id: usize,
    /// Fail on unresolvable pins instead of degrading to a `0` literal.
    pub strict: bool,
}

impl GenerationContext {
    pub fn new(strict: bool) -> Self {
        GenerationContext {
            input: StructDef::new(""),
            output: StructDef::new(""),
            input_type: SType::Unknown,
            output_type: SType::Unknown,
            strict,
            ..Default::default()
        }
    }

    /// The operation emitted for `node`. The node must already have been
    /// visited; anything else means the traversal order is broken.
    pub fn find(&self, node: &Node) -> Result<&Operation> {
        let id = match self.mapping.get(&node.id) {
            Some(id) => *id,
            None => bail_graph!("node '{}' resolved before it was visited", node.name),
        };
        match self.table.find_by_id(id) {
            Some(op) => Ok(op),
            None => bail_graph!("node '{}' was visited but emitted no operation", node.name),
        }
    }

    fn resolve_link(&self, link: &Link, graph: &Graph) -> Result<Definition> {
        let producer = match graph.node(link.from_node) {
            Some(n) => n,
            None => bail_graph!("link references missing node {:?}", link.from_node),
        };
        let op = self.find(producer)?;
        let pin = match producer.pins.get(link.from_pin) {
            Some(p) => p,
            None => bail_graph!("link references missing pin on node '{}'", producer.name),
        };
        if op.ty.is_struct() {
            let field = pin.member.clone().unwrap_or_else(|| pin.name.clone());
            let ty = pin.ty.clone().unwrap_or_else(|| op.ty.clone());
            return Ok(Definition::member(op.name.clone(), field, ty));
        }
        if let Some(member) = &pin.member {
            let ty = pin.ty.clone().unwrap_or_else(|| op.ty.clone());
            return Ok(Definition::member(op.name.clone(), member.clone(), ty));
        }
        Ok(Definition::bare(op.name.clone(), op.ty.clone()))
    }

    fn unresolved(&self, node: &Node, pin: &Pin) -> Result<Definition> {
        if self.strict {
            return Err(GeneratorError::UnresolvedPin {
                node: node.name.clone(),
                pin: pin.name.clone(),
            });
        }
        // Tolerate in-progress graphs: an unlinked pin without a default
        // degrades to a zero literal of unknown type.
        Ok(Definition::bare("0", SType::Unknown))
    }

    fn default_for(&self, node: &Node, pin: &Pin) -> Result<Definition> {
        if let Some(literal) = &pin.default {
            let ty = pin
                .ty
                .clone()
                .or_else(|| node.kind.value_type())
                .unwrap_or(SType::Unknown);
            return Ok(Definition::bare(literal.clone(), ty));
        }
        self.unresolved(node, pin)
    }

    /// Resolve the `index`-th link of a pin.
    pub fn variable_for_link(&self, node: &Node, pin: &Pin, index: usize, graph: &Graph) -> Result<Definition> {
        match pin.links.get(index) {
            Some(link) => self.resolve_link(link, graph),
            None => self.unresolved(node, pin),
        }
    }

    /// Resolve a pin to the text that should appear in an expression: the
    /// producing operation's name if linked, else the pin's default literal,
    /// else a permissive `0`.
    pub fn variable_first_link(&self, node: &Node, pin: &Pin, graph: &Graph) -> Result<Definition> {
        if pin.links.is_empty() || pin.kind == PinKind::Output {
            return self.default_for(node, pin);
        }
        self.resolve_link(&pin.links[0], graph)
    }

    /// Register a texture binding for `node`, remembering its slot.
    /// Repeat calls for the same node return the first binding.
    pub fn add_srv(&mut self, node: &Node, name: &str, ty: SType, value_ty: SType) -> ShaderResourceView {
        if let Some(slot) = self.texture_slots.get(&node.id) {
            return self.table.shader_resource_views()[*slot as usize].clone();
        }
        let unique = self.table.get_unique_name(name);
        let srv = self.table.add_shader_resource_view(unique, ty, value_ty);
        debug!("srv '{}' -> t{}", srv.name, srv.slot);
        self.texture_slots.insert(node.id, srv.slot);
        srv
    }

    /// Register a sampler binding for `node`, remembering its slot.
    pub fn add_sampler(&mut self, node: &Node, name: &str, ty: SType) -> SamplerState {
        if let Some(slot) = self.sampler_slots.get(&node.id) {
            return self.table.sampler_states()[*slot as usize].clone();
        }
        let unique = self.table.get_unique_name(name);
        let sampler = self.table.add_sampler_state(unique, ty);
        debug!("sampler '{}' -> s{}", sampler.name, sampler.slot);
        self.sampler_slots.insert(node.id, sampler.slot);
        sampler
    }

    pub(crate) fn gen_id(&self, node: &Node) -> Result<usize> {
        match self.mapping.get(&node.id) {
            Some(id) => Ok(*id),
            None => bail_graph!("node '{}' emitted before it was visited", node.name),
        }
    }

    /// Allocate a named operation owned by `node`. The proposed name is
    /// lower-cased, stripped of spaces and uniquified.
    pub fn add_variable(&mut self, node: &Node, proposed: &str, ty: SType, expr: String, can_inline: bool) -> Result<usize> {
        let id = self.gen_id(node)?;
        let base = proposed.to_lowercase().replace(' ', "");
        let name = self.table.get_unique_name(&base);
        Ok(self.table.add_variable(Operation::new(Some(id), name, ty, expr, can_inline, true)))
    }

    /// Allocate an anonymous statement operation owned by `node`.
    pub fn add_statement(&mut self, node: &Node, expr: String) -> Result<usize> {
        let id = self.gen_id(node)?;
        Ok(self.table.add_variable(Operation::new(Some(id), String::new(), SType::Void, expr, false, false)))
    }

    /// Compose `func(args...)` and register it as this node's operation.
    pub fn build_function_call(&mut self, args: &[Definition], ret: SType, node: &Node, func: &str) -> Result<usize> {
        if ret == SType::Void {
            return self.build_function_call_void(args, node, func);
        }
        let expr = compose_call(func, args);
        let index = self.add_variable(node, &node.name, ret, expr, true)?;
        for arg in args {
            self.table.add_ref(&arg.text(), index);
        }
        Ok(index)
    }

    /// Compose a call whose result is discarded; emitted as a bare statement.
    pub fn build_function_call_void(&mut self, args: &[Definition], node: &Node, func: &str) -> Result<usize> {
        let expr = compose_call(func, args);
        let index = self.add_statement(node, expr)?;
        for arg in args {
            self.table.add_ref(&arg.text(), index);
        }
        Ok(index)
    }

    /// Compose `left op right`, inserting component-count casts when scalar
    /// and vector operands mix.
    pub fn build_operator_call(&mut self, left: &Definition, right: &Definition, ty: SType, node: &Node, op: &str) -> Result<usize> {
        let expr = if needs_per_component_cast(&left.ty, &right.ty) {
            let cast_left = left.ty.cast_between(&ty)?;
            let cast_right = right.ty.cast_between(&ty)?;
            format!("{}{} {} {}{}", cast_left, left.text(), op, cast_right, right.text())
        } else {
            format!("{} {} {}", left.text(), op, right.text())
        };
        let index = self.add_variable(node, &node.name, ty, expr, true)?;
        self.table.add_ref(&left.text(), index);
        self.table.add_ref(&right.text(), index);
        Ok(index)
    }
}

pub(crate) fn compose_call(func: &str, args: &[Definition]) -> String {
    let mut expr = String::from(func);
    expr.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            expr.push(',');
        }
        expr.push_str(&arg.text());
    }
    expr.push(')');
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Pin};

    fn constant_node(graph: &mut Graph, name: &str, value: f32) -> NodeId {
        graph.add_node(
            name,
            NodeKind::Constant { values: [value, 0.0, 0.0, 0.0], ty: SType::float() },
            vec![Pin::output("out")],
        )
    }

    #[test]
    fn test_find_on_unvisited_node_is_contract_violation() {
        let mut graph = Graph::new();
        let id = constant_node(&mut graph, "one", 1.0);
        let ctx = GenerationContext::new(false);
        assert!(ctx.find(graph.node(id).unwrap()).is_err());
    }

    #[test]
    fn test_unlinked_pin_with_default_resolves_to_literal() {
        let mut graph = Graph::new();
        let id = graph.add_node(
            "lerp",
            NodeKind::FuncCall { func: "lerp".into(), ty: SType::float() },
            vec![Pin::input("t").typed(SType::float()).with_default("0.5")],
        );
        let ctx = GenerationContext::new(false);
        let node = graph.node(id).unwrap();
        let def = ctx.variable_first_link(node, &node.pins[0], &graph).unwrap();
        assert_eq!(def.text(), "0.5");
        assert_eq!(def.ty, SType::float());
    }

    #[test]
    fn test_unlinked_pin_without_default_degrades_to_zero() {
        let mut graph = Graph::new();
        let id = graph.add_node(
            "add",
            NodeKind::Operator { op: "+".into(), ty: SType::float() },
            vec![Pin::input("left")],
        );
        let ctx = GenerationContext::new(false);
        let node = graph.node(id).unwrap();
        let def = ctx.variable_first_link(node, &node.pins[0], &graph).unwrap();
        assert_eq!(def.text(), "0");
        assert!(def.ty.is_unknown());
    }

    #[test]
    fn test_strict_mode_rejects_unresolved_pin() {
        let mut graph = Graph::new();
        let id = graph.add_node(
            "add",
            NodeKind::Operator { op: "+".into(), ty: SType::float() },
            vec![Pin::input("left")],
        );
        let ctx = GenerationContext::new(true);
        let node = graph.node(id).unwrap();
        let err = ctx.variable_first_link(node, &node.pins[0], &graph).unwrap_err();
        assert!(matches!(err, GeneratorError::UnresolvedPin { .. }));
    }

    #[test]
    fn test_operator_call_inserts_cast_on_scalar_operand() {
        let mut graph = Graph::new();
        let id = graph.add_node(
            "mul",
            NodeKind::Operator { op: "*".into(), ty: SType::float3() },
            vec![Pin::input("left"), Pin::input("right"), Pin::output("out")],
        );
        let mut ctx = GenerationContext::new(false);
        ctx.mapping.insert(id, 0);
        let node = graph.node(id).unwrap().clone();

        let left = Definition::bare("intensity", SType::float());
        let right = Definition::bare("tint", SType::float3());
        let index = ctx.build_operator_call(&left, &right, SType::float3(), &node, "*").unwrap();
        assert_eq!(ctx.table.operation(index).expr, "(float3)intensity * tint");
    }

    #[test]
    fn test_srv_registration_is_idempotent_per_node() {
        use crate::types::TextureKind;
        let mut graph = Graph::new();
        let id = constant_node(&mut graph, "tex", 0.0);
        let node = graph.node(id).unwrap().clone();
        let mut ctx = GenerationContext::new(false);
        let first = ctx.add_srv(&node, "SrvTex", SType::Texture(TextureKind::Texture2D), SType::float4());
        let second = ctx.add_srv(&node, "SrvTex", SType::Texture(TextureKind::Texture2D), SType::float4());
        assert_eq!(first.slot, second.slot);
        assert_eq!(first.name, second.name);
        assert_eq!(ctx.table.shader_resource_views().len(), 1);
    }
}
