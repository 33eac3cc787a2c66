//! Per-node-kind emission logic.
//!
//! The generator walks sorted nodes and offers each one to an ordered list of
//! analyzers; the first analyzer that recognizes the node's kind emits its
//! operations into the context and claims it. A node no analyzer claims
//! produces no emission, which is fine for pure pass-through markers.

use crate::context::{compose_call, Definition, GenerationContext};
use crate::error::Result;
use crate::graph::{mask_type, Graph, Node, NodeKind, Pin, PinKind};
use crate::table::{MethodDef, Operation};
use crate::types::{SamplerKind, SType};
use crate::bail_graph;

pub trait NodeAnalyzer {
    /// Emit `node`'s operations into `ctx` if this analyzer handles its
    /// kind. Returns whether the node was claimed.
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool>;
}

/// The analyzer chain in registration order.
pub fn default_analyzers() -> Vec<Box<dyn NodeAnalyzer>> {
    vec![
        Box::new(InputAnalyzer),
        Box::new(ComponentMaskAnalyzer),
        Box::new(ConstantAnalyzer),
        Box::new(ConvertAnalyzer),
        Box::new(FuncCallDeclarationAnalyzer),
        Box::new(FuncCallAnalyzer),
        Box::new(FuncCallVoidAnalyzer),
        Box::new(OperatorAnalyzer),
        Box::new(PackAnalyzer),
        Box::new(SplitAnalyzer),
        Box::new(TextureSampleAnalyzer),
        Box::new(CodeAnalyzer),
    ]
}

fn first_input<'a>(node: &'a Node) -> Option<&'a Pin> {
    node.pins.iter().find(|p| p.kind == PinKind::Input)
}

fn input_defs(node: &Node, graph: &Graph, ctx: &GenerationContext) -> Result<Vec<Definition>> {
    node.input_pins()
        .map(|pin| ctx.variable_first_link(node, pin, graph))
        .collect()
}

/// The input parameter itself. Emits no statement; it registers an alias
/// operation bound to the input variable so consumers resolve struct members
/// (`pixel.uv`) through the ordinary lookup path.
pub struct InputAnalyzer;

impl NodeAnalyzer for InputAnalyzer {
    fn try_analyze(&self, node: &Node, _graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        if !matches!(node.kind, NodeKind::Input) {
            return Ok(false);
        }
        let id = ctx.gen_id(node)?;
        ctx.table.add_variable(Operation::new(
            Some(id),
            ctx.input_var.clone(),
            ctx.input_type.clone(),
            String::new(),
            false,
            true,
        ));
        Ok(true)
    }
}

pub struct ComponentMaskAnalyzer;

impl NodeAnalyzer for ComponentMaskAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let mask = match &node.kind {
            NodeKind::ComponentMask { mask } => mask.clone(),
            _ => return Ok(false),
        };
        let ty = mask_type(&mask);
        if ty.is_unknown() {
            bail_graph!("node '{}' has invalid component mask '{}'", node.name, mask);
        }
        let pin = match first_input(node) {
            Some(p) => p,
            None => bail_graph!("component mask node '{}' has no input pin", node.name),
        };
        let def = ctx.variable_first_link(node, pin, graph)?;
        let expr = format!("{}.{}", def.text(), mask);
        let index = ctx.add_variable(node, &node.name, ty, expr, true)?;
        ctx.table.add_ref(&def.text(), index);
        Ok(true)
    }
}

pub struct ConstantAnalyzer;

impl NodeAnalyzer for ConstantAnalyzer {
    fn try_analyze(&self, node: &Node, _graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let (values, ty) = match &node.kind {
            NodeKind::Constant { values, ty } => (*values, ty.clone()),
            _ => return Ok(false),
        };
        let literal = match ty.arity() {
            Some(1) => format_component(values[0]),
            Some(n) => {
                let parts: Vec<String> =
                    values[..n as usize].iter().map(|v| format_component(*v)).collect();
                format!("{}({})", ty.name(), parts.join(","))
            }
            None => bail_graph!("constant node '{}' has non-numeric type '{}'", node.name, ty.name()),
        };
        ctx.add_variable(node, &node.name, ty, literal, true)?;
        Ok(true)
    }
}

/// Explicit conversion. Widening a vector appends the pad component through a
/// constructor (`float4(v, 1)`); everything else is a plain cast.
pub struct ConvertAnalyzer;

impl NodeAnalyzer for ConvertAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let (target, append) = match &node.kind {
            NodeKind::Convert { target, append } => (target.clone(), *append),
            _ => return Ok(false),
        };
        let pin = match first_input(node) {
            Some(p) => p,
            None => bail_graph!("convert node '{}' has no input pin", node.name),
        };
        let def = ctx.variable_first_link(node, pin, graph)?;

        let expr = match (target.arity(), def.ty.arity()) {
            (Some(to), Some(from)) if to > from => {
                let mut parts = vec![def.text()];
                for _ in from..to {
                    parts.push(format_component(append));
                }
                format!("{}({})", target.name(), parts.join(","))
            }
            _ => format!("{}{}", target.cast_prefix()?, def.text()),
        };
        let index = ctx.add_variable(node, &node.name, target, expr, true)?;
        ctx.table.add_ref(&def.text(), index);
        Ok(true)
    }
}

pub struct FuncCallAnalyzer;

impl NodeAnalyzer for FuncCallAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let (func, ty) = match &node.kind {
            NodeKind::FuncCall { func, ty } => (func.clone(), ty.clone()),
            _ => return Ok(false),
        };
        let defs = input_defs(node, graph, ctx)?;
        ctx.build_function_call(&defs, ty, node, &func)?;
        Ok(true)
    }
}

pub struct FuncCallVoidAnalyzer;

impl NodeAnalyzer for FuncCallVoidAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let func = match &node.kind {
            NodeKind::FuncCallVoid { func } => func.clone(),
            _ => return Ok(false),
        };
        let defs = input_defs(node, graph, ctx)?;
        ctx.build_function_call_void(&defs, node, &func)?;
        Ok(true)
    }
}

/// Call to a function defined in the header. The definition is registered
/// before the first call; later nodes naming the same function reuse it.
pub struct FuncCallDeclarationAnalyzer;

impl NodeAnalyzer for FuncCallDeclarationAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let (func, ty, params, body) = match &node.kind {
            NodeKind::FuncCallDeclaration { func, ty, params, body } => {
                (func.clone(), ty.clone(), params.clone(), body.clone())
            }
            _ => return Ok(false),
        };
        ctx.table.add_method(MethodDef { name: func.clone(), ret: ty.clone(), params, body });
        let defs = input_defs(node, graph, ctx)?;
        // User-declared functions don't take part in ref counting.
        let expr = compose_call(&func, &defs);
        ctx.add_variable(node, &node.name, ty, expr, true)?;
        Ok(true)
    }
}

pub struct OperatorAnalyzer;

impl NodeAnalyzer for OperatorAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let (op, ty) = match &node.kind {
            NodeKind::Operator { op, ty } => (op.clone(), ty.clone()),
            _ => return Ok(false),
        };
        let mut inputs = node.input_pins();
        let (left_pin, right_pin) = match (inputs.next(), inputs.next()) {
            (Some(l), Some(r)) => (l, r),
            _ => bail_graph!("operator node '{}' needs two input pins", node.name),
        };
        let left = ctx.variable_first_link(node, left_pin, graph)?;
        let right = ctx.variable_first_link(node, right_pin, graph)?;
        ctx.build_operator_call(&left, &right, ty, node, &op)?;
        Ok(true)
    }
}

pub struct PackAnalyzer;

impl NodeAnalyzer for PackAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let ty = match &node.kind {
            NodeKind::Pack { ty } => ty.clone(),
            _ => return Ok(false),
        };
        let defs = input_defs(node, graph, ctx)?;
        let arity = match ty.arity() {
            Some(n) => n as usize,
            None => bail_graph!("pack node '{}' has non-numeric type '{}'", node.name, ty.name()),
        };
        if defs.len() < arity {
            bail_graph!(
                "pack node '{}' needs {} component inputs, has {}",
                node.name,
                arity,
                defs.len()
            );
        }
        let expr = if arity == 1 {
            defs[0].text()
        } else {
            let parts: Vec<String> = defs[..arity].iter().map(|d| d.text()).collect();
            format!("{}({})", ty.name(), parts.join(","))
        };
        ctx.add_variable(node, &node.name, ty, expr, true)?;
        Ok(true)
    }
}

/// Split registers a name alias for its source; the component output pins
/// project `.x`/`.y`/`.z`/`.w` off that name during resolution.
pub struct SplitAnalyzer;

impl NodeAnalyzer for SplitAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        if !matches!(node.kind, NodeKind::Split) {
            return Ok(false);
        }
        let pin = match first_input(node) {
            Some(p) => p,
            None => bail_graph!("split node '{}' has no input pin", node.name),
        };
        let def = ctx.variable_first_link(node, pin, graph)?;
        let id = ctx.gen_id(node)?;
        ctx.table.add_variable(Operation::new(
            Some(id),
            def.text(),
            def.ty.clone(),
            String::new(),
            false,
            true,
        ));
        Ok(true)
    }
}

pub struct TextureSampleAnalyzer;

impl NodeAnalyzer for TextureSampleAnalyzer {
    fn try_analyze(&self, node: &Node, graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let texture = match &node.kind {
            NodeKind::TextureSample { texture } => *texture,
            _ => return Ok(false),
        };
        let pin = match first_input(node) {
            Some(p) => p,
            None => bail_graph!("texture node '{}' has no UV input pin", node.name),
        };
        let uv = ctx.variable_first_link(node, pin, graph)?;
        let base = node.name.replace(' ', "");
        let srv = ctx.add_srv(node, &format!("Srv{}", base), SType::Texture(texture), SType::float4());
        let sampler = ctx.add_sampler(
            node,
            &format!("Sampler{}", base),
            SType::Sampler(SamplerKind::SamplerState),
        );
        let expr = format!("{}.Sample({}, {})", srv.name, sampler.name, uv.text());
        ctx.add_variable(node, &node.name, SType::float4(), expr, true)?;
        Ok(true)
    }
}

/// Raw expression escape hatch; never inlined.
pub struct CodeAnalyzer;

impl NodeAnalyzer for CodeAnalyzer {
    fn try_analyze(&self, node: &Node, _graph: &Graph, ctx: &mut GenerationContext) -> Result<bool> {
        let (expr, ty) = match &node.kind {
            NodeKind::Code { expr, ty } => (expr.clone(), ty.clone()),
            _ => return Ok(false),
        };
        ctx.add_variable(node, &node.name, ty, expr, false)?;
        Ok(true)
    }
}

fn format_component(value: f32) -> String {
    let mut text = format!("{}", value);
    if !text.contains('.') && !text.contains('e') && !text.contains("inf") && !text.contains("NaN") {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_component() {
        assert_eq!(format_component(1.0), "1.0");
        assert_eq!(format_component(0.5), "0.5");
        assert_eq!(format_component(-2.0), "-2.0");
    }
}
