//! The shader generator: topological sort, analyzer dispatch, and final
//! source assembly.
//!
//! One `generate` call is a complete single-shot pipeline over an immutable
//! graph. All mutable state lives in a [`GenerationContext`] built for the
//! call and returned (as the slot maps) or dropped with it, so a generator
//! can be shared freely.

use crate::analyzers::{default_analyzers, NodeAnalyzer};
use crate::context::{Definition, GenerationContext};
use crate::error::{GeneratorError, Result};
use crate::graph::{Graph, Node, NodeId};
use crate::table::{Operation, StructDef, StructField, VariableTable};
use crate::types::SType;
use crate::writer::CodeWriter;
use crate::bail_graph;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HLSL keywords that must never be handed out as generated identifiers.
/// The scalar/vector/matrix type-name families are reserved programmatically.
const KEYWORDS: &[&str] = &[
    "AppendStructuredBuffer", "BlendState", "Buffer", "ByteAddressBuffer", "CompileShader",
    "ComputeShader", "ConsumeStructuredBuffer", "DepthStencilState", "DepthStencilView",
    "DomainShader", "GeometryShader", "Hullshader", "InputPatch", "LineStream", "NULL",
    "OutputPatch", "PixelShader", "PointStream", "RWBuffer", "RWByteAddressBuffer",
    "RWStructuredBuffer", "RWTexture1D", "RWTexture1DArray", "RWTexture2D", "RWTexture2DArray",
    "RWTexture3D", "RasterizerState", "RenderTargetView", "SamplerComparisonState",
    "SamplerState", "StructuredBuffer", "Texture1D", "Texture1DArray", "Texture2D",
    "Texture2DArray", "Texture2DMS", "Texture2DMSArray", "Texture3D", "TextureCube",
    "TextureCubeArray", "TriangleStream", "VertexShader", "asm", "asm_fragment", "break",
    "case", "cbuffer", "centroid", "class", "column_major", "compile", "compile_fragment",
    "const", "continue", "default", "discard", "do", "dword", "else", "export", "extern",
    "false", "for", "fxgroup", "groupshared", "if", "in", "inline", "inout", "interface",
    "line", "lineadj", "linear", "matrix", "namespace", "nointerpolation", "noperspective",
    "out", "packoffset", "pass", "pixelfragment", "point", "precise", "register", "return",
    "row_major", "sample", "shared", "snorm", "stateblock", "stateblock_state", "static",
    "string", "struct", "switch", "tbuffer", "technique", "technique10", "technique11",
    "texture", "true", "typedef", "triangle", "triangleadj", "uniform", "unorm", "unsigned",
    "vector", "vertexfragment", "void", "volatile", "while",
];

/// Intrinsic function names, reserved for the same reason.
const FUNCTIONS: &[&str] = &[
    "abs", "acos", "all", "any", "asdouble", "asfloat", "asin", "asint", "asuint", "atan",
    "atan2", "ceil", "clamp", "clip", "cos", "cosh", "cross", "ddx", "ddx_coarse", "ddx_fine",
    "ddy", "ddy_coarse", "ddy_fine", "degrees", "distance", "dot", "exp", "exp2", "floor",
    "fmod", "frac", "fwidth", "ldexp", "length", "lerp", "lit", "log", "log10", "log2", "max",
    "min", "mul", "normalize", "pow", "radians", "reflect", "refract", "round", "rcp",
    "rsqrt", "saturate", "sin", "sinh", "smoothstep", "sqrt", "step", "tan", "tanh",
];

const TYPE_FAMILIES: &[&str] = &[
    "bool", "int", "uint", "half", "float", "double", "min10float", "min16float", "min12int",
    "min16int", "min16uint",
];

fn reserve_names(table: &mut VariableTable) {
    for kw in KEYWORDS {
        table.add_keyword(kw);
    }
    for f in FUNCTIONS {
        table.add_keyword(f);
    }
    for base in TYPE_FAMILIES {
        table.add_keyword(base);
        for n in 1..=4u8 {
            table.add_keyword(&format!("{}{}", base, n));
            for m in 1..=4u8 {
                table.add_keyword(&format!("{}{}x{}", base, n, m));
            }
        }
    }
}

/// One named, typed field of an I/O signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureDef {
    pub name: String,
    pub ty: SType,
}

impl SignatureDef {
    pub fn new(name: impl Into<String>, ty: SType) -> Self {
        SignatureDef { name: name.into(), ty }
    }
}

/// Shape of the generated function's input or output parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IOSignature {
    pub name: String,
    pub defs: Vec<SignatureDef>,
}

impl IOSignature {
    pub fn new(name: impl Into<String>, defs: Vec<SignatureDef>) -> Self {
        IOSignature { name: name.into(), defs }
    }
}

/// Result of one generation pass: the source text plus the resource slots
/// assigned to texture nodes, for the caller to bind at runtime.
#[derive(Debug, Clone)]
pub struct Generated {
    pub source: String,
    pub texture_slots: HashMap<NodeId, u32>,
    pub sampler_slots: HashMap<NodeId, u32>,
}

type TableHook = Box<dyn Fn(&mut VariableTable)>;

pub struct ShaderGenerator {
    analyzers: Vec<Box<dyn NodeAnalyzer>>,
    /// Elide single-use temporaries and substitute their expressions inline.
    pub inline: bool,
    /// Treat unresolvable pins as errors instead of `0` literals.
    pub strict: bool,
    /// Warn (via `log`) when an orphan node is dropped from emission.
    pub warn_orphans: bool,
    pre_build: Option<TableHook>,
    post_build: Option<TableHook>,
}

impl Default for ShaderGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGenerator {
    pub fn new() -> Self {
        ShaderGenerator {
            analyzers: default_analyzers(),
            inline: false,
            strict: false,
            warn_orphans: true,
            pre_build: None,
            post_build: None,
        }
    }

    /// Hook invoked on the fresh table before any reserved names are added.
    pub fn on_pre_build_table(&mut self, hook: impl Fn(&mut VariableTable) + 'static) {
        self.pre_build = Some(Box::new(hook));
    }

    /// Hook invoked on the finished table before text emission.
    pub fn on_post_build_table(&mut self, hook: impl Fn(&mut VariableTable) + 'static) {
        self.post_build = Some(Box::new(hook));
    }

    /// Generate shader source for `graph`, rooted at `root`.
    ///
    /// `input_sig`/`output_sig` describe the entry point's parameter and
    /// return shapes; `define_input_struct`/`define_output_struct` control
    /// whether their struct declarations are emitted into the header. An
    /// output signature named after a primitive type (`"float4"`) produces a
    /// `SV_TARGET`-annotated entry point instead of a struct return.
    pub fn generate(
        &self,
        graph: &Graph,
        root: NodeId,
        entry_name: &str,
        define_input_struct: bool,
        define_output_struct: bool,
        input_sig: &IOSignature,
        output_sig: &IOSignature,
    ) -> Result<Generated> {
        let mut ctx = GenerationContext::new(self.strict);
        if let Some(hook) = &self.pre_build {
            hook(&mut ctx.table);
        }
        reserve_names(&mut ctx.table);

        self.build_signatures(&mut ctx, define_input_struct, define_output_struct, input_sig, output_sig);

        let order = self.topological_sort(graph)?;
        debug!("emitting {} of {} nodes", order.len(), graph.nodes.len());
        for node in order {
            let id = ctx.mapping.len();
            ctx.mapping.insert(node.id, id);
            ctx.id = id;
            for analyzer in &self.analyzers {
                if analyzer.try_analyze(node, graph, &mut ctx)? {
                    break;
                }
            }
        }

        if let Some(hook) = &self.post_build {
            hook(&mut ctx.table);
        }

        let mut writer = CodeWriter::new();
        ctx.table.build(&mut writer);
        self.build_body(&mut writer, graph, root, entry_name, &mut ctx)?;

        Ok(Generated {
            source: writer.finish(),
            texture_slots: ctx.texture_slots,
            sampler_slots: ctx.sampler_slots,
        })
    }

    fn build_signatures(
        &self,
        ctx: &mut GenerationContext,
        define_input_struct: bool,
        define_output_struct: bool,
        input_sig: &IOSignature,
        output_sig: &IOSignature,
    ) {
        let mut input = StructDef::new(&input_sig.name);
        for def in &input_sig.defs {
            input.fields.push(StructField { name: def.name.clone(), ty: def.ty.clone() });
        }
        if define_input_struct {
            input = ctx.table.add_struct(input);
        }
        ctx.input_type = SType::Struct(input.name.clone());
        let input_var = ctx.table.get_unique_name(&input.name.to_lowercase());
        ctx.table.add_variable(Operation::new(
            None,
            input_var.clone(),
            ctx.input_type.clone(),
            String::new(),
            false,
            true,
        ));
        ctx.input_var = input_var;
        ctx.input = input;

        let mut output = StructDef::new(&output_sig.name);
        for def in &output_sig.defs {
            output.fields.push(StructField { name: def.name.clone(), ty: def.ty.clone() });
        }
        ctx.output_type = SType::parse(&output_sig.name);
        if output.name != ctx.input.name && define_output_struct && ctx.output_type.is_struct() {
            output = ctx.table.add_struct(output);
        }
        ctx.output = output;
    }

    /// Stable dependency-first ordering of all linked nodes. Orphans (no
    /// links at all) are dropped; cycles are a definite error.
    pub fn topological_sort<'a>(&self, graph: &'a Graph) -> Result<Vec<&'a Node>> {
        #[derive(PartialEq)]
        enum Mark {
            Visiting,
            Visited,
        }

        fn visit<'a>(
            node: &'a Node,
            graph: &'a Graph,
            marks: &mut HashMap<NodeId, Mark>,
            sorted: &mut Vec<&'a Node>,
            warn_orphans: bool,
        ) -> Result<()> {
            match marks.get(&node.id) {
                Some(Mark::Visited) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(GeneratorError::CycleDetected(node.name.clone()));
                }
                None => {}
            }
            marks.insert(node.id, Mark::Visiting);
            for link in node.incoming_links() {
                let dep = match graph.node(link.from_node) {
                    Some(n) => n,
                    None => bail_graph!(
                        "node '{}' links to missing node {:?}",
                        node.name,
                        link.from_node
                    ),
                };
                visit(dep, graph, marks, sorted, warn_orphans)?;
            }
            marks.insert(node.id, Mark::Visited);
            if node.is_linked() {
                sorted.push(node);
            } else if warn_orphans {
                warn!("node '{}' has no links and is dropped from emission", node.name);
            }
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut sorted = Vec::new();
        for node in &graph.nodes {
            visit(node, graph, &mut marks, &mut sorted, self.warn_orphans)?;
        }
        Ok(sorted)
    }

    fn elided_expressions(&self, table: &VariableTable) -> HashMap<String, String> {
        let mut elided = HashMap::new();
        if !self.inline {
            return elided;
        }
        for op in table.operations() {
            if op.can_inline && op.refs <= 1 && !op.name.is_empty() && !op.expr.is_empty() {
                elided.insert(op.name.clone(), op.expr.clone());
            }
        }
        elided
    }

    fn build_body(
        &self,
        writer: &mut CodeWriter,
        graph: &Graph,
        root: NodeId,
        entry_name: &str,
        ctx: &GenerationContext,
    ) -> Result<()> {
        let output_name = if ctx.output_type.is_struct() {
            ctx.output.name.clone()
        } else {
            ctx.output_type.name()
        };
        let signature = if ctx.output_type.is_struct() {
            format!("{} {}({} {})", output_name, entry_name, ctx.input.name, ctx.input_var)
        } else {
            format!(
                "{} {}({} {}) : SV_TARGET",
                output_name, entry_name, ctx.input.name, ctx.input_var
            )
        };

        let elided = self.elided_expressions(&ctx.table);

        writer.begin_block(&signature);
        for i in 0..ctx.table.operation_count() {
            let op = ctx.table.operation(i);
            if !op.name.is_empty() && elided.contains_key(&op.name) {
                continue;
            }
            let rhs = expand_elided(&op.expr, &elided);
            if let Some(statement) = op.statement(&rhs) {
                writer.line(&statement);
            }
        }
        self.write_root_node(writer, graph, root, ctx, &elided)?;
        writer.end_block();
        Ok(())
    }

    fn write_root_node(
        &self,
        writer: &mut CodeWriter,
        graph: &Graph,
        root: NodeId,
        ctx: &GenerationContext,
        elided: &HashMap<String, String>,
    ) -> Result<()> {
        let root_node = match graph.node(root) {
            Some(n) => n,
            None => bail_graph!("root node {:?} is not part of the graph", root),
        };

        if !ctx.output_type.is_struct() {
            let def = self.root_field_def(root_node, 0, None, graph, ctx)?;
            writer.line(&format!("return {};", expand_elided(&def.text(), elided)));
            return Ok(());
        }

        let same_shape = ctx.input_type.name() == ctx.output_type.name();
        let var = if same_shape {
            ctx.input_var.clone()
        } else {
            let name = ctx.table.get_unique_name(&ctx.output.name.to_lowercase());
            writer.line(&format!("{} {};", ctx.output.name, name));
            name
        };

        let fields = ctx.output.fields.clone();
        for (i, field) in fields.iter().enumerate() {
            let def = self.root_field_def(root_node, i, Some(&field.name), graph, ctx)?;
            writer.line(&format!(
                "{}.{} = {};",
                var,
                field.name,
                expand_elided(&def.text(), elided)
            ));
        }
        writer.line(&format!("return {};", var));
        Ok(())
    }

    /// The value feeding one output field. A collector root resolves its
    /// matching input pin (by name, then by position); a computing root with
    /// a single output field yields its own operation.
    fn root_field_def(
        &self,
        root: &Node,
        index: usize,
        field: Option<&str>,
        graph: &Graph,
        ctx: &GenerationContext,
    ) -> Result<Definition> {
        let single_field = ctx.output.fields.len() <= 1;
        if single_field {
            if let Ok(op) = ctx.find(root) {
                if !op.name.is_empty() {
                    return Ok(Definition::bare(op.name.clone(), op.ty.clone()));
                }
            }
        }
        if let Some(name) = field {
            if let Some(pin) = root.input_pins().find(|p| p.name == name) {
                return ctx.variable_first_link(root, pin, graph);
            }
        }
        if let Some(pin) = root.input_pins().nth(index) {
            return ctx.variable_first_link(root, pin, graph);
        }
        if let Ok(op) = ctx.find(root) {
            if !op.name.is_empty() {
                return Ok(Definition::bare(op.name.clone(), op.ty.clone()));
            }
        }
        bail_graph!(
            "root node '{}' has nothing to feed output field {}",
            root.name,
            field.unwrap_or("0")
        )
    }
}

/// Substitute elided operation names in `text` with their (parenthesized,
/// recursively expanded) expressions. Only whole identifiers not preceded by
/// `.` are substituted, so member accesses and longer names are untouched.
fn expand_elided(text: &str, elided: &HashMap<String, String>) -> String {
    if elided.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    let mut prev: Option<char> = None;
    while let Some(&(start, c)) = chars.peek() {
        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, ch)) = chars.peek() {
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    end = i + ch.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let ident = &text[start..end];
            match elided.get(ident) {
                Some(expr) if prev != Some('.') => {
                    out.push('(');
                    out.push_str(&expand_elided(expr, elided));
                    out.push(')');
                }
                _ => out.push_str(ident),
            }
            prev = ident.chars().next_back();
        } else {
            out.push(c);
            chars.next();
            prev = Some(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_elided_whole_identifiers_only() {
        let mut elided = HashMap::new();
        elided.insert("t0".to_string(), "a + b".to_string());
        assert_eq!(expand_elided("t0 * c", &elided), "(a + b) * c");
        // t01 is a different identifier; pixel.t0 is a member access
        assert_eq!(expand_elided("t01 * pixel.t0", &elided), "t01 * pixel.t0");
    }

    #[test]
    fn test_expand_elided_is_recursive() {
        let mut elided = HashMap::new();
        elided.insert("t0".to_string(), "a + b".to_string());
        elided.insert("t1".to_string(), "t0 * c".to_string());
        assert_eq!(expand_elided("t1 - d", &elided), "((a + b) * c) - d");
    }

    #[test]
    fn test_reserved_names_include_type_families() {
        let mut table = VariableTable::new();
        reserve_names(&mut table);
        for name in ["float", "float3", "float4x4", "uint2", "min16float3x2", "lerp", "struct"] {
            assert!(table.name_exists(name), "{} should be reserved", name);
        }
    }
}
