//! Material node-graph shader source generator.
//!
//! Takes a directed graph of typed operation nodes and lowers it to HLSL
//! source text: topological sort, per-node-kind emission, name
//! uniquification, scalar/vector promotion casts and optional single-use
//! inlining. Rendering, physics and the editing UI are external; the only
//! contract here is graph in, shader text (plus resource slot maps) out.

pub mod analyzers;
pub mod context;
pub mod error;
pub mod generator;
pub mod graph;
pub mod table;
pub mod types;
pub mod writer;


pub use context::{Definition, GenerationContext, Resolved};
pub use error::{GeneratorError, Result};
pub use generator::{Generated, IOSignature, ShaderGenerator, SignatureDef};
pub use graph::{Graph, Link, Node, NodeId, NodeKind, Pin, PinKind};
pub use table::{Operation, StructDef, StructField, VariableTable};
pub use types::{ScalarKind, SType, TextureKind};
