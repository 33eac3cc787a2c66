//! The variable table: every emitted operation, declaration and resource of
//! one generation pass, in emission order.
//!
//! The table owns name uniquification (no generated identifier ever collides
//! with a reserved keyword, another variable, a struct or a resource) and the
//! reference counts that feed the generator's inlining decision. It does not
//! decide inlining itself.

use crate::types::SType;
use crate::writer::CodeWriter;
use std::collections::HashSet;

/// One emitted statement: a generated name bound to a right-hand-side
/// expression. Anonymous operations (empty name, `is_named == false`) emit
/// as bare expression statements; named operations with an empty expression
/// emit nothing at all and only exist so consumers can resolve their name.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Generation ordinal of the owning node; `None` for unowned bindings
    /// such as the input parameter.
    pub id: Option<usize>,
    pub name: String,
    pub ty: SType,
    pub expr: String,
    pub can_inline: bool,
    pub is_named: bool,
    /// How many other operations reference this one's name.
    pub refs: u32,
    /// Names this operation's expression references, in argument order.
    pub references: Vec<String>,
}

impl Operation {
    pub fn new(id: Option<usize>, name: String, ty: SType, expr: String, can_inline: bool, is_named: bool) -> Self {
        Operation { id, name, ty, expr, can_inline, is_named, refs: 0, references: Vec::new() }
    }

    /// The statement this operation emits, with `rhs` already expanded.
    /// `None` when the operation is a pure name alias.
    pub fn statement(&self, rhs: &str) -> Option<String> {
        if self.expr.is_empty() {
            return None;
        }
        if self.name.is_empty() {
            Some(format!("{};", rhs))
        } else {
            Some(format!("{} {} = {};", self.ty.name(), self.name, rhs))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: SType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructDef {
    pub fn new(name: impl Into<String>) -> Self {
        StructDef { name: name.into(), fields: Vec::new() }
    }

    fn build(&self, w: &mut CodeWriter) {
        w.begin_block(&format!("struct {}", self.name));
        for field in &self.fields {
            w.line(&format!("{} {};", field.ty.name(), field.name));
        }
        w.end_block_semi();
    }
}

/// A texture binding with its assigned `t` register.
#[derive(Debug, Clone)]
pub struct ShaderResourceView {
    pub name: String,
    pub ty: SType,
    pub value_ty: SType,
    pub slot: u32,
}

/// A sampler binding with its assigned `s` register.
#[derive(Debug, Clone)]
pub struct SamplerState {
    pub name: String,
    pub ty: SType,
    pub slot: u32,
}

/// A helper function definition emitted ahead of the entry point.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub ret: SType,
    pub params: Vec<(String, SType)>,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct VariableTable {
    operations: Vec<Operation>,
    reserved: HashSet<String>,
    structs: Vec<StructDef>,
    srvs: Vec<ShaderResourceView>,
    samplers: Vec<SamplerState>,
    methods: Vec<MethodDef>,
}

impl VariableTable {
    pub fn new() -> Self {
        VariableTable::default()
    }

    /// Reserve a name so it is never handed out as a generated identifier.
    pub fn add_keyword(&mut self, name: &str) {
        self.reserved.insert(name.to_string());
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// `base` unchanged if free, else the first free `base1`, `base2`, ...
    pub fn get_unique_name(&self, base: &str) -> String {
        if !self.name_exists(base) {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.name_exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Insert a pre-built operation, registering its name. Returns its index.
    pub fn add_variable(&mut self, op: Operation) -> usize {
        if !op.name.is_empty() {
            self.reserved.insert(op.name.clone());
        }
        self.operations.push(op);
        self.operations.len() - 1
    }

    /// Record that the operation at `referencing` uses `name` in its
    /// expression. Names that don't belong to a table operation (literals,
    /// member accesses) are ignored.
    pub fn add_ref(&mut self, name: &str, referencing: usize) {
        let mut found = false;
        for op in self.operations.iter_mut() {
            if !op.name.is_empty() && op.name == name {
                op.refs += 1;
                found = true;
            }
        }
        if found {
            if let Some(op) = self.operations.get_mut(referencing) {
                op.references.push(name.to_string());
            }
        }
    }

    /// Register a struct shape, reusing an existing one with the same name.
    pub fn add_struct(&mut self, def: StructDef) -> StructDef {
        if let Some(existing) = self.structs.iter().find(|s| s.name == def.name) {
            return existing.clone();
        }
        self.reserved.insert(def.name.clone());
        self.structs.push(def.clone());
        def
    }

    /// Register a texture binding on the next free `t` slot.
    pub fn add_shader_resource_view(&mut self, name: String, ty: SType, value_ty: SType) -> ShaderResourceView {
        let slot = self.srvs.len() as u32;
        let srv = ShaderResourceView { name: name.clone(), ty, value_ty, slot };
        self.reserved.insert(name);
        self.srvs.push(srv.clone());
        srv
    }

    /// Register a sampler binding on the next free `s` slot.
    pub fn add_sampler_state(&mut self, name: String, ty: SType) -> SamplerState {
        let slot = self.samplers.len() as u32;
        let sampler = SamplerState { name: name.clone(), ty, slot };
        self.reserved.insert(name);
        self.samplers.push(sampler.clone());
        sampler
    }

    /// Register a helper function definition; repeat registrations under the
    /// same name reuse the first.
    pub fn add_method(&mut self, def: MethodDef) {
        if self.methods.iter().any(|m| m.name == def.name) {
            return;
        }
        self.reserved.insert(def.name.clone());
        self.methods.push(def);
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn operation(&self, index: usize) -> &Operation {
        &self.operations[index]
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> + '_ {
        self.operations.iter()
    }

    /// Look up an operation by the generation id assigned to its owning node.
    pub fn find_by_id(&self, id: usize) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == Some(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| !op.name.is_empty() && op.name == name)
    }

    pub fn shader_resource_views(&self) -> &[ShaderResourceView] {
        &self.srvs
    }

    pub fn sampler_states(&self) -> &[SamplerState] {
        &self.samplers
    }

    /// Emit the declaration header: structs, then shader resource views,
    /// then samplers, then helper functions, each in registration order.
    pub fn build(&self, w: &mut CodeWriter) {
        for s in &self.structs {
            s.build(w);
        }
        for srv in &self.srvs {
            w.line(&format!("{} {} : register(t{});", srv.ty.name(), srv.name, srv.slot));
        }
        for sampler in &self.samplers {
            w.line(&format!("{} {} : register(s{});", sampler.ty.name(), sampler.name, sampler.slot));
        }
        for method in &self.methods {
            let params = method
                .params
                .iter()
                .map(|(name, ty)| format!("{} {}", ty.name(), name))
                .collect::<Vec<_>>()
                .join(", ");
            w.begin_block(&format!("{} {}({})", method.ret.name(), method.name, params));
            for line in method.body.lines() {
                w.line(line);
            }
            w.end_block();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SamplerKind, TextureKind};

    fn named(name: &str) -> Operation {
        Operation::new(None, name.to_string(), SType::float(), "0".to_string(), true, true)
    }

    #[test]
    fn test_unique_name_suffixes_start_at_one() {
        let mut table = VariableTable::new();
        assert_eq!(table.get_unique_name("color"), "color");
        table.add_variable(named("color"));
        assert_eq!(table.get_unique_name("color"), "color1");
        table.add_variable(named("color1"));
        assert_eq!(table.get_unique_name("color"), "color2");
    }

    #[test]
    fn test_unique_name_avoids_keywords_and_resources() {
        let mut table = VariableTable::new();
        table.add_keyword("float");
        assert_eq!(table.get_unique_name("float"), "float1");

        table.add_struct(StructDef::new("Pixel"));
        assert_eq!(table.get_unique_name("Pixel"), "Pixel1");

        table.add_shader_resource_view(
            "SrvAlbedo".to_string(),
            SType::Texture(TextureKind::Texture2D),
            SType::float4(),
        );
        assert_eq!(table.get_unique_name("SrvAlbedo"), "SrvAlbedo1");
    }

    #[test]
    fn test_slot_sequences_are_independent() {
        let mut table = VariableTable::new();
        let t0 = table.add_shader_resource_view(
            "SrvA".into(),
            SType::Texture(TextureKind::Texture2D),
            SType::float4(),
        );
        let s0 = table.add_sampler_state("SamplerA".into(), SType::Sampler(SamplerKind::SamplerState));
        let t1 = table.add_shader_resource_view(
            "SrvB".into(),
            SType::Texture(TextureKind::Texture2D),
            SType::float4(),
        );
        assert_eq!(t0.slot, 0);
        assert_eq!(t1.slot, 1);
        assert_eq!(s0.slot, 0);
    }

    #[test]
    fn test_add_ref_counts_and_records() {
        let mut table = VariableTable::new();
        let a = table.add_variable(named("a"));
        let b = table.add_variable(named("b"));
        table.add_ref("a", b);
        table.add_ref("a", b);
        // non-operation names are ignored
        table.add_ref("0.5", b);
        assert_eq!(table.operation(a).refs, 2);
        assert_eq!(table.operation(b).references, vec!["a", "a"]);
    }

    #[test]
    fn test_struct_registration_is_idempotent() {
        let mut table = VariableTable::new();
        let mut def = StructDef::new("Pixel");
        def.fields.push(StructField { name: "color".into(), ty: SType::float4() });
        table.add_struct(def.clone());
        let again = table.add_struct(StructDef::new("Pixel"));
        // the canonical (first) shape wins
        assert_eq!(again.fields.len(), 1);
    }

    #[test]
    fn test_build_orders_declarations() {
        let mut table = VariableTable::new();
        let mut def = StructDef::new("Pixel");
        def.fields.push(StructField { name: "uv".into(), ty: SType::float2() });
        table.add_struct(def);
        table.add_shader_resource_view(
            "SrvAlbedo".into(),
            SType::Texture(TextureKind::Texture2D),
            SType::float4(),
        );
        table.add_sampler_state("SamplerAlbedo".into(), SType::Sampler(SamplerKind::SamplerState));

        let mut w = CodeWriter::new();
        table.build(&mut w);
        let out = w.finish();
        let struct_at = out.find("struct Pixel").unwrap();
        let srv_at = out.find("Texture2D SrvAlbedo : register(t0);").unwrap();
        let sampler_at = out.find("SamplerState SamplerAlbedo : register(s0);").unwrap();
        assert!(struct_at < srv_at && srv_at < sampler_at);
    }

    #[test]
    fn test_anonymous_operation_statement() {
        let op = Operation::new(Some(0), String::new(), SType::Void, "clip(x)".into(), false, false);
        assert_eq!(op.statement("clip(x)").unwrap(), "clip(x);");
    }

    #[test]
    fn test_alias_operation_emits_nothing() {
        let op = Operation::new(Some(0), "v".into(), SType::float3(), String::new(), false, true);
        assert!(op.statement("").is_none());
    }
}
