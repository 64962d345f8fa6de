//! HLSL front end
//!
//! Turns preprocessed source into a [`Module`]. Declarations are parsed,
//! identifiers are checked against what is in scope, resources get their
//! registers, the entry point's signatures are built and statements are
//! lowered to instructions.

mod builtins;
mod parser;

use crate::diagnostic::{Diagnostic, Diagnostics, Stage};
use crate::lexer::{self, Token, TokenKind, TokenStream};
use crate::module::{
    Function, Instruction, Module, Opcode, Param, Resource, ResourceClass, SignatureElement,
};
use crate::target::ShaderTarget;
use builtins::{
    QUALIFIERS, classify_resource, component_layout, is_builtin_type, is_compute_system_value,
    is_intrinsic, resource_return_type, split_semantic, system_value,
};
use log::debug;
use parser::{Attribute, FunctionDecl, LoopKind, Program, Register, Span, Stmt, StructDecl, TypeSpec};
use std::collections::{HashMap, HashSet};

const ASSIGNMENT_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=",
];

const STREAM_TYPES: &[&str] = &["PointStream", "LineStream", "TriangleStream"];

const PATCH_TYPES: &[&str] = &["InputPatch", "OutputPatch"];

/// Compiles preprocessed HLSL into a module.
///
/// Problems are reported to `diagnostics`; `None` is returned when any of
/// them is an error.
pub fn compile(
    text: &str,
    file_name: &str,
    entry_point: &str,
    target: ShaderTarget,
    diagnostics: &mut Diagnostics,
) -> Option<Module> {
    let stream = match lexer::tokenize(text, file_name) {
        Ok(stream) => stream,
        Err(diagnostic) => {
            diagnostics.push(diagnostic);
            return None;
        }
    };
    if !parser::check_delimiters(&stream, diagnostics) {
        return None;
    }
    let program = parser::Parser::new(&stream, diagnostics)
        .parse_program()
        .ok()?;
    debug!(
        "parsed {} functions, {} structs, {} buffers, {} globals",
        program.functions.len(),
        program.structs.len(),
        program.buffers.len(),
        program.variables.len()
    );

    let mut lowering = Lowering::new(&stream, &program, diagnostics);
    let module = lowering.run(file_name, entry_point, target);
    if diagnostics.has_errors() {
        return None;
    }
    if let Err(err) = module.verify() {
        diagnostics.push(Diagnostic::error(Stage::Compile, err.to_string()));
        return None;
    }
    Some(module)
}

/// Per-function lowering state
struct FunctionState<'a> {
    scopes: Vec<HashSet<&'a str>>,
    reported: HashSet<&'a str>,
    loop_depth: usize,
    body: Vec<Instruction>,
}

impl<'a> FunctionState<'a> {
    fn declare(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name);
        }
    }

    fn in_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }
}

struct Lowering<'a, 'd> {
    stream: &'a TokenStream,
    program: &'a Program,
    structs: HashMap<&'a str, &'a StructDecl>,
    globals: HashSet<&'a str>,
    diagnostics: &'d mut Diagnostics,
}

impl<'a, 'd> Lowering<'a, 'd> {
    fn new(stream: &'a TokenStream, program: &'a Program, diagnostics: &'d mut Diagnostics) -> Self {
        let structs = program
            .structs
            .iter()
            .map(|s| (s.name.as_str(), s))
            .collect();
        let mut globals: HashSet<&'a str> = HashSet::new();
        globals.extend(program.structs.iter().map(|s| s.name.as_str()));
        globals.extend(program.functions.iter().map(|f| f.name.as_str()));
        globals.extend(program.variables.iter().map(|v| v.name.as_str()));
        for buffer in &program.buffers {
            globals.insert(buffer.name.as_str());
            globals.extend(buffer.fields.iter().map(|f| f.name.as_str()));
        }
        Lowering {
            stream,
            program,
            structs,
            globals,
            diagnostics,
        }
    }

    fn tokens(&self) -> &'a [Token] {
        &self.stream.tokens
    }

    fn error(&mut self, token: usize, message: impl Into<String>) {
        let mut diagnostic = Diagnostic::error(Stage::Compile, message);
        if let Some(t) = self.tokens().get(token) {
            diagnostic = diagnostic.at(self.stream.location(t));
        }
        self.diagnostics.push(diagnostic);
    }

    fn text(&self, span: &Span) -> String {
        lexer::render(&self.tokens()[span.clone()])
    }

    fn emit(&self, state: &mut FunctionState<'a>, inst: Instruction, token: usize) {
        let inst = match self.tokens().get(token) {
            Some(t) => inst.at(t.line, t.column),
            None => inst,
        };
        state.body.push(inst);
    }

    fn run(&mut self, file_name: &str, entry_point: &str, target: ShaderTarget) -> Module {
        let program = self.program;
        let mut seen = HashSet::new();
        for f in &program.functions {
            if !seen.insert(f.name.as_str()) {
                self.error(f.token, format!("redefinition of '{}'", f.name));
            }
        }

        let mut module = Module::new(target, "");
        module.source_name = Some(file_name.to_string());
        module.resources = self.bind_resources();

        if !target.is_library() {
            module.entry_point = entry_point.to_string();
            match program.functions.iter().find(|f| f.name == entry_point) {
                Some(entry) => self.entry_properties(entry, target, &mut module),
                None => self.diagnostics.push(Diagnostic::error(
                    Stage::Compile,
                    format!("missing entry point definition '{entry_point}'"),
                )),
            }
        }

        module.functions = program
            .functions
            .iter()
            .map(|f| self.lower_function(f))
            .collect();
        module
    }

    fn bind_resources(&mut self) -> Vec<Resource> {
        let program = self.program;
        // (declaration token, resource, explicit register)
        let mut pending: Vec<(usize, Resource, Option<Register>)> = Vec::new();

        for buffer in &program.buffers {
            let Some(shape) = classify_resource(&buffer.keyword) else {
                continue;
            };
            pending.push((
                buffer.token,
                Resource {
                    class: shape.class,
                    type_name: buffer.keyword.clone(),
                    name: buffer.name.clone(),
                    space: 0,
                    slot: 0,
                    count: 1,
                    kind: shape.kind,
                    dimension: shape.dimension,
                    return_type: 0,
                    fields: buffer.fields.iter().map(|f| f.name.clone()).collect(),
                },
                buffer.register,
            ));
        }

        let mut global_fields = Vec::new();
        for var in &program.variables {
            let Some(shape) = classify_resource(&var.ty.base) else {
                if !var.ty.has("static") && !var.ty.has("groupshared") {
                    global_fields.push(var.name.clone());
                }
                continue;
            };
            let fields = match (shape.class, var.ty.template.as_deref()) {
                (ResourceClass::Cbv, Some(t)) => self
                    .structs
                    .get(t)
                    .map(|s| s.fields.iter().map(|f| f.name.clone()).collect())
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            pending.push((
                var.token,
                Resource {
                    class: shape.class,
                    type_name: var.ty.name.clone(),
                    name: var.name.clone(),
                    space: 0,
                    slot: 0,
                    count: var.array.unwrap_or(1).max(1),
                    kind: shape.kind,
                    dimension: shape.dimension,
                    return_type: resource_return_type(
                        &shape,
                        var.ty.template.as_deref(),
                        var.ty.norm.as_deref(),
                    ),
                    fields,
                },
                var.register,
            ));
        }
        pending.sort_by_key(|(token, _, _)| *token);

        if !global_fields.is_empty() {
            pending.push((
                usize::MAX,
                Resource {
                    class: ResourceClass::Cbv,
                    type_name: "cbuffer".to_string(),
                    name: "$Globals".to_string(),
                    space: 0,
                    slot: 0,
                    count: 1,
                    kind: 0,
                    dimension: 0,
                    return_type: 0,
                    fields: global_fields,
                },
                None,
            ));
        }

        let mut placed: Vec<usize> = Vec::new();
        for index in 0..pending.len() {
            let token = pending[index].0;
            let Some(register) = pending[index].2 else {
                continue;
            };
            let resource = &pending[index].1;
            if ResourceClass::from_register_letter(register.letter) != Some(resource.class) {
                let message = format!(
                    "resource '{}' of class {} cannot be bound to register '{}{}'",
                    resource.name,
                    resource.class.name(),
                    register.letter,
                    register.slot
                );
                self.error(token, message);
                continue;
            }
            pending[index].1.slot = register.slot;
            pending[index].1.space = register.space;
            let resource = &pending[index].1;
            if let Some(other) = placed.iter().find(|&&o| pending[o].1.overlaps(resource)) {
                let message = format!(
                    "register {} of '{}' overlaps with '{}'",
                    resource.register(),
                    resource.name,
                    pending[*other].1.name
                );
                self.error(token, message);
                continue;
            }
            placed.push(index);
        }

        for index in 0..pending.len() {
            if pending[index].2.is_some() {
                continue;
            }
            while placed
                .iter()
                .any(|&o| pending[o].1.overlaps(&pending[index].1))
            {
                pending[index].1.slot += 1;
            }
            placed.push(index);
        }

        for (_, resource, _) in &pending {
            debug!("bound {} to {}", resource.name, resource.register());
        }
        pending.into_iter().map(|(_, r, _)| r).collect()
    }

    fn entry_properties(&mut self, entry: &'a FunctionDecl, target: ShaderTarget, module: &mut Module) {
        if target.shader_type.uses_thread_groups() {
            match entry.attributes.iter().find(|a| a.name.eq_ignore_ascii_case("numthreads")) {
                Some(attribute) => module.thread_group = self.numthreads(attribute),
                None => self.error(
                    entry.token,
                    format!(
                        "{} entry point '{}' must declare a numthreads attribute",
                        target.shader_type.prefix(),
                        entry.name
                    ),
                ),
            }
        }
        if let Some(attribute) = entry.attributes.iter().find(|a| a.name == "RootSignature") {
            module.root_signature = self.root_signature(attribute);
        }
        let (inputs, outputs) = self.signatures(entry);
        module.inputs = inputs;
        module.outputs = outputs;
    }

    fn numthreads(&mut self, attribute: &Attribute) -> Option<[u32; 3]> {
        let tokens = self.tokens();
        let values: Vec<u32> = attribute
            .args
            .iter()
            .filter_map(|span| match &tokens[span.clone()] {
                [t] if t.kind == TokenKind::Number => {
                    t.text.trim_end_matches(['u', 'U']).parse().ok()
                }
                _ => None,
            })
            .collect();
        match values.as_slice() {
            [x, y, z] if attribute.args.len() == 3 && *x > 0 && *y > 0 && *z > 0 => {
                Some([*x, *y, *z])
            }
            _ => {
                self.error(
                    attribute.token,
                    "numthreads requires three positive integer literals",
                );
                None
            }
        }
    }

    fn root_signature(&mut self, attribute: &Attribute) -> Option<String> {
        let tokens = self.tokens();
        let parts = match attribute.args.as_slice() {
            [span] if !span.is_empty() => &tokens[span.clone()],
            _ => &[][..],
        };
        if parts.is_empty() || parts.iter().any(|t| t.kind != TokenKind::Str) {
            self.error(attribute.token, "RootSignature requires a string literal");
            return None;
        }
        let mut text = String::new();
        for part in parts {
            let inner = &part.text[1..part.text.len() - 1];
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => text.extend(chars.next()),
                    _ => text.push(c),
                }
            }
        }
        Some(text)
    }

    /// `(semantic, type)` pairs for one parameter or return value
    fn elements_of(
        &mut self,
        ty: &'a TypeSpec,
        semantic: Option<&'a str>,
        token: usize,
        what: &str,
        out: &mut Vec<(&'a str, &'a str)>,
    ) {
        let mut base = ty.base.as_str();
        if STREAM_TYPES.contains(&base) || PATCH_TYPES.contains(&base) {
            let template = ty.template.as_deref().unwrap_or_default();
            base = template.split(',').next().unwrap_or_default();
        }
        if let Some(decl) = self.structs.get(base).copied() {
            for field in &decl.fields {
                match field.semantic.as_deref() {
                    Some(s) => out.push((s, field.ty.base.as_str())),
                    None => self.error(
                        field.token,
                        format!(
                            "semantic must be defined for field '{}' of '{}'",
                            field.name, decl.name
                        ),
                    ),
                }
            }
            return;
        }
        match semantic {
            Some(s) => out.push((s, base)),
            None => self.error(token, format!("semantic must be defined for {what}")),
        }
    }

    fn signatures(&mut self, entry: &'a FunctionDecl) -> (Vec<SignatureElement>, Vec<SignatureElement>) {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for param in &entry.params {
            let ty = &param.ty;
            if ty.has("uniform") || ty.has("payload") {
                continue;
            }
            let what = format!("parameter '{}'", param.name);
            let semantic = param.semantic.as_deref();
            let is_stream = STREAM_TYPES.contains(&ty.base.as_str());
            let is_output = ty.has("out")
                || ty.has("inout")
                || ty.has("vertices")
                || ty.has("indices")
                || ty.has("primitives");
            if ty.has("indices") {
                continue;
            }
            if is_output || is_stream {
                self.elements_of(ty, semantic, param.token, &what, &mut outputs);
            }
            if !(ty.has("out") || is_stream || ty.has("vertices") || ty.has("primitives")) {
                self.elements_of(ty, semantic, param.token, &what, &mut inputs);
            }
        }
        if entry.return_type.name != "void" {
            let what = format!("the return value of '{}'", entry.name);
            self.elements_of(
                &entry.return_type,
                entry.semantic.as_deref(),
                entry.token,
                &what,
                &mut outputs,
            );
        }
        (build_signature(&inputs), build_signature(&outputs))
    }

    fn check(&mut self, span: &Span, state: &mut FunctionState<'a>) {
        let tokens = self.tokens();
        for index in span.clone() {
            let token = &tokens[index];
            if !token.is_ident() {
                continue;
            }
            if index > 0 && (tokens[index - 1].is(".") || tokens[index - 1].is("::")) {
                continue;
            }
            let name = token.text.as_str();
            let known = state.in_scope(name)
                || self.globals.contains(name)
                || is_builtin_type(name)
                || is_intrinsic(name)
                || QUALIFIERS.contains(&name);
            if !known && state.reported.insert(name) {
                self.error(index, format!("use of undeclared identifier '{name}'"));
            }
        }
    }

    fn lower_function(&mut self, f: &'a FunctionDecl) -> Function {
        let mut state = FunctionState {
            scopes: vec![f.params.iter().map(|p| p.name.as_str()).collect()],
            reported: HashSet::new(),
            loop_depth: 0,
            body: Vec::new(),
        };
        self.lower_scoped(&f.body, &mut state);
        let params = f
            .params
            .iter()
            .map(|p| {
                let modifier = ["inout", "out", "in"].into_iter().find(|m| p.ty.has(m));
                Param {
                    ty: match modifier {
                        Some(m) => format!("{m} {}", p.ty.name),
                        None => p.ty.name.clone(),
                    },
                    name: p.name.clone(),
                }
            })
            .collect();
        Function {
            name: f.name.clone(),
            return_type: f.return_type.name.clone(),
            params,
            body: state.body,
        }
    }

    fn lower_scoped(&mut self, stmts: &'a [Stmt], state: &mut FunctionState<'a>) {
        state.scopes.push(HashSet::new());
        for stmt in stmts {
            self.lower(stmt, state);
        }
        state.scopes.pop();
    }

    fn lower(&mut self, stmt: &'a Stmt, state: &mut FunctionState<'a>) {
        match stmt {
            Stmt::Decl {
                ty,
                name,
                array,
                init,
                token,
            } => {
                if let Some(init) = init {
                    self.check(init, state);
                }
                state.declare(name);
                let ty = match array {
                    Some(n) => format!("{}[{n}]", ty.name),
                    None => ty.name.clone(),
                };
                let init = init.as_ref().map(|s| self.text(s)).unwrap_or_default();
                self.emit(state, Instruction::let_(name.as_str(), ty, init), *token);
            }
            Stmt::Expr(span) => {
                if span.is_empty() {
                    return;
                }
                self.check(span, state);
                let opcode = if is_assignment(&self.tokens()[span.clone()]) {
                    Opcode::Store
                } else {
                    Opcode::Eval
                };
                self.emit(state, Instruction::new(opcode, self.text(span)), span.start);
            }
            Stmt::Return { value, token } => {
                if let Some(value) = value {
                    self.check(value, state);
                }
                let operands = value.as_ref().map(|s| self.text(s)).unwrap_or_default();
                self.emit(state, Instruction::new(Opcode::Ret, operands), *token);
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                token,
            } => {
                self.check(cond, state);
                self.emit(state, Instruction::new(Opcode::If, self.text(cond)), *token);
                self.lower_scoped(then, state);
                if let Some(otherwise) = otherwise {
                    self.emit(state, Instruction::new(Opcode::Else, ""), *token);
                    self.lower_scoped(otherwise, state);
                }
                self.emit(state, Instruction::new(Opcode::End, ""), *token);
            }
            Stmt::Loop {
                kind,
                init,
                cond,
                step,
                body,
                token,
            } => {
                state.scopes.push(HashSet::new());
                for stmt in init {
                    self.lower(stmt, state);
                }
                for span in [cond, step].into_iter().flatten() {
                    self.check(span, state);
                }
                let text = |span: &Option<Span>| span.as_ref().map(|s| self.text(s)).unwrap_or_default();
                let header = match kind {
                    LoopKind::For => format!("for ({}; {})", text(cond), text(step)),
                    LoopKind::While => format!("while ({})", text(cond)),
                    LoopKind::DoWhile => format!("do while ({})", text(cond)),
                };
                self.emit(state, Instruction::new(Opcode::Loop, header), *token);
                state.loop_depth += 1;
                self.lower_scoped(body, state);
                state.loop_depth -= 1;
                self.emit(state, Instruction::new(Opcode::End, ""), *token);
                state.scopes.pop();
            }
            Stmt::Break(token) | Stmt::Continue(token) => {
                let opcode = match stmt {
                    Stmt::Break(_) => Opcode::Break,
                    _ => Opcode::Continue,
                };
                if state.loop_depth == 0 {
                    self.error(*token, format!("'{opcode}' statement not in loop statement"));
                    return;
                }
                self.emit(state, Instruction::new(opcode, ""), *token);
            }
            Stmt::Discard(token) => {
                self.emit(state, Instruction::new(Opcode::Discard, ""), *token);
            }
            Stmt::Block(stmts) => self.lower_scoped(stmts, state),
        }
    }
}

fn is_assignment(tokens: &[Token]) -> bool {
    if tokens.first().is_some_and(|t| t.is("++") || t.is("--"))
        || tokens.last().is_some_and(|t| t.is("++") || t.is("--"))
    {
        return true;
    }
    let mut depth = 0i32;
    tokens.iter().any(|t| {
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth -= 1,
            _ => {}
        }
        depth == 0 && t.kind == TokenKind::Punct && ASSIGNMENT_OPS.contains(&t.text.as_str())
    })
}

fn build_signature(elements: &[(&str, &str)]) -> Vec<SignatureElement> {
    elements
        .iter()
        .filter(|(semantic, _)| !is_compute_system_value(semantic))
        .enumerate()
        .map(|(register, (semantic, ty))| {
            let (name, index) = split_semantic(semantic);
            let (component_type, mask) = component_layout(ty);
            SignatureElement {
                semantic_name: name.to_string(),
                semantic_index: index,
                register: register as u32,
                system_value: system_value(name),
                component_type,
                mask,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile_ok(text: &str, entry: &str, target: ShaderTarget) -> Module {
        let mut diagnostics = Diagnostics::new();
        let module = compile(text, "shader.hlsl", entry, target, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render());
        module.unwrap()
    }

    fn compile_err(text: &str, entry: &str, target: ShaderTarget) -> String {
        let mut diagnostics = Diagnostics::new();
        let module = compile(text, "shader.hlsl", entry, target, &mut diagnostics);
        assert!(module.is_none());
        diagnostics.render()
    }

    const PIXEL: &str = "\
Texture2D<float4> tex : register(t0);
SamplerState samp;
float4 tint;
float4 main(float2 uv : TEXCOORD0) : SV_Target {
    float4 c = tex.Sample(samp, uv);
    if (c.a < 0.5) discard;
    c *= tint;
    return c;
}
";

    #[test]
    fn test_pixel_shader() {
        let module = compile_ok(PIXEL, "main", ShaderTarget::PS_6_0);
        assert_eq!(module.entry_point, "main");
        let names: Vec<_> = module.resources.iter().map(|r| r.register()).collect();
        assert_eq!(names, ["t0", "s0", "b0"]);
        assert_eq!(module.resources[2].name, "$Globals");
        assert_eq!(module.resources[2].fields, ["tint"]);
        assert_eq!(module.resources[0].return_type, 5);

        assert_eq!(module.inputs.len(), 1);
        assert_eq!(module.inputs[0].semantic_name, "TEXCOORD");
        assert_eq!(module.inputs[0].mask, 0x3);
        assert_eq!(module.outputs[0].system_value, 64);

        let body = &module.functions[0].body;
        let ops: Vec<_> = body.iter().map(|i| i.opcode).collect();
        assert_eq!(
            ops,
            [
                Opcode::Let,
                Opcode::If,
                Opcode::Discard,
                Opcode::End,
                Opcode::Store,
                Opcode::Ret
            ]
        );
        assert_eq!(body[0].operands, "tex.Sample(samp, uv)");
        assert_eq!(body[0].debug_loc.map(|d| d.line), Some(5));
        assert!(module.verify().is_ok());
    }

    #[test]
    fn test_compute_requires_numthreads() {
        let err = compile_err("void main() {}", "main", ShaderTarget::CS_6_0);
        assert!(err.contains("numthreads"), "{err}");

        let module = compile_ok(
            "RWBuffer<uint> output;\n\
             [numthreads(64, 1, 1)]\n\
             void main(uint3 id : SV_DispatchThreadID) { output[id.x] = id.x; }\n",
            "main",
            ShaderTarget::CS_6_0,
        );
        assert_eq!(module.thread_group, Some([64, 1, 1]));
        assert!(module.inputs.is_empty());
        assert_eq!(module.resources[0].register(), "u0");
    }

    #[test]
    fn test_missing_entry_point() {
        let err = compile_err("float4 other() : SV_Target { return 0; }", "main", ShaderTarget::PS_6_0);
        assert!(err.contains("missing entry point definition 'main'"), "{err}");
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = compile_err(
            "float4 main() : SV_Target { return missing + missing; }",
            "main",
            ShaderTarget::PS_6_0,
        );
        assert_eq!(err.matches("use of undeclared identifier 'missing'").count(), 1);
        assert!(err.starts_with("shader.hlsl:1:36"), "{err}");
    }

    #[test]
    fn test_register_overlap() {
        let err = compile_err(
            "Texture2D a : register(t1);\nTexture2D b[2] : register(t0);\nfloat4 main() : SV_Target { return 0; }",
            "main",
            ShaderTarget::PS_6_0,
        );
        assert!(err.contains("overlaps with 'a'"), "{err}");
    }

    #[test]
    fn test_auto_binding_skips_explicit() {
        let module = compile_ok(
            "cbuffer A : register(b0) { float x; };\ncbuffer B { float y; };\nfloat4 main() : SV_Target { return x + y; }",
            "main",
            ShaderTarget::PS_6_0,
        );
        assert_eq!(module.resources[1].register(), "b1");
    }

    #[test]
    fn test_struct_signatures() {
        let module = compile_ok(
            "struct VSIn { float3 pos : POSITION; uint id : SV_VertexID; };\n\
             struct VSOut { float4 pos : SV_Position; float2 uv : TEXCOORD1; };\n\
             VSOut main(VSIn input) {\n\
               VSOut o;\n\
               o.pos = float4(input.pos, 1);\n\
               o.uv = 0;\n\
               return o;\n\
             }\n",
            "main",
            ShaderTarget::VS_6_0,
        );
        assert_eq!(module.inputs.len(), 2);
        assert_eq!(module.inputs[1].system_value, 6);
        assert_eq!(module.inputs[1].component_type, 1);
        assert_eq!(module.outputs[1].semantic_index, 1);
        assert_eq!(module.outputs[1].register, 1);
    }

    #[test]
    fn test_missing_semantic() {
        let err = compile_err("float4 main(float2 uv) : SV_Target { return 0; }", "main", ShaderTarget::PS_6_0);
        assert!(err.contains("semantic must be defined for parameter 'uv'"), "{err}");
    }

    #[test]
    fn test_loops_and_root_signature() {
        let module = compile_ok(
            "[RootSignature(\"RootFlags(0), \" \"CBV(b0)\")]\n\
             [numthreads(1, 1, 1)]\n\
             void main() {\n\
               int total = 0;\n\
               for (int i = 0; i < 4; ++i) { if (i == 2) continue; total += i; }\n\
               while (total > 0) { total--; break; }\n\
             }\n",
            "main",
            ShaderTarget::CS_6_0,
        );
        assert_eq!(module.root_signature.as_deref(), Some("RootFlags(0), CBV(b0)"));
        let loops: Vec<_> = module.functions[0]
            .body
            .iter()
            .filter(|i| i.opcode == Opcode::Loop)
            .map(|i| i.operands.as_str())
            .collect();
        assert_eq!(loops, ["for (i < 4; ++i)", "while (total > 0)"]);
    }

    #[test]
    fn test_break_outside_loop() {
        let err = compile_err("float4 main() : SV_Target { break; return 0; }", "main", ShaderTarget::PS_6_0);
        assert!(err.contains("'break' statement not in loop statement"), "{err}");
    }

    #[test]
    fn test_library_keeps_all_functions() {
        let module = compile_ok(
            "float helper(float x) { return x * 2; }\nexport float twice(float x) { return helper(x); }\n",
            "",
            ShaderTarget::LIB_6_3,
        );
        assert_eq!(module.entry_point, "");
        assert_eq!(module.functions.len(), 2);
        assert!(module.inputs.is_empty());
    }
}
