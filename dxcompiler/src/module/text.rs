//! Module text form
//!
//! ```text
//! source "shader.hlsl"
//! target ps_6_0
//! entry @main
//! resource srv Texture2D<float4> @tex space=0 slot=0 count=1 kind=2 dim=4 ret=5
//! output SV_Target 0 reg=0 sv=64 comp=3 mask=15
//!
//! define float4 @main(float2 uv) {
//!   %c = let float4 tex.Sample(samp, uv) !dbg 7:5
//!   ret c !dbg 8:5
//! }
//! ```

use super::{
    DebugLoc, Function, Instruction, Module, Opcode, Param, Resource, ResourceClass,
    SignatureElement,
};
use crate::target::ShaderTarget;
use crate::{Error, Result};
use std::fmt::Write;

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn print_element(out: &mut String, keyword: &str, e: &SignatureElement) {
    let _ = writeln!(
        out,
        "{keyword} {} {} reg={} sv={} comp={} mask={}",
        e.semantic_name, e.semantic_index, e.register, e.system_value, e.component_type, e.mask
    );
}

/// Prints a module in text form
pub fn print(module: &Module) -> String {
    let mut out = String::new();
    if let Some(source) = &module.source_name {
        let _ = writeln!(out, "source {}", quote(source));
    }
    let _ = writeln!(out, "target {}", module.target);
    if !module.entry_point.is_empty() {
        let _ = writeln!(out, "entry @{}", module.entry_point);
    }
    if let Some([x, y, z]) = module.thread_group {
        let _ = writeln!(out, "numthreads {x} {y} {z}");
    }
    if let Some(rs) = &module.root_signature {
        let _ = writeln!(out, "rootsignature {}", quote(rs));
    }
    for r in &module.resources {
        let _ = write!(
            out,
            "resource {} {} @{} space={} slot={} count={} kind={} dim={} ret={}",
            r.class.name(),
            r.type_name,
            r.name,
            r.space,
            r.slot,
            r.count,
            r.kind,
            r.dimension,
            r.return_type
        );
        if !r.fields.is_empty() {
            let _ = write!(out, " fields={}", r.fields.join(","));
        }
        out.push('\n');
    }
    for e in &module.inputs {
        print_element(&mut out, "input", e);
    }
    for e in &module.outputs {
        print_element(&mut out, "output", e);
    }

    for f in &module.functions {
        out.push('\n');
        let params: Vec<String> = f
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect();
        let _ = writeln!(out, "define {} @{}({}) {{", f.return_type, f.name, params.join(", "));
        let mut depth = 1usize;
        for inst in &f.body {
            if matches!(inst.opcode, Opcode::End | Opcode::Else) {
                depth = depth.saturating_sub(1).max(1);
            }
            out.push_str(&"  ".repeat(depth));
            if let Some(result) = &inst.result {
                let _ = write!(out, "%{result} = ");
            }
            out.push_str(inst.opcode.name());
            if let Some(ty) = &inst.ty {
                let _ = write!(out, " {ty}");
            }
            if !inst.operands.is_empty() {
                let _ = write!(out, " {}", inst.operands);
            }
            if let Some(loc) = inst.debug_loc {
                let _ = write!(out, " !dbg {}:{}", loc.line, loc.column);
            }
            out.push('\n');
            if matches!(inst.opcode, Opcode::If | Opcode::Loop | Opcode::Else) {
                depth += 1;
            }
        }
        out.push_str("}\n");
    }
    out
}

struct LineParser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

fn syntax(line: usize, message: impl Into<String>) -> Error {
    Error::IrSyntax {
        line,
        message: message.into(),
    }
}

/// Splits `key=value` attributes into a lookup
fn attributes<'a>(line: usize, words: &[&'a str]) -> Result<Vec<(&'a str, &'a str)>> {
    words
        .iter()
        .map(|w| {
            w.split_once('=')
                .ok_or_else(|| syntax(line, format!("expected key=value, found '{w}'")))
        })
        .collect()
}

fn attribute_u32(line: usize, attrs: &[(&str, &str)], key: &str) -> Result<u32> {
    let (_, value) = attrs
        .iter()
        .find(|(k, _)| *k == key)
        .ok_or_else(|| syntax(line, format!("missing attribute '{key}'")))?;
    value
        .parse()
        .map_err(|_| syntax(line, format!("attribute '{key}' is not an integer")))
}

fn parse_number(line: usize, text: &str) -> Result<u32> {
    text.parse()
        .map_err(|_| syntax(line, format!("expected an integer, found '{text}'")))
}

fn parse_resource(line: usize, rest: &str) -> Result<Resource> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    if words.len() < 3 {
        return Err(syntax(line, "incomplete resource declaration"));
    }
    let class = ResourceClass::from_name(words[0])
        .ok_or_else(|| syntax(line, format!("unknown resource class '{}'", words[0])))?;
    let name = words[2]
        .strip_prefix('@')
        .ok_or_else(|| syntax(line, "resource name must start with '@'"))?;
    let attrs = attributes(line, &words[3..])?;
    let fields = attrs
        .iter()
        .find(|(k, _)| *k == "fields")
        .map(|(_, v)| v.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    Ok(Resource {
        class,
        type_name: words[1].to_string(),
        name: name.to_string(),
        space: attribute_u32(line, &attrs, "space")?,
        slot: attribute_u32(line, &attrs, "slot")?,
        count: attribute_u32(line, &attrs, "count")?,
        kind: attribute_u32(line, &attrs, "kind")?,
        dimension: attribute_u32(line, &attrs, "dim")?,
        return_type: attribute_u32(line, &attrs, "ret")?,
        fields,
    })
}

fn parse_element(line: usize, rest: &str) -> Result<SignatureElement> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    if words.len() < 2 {
        return Err(syntax(line, "incomplete signature element"));
    }
    let attrs = attributes(line, &words[2..])?;
    let mask = attribute_u32(line, &attrs, "mask")?;
    Ok(SignatureElement {
        semantic_name: words[0].to_string(),
        semantic_index: parse_number(line, words[1])?,
        register: attribute_u32(line, &attrs, "reg")?,
        system_value: attribute_u32(line, &attrs, "sv")?,
        component_type: attribute_u32(line, &attrs, "comp")?,
        mask: u8::try_from(mask).map_err(|_| syntax(line, "mask does not fit in 8 bits"))?,
    })
}

fn parse_instruction(line: usize, text: &str) -> Result<Instruction> {
    let mut head = text;
    let mut debug_loc = None;
    if let Some((before, loc)) = text.rsplit_once(" !dbg ") {
        if let Some((l, c)) = loc.trim().split_once(':') {
            if let (Ok(l), Ok(c)) = (l.parse(), c.parse()) {
                debug_loc = Some(DebugLoc { line: l, column: c });
                head = before;
            }
        }
    }

    let (result, rest) = match head.strip_prefix('%') {
        Some(named) => {
            let (name, rest) = named
                .split_once(" = ")
                .ok_or_else(|| syntax(line, "expected '=' after result name"))?;
            (Some(name.trim().to_string()), rest.trim())
        }
        None => (None, head.trim()),
    };

    let (mnemonic, operands) = rest.split_once(' ').unwrap_or((rest, ""));
    let opcode = Opcode::from_name(mnemonic)
        .ok_or_else(|| syntax(line, format!("unknown opcode '{mnemonic}'")))?;
    let (ty, operands) = if opcode == Opcode::Let {
        let operands = operands.trim();
        if operands.is_empty() {
            return Err(syntax(line, "'let' requires a type"));
        }
        let (ty, init) = operands.split_once(' ').unwrap_or((operands, ""));
        (Some(ty.to_string()), init.trim())
    } else {
        (None, operands.trim())
    };

    Ok(Instruction {
        result,
        opcode,
        ty,
        operands: operands.to_string(),
        debug_loc,
    })
}

/// Splits on commas outside of template brackets
fn split_params(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_define(line: usize, rest: &str) -> Result<Function> {
    let rest = rest
        .trim()
        .strip_suffix('{')
        .ok_or_else(|| syntax(line, "expected '{' at the end of a definition"))?
        .trim();
    let (return_type, signature) = rest
        .split_once(" @")
        .ok_or_else(|| syntax(line, "expected '@name' in definition"))?;
    let (name, params) = signature
        .split_once('(')
        .ok_or_else(|| syntax(line, "expected '(' after function name"))?;
    let params = params
        .strip_suffix(')')
        .ok_or_else(|| syntax(line, "expected ')' after parameters"))?;
    let params = split_params(params)
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.rsplit_once(' ')
                .map(|(ty, name)| Param {
                    ty: ty.trim().to_string(),
                    name: name.to_string(),
                })
                .ok_or_else(|| syntax(line, format!("malformed parameter '{p}'")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Function {
        name: name.to_string(),
        return_type: return_type.trim().to_string(),
        params,
        body: Vec::new(),
    })
}

impl<'a> LineParser<'a> {
    /// Next non-blank, non-comment line with its 1-based number
    fn next(&mut self) -> Option<(usize, &'a str)> {
        for (index, line) in self.lines.by_ref() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with(';') {
                return Some((index + 1, line));
            }
        }
        None
    }
}

/// Parses module text
pub fn parse(text: &str) -> Result<Module> {
    let mut parser = LineParser {
        lines: text.lines().enumerate(),
    };
    let mut target: Option<ShaderTarget> = None;
    let mut module = Module::new(ShaderTarget::LIB_6_3, "");

    while let Some((line, content)) = parser.next() {
        let (keyword, rest) = content.split_once(' ').unwrap_or((content, ""));
        let rest = rest.trim();
        match keyword {
            "source" => {
                module.source_name =
                    Some(unquote(rest).ok_or_else(|| syntax(line, "expected a quoted source name"))?);
            }
            "target" => {
                target = Some(
                    rest.parse()
                        .map_err(|_| syntax(line, format!("unknown target profile '{rest}'")))?,
                );
            }
            "entry" => {
                module.entry_point = rest
                    .strip_prefix('@')
                    .ok_or_else(|| syntax(line, "entry point must start with '@'"))?
                    .to_string();
            }
            "numthreads" => {
                let dims: Vec<u32> = rest
                    .split_whitespace()
                    .map(|w| parse_number(line, w))
                    .collect::<Result<_>>()?;
                let [x, y, z] = dims[..] else {
                    return Err(syntax(line, "numthreads needs three values"));
                };
                module.thread_group = Some([x, y, z]);
            }
            "rootsignature" => {
                module.root_signature = Some(
                    unquote(rest).ok_or_else(|| syntax(line, "expected a quoted root signature"))?,
                );
            }
            "resource" => module.resources.push(parse_resource(line, rest)?),
            "input" => module.inputs.push(parse_element(line, rest)?),
            "output" => module.outputs.push(parse_element(line, rest)?),
            "define" => {
                let mut function = parse_define(line, rest)?;
                loop {
                    let Some((line, content)) = parser.next() else {
                        return Err(syntax(line, format!("missing '}}' for '@{}'", function.name)));
                    };
                    if content == "}" {
                        break;
                    }
                    function.body.push(parse_instruction(line, content)?);
                }
                module.functions.push(function);
            }
            other => return Err(syntax(line, format!("unexpected '{other}'"))),
        }
    }

    module.target = target.ok_or_else(|| syntax(1, "module has no target"))?;
    Ok(module)
}
