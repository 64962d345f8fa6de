//! Binary module encoding
//!
//! Layout: the magic `BC C0 DE`, a u32 format version, then the module
//! fields in declaration order. Strings are u32-length-prefixed UTF-8,
//! lists are u32-count-prefixed.

use crate::codec::{Reader, Writer};
use crate::module::{
    DebugLoc, Function, Instruction, Module, Opcode, Param, Resource, ResourceClass,
    SignatureElement,
};
use crate::target::ShaderTarget;
use crate::{Error, Result};
use log::trace;

/// Leading bytes of every bitcode module
pub const MAGIC: [u8; 4] = [b'B', b'C', 0xC0, 0xDE];

/// Current encoding version
pub const VERSION: u32 = 1;

/// Returns true if `bytes` starts with the bitcode magic
pub fn is_bitcode(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}

/// Writes one resource record
pub fn write_resource(w: &mut Writer, r: &Resource) {
    w.u8(r.class.code());
    w.str(&r.type_name);
    w.str(&r.name);
    w.u32(r.space);
    w.u32(r.slot);
    w.u32(r.count);
    w.u32(r.kind);
    w.u32(r.dimension);
    w.u32(r.return_type);
    w.u32(r.fields.len() as u32);
    for field in &r.fields {
        w.str(field);
    }
}

/// Reads one resource record
pub fn read_resource(r: &mut Reader<'_>) -> Result<Resource> {
    let code = r.u8()?;
    let class = ResourceClass::from_code(code)
        .ok_or_else(|| r.error(format!("invalid resource class {code}")))?;
    let type_name = r.str()?;
    let name = r.str()?;
    let space = r.u32()?;
    let slot = r.u32()?;
    let count = r.u32()?;
    let kind = r.u32()?;
    let dimension = r.u32()?;
    let return_type = r.u32()?;
    let field_count = r.count(4)?;
    let fields = (0..field_count).map(|_| r.str()).collect::<Result<_>>()?;
    Ok(Resource {
        class,
        type_name,
        name,
        space,
        slot,
        count,
        kind,
        dimension,
        return_type,
        fields,
    })
}

/// Writes one signature element record
pub fn write_element(w: &mut Writer, e: &SignatureElement) {
    w.str(&e.semantic_name);
    w.u32(e.semantic_index);
    w.u32(e.register);
    w.u32(e.system_value);
    w.u32(e.component_type);
    w.u8(e.mask);
}

/// Reads one signature element record
pub fn read_element(r: &mut Reader<'_>) -> Result<SignatureElement> {
    Ok(SignatureElement {
        semantic_name: r.str()?,
        semantic_index: r.u32()?,
        register: r.u32()?,
        system_value: r.u32()?,
        component_type: r.u32()?,
        mask: r.u8()?,
    })
}

/// Writes a count-prefixed list of signature elements
pub fn write_elements(w: &mut Writer, elements: &[SignatureElement]) {
    w.u32(elements.len() as u32);
    for e in elements {
        write_element(w, e);
    }
}

/// Reads a count-prefixed list of signature elements
pub fn read_elements(r: &mut Reader<'_>) -> Result<Vec<SignatureElement>> {
    let count = r.count(21)?;
    (0..count).map(|_| read_element(r)).collect()
}

fn write_instruction(w: &mut Writer, inst: &Instruction) {
    w.opt_str(inst.result.as_deref());
    w.u8(inst.opcode.code());
    w.opt_str(inst.ty.as_deref());
    w.str(&inst.operands);
    match inst.debug_loc {
        Some(loc) => {
            w.u8(1);
            w.u32(loc.line);
            w.u32(loc.column);
        }
        None => w.u8(0),
    }
}

fn read_instruction(r: &mut Reader<'_>) -> Result<Instruction> {
    let result = r.opt_str()?;
    let code = r.u8()?;
    let opcode = Opcode::from_code(code).ok_or_else(|| r.error(format!("invalid opcode {code}")))?;
    let ty = r.opt_str()?;
    let operands = r.str()?;
    let debug_loc = match r.u8()? {
        0 => None,
        1 => Some(DebugLoc {
            line: r.u32()?,
            column: r.u32()?,
        }),
        other => return Err(r.error(format!("invalid debug location flag {other}"))),
    };
    Ok(Instruction {
        result,
        opcode,
        ty,
        operands,
        debug_loc,
    })
}

/// Encodes a module as bitcode
pub fn encode(module: &Module) -> Vec<u8> {
    let mut w = Writer::new();
    w.bytes(&MAGIC);
    w.u32(VERSION);
    w.opt_str(module.source_name.as_deref());
    w.str(&module.target.to_string());
    w.str(&module.entry_point);
    match module.thread_group {
        Some(dims) => {
            w.u8(1);
            dims.iter().for_each(|d| w.u32(*d));
        }
        None => w.u8(0),
    }
    w.opt_str(module.root_signature.as_deref());

    w.u32(module.resources.len() as u32);
    for r in &module.resources {
        write_resource(&mut w, r);
    }
    write_elements(&mut w, &module.inputs);
    write_elements(&mut w, &module.outputs);

    w.u32(module.functions.len() as u32);
    for f in &module.functions {
        w.str(&f.name);
        w.str(&f.return_type);
        w.u32(f.params.len() as u32);
        for p in &f.params {
            w.str(&p.ty);
            w.str(&p.name);
        }
        w.u32(f.body.len() as u32);
        for inst in &f.body {
            write_instruction(&mut w, inst);
        }
    }

    let bytes = w.into_bytes();
    trace!("encoded module as {} bytes of bitcode", bytes.len());
    bytes
}

/// Decodes bitcode produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<Module> {
    if !is_bitcode(bytes) {
        return Err(Error::Decode {
            offset: 0,
            message: "missing bitcode magic".to_string(),
        });
    }
    let mut r = Reader::new(bytes);
    r.bytes(MAGIC.len())?;
    let version = r.u32()?;
    if version != VERSION {
        return Err(r.error(format!("unsupported bitcode version {version}")));
    }

    let source_name = r.opt_str()?;
    let profile = r.str()?;
    let target: ShaderTarget = profile
        .parse()
        .map_err(|_| r.error(format!("unknown target profile '{profile}'")))?;
    let entry_point = r.str()?;
    let thread_group = match r.u8()? {
        0 => None,
        1 => Some([r.u32()?, r.u32()?, r.u32()?]),
        other => return Err(r.error(format!("invalid thread group flag {other}"))),
    };
    let root_signature = r.opt_str()?;

    let resource_count = r.count(37)?;
    let resources = (0..resource_count)
        .map(|_| read_resource(&mut r))
        .collect::<Result<_>>()?;
    let inputs = read_elements(&mut r)?;
    let outputs = read_elements(&mut r)?;

    let function_count = r.count(16)?;
    let mut functions = Vec::with_capacity(function_count);
    for _ in 0..function_count {
        let name = r.str()?;
        let return_type = r.str()?;
        let param_count = r.count(8)?;
        let params = (0..param_count)
            .map(|_| -> Result<Param> {
                Ok(Param {
                    ty: r.str()?,
                    name: r.str()?,
                })
            })
            .collect::<Result<_>>()?;
        let inst_count = r.count(8)?;
        let body = (0..inst_count)
            .map(|_| read_instruction(&mut r))
            .collect::<Result<_>>()?;
        functions.push(Function {
            name,
            return_type,
            params,
            body,
        });
    }

    if !r.is_at_end() {
        return Err(r.error(format!("{} trailing bytes", r.remaining())));
    }

    Ok(Module {
        source_name,
        target,
        entry_point,
        thread_group,
        root_signature,
        resources,
        inputs,
        outputs,
        functions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Module {
        Module::parse(
            "source \"a.hlsl\"\ntarget cs_6_0\nentry @main\nnumthreads 8 4 1\n\
             resource uav RWBuffer<uint> @out space=0 slot=0 count=1 kind=4 dim=1 ret=4\n\
             define void @main(uint3 id) {\n  store out[id.x] = 1 !dbg 3:5\n  ret\n}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_bitcode_preserves_module() {
        let m = sample();
        let bytes = encode(&m);
        assert!(is_bitcode(&bytes));
        assert_eq!(decode(&bytes).unwrap(), m);
    }

    #[test]
    fn test_decode_rejects_truncation_and_garbage() {
        let bytes = encode(&sample());
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
        let mut extra = bytes.clone();
        extra.push(0);
        assert!(decode(&extra).is_err());
        assert!(decode(b"not bitcode").is_err());
    }
}
