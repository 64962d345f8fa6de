//! Program disassembly
//!
//! Renders a container as its part table followed by the program module
//! text and the code generation listing. Module text or bitcode given
//! directly skips the part table.

use crate::assembler::{decode_module, module_from_container};
use crate::container::{CONTAINER_MAGIC, Container, PartKind};
use crate::{Blob, EncodedBlob, Error, Result};
use dxcompiler::{Module, bitcode, codegen};
use log::debug;
use std::fmt::Write;

/// Builder for program disassembly
///
/// # Example
/// ```
/// use dxcrs::{compile, DisassembleBuilder, ShaderTarget};
///
/// let bytecode = compile(
///     "float4 main() : SV_Target { return float4(1,0,0,1); }",
///     "main",
///     ShaderTarget::PS_6_0
/// ).unwrap();
///
/// let disasm = DisassembleBuilder::new(&bytecode)
///     .comment("My shader")
///     .without_listing()
///     .disassemble()
///     .unwrap();
///
/// assert!(disasm.to_text().unwrap().contains("entry @main"));
/// ```
pub struct DisassembleBuilder<'a> {
    program: &'a Blob,
    comment: Option<String>,
    part_table: bool,
    listing: bool,
    debug_program: bool,
}

impl<'a> DisassembleBuilder<'a> {
    /// Creates a new disassemble builder.
    pub fn new(program: &'a Blob) -> Self {
        DisassembleBuilder {
            program,
            comment: None,
            part_table: true,
            listing: true,
            debug_program: false,
        }
    }

    /// Sets a comment written as the first line.
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Leaves out the container part table.
    pub fn without_part_table(mut self) -> Self {
        self.part_table = false;
        self
    }

    /// Leaves out the code generation listing.
    pub fn without_listing(mut self) -> Self {
        self.listing = false;
        self
    }

    /// Prints the debug program (`ILDB`) instead of `DXIL` when present.
    pub fn prefer_debug_program(mut self) -> Self {
        self.debug_program = true;
        self
    }

    /// Disassembles the program.
    ///
    /// Input that is neither a container nor a module fails with
    /// [`Error::Disassembly`].
    pub fn disassemble(self) -> Result<EncodedBlob> {
        self.render().map_err(|err| Error::Disassembly {
            hresult: err.hresult(),
            message: err.to_string(),
        })
    }

    fn render(&self) -> Result<EncodedBlob> {
        let mut out = String::new();
        if let Some(comment) = &self.comment {
            for line in comment.lines() {
                let _ = writeln!(out, "; {line}");
            }
        }

        let bytes = self.program.as_bytes();
        let module = if bytes.starts_with(&CONTAINER_MAGIC) {
            let container = Container::load(self.program)?;
            if self.part_table {
                write_part_table(&mut out, &container);
            }
            match container.find_part(PartKind::ILDB).filter(|_| self.debug_program) {
                Some(debug) => bitcode::decode(debug.as_bytes())?,
                None => module_from_container(&container)?,
            }
        } else {
            decode_module(bytes)?
        };

        write_module(&mut out, &module, self.listing);
        debug!("disassembled {} bytes into {} bytes of text", bytes.len(), out.len());
        Ok(EncodedBlob::from_text(out))
    }
}

fn write_part_table(out: &mut String, container: &Container) {
    let digest: String = if container.is_signed() {
        container.digest().iter().map(|b| format!("{b:02x}")).collect()
    } else {
        "unsigned".to_string()
    };
    let _ = writeln!(out, "; container {} bytes, digest {digest}", container.as_blob().len());
    for (index, part) in container.parts().iter().enumerate() {
        let _ = writeln!(out, ";   part {index}: {} ({} bytes)", part.kind, part.content.len());
    }
    out.push_str(";\n");
}

fn write_module(out: &mut String, module: &Module, listing: bool) {
    out.push_str(&module.to_text());
    if listing {
        out.push('\n');
        for line in codegen::generate(module).render().lines() {
            if line.starts_with(';') || line.is_empty() {
                let _ = writeln!(out, "{line}");
            } else {
                let _ = writeln!(out, "; {line}");
            }
        }
    }
}

/// Convenience function for simple disassembly.
///
/// # Example
/// ```
/// use dxcrs::{compile, disassemble, ShaderTarget};
///
/// let bytecode = compile(
///     "float4 main() : SV_Target { return float4(1,0,0,1); }",
///     "main",
///     ShaderTarget::PS_6_0
/// ).unwrap();
///
/// let asm = disassemble(&bytecode).unwrap();
/// println!("{}", asm.to_text().unwrap());
/// ```
pub fn disassemble(program: &Blob) -> Result<EncodedBlob> {
    DisassembleBuilder::new(program).disassemble()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;

    const IR: &str = "\
target ps_6_0
entry @main
output SV_Target 0 reg=0 sv=64 comp=3 mask=15

define float4 @main() {
  %c = let float4 1
  ret c !dbg 2:3
}
";

    fn container() -> Blob {
        Assembler::new()
            .assemble_to_container(&Blob::from(IR))
            .result()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_disassemble_container() {
        let text = disassemble(&container()).unwrap().to_text().unwrap();
        assert!(text.contains("digest unsigned"), "{text}");
        assert!(text.contains("part 6: DXIL"), "{text}");
        assert!(text.contains("target ps_6_0"));
        assert!(text.contains("define float4 @main()"));
        assert!(text.contains("; profile ps_6_0"));
        assert!(!text.contains("!dbg"));
    }

    #[test]
    fn test_debug_program() {
        let text = DisassembleBuilder::new(&container())
            .prefer_debug_program()
            .without_part_table()
            .without_listing()
            .comment("debug view")
            .disassemble()
            .unwrap()
            .to_text()
            .unwrap();
        assert!(text.starts_with("; debug view\ntarget ps_6_0"), "{text}");
        assert!(text.contains("ret c !dbg 2:3"));
    }

    #[test]
    fn test_disassemble_module_text() {
        let text = disassemble(&Blob::from(IR)).unwrap().to_text().unwrap();
        assert!(!text.contains("; container"));
        assert!(text.contains("mov r0, 1 ; c"), "{text}");
    }

    #[test]
    fn test_disassemble_garbage() {
        let err = disassemble(&Blob::from("DXBC")).unwrap_err();
        assert!(matches!(err, Error::Disassembly { .. }));
        assert!(disassemble(&Blob::from("not a module")).is_err());
    }
}
