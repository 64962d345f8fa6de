//! Module to container assembly

use crate::container::{Container, ContainerBuilder, PartKind};
use crate::reflect::{encode_pipeline_state, encode_root_signature, encode_signature};
use crate::result::{OperationResult, diagnostics_blob};
use crate::{Blob, Error, HResult, Result};
use dxcompiler::codec::Writer;
use dxcompiler::{Diagnostic, Diagnostics, Module, Stage, bitcode, transform};
use log::debug;
use sha1::{Digest, Sha1};

/// Decodes module text or bitcode and verifies it
pub fn decode_module(ir: &[u8]) -> Result<Module> {
    let module = if bitcode::is_bitcode(ir) {
        bitcode::decode(ir)?
    } else {
        let text = std::str::from_utf8(ir)
            .map_err(|e| Error::Encoding(format!("module text is not UTF-8: {e}")))?;
        Module::parse(text.trim_end_matches('\0'))?
    };
    module.verify()?;
    Ok(module)
}

/// Reads the program module out of a loaded container
pub fn module_from_container(container: &Container) -> Result<Module> {
    let program = container
        .find_part(PartKind::DXIL)
        .ok_or(Error::PartNotFound(PartKind::DXIL))?;
    Ok(bitcode::decode(program.as_bytes())?)
}

/// Name stored in the `ILDN` part for the debug program `ildb`
fn debug_name(ildb: &[u8]) -> String {
    let hash = Sha1::digest(ildb);
    let hex: String = hash[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{hex}.pdb")
}

/// Serializes `module` into an unsigned container.
///
/// A module carrying debug locations gets an `ILDB` part holding it as is and
/// a `DXIL` part with the locations removed.
pub fn build_container(module: &Module) -> Result<Blob> {
    let mut builder = ContainerBuilder::new()
        .with_part(PartKind::ISG1, encode_signature(&module.inputs))
        .with_part(PartKind::OSG1, encode_signature(&module.outputs))
        .with_part(PartKind::PSV0, encode_pipeline_state(module));
    if let Some(root_signature) = &module.root_signature {
        builder.add_part(PartKind::RTS0, encode_root_signature(root_signature));
    }
    builder.add_part(PartKind::STAT, crate::reflect::encode_summary(module));

    let program = if module.has_debug_info() {
        let ildb = bitcode::encode(module);
        let mut name = Writer::new();
        name.str(&debug_name(&ildb));
        builder.add_part(PartKind::ILDB, ildb);
        builder.add_part(PartKind::ILDN, name.into_bytes());

        let mut stripped = module.clone();
        transform::strip_debug(&mut stripped);
        bitcode::encode(&stripped)
    } else {
        bitcode::encode(module)
    };
    builder.add_part(PartKind::DXIL, program);
    builder.build()
}

/// Assembler service
#[derive(Debug, Clone, Copy, Default)]
pub struct Assembler;

impl Assembler {
    /// Creates the service
    pub fn new() -> Self {
        Assembler
    }

    /// Assembles module text or bitcode into a container.
    ///
    /// Malformed input fails with `E_FORMAT` and a diagnostic describing the
    /// first structural error; nothing is produced in that case.
    pub fn assemble_to_container(&self, ir: &Blob) -> OperationResult {
        debug!("assembling {} bytes of module input", ir.len());
        let module = match decode_module(ir.as_bytes()) {
            Ok(module) => module,
            Err(err) => {
                let diagnostics = Diagnostics::from(Diagnostic::error(Stage::Assemble, err.to_string()));
                return OperationResult::failure(HResult::E_FORMAT, diagnostics_blob(&diagnostics));
            }
        };
        match build_container(&module) {
            Ok(container) => {
                debug!("assembled container of {} bytes", container.len());
                OperationResult::success(container, None)
            }
            Err(err) => {
                let diagnostics = Diagnostics::from(Diagnostic::error(Stage::Assemble, err.to_string()));
                OperationResult::failure(err.hresult(), diagnostics_blob(&diagnostics))
            }
        }
    }
}
