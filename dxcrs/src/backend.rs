//! Back-end output for a finished module

use crate::assembler::build_container;
use crate::Result;
use dxcompiler::{BackendAction, Module, bitcode, codegen};
use log::debug;
use std::io::Write;

/// What a back-end run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendReport {
    /// Action that ran
    pub action: BackendAction,
    /// Whether code generation ran
    pub codegen_ran: bool,
    /// Bytes written to the sink
    pub bytes_written: usize,
}

/// Renders the configured pass list
fn pass_configuration(passes: &[String]) -> String {
    if passes.is_empty() {
        return "; no passes configured\n".to_string();
    }
    let mut out = String::from("; pass configuration\n");
    for pass in passes {
        out.push_str(pass);
        out.push('\n');
    }
    out
}

/// Runs the back end for `action`, writing its output to `sink`.
///
/// The action never changes the module, only what gets written.
/// [`BackendAction::EmitNothing`] still runs code generation;
/// [`BackendAction::EmitPassConfig`] skips it and writes `pass_config`.
pub fn emit_backend_output(
    module: &Module,
    action: BackendAction,
    pass_config: &[String],
    sink: &mut dyn Write,
) -> Result<BackendReport> {
    let listing = action.runs_codegen().then(|| codegen::generate(module));
    let bytes: Vec<u8> = match action {
        BackendAction::EmitAssembly => listing
            .as_ref()
            .map(|l| l.render().into_bytes())
            .unwrap_or_default(),
        BackendAction::EmitBitcode => bitcode::encode(module),
        BackendAction::EmitIrText => module.to_text().into_bytes(),
        BackendAction::EmitNothing | BackendAction::EmitCodegenOnly => Vec::new(),
        BackendAction::EmitObject => build_container(module)?.to_vec(),
        BackendAction::EmitPassConfig => pass_configuration(pass_config).into_bytes(),
    };
    sink.write_all(&bytes)?;
    sink.flush()?;

    if let Some(listing) = &listing {
        debug!(
            "backend {action}: generated {} machine instructions",
            listing.instruction_count()
        );
    }
    Ok(BackendReport {
        action,
        codegen_ran: listing.is_some(),
        bytes_written: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{CONTAINER_MAGIC, Container};
    use crate::Blob;

    const IR: &str = "\
target ps_6_0
entry @main

define float4 @main() {
  ret 0
}
";

    fn emit(action: BackendAction, passes: &[String]) -> (BackendReport, Vec<u8>) {
        let module = Module::parse(IR).unwrap();
        let mut out = Vec::new();
        let report = emit_backend_output(&module, action, passes, &mut out).unwrap();
        (report, out)
    }

    #[test]
    fn test_emit_nothing_runs_codegen() {
        let (report, out) = emit(BackendAction::EmitNothing, &[]);
        assert!(report.codegen_ran);
        assert_eq!(report.bytes_written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_pass_config_skips_codegen() {
        let passes = vec!["-simplifycfg".to_string(), "-dce".to_string()];
        let (report, out) = emit(BackendAction::EmitPassConfig, &passes);
        assert!(!report.codegen_ran);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "; pass configuration\n-simplifycfg\n-dce\n"
        );
        let (_, out) = emit(BackendAction::EmitPassConfig, &[]);
        assert_eq!(out, b"; no passes configured\n");
    }

    #[test]
    fn test_object_is_container() {
        let (report, out) = emit(BackendAction::EmitObject, &[]);
        assert!(report.codegen_ran);
        assert!(out.starts_with(&CONTAINER_MAGIC));
        assert!(Container::load(&Blob::from_vec(out)).is_ok());
    }

    #[test]
    fn test_text_actions() {
        let (_, out) = emit(BackendAction::EmitIrText, &[]);
        assert_eq!(String::from_utf8(out).unwrap(), IR);
        let (report, out) = emit(BackendAction::EmitBitcode, &[]);
        assert!(!report.codegen_ran);
        assert!(bitcode::is_bitcode(&out));
        let (report, out) = emit(BackendAction::EmitAssembly, &[]);
        assert!(report.codegen_ran);
        assert!(!out.is_empty());
    }
}
