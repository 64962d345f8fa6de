//! Optimizer pass catalog and pipeline runner
//!
//! Passes are named by option strings such as `-simplifycfg` or
//! `-print-module,banner=after dce`. A run parses every option before the
//! first pass executes, so an unknown pass or argument never leaves a
//! partially optimized module behind.

use crate::assembler::{decode_module, module_from_container};
use crate::container::{CONTAINER_MAGIC, Container};
use crate::result::{OperationResult, diagnostics_blob};
use crate::{Blob, EncodedBlob, Error, HResult, Result};
use dxcompiler::{Diagnostic, Diagnostics, Module, Stage, bitcode, transform};
use dxcompiler_proc::pass_catalog;
use log::{debug, trace};

/// A declared argument of an optimizer pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassArg {
    /// Argument name as written in `name=value`
    pub name: &'static str,
    /// What the argument controls
    pub description: &'static str,
}

/// An entry of the optimizer's pass catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerPass {
    /// Option name without the leading '-'
    pub option_name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Declared arguments
    pub args: &'static [PassArg],
}

impl OptimizerPass {
    /// Number of declared arguments
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Name of the argument at `index`
    pub fn arg_name(&self, index: usize) -> Result<&'static str> {
        self.arg(index).map(|a| a.name)
    }

    /// Description of the argument at `index`
    pub fn arg_description(&self, index: usize) -> Result<&'static str> {
        self.arg(index).map(|a| a.description)
    }

    fn arg(&self, index: usize) -> Result<&PassArg> {
        self.args.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.args.len(),
        })
    }
}

pass_catalog! {
    SimplifyCfg = "simplifycfg": "Remove empty blocks and code after unconditional exits";
    DeadCodeElimination = "dce": "Remove instructions whose results are never used";
    GlobalDce = "globaldce": "Remove functions the entry point never reaches";
    RemoveUnusedResources = "dxil-remove-unused-resources": "Remove resources no function references";
    StripDebug = "strip-debug": "Remove debug locations";
    PrintModule = "print-module": "Append the module text to the output text" {
        banner: "Line written before the module text",
    };
}

/// A parsed pipeline entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassInvocation {
    /// Pass to run
    pub pass: PassId,
    /// `name=value` arguments in the order given
    pub args: Vec<(String, String)>,
}

impl PassInvocation {
    /// Parses `-name[,arg=value]*`; the leading '-' is optional
    pub fn parse(option: &str) -> Result<Self> {
        let mut pieces = option.split(',');
        let name = pieces.next().unwrap_or_default().trim();
        let name = name.strip_prefix('-').unwrap_or(name);
        let pass = PassId::from_option_name(name).ok_or_else(|| configuration(format!(
            "unknown optimizer pass '{option}'"
        )))?;

        let descriptor = pass.descriptor();
        let args = pieces
            .map(|piece| {
                let (arg, value) = piece.split_once('=').ok_or_else(|| {
                    configuration(format!(
                        "malformed argument '{piece}' for pass '-{name}', expected name=value"
                    ))
                })?;
                let arg = arg.trim();
                if !descriptor.args.iter().any(|a| a.name == arg) {
                    return Err(configuration(format!("pass '-{name}' has no argument '{arg}'")));
                }
                Ok((arg.to_string(), value.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PassInvocation { pass, args })
    }

    /// Value of argument `name`, the last one given wins
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn configuration(message: String) -> Error {
    Error::Optimization {
        hresult: HResult::E_CONFIGURATION,
        message,
    }
}

/// Parses every pipeline option, failing on the first bad one
pub fn parse_pipeline<S: AsRef<str>>(options: &[S]) -> Result<Vec<PassInvocation>> {
    options
        .iter()
        .map(|o| PassInvocation::parse(o.as_ref()))
        .collect()
}

/// Applies `passes` to `module` left to right, appending any printed text
/// to `text`.
///
/// The module is re-verified after every pass; the first failure stops the
/// run.
pub fn apply_pipeline(module: &mut Module, passes: &[PassInvocation], text: &mut String) -> Result<()> {
    for invocation in passes {
        let pass = invocation.pass;
        let changed = match pass {
            PassId::SimplifyCfg => transform::simplify_cfg(module),
            PassId::DeadCodeElimination => transform::eliminate_dead_code(module),
            PassId::GlobalDce => transform::eliminate_dead_globals(module),
            PassId::RemoveUnusedResources => transform::remove_unused_resources(module),
            PassId::StripDebug => transform::strip_debug(module),
            PassId::PrintModule => {
                if let Some(banner) = invocation.arg("banner") {
                    text.push_str(banner);
                    text.push('\n');
                }
                text.push_str(&module.to_text());
                false
            }
        };
        trace!("pass -{} changed={changed}", pass.option_name());
        module.verify().map_err(|err| Error::Optimization {
            hresult: HResult::E_FORMAT,
            message: format!("module is invalid after pass '-{}': {err}", pass.option_name()),
        })?;
    }
    Ok(())
}

/// Runs option strings over a module, returning the printed text
pub fn optimize_module<S: AsRef<str>>(module: &mut Module, options: &[S]) -> Result<String> {
    let passes = parse_pipeline(options)?;
    let mut text = String::new();
    apply_pipeline(module, &passes, &mut text)?;
    Ok(text)
}

/// Form of an optimizer input, reused for its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleForm {
    Text,
    Bitcode,
}

fn read_input(input: &Blob) -> Result<(Module, ModuleForm)> {
    let bytes = input.as_bytes();
    if bytes.starts_with(&CONTAINER_MAGIC) {
        let module = module_from_container(&Container::load(input)?)?;
        return Ok((module, ModuleForm::Bitcode));
    }
    let form = if bitcode::is_bitcode(bytes) {
        ModuleForm::Bitcode
    } else {
        ModuleForm::Text
    };
    Ok((decode_module(bytes)?, form))
}

/// Outcome of an optimizer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerRun {
    /// Output module on success, diagnostics on failure
    pub result: OperationResult,
    /// Text printed by passes, kept even when a later pass failed
    pub text: Option<EncodedBlob>,
}

/// Optimizer service
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer;

impl Optimizer {
    /// Creates the service
    pub fn new() -> Self {
        Optimizer
    }

    /// Every pass in registration order
    pub fn available_passes(&self) -> &'static [OptimizerPass] {
        &PASS_CATALOG
    }

    /// Number of catalog passes
    pub fn available_pass_count(&self) -> usize {
        PASS_CATALOG.len()
    }

    /// Catalog pass at `index`
    pub fn available_pass(&self, index: usize) -> Result<&'static OptimizerPass> {
        PASS_CATALOG.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: PASS_CATALOG.len(),
        })
    }

    /// Runs `options` over `module`.
    ///
    /// `module` may be module text, bitcode or a container; text and bitcode
    /// come back in the same form, a container's program comes back as
    /// bitcode.
    pub fn run<S: AsRef<str>>(&self, module: &Blob, options: &[S]) -> OptimizerRun {
        let passes = match parse_pipeline(options) {
            Ok(passes) => passes,
            Err(err) => return failed_run(&err, String::new()),
        };
        let (mut module, form) = match read_input(module) {
            Ok(input) => input,
            Err(err) => return failed_run(&err, String::new()),
        };
        debug!("running {} optimizer passes", passes.len());

        let mut text = String::new();
        if let Err(err) = apply_pipeline(&mut module, &passes, &mut text) {
            return failed_run(&err, text);
        }
        let output = match form {
            ModuleForm::Text => Blob::from(module.to_text()),
            ModuleForm::Bitcode => Blob::from_vec(bitcode::encode(&module)),
        };
        OptimizerRun {
            result: OperationResult::success(output, None),
            text: printed(text),
        }
    }
}

fn printed(text: String) -> Option<EncodedBlob> {
    (!text.is_empty()).then(|| EncodedBlob::from_text(text))
}

fn failed_run(err: &Error, text: String) -> OptimizerRun {
    let message = match err {
        Error::Optimization { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let diagnostics = Diagnostics::from(Diagnostic::error(Stage::Optimize, message));
    OptimizerRun {
        result: OperationResult::failure(err.hresult(), diagnostics_blob(&diagnostics)),
        text: printed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IR: &str = "\
target ps_6_0
entry @main
resource srv Texture2D<float4> @unused space=0 slot=0 count=1 kind=2 dim=4 ret=5

define float @helper() {
  ret 1
}

define float4 @main() {
  %x = let float 2
  ret 0 !dbg 3:5
}
";

    fn run(options: &[&str]) -> OptimizerRun {
        Optimizer::new().run(&Blob::from(IR), options)
    }

    fn output(run: &OptimizerRun) -> Module {
        decode_module(run.result.result().unwrap()).unwrap()
    }

    #[test]
    fn test_catalog_order() {
        let names: Vec<_> = Optimizer::new()
            .available_passes()
            .iter()
            .map(|p| p.option_name)
            .collect();
        assert_eq!(
            names,
            [
                "simplifycfg",
                "dce",
                "globaldce",
                "dxil-remove-unused-resources",
                "strip-debug",
                "print-module"
            ]
        );
        let print = Optimizer::new().available_pass(5).unwrap();
        assert_eq!(print.arg_count(), 1);
        assert_eq!(print.arg_name(0).unwrap(), "banner");
        assert!(print.arg_name(1).is_err());
        assert!(Optimizer::new().available_pass(6).is_err());
    }

    #[test]
    fn test_passes_apply_in_order() {
        let result = run(&["-dce", "-globaldce", "-dxil-remove-unused-resources", "-strip-debug"]);
        assert!(result.result.is_success(), "{}", result.result.diagnostics_text());
        let module = output(&result);
        assert!(module.function("helper").is_none());
        assert!(module.resources.is_empty());
        assert!(!module.has_debug_info());
        assert_eq!(module.instruction_count(), 1);
        assert!(result.text.is_none());
    }

    #[test]
    fn test_composition() {
        let both = run(&["-dce", "-strip-debug"]);
        let first = run(&["-dce"]);
        let second = Optimizer::new().run(first.result.result().unwrap(), &["-strip-debug"]);
        assert_eq!(both.result.result(), second.result.result());
    }

    #[test]
    fn test_unknown_pass_is_atomic() {
        let result = run(&["-dce", "-inline"]);
        assert_eq!(result.result.status(), HResult::E_CONFIGURATION);
        assert!(result.result.result().is_none());
        assert!(result.result.diagnostics_text().contains("unknown optimizer pass '-inline'"));
    }

    #[test]
    fn test_argument_checks() {
        assert!(PassInvocation::parse("print-module,banner=x").is_ok());
        assert!(PassInvocation::parse("-print-module,color=red").is_err());
        assert!(PassInvocation::parse("-print-module,banner").is_err());
        assert!(PassInvocation::parse("-dce,banner=x").is_err());
    }

    #[test]
    fn test_print_module() {
        let result = run(&["-print-module,banner=before", "-dce", "-print-module"]);
        let text = result.text.unwrap().to_text().unwrap();
        assert!(text.starts_with("before\ntarget ps_6_0\n"), "{text}");
        assert_eq!(text.matches("define float4 @main()").count(), 2);
        assert_eq!(text.matches("%x = let").count(), 1);
    }

    #[test]
    fn test_bitcode_stays_bitcode() {
        let module = Module::parse(IR).unwrap();
        let input = Blob::from_vec(bitcode::encode(&module));
        let result = Optimizer::new().run(&input, &["-strip-debug"]);
        assert!(bitcode::is_bitcode(result.result.result().unwrap()));
    }

    #[test]
    fn test_malformed_input() {
        let result = Optimizer::new().run(&Blob::from("garbage"), &["-dce"]);
        assert_eq!(result.result.status(), HResult::E_FORMAT);
    }
}
