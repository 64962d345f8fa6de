//! Compilation driver
//!
//! [`Compiler`] runs preprocess, front end, optimizer, back end and
//! container finalization for one source, reporting through an
//! [`OperationResult`]. [`CompileBuilder`] and [`compile`] wrap it for the
//! common case of compiling text.

use crate::container::{self, Container};
use crate::include::{IncludeResolver, ResolverLoader};
use crate::optimizer::optimize_module;
use crate::result::{OperationResult, diagnostics_blob};
use crate::validator::check_container;
use crate::{
    Blob, EncodedBlob, Error, HResult, Result, ShaderTarget, StripFlags, VersionInfo,
    backend::emit_backend_output, disassemble::disassemble, strip::strip_parts,
};
use dxcompiler::preprocess::{self, IncludeLoader};
use dxcompiler::{BackendAction, CompileOptions, Diagnostic, Diagnostics, Stage, frontend};
use log::{debug, warn};

/// Source name used when the caller gives none
pub const DEFAULT_SOURCE_NAME: &str = "hlsl.hlsl";

/// A preprocessor macro definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    /// Macro name
    pub name: String,
    /// Replacement text, `None` defines the macro as `1`
    pub value: Option<String>,
}

impl Define {
    /// Creates a new preprocessor define
    ///
    /// # Example
    /// ```
    /// use dxcrs::Define;
    /// let define = Define::new("DEBUG", "1");
    /// ```
    pub fn new(name: &str, value: &str) -> Self {
        Define {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Creates a define without a value
    pub fn flag(name: &str) -> Self {
        Define {
            name: name.to_string(),
            value: None,
        }
    }
}

/// Status of a failed step; its diagnostics are already recorded
type Outcome<T> = std::result::Result<T, HResult>;

/// Records `err` as a diagnostic of `stage` and returns its status
fn report(diagnostics: &mut Diagnostics, stage: Stage, err: &Error) -> HResult {
    let message = match err {
        Error::Optimization { message, .. } => message.clone(),
        other => other.to_string(),
    };
    diagnostics.push(Diagnostic::error(stage, message));
    err.hresult()
}

fn finish(outcome: Outcome<Blob>, diagnostics: &Diagnostics) -> OperationResult {
    match outcome {
        Ok(blob) => OperationResult::success(blob, diagnostics_blob(diagnostics)),
        Err(status) => OperationResult::failure(status, diagnostics_blob(diagnostics)),
    }
}

fn parse_arguments<S: AsRef<str>>(arguments: &[S], diagnostics: &mut Diagnostics) -> Outcome<CompileOptions> {
    CompileOptions::parse(arguments).map_err(|d| {
        diagnostics.push(d);
        HResult::E_CONFIGURATION
    })
}

fn apply_warning_policy(options: &CompileOptions, diagnostics: &mut Diagnostics) {
    if options.suppress_warnings {
        diagnostics.drop_warnings();
    } else if options.warnings_are_errors {
        diagnostics.promote_warnings();
    }
}

/// Runs the preprocessor, returning the expanded text
fn expand(
    source: &EncodedBlob,
    source_name: &str,
    options: &CompileOptions,
    defines: &[Define],
    include: Option<&mut dyn IncludeResolver>,
    diagnostics: &mut Diagnostics,
) -> Outcome<String> {
    let text = source
        .to_text()
        .map_err(|err| report(diagnostics, Stage::Preprocess, &err))?;

    if let Some(bad) = defines.iter().find(|d| d.name.trim().is_empty()) {
        let err = Error::InvalidParameter(format!("define with empty name (value {:?})", bad.value));
        return Err(report(diagnostics, Stage::Preprocess, &err));
    }
    let all_defines: Vec<(String, Option<String>)> = options
        .defines
        .iter()
        .cloned()
        .chain(defines.iter().map(|d| (d.name.clone(), d.value.clone())))
        .collect();

    let mut loader = include.map(ResolverLoader::new);
    let loader = loader.as_mut().map(|l| l as &mut dyn IncludeLoader);
    match preprocess::preprocess(&text, source_name, &all_defines, loader) {
        Ok(output) => {
            diagnostics.append(output.diagnostics);
            Ok(output.text)
        }
        Err(err) => {
            warn!("include '{}' could not be read: {}", err.name, err.source);
            diagnostics.append(err.diagnostics);
            Err(HResult::E_IO)
        }
    }
}

/// Returns true for names the front end accepts as an entry point
fn is_identifier(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compiler service
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler;

impl Compiler {
    /// Creates the service
    pub fn new() -> Self {
        Compiler
    }

    /// Compiles `source` for `target_profile`.
    ///
    /// An unknown profile, a malformed entry point name or an unknown
    /// argument fails with `E_CONFIGURATION`; syntax and semantic errors fail
    /// with `E_SOURCE`; an include resolver I/O failure stops compilation
    /// with `E_IO`. Warnings accompany a successful result.
    #[allow(clippy::too_many_arguments)]
    pub fn compile<S: AsRef<str>>(
        &self,
        source: &EncodedBlob,
        source_name: Option<&str>,
        entry_point: &str,
        target_profile: &str,
        arguments: &[S],
        defines: &[Define],
        include: Option<&mut dyn IncludeResolver>,
    ) -> OperationResult {
        let source_name = source_name.unwrap_or(DEFAULT_SOURCE_NAME);
        let mut diagnostics = Diagnostics::new();
        let outcome = compile_source(
            source,
            source_name,
            entry_point,
            target_profile,
            arguments,
            defines,
            include,
            &mut diagnostics,
        );
        match &outcome {
            Ok(blob) => debug!("compiled {source_name}: {} bytes", blob.len()),
            Err(status) => debug!("compiling {source_name} failed with {status}"),
        }
        finish(outcome, &diagnostics)
    }

    /// Expands macros and includes without compiling.
    ///
    /// The result blob is the expanded text. Only `-D` style arguments and
    /// the warning switches affect the output.
    pub fn preprocess<S: AsRef<str>>(
        &self,
        source: &EncodedBlob,
        source_name: Option<&str>,
        arguments: &[S],
        defines: &[Define],
        include: Option<&mut dyn IncludeResolver>,
    ) -> OperationResult {
        let source_name = source_name.unwrap_or(DEFAULT_SOURCE_NAME);
        let mut diagnostics = Diagnostics::new();
        let outcome = parse_arguments(arguments, &mut diagnostics).and_then(|options| {
            let text = expand(source, source_name, &options, defines, include, &mut diagnostics)?;
            apply_warning_policy(&options, &mut diagnostics);
            if diagnostics.has_errors() {
                return Err(HResult::E_SOURCE);
            }
            Ok(Blob::from(text))
        });
        debug!("preprocessed {source_name}");
        finish(outcome, &diagnostics)
    }

    /// Renders a container, module bitcode or module text as readable text
    pub fn disassemble(&self, program: &Blob) -> Result<EncodedBlob> {
        disassemble(program)
    }

    /// Version of the compiler
    pub fn version(&self) -> VersionInfo {
        VersionInfo::current()
    }
}

#[allow(clippy::too_many_arguments)]
fn compile_source<S: AsRef<str>>(
    source: &EncodedBlob,
    source_name: &str,
    entry_point: &str,
    target_profile: &str,
    arguments: &[S],
    defines: &[Define],
    include: Option<&mut dyn IncludeResolver>,
    diagnostics: &mut Diagnostics,
) -> Outcome<Blob> {
    let options = parse_arguments(arguments, diagnostics)?;
    let target: ShaderTarget = target_profile
        .parse()
        .map_err(|err| report(diagnostics, Stage::Compile, &Error::Engine(err)))?;
    if !target.is_library() && !is_identifier(entry_point) {
        diagnostics.push(Diagnostic::error(
            Stage::Compile,
            format!("invalid entry point name '{entry_point}'"),
        ));
        return Err(HResult::E_CONFIGURATION);
    }
    debug!("compiling {source_name} for {target}, entry '{entry_point}'");

    let text = expand(source, source_name, &options, defines, include, diagnostics)?;
    let module = if diagnostics.has_errors() {
        None
    } else {
        frontend::compile(&text, source_name, entry_point, target, diagnostics)
    };
    apply_warning_policy(&options, diagnostics);
    let mut module = match module {
        Some(module) if !diagnostics.has_errors() => module,
        _ => return Err(HResult::E_SOURCE),
    };

    let pipeline = options.optimizer_pipeline();
    optimize_module(&mut module, &pipeline).map_err(|err| report(diagnostics, Stage::Optimize, &err))?;

    let mut output = Vec::new();
    let emitted = emit_backend_output(&module, options.action, &pipeline, &mut output)
        .map_err(|err| report(diagnostics, Stage::Assemble, &err))?;
    debug!("backend wrote {} bytes", emitted.bytes_written);
    let output = Blob::from_vec(output);
    if options.action != BackendAction::EmitObject {
        return Ok(output);
    }
    finalize_container(output, &options, diagnostics)
}

/// Validates and signs a fresh container, then applies the strip switches
fn finalize_container(
    bytecode: Blob,
    options: &CompileOptions,
    diagnostics: &mut Diagnostics,
) -> Outcome<Blob> {
    let mut bytecode = bytecode;
    if !options.skip_validation {
        let loaded =
            Container::load(&bytecode).map_err(|err| report(diagnostics, Stage::Validate, &err))?;
        let broken = check_container(&loaded);
        if !broken.is_empty() {
            diagnostics.extend(
                broken
                    .iter()
                    .map(|rule| Diagnostic::error(Stage::Validate, rule.to_string())),
            );
            return Err(HResult::E_VALIDATION);
        }
        bytecode =
            container::sign(&bytecode).map_err(|err| report(diagnostics, Stage::Validate, &err))?;
    }

    let mut strip = StripFlags::empty();
    strip.set(StripFlags::DEBUG_INFO, options.strip_debug);
    strip.set(StripFlags::REFLECTION_DATA, options.strip_reflection);
    if strip.is_empty() {
        return Ok(bytecode);
    }
    strip_parts(&bytecode, strip).map_err(|err| report(diagnostics, Stage::Container, &err))
}

/// Result of a successful shader compilation
#[derive(Debug)]
pub struct CompileResult {
    /// The compiled shader bytecode
    pub bytecode: Blob,
    /// Any warning messages from the compiler (if present)
    pub warnings: Option<String>,
}

/// Builder for shader compilation with fluent API
///
/// # Example
/// ```
/// use dxcrs::{CompileBuilder, ShaderTarget};
///
/// let source = "float4 main() : SV_Target { return float4(1,0,0,1); }";
///
/// let result = CompileBuilder::new(source, "main", ShaderTarget::PS_6_0)
///     .source_name("my_shader.hlsl")
///     .define("DEBUG", "1")
///     .warnings_are_errors()
///     .optimization_level(3)
///     .compile()
///     .unwrap();
/// assert_eq!(&result.bytecode[0..4], b"DXBC");
/// ```
pub struct CompileBuilder<'a> {
    source: EncodedBlob,
    source_name: Option<String>,
    entry_point: String,
    target: ShaderTarget,
    defines: Vec<Define>,
    arguments: Vec<String>,
    include: Option<&'a mut dyn IncludeResolver>,
}

impl<'a> CompileBuilder<'a> {
    /// Creates a new compile builder with the required parameters.
    ///
    /// # Arguments
    /// * `source` - The HLSL source code
    /// * `entry_point` - The name of the entry point function (e.g., "main")
    /// * `target` - The shader target (e.g., `ShaderTarget::PS_6_0`)
    pub fn new(source: &str, entry_point: &str, target: ShaderTarget) -> Self {
        Self::from_blob(EncodedBlob::from_text(source), entry_point, target)
    }

    /// Creates a compile builder from raw bytes of unknown encoding.
    pub fn from_bytes(source: &[u8], entry_point: &str, target: ShaderTarget) -> Self {
        Self::from_blob(EncodedBlob::new(Blob::from(source), None), entry_point, target)
    }

    /// Creates a compile builder from an encoded blob.
    pub fn from_blob(source: EncodedBlob, entry_point: &str, target: ShaderTarget) -> Self {
        CompileBuilder {
            source,
            source_name: None,
            entry_point: entry_point.to_string(),
            target,
            defines: Vec::new(),
            arguments: Vec::new(),
            include: None,
        }
    }

    /// Sets the source file name (used in error messages).
    pub fn source_name(mut self, name: &str) -> Self {
        self.source_name = Some(name.to_string());
        self
    }

    /// Adds a preprocessor define.
    pub fn define(mut self, name: &str, value: &str) -> Self {
        self.defines.push(Define::new(name, value));
        self
    }

    /// Adds a preprocessor define without a value.
    pub fn define_flag(mut self, name: &str) -> Self {
        self.defines.push(Define::flag(name));
        self
    }

    /// Adds multiple preprocessor defines from an iterator.
    pub fn defines<I>(mut self, defines: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in defines {
            self.defines.push(Define::new(name, value));
        }
        self
    }

    /// Adds a pre-built Define.
    pub fn with_define(mut self, define: Define) -> Self {
        self.defines.push(define);
        self
    }

    /// Appends a front-end argument such as `-Qstrip_reflect`.
    pub fn argument(mut self, argument: &str) -> Self {
        self.arguments.push(argument.to_string());
        self
    }

    /// Appends several front-end arguments.
    pub fn arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Keeps debug information (`-Zi`).
    pub fn debug(self) -> Self {
        self.argument("-Zi")
    }

    /// Skips optimization (`-Od`).
    pub fn skip_optimization(self) -> Self {
        self.argument("-Od")
    }

    /// Skips validation and signing (`-Vd`).
    pub fn skip_validation(self) -> Self {
        self.argument("-Vd")
    }

    /// Treats warnings as errors (`-WX`).
    pub fn warnings_are_errors(self) -> Self {
        self.argument("-WX")
    }

    /// Sets the optimization level (0-3).
    ///
    /// * Level 0: No optimization
    /// * Level 1: Control flow simplification only
    /// * Level 2 and 3: Full optimization (default)
    pub fn optimization_level(self, level: u8) -> Self {
        let argument = format!("-O{}", level.min(3));
        self.argument(&argument)
    }

    /// Selects what the back end writes.
    pub fn emit(self, action: BackendAction) -> Self {
        let argument = format!("-emit-{}", action.name());
        self.argument(&argument)
    }

    /// Sets the include resolver.
    pub fn include_handler(mut self, include: &'a mut dyn IncludeResolver) -> Self {
        self.include = Some(include);
        self
    }

    /// Compiles the shader.
    ///
    /// Returns the compiled bytecode and any warning messages.
    pub fn compile(self) -> Result<CompileResult> {
        let result = Compiler::new().compile(
            &self.source,
            self.source_name.as_deref(),
            &self.entry_point,
            &self.target.to_string(),
            &self.arguments,
            &self.defines,
            self.include,
        );
        let warnings = Some(result.diagnostics_text()).filter(|s| !s.is_empty());
        let bytecode = result.into_result(|hresult, message| Error::Compilation { hresult, message })?;
        Ok(CompileResult { bytecode, warnings })
    }
}

/// Convenience function for simple shader compilation.
///
/// # Example
/// ```
/// use dxcrs::{compile, ShaderTarget};
///
/// let source = "float4 main() : SV_Target { return float4(1,0,0,1); }";
/// let bytecode = compile(source, "main", ShaderTarget::PS_6_0).unwrap();
/// assert!(!bytecode.is_empty());
/// ```
pub fn compile(source: &str, entry_point: &str, target: ShaderTarget) -> Result<Blob> {
    CompileBuilder::new(source, entry_point, target)
        .compile()
        .map(|r| r.bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryInclude, PartKind};

    const SIMPLE_PS: &str = "float4 main() : SV_Target { return float4(1,0,0,1); }";

    fn run(source: &str, profile: &str, arguments: &[&str]) -> OperationResult {
        Compiler::new().compile(
            &EncodedBlob::from_text(source),
            Some("shader.hlsl"),
            "main",
            profile,
            arguments,
            &[],
            None,
        )
    }

    #[test]
    fn test_compile_simple_shader() {
        let result = run(SIMPLE_PS, "ps_6_0", &[]);
        assert!(result.is_success(), "{}", result.diagnostics_text());
        let container = Container::load(result.result().unwrap()).unwrap();
        assert!(container.find_first_part_kind(PartKind::DXIL).is_some());
        assert!(container.digest_matches());
        assert!(container.is_signed());
    }

    #[test]
    fn test_compile_with_defines() {
        let source = r#"
            #ifdef USE_RED
            float4 main() : SV_Target { return float4(1,0,0,1); }
            #else
            float4 main() : SV_Target { return undefined_color; }
            #endif
        "#;

        let result = CompileBuilder::new(source, "main", ShaderTarget::PS_6_0)
            .define("USE_RED", "1")
            .compile();
        assert!(result.is_ok());
        assert!(compile(source, "main", ShaderTarget::PS_6_0).is_err());
    }

    #[test]
    fn test_compile_error() {
        let result = run("float4 main() : SV_Target { return undefined_variable; }", "ps_6_0", &[]);
        assert_eq!(result.status(), HResult::E_SOURCE);
        assert!(result.result().is_none());
        assert!(result.diagnostics_text().contains("undeclared identifier 'undefined_variable'"));
    }

    #[test]
    fn test_unknown_profile() {
        let result = run(SIMPLE_PS, "ps_9_9", &[]);
        assert_eq!(result.status(), HResult::E_CONFIGURATION);
        assert!(result.diagnostics_text().contains("unknown target profile 'ps_9_9'"));
    }

    #[test]
    fn test_unknown_argument() {
        let result = run(SIMPLE_PS, "ps_6_0", &["-Gfa"]);
        assert_eq!(result.status(), HResult::E_CONFIGURATION);
    }

    #[test]
    fn test_invalid_entry_point() {
        let result = Compiler::new().compile(
            &EncodedBlob::from_text(SIMPLE_PS),
            None,
            "",
            "ps_6_0",
            &[] as &[&str],
            &[],
            None,
        );
        assert_eq!(result.status(), HResult::E_CONFIGURATION);
    }

    #[test]
    fn test_warnings_policy() {
        let source = format!("#pragma message(\"hello\")\n{SIMPLE_PS}");
        let result = run(&source, "ps_6_0", &[]);
        assert!(result.is_success());
        assert!(result.diagnostics_text().contains("warning: hello"));

        let result = run(&source, "ps_6_0", &["-WX"]);
        assert_eq!(result.status(), HResult::E_SOURCE);
        assert!(result.diagnostics_text().contains("error: hello"));

        let result = run(&source, "ps_6_0", &["-no-warnings"]);
        assert!(result.diagnostics().is_none());
    }

    #[test]
    fn test_include_through_resolver() {
        let mut files = MemoryInclude::new().with_file("color.h", b"#define COLOR float4(0, 1, 0, 1)\n");
        let result = Compiler::new().compile(
            &EncodedBlob::from_text("#include \"color.h\"\nfloat4 main() : SV_Target { return COLOR; }"),
            None,
            "main",
            "ps_6_0",
            &[] as &[&str],
            &[],
            Some(&mut files),
        );
        assert!(result.is_success(), "{}", result.diagnostics_text());
    }

    struct DeniedInclude;

    impl IncludeResolver for DeniedInclude {
        fn load(&mut self, _filename: &str) -> Result<Option<EncodedBlob>> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[test]
    fn test_include_read_failure_aborts() {
        let result = Compiler::new().compile(
            &EncodedBlob::from_text("#include \"x.h\"\nfloat4 main() : SV_Target { return 0; }"),
            None,
            "main",
            "ps_6_0",
            &[] as &[&str],
            &[],
            Some(&mut DeniedInclude),
        );
        assert_eq!(result.status(), HResult::E_IO);
        assert!(result.result().is_none());
        let text = result.diagnostics_text();
        assert!(text.contains("cannot read 'x.h'"), "{text}");
    }

    #[test]
    fn test_missing_semicolon_before_keyword() {
        let result = run("float4 main() : SV_Target { float x = 1 return 0; }", "ps_6_0", &[]);
        assert_eq!(result.status(), HResult::E_SOURCE);
        assert!(result.result().is_none());
        let text = result.diagnostics_text();
        assert!(text.contains("shader.hlsl:1:41: error: expected ';', found 'return'"), "{text}");
        assert!(!text.contains("undeclared identifier"), "{text}");
    }

    #[test]
    fn test_emit_actions() {
        let ir = run(SIMPLE_PS, "ps_6_0", &["-emit-ll"]);
        let text = ir.result().unwrap().as_str().unwrap().to_string();
        assert!(text.contains("define float4 @main()"), "{text}");

        let passes = run(SIMPLE_PS, "ps_6_0", &["-O1", "-emit-passes"]);
        assert_eq!(
            passes.result().unwrap().as_str().unwrap(),
            "; pass configuration\n-simplifycfg\n-strip-debug\n"
        );

        let nothing = run(SIMPLE_PS, "ps_6_0", &["-emit-none"]);
        assert!(nothing.is_success());
        assert!(nothing.result().unwrap().is_empty());
    }

    #[test]
    fn test_debug_info_and_strip() {
        let result = run(SIMPLE_PS, "ps_6_0", &["-Zi"]);
        let container = Container::load(result.result().unwrap()).unwrap();
        assert!(container.find_first_part_kind(PartKind::ILDB).is_some());

        let result = run(SIMPLE_PS, "ps_6_0", &["-Zi", "-Qstrip_debug", "-Qstrip_reflect"]);
        let container = Container::load(result.result().unwrap()).unwrap();
        assert_eq!(container.find_first_part_kind(PartKind::ILDB), None);
        assert_eq!(container.find_first_part_kind(PartKind::STAT), None);
        assert!(container.digest_matches());
    }

    #[test]
    fn test_skip_validation_leaves_unsigned() {
        let result = run(SIMPLE_PS, "ps_6_0", &["-Vd"]);
        let container = Container::load(result.result().unwrap()).unwrap();
        assert!(!container.is_signed());
    }

    #[test]
    fn test_preprocess() {
        let result = Compiler::new().preprocess(
            &EncodedBlob::from_text("#define PI 3.14159\nfloat x = PI;\n"),
            None,
            &["-DEXTRA=2"],
            &[Define::flag("FLAG")],
            None,
        );
        let text = result.result().unwrap().as_str().unwrap().to_string();
        assert!(text.contains("float x = 3.14159;"), "{text}");
        assert!(!text.contains("#define PI"));
    }

    #[test]
    fn test_version() {
        let version = Compiler::new().version();
        assert_eq!(version.major, 0);
        assert_eq!(version.minor, 1);
    }
}
