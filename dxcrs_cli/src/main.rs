//! Shader compilation driver CLI

use clap::{Parser, Subcommand, ValueEnum};
use dxcrs::{
    Assembler, Blob, BlobPart, Compiler, Container, Define, DisassembleBuilder, EncodedBlob,
    FileSystemInclude, OperationResult, Optimizer, PreprocessBuilder, ReflectionCapability,
    ShaderReflection, StripFlags, ValidatorFlags, Validator, get_blob_part, set_blob_part,
    strip_parts,
};
use log::debug;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dxcrs")]
#[command(about = "Shader compilation driver", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile HLSL shader to a container
    Compile {
        /// Input HLSL file
        input: PathBuf,

        /// Entry point function name
        #[arg(short = 'E', long, default_value = "main")]
        entry: String,

        /// Target profile (e.g., vs_6_0, ps_6_0, lib_6_3)
        #[arg(short = 'T', long)]
        target: String,

        /// Output file (default: <input>.dxbc)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optimization level 0-3
        #[arg(short = 'O', long, default_value = "3", value_parser = clap::value_parser!(u8).range(0..=3))]
        optimize: u8,

        /// Preprocessor defines (NAME=VALUE or NAME)
        #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
        defines: Vec<String>,

        /// Include search directories
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        includes: Vec<PathBuf>,

        /// Keep debug information
        #[arg(long)]
        debug: bool,

        /// Skip validation and signing
        #[arg(long)]
        skip_validation: bool,

        /// Treat warnings as errors
        #[arg(long)]
        warnings_as_errors: bool,

        /// Back-end output to produce
        #[arg(long, value_enum, default_value = "obj")]
        emit: Emit,

        /// Extra front-end arguments, passed through unchanged
        #[arg(last = true)]
        arguments: Vec<String>,
    },

    /// Preprocess HLSL source
    #[command(alias = "pp")]
    Preprocess {
        /// Input HLSL file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Preprocessor defines (NAME=VALUE or NAME)
        #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
        defines: Vec<String>,

        /// Include search directories
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        includes: Vec<PathBuf>,
    },

    /// Disassemble a container or module
    #[command(alias = "disassemble")]
    Disasm {
        /// Input container, bitcode or module text
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave out the code generation listing
        #[arg(long)]
        no_listing: bool,

        /// Show the debug program instead of the stripped one
        #[arg(long)]
        debug_program: bool,
    },

    /// Assemble module text or bitcode into a container
    Assemble {
        /// Input module
        input: PathBuf,

        /// Output file (default: <input>.dxbc)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a container
    Validate {
        /// Input container
        input: PathBuf,

        /// Write the signed container here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run optimizer passes over a module
    #[command(alias = "opt")]
    Optimize {
        /// Input module or container
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pass options in order, e.g. -simplifycfg -print-module,banner=after
        #[arg(last = true)]
        passes: Vec<String>,
    },

    /// List the optimizer pass catalog
    Passes,

    /// List the parts of a container
    Parts {
        /// Input container
        input: PathBuf,
    },

    /// Show shader reflection info
    Reflect {
        /// Input container
        input: PathBuf,
    },

    /// Strip debug info and/or reflection data from a container
    Strip {
        /// Input container
        input: PathBuf,

        /// Output file (default: <input>.stripped.dxbc)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep debug information (stripped by default)
        #[arg(long)]
        keep_debug: bool,

        /// Keep reflection data (stripped by default)
        #[arg(long)]
        keep_reflection: bool,

        /// Also strip private data
        #[arg(long)]
        private_data: bool,

        /// Also strip the root signature
        #[arg(long)]
        root_signature: bool,
    },

    /// Extract a part from a container
    Extract {
        /// Input container
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Part to extract
        #[arg(short, long, value_enum)]
        part: ExtractPart,
    },

    /// Inject private data or a root signature into a container
    Inject {
        /// Input container
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// File to inject
        #[arg(short, long)]
        data: PathBuf,

        /// Part to replace
        #[arg(short, long, value_enum, default_value = "private")]
        part: InjectPart,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Emit {
    #[value(name = "obj")]
    Object,
    #[value(name = "asm")]
    Assembly,
    #[value(name = "bc")]
    Bitcode,
    #[value(name = "ll")]
    IrText,
    #[value(name = "none")]
    Nothing,
    #[value(name = "codegen-only")]
    CodegenOnly,
    #[value(name = "passes")]
    PassConfig,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExtractPart {
    /// Input signature
    #[value(name = "input-sig")]
    InputSignature,
    /// Output signature
    #[value(name = "output-sig")]
    OutputSignature,
    /// Patch constant signature
    #[value(name = "patch-sig")]
    PatchConstantSignature,
    /// All signatures, as a container
    #[value(name = "all-sigs")]
    AllSignatures,
    /// Program with debug info
    #[value(name = "debug")]
    DebugInfo,
    /// Debug name
    #[value(name = "debug-name")]
    DebugName,
    /// Program
    #[value(name = "program")]
    Program,
    /// Pipeline state
    #[value(name = "pipeline-state")]
    PipelineState,
    /// Reflection summary
    #[value(name = "reflection")]
    ReflectionData,
    /// Private data
    #[value(name = "private")]
    PrivateData,
    /// Root signature
    #[value(name = "root-sig")]
    RootSignature,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum InjectPart {
    #[value(name = "private")]
    PrivateData,
    #[value(name = "root-sig")]
    RootSignature,
}

impl Emit {
    fn argument(self) -> &'static str {
        match self {
            Emit::Object => "-emit-obj",
            Emit::Assembly => "-emit-asm",
            Emit::Bitcode => "-emit-bc",
            Emit::IrText => "-emit-ll",
            Emit::Nothing => "-emit-none",
            Emit::CodegenOnly => "-emit-codegen-only",
            Emit::PassConfig => "-emit-passes",
        }
    }
}

impl From<ExtractPart> for BlobPart {
    fn from(p: ExtractPart) -> Self {
        match p {
            ExtractPart::InputSignature => BlobPart::InputSignature,
            ExtractPart::OutputSignature => BlobPart::OutputSignature,
            ExtractPart::PatchConstantSignature => BlobPart::PatchConstantSignature,
            ExtractPart::AllSignatures => BlobPart::AllSignatures,
            ExtractPart::DebugInfo => BlobPart::DebugInfo,
            ExtractPart::DebugName => BlobPart::DebugName,
            ExtractPart::Program => BlobPart::Program,
            ExtractPart::PipelineState => BlobPart::PipelineState,
            ExtractPart::ReflectionData => BlobPart::ReflectionData,
            ExtractPart::PrivateData => BlobPart::PrivateData,
            ExtractPart::RootSignature => BlobPart::RootSignature,
        }
    }
}

fn parse_define(s: &str) -> Define {
    match s.split_once('=') {
        Some((name, value)) => Define::new(name, value),
        None => Define::flag(s),
    }
}

fn mask_to_string(mask: u8) -> String {
    let s: String = ['x', 'y', 'z', 'w']
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, c)| *c)
        .collect();
    if s.is_empty() { "none".to_string() } else { s }
}

fn read_file(path: &Path) -> Result<Blob, String> {
    std::fs::read(path)
        .map(Blob::from_vec)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    std::fs::write(path, bytes).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

/// Writes to `output`, or stdout when none is given
fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<(), String> {
    match output {
        Some(path) => write_file(path, bytes),
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(bytes)
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Resolver searching the input's directory, then `dirs`
fn include_resolver(input: &Path, dirs: &[PathBuf]) -> FileSystemInclude {
    let mut resolver = FileSystemInclude::new();
    if let Some(parent) = input.parent().filter(|p| !p.as_os_str().is_empty()) {
        resolver.add_path(parent);
    }
    for dir in dirs {
        resolver.add_path(dir);
    }
    resolver
}

/// Prints diagnostics and turns a failed result into an error
fn finish(result: OperationResult, stage: &str) -> Result<Blob, String> {
    let diagnostics = result.diagnostics_text();
    let status = result.status();
    match result.into_parts() {
        (_, Some(blob), _) => {
            if !diagnostics.is_empty() {
                eprint!("{diagnostics}");
            }
            Ok(blob)
        }
        (_, None, _) => {
            eprint!("{diagnostics}");
            Err(format!("{stage} failed ({status})"))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn compile_shader(
    input: PathBuf,
    entry: String,
    target: String,
    output: Option<PathBuf>,
    optimize: u8,
    defines: Vec<String>,
    includes: Vec<PathBuf>,
    debug: bool,
    skip_validation: bool,
    warnings_as_errors: bool,
    emit: Emit,
    extra: Vec<String>,
) -> Result<(), String> {
    let output = output.unwrap_or_else(|| input.with_extension("dxbc"));
    let source = read_file(&input)?;

    let mut arguments = vec![format!("-O{optimize}"), emit.argument().to_string()];
    if debug {
        arguments.push("-Zi".to_string());
    }
    if skip_validation {
        arguments.push("-Vd".to_string());
    }
    if warnings_as_errors {
        arguments.push("-WX".to_string());
    }
    arguments.extend(extra);
    let defines: Vec<Define> = defines.iter().map(|d| parse_define(d)).collect();
    debug!("compile arguments: {arguments:?}");

    let mut resolver = include_resolver(&input, &includes);
    let result = Compiler::new().compile(
        &EncodedBlob::new(source, None),
        Some(&input.to_string_lossy()),
        &entry,
        &target,
        &arguments,
        &defines,
        Some(&mut resolver),
    );
    let blob = finish(result, "Compilation")?;

    write_file(&output, blob.as_bytes())?;
    eprintln!(
        "Compiled {} -> {} ({} bytes)",
        input.display(),
        output.display(),
        blob.len()
    );
    Ok(())
}

fn preprocess_shader(
    input: PathBuf,
    output: Option<PathBuf>,
    defines: Vec<String>,
    includes: Vec<PathBuf>,
) -> Result<(), String> {
    let source = read_file(&input)?;
    let mut resolver = include_resolver(&input, &includes);

    let mut builder = PreprocessBuilder::from_bytes(source.as_bytes())
        .source_name(&input.to_string_lossy())
        .include_handler(&mut resolver);
    for def in &defines {
        builder = builder.with_define(parse_define(def));
    }

    let result = builder.preprocess().map_err(|e| format!("{}", e))?;
    if let Some(warnings) = &result.warnings {
        eprint!("{}", warnings);
    }
    write_output(output.as_deref(), result.source.as_bytes())
}

fn disassemble_program(
    input: PathBuf,
    output: Option<PathBuf>,
    no_listing: bool,
    debug_program: bool,
) -> Result<(), String> {
    let program = read_file(&input)?;

    let mut builder = DisassembleBuilder::new(&program).comment(&input.to_string_lossy());
    if no_listing {
        builder = builder.without_listing();
    }
    if debug_program {
        builder = builder.prefer_debug_program();
    }
    let disasm = builder.disassemble().map_err(|e| format!("{}", e))?;
    write_output(output.as_deref(), disasm.as_bytes())
}

fn assemble_module(input: PathBuf, output: Option<PathBuf>) -> Result<(), String> {
    let output = output.unwrap_or_else(|| input.with_extension("dxbc"));
    let module = read_file(&input)?;
    let container = finish(Assembler::new().assemble_to_container(&module), "Assembly")?;
    write_file(&output, container.as_bytes())?;
    eprintln!(
        "Assembled {} -> {} ({} bytes)",
        input.display(),
        output.display(),
        container.len()
    );
    Ok(())
}

fn validate_container(input: PathBuf, output: Option<PathBuf>) -> Result<(), String> {
    let container = read_file(&input)?;
    let flags = if output.is_some() {
        ValidatorFlags::IN_PLACE_EDIT
    } else {
        ValidatorFlags::DEFAULT
    };
    let validated = finish(Validator::new().validate(&container, flags), "Validation")?;
    if let Some(output) = output {
        write_file(&output, validated.as_bytes())?;
        eprintln!("Signed {} -> {}", input.display(), output.display());
    } else {
        eprintln!("{} is valid", input.display());
    }
    Ok(())
}

fn optimize_program(input: PathBuf, output: Option<PathBuf>, passes: Vec<String>) -> Result<(), String> {
    let module = read_file(&input)?;
    let run = Optimizer::new().run(&module, &passes);
    if let Some(text) = &run.text {
        eprint!("{}", text.to_string_lossy());
    }
    let optimized = finish(run.result, "Optimization")?;
    write_output(output.as_deref(), optimized.as_bytes())
}

fn list_passes() -> Result<(), String> {
    let optimizer = Optimizer::new();
    println!("Optimizer passes ({}):", optimizer.available_pass_count());
    for pass in optimizer.available_passes() {
        println!("  -{:<30} {}", pass.option_name, pass.description);
        for arg in pass.args {
            println!("      {}=<value>  {}", arg.name, arg.description);
        }
    }
    Ok(())
}

fn list_parts(input: PathBuf) -> Result<(), String> {
    let blob = read_file(&input)?;
    let container = Container::load(&blob).map_err(|e| format!("{}", e))?;

    println!("Container {}:", input.display());
    println!("  Size: {} bytes", blob.len());
    if container.is_signed() {
        let digest: String = container.digest().iter().map(|b| format!("{b:02x}")).collect();
        let state = if container.digest_matches() { "valid" } else { "MISMATCH" };
        println!("  Digest: {} ({})", digest, state);
    } else {
        println!("  Digest: unsigned");
    }
    for (index, part) in container.parts().iter().enumerate() {
        let capabilities: Vec<String> = ReflectionCapability::supported_by(part.kind)
            .iter()
            .map(|c| format!("{c:?}"))
            .collect();
        println!(
            "  [{}] {} {} bytes {}",
            index,
            part.kind,
            part.content.len(),
            capabilities.join(", ")
        );
    }
    Ok(())
}

fn reflect_shader(input: PathBuf) -> Result<(), String> {
    let bytecode = read_file(&input)?;
    let reflection =
        ShaderReflection::new(&bytecode).map_err(|e| format!("Reflection failed: {}", e))?;
    let desc = reflection.desc();

    match (desc.shader_type(), desc.shader_model()) {
        (Some(kind), Some(model)) => println!("Shader: {}_{}", kind.prefix(), model),
        _ => println!("Shader: unknown (version {:#x})", desc.version),
    }
    println!("Creator: {}", desc.creator);
    if !reflection.entry_point().is_empty() {
        println!("Entry point: {}", reflection.entry_point());
    }
    println!("Instructions: {}", desc.instruction_count);
    println!("Temp registers: {}", desc.temp_register_count);
    println!("Functions: {}", desc.function_count);
    let (x, y, z) = reflection.thread_group_size();
    if x > 0 {
        println!("Thread group: {} x {} x {}", x, y, z);
    }
    println!();

    for (title, params) in [
        ("Input Parameters", reflection.input_parameters().collect::<Vec<_>>()),
        ("Output Parameters", reflection.output_parameters().collect::<Vec<_>>()),
    ] {
        if params.is_empty() {
            continue;
        }
        println!("{} ({}):", title, params.len());
        for param in params {
            let semantic_index = if param.semantic_index > 0 {
                format!("{}", param.semantic_index)
            } else {
                String::new()
            };
            println!(
                "  [{:2}] {}{}: {:?} {} ({:?})",
                param.register,
                param.semantic_name,
                semantic_index,
                param.component_type,
                mask_to_string(param.mask),
                param.system_value_type
            );
        }
        println!();
    }

    let bindings: Vec<_> = reflection.resource_bindings().collect();
    if !bindings.is_empty() {
        println!("Bound Resources ({}):", bindings.len());
        for binding in bindings {
            println!(
                "  [{}{}, space{}] {} ({:?}, count {})",
                binding.register_class,
                binding.bind_point,
                binding.space,
                binding.name,
                binding.resource_type,
                binding.bind_count
            );
        }
        println!();
    }

    let cbs: Vec<_> = reflection.constant_buffers().collect();
    if !cbs.is_empty() {
        println!("Constant Buffers ({}):", cbs.len());
        for (i, cb) in cbs.iter().enumerate() {
            println!("  [{}] {} (b{}, {} variables)", i, cb.name, cb.bind_point, cb.variables.len());
            for var in &cb.variables {
                println!("      {}", var);
            }
        }
        println!();
    }

    Ok(())
}

fn strip_container(
    input: PathBuf,
    output: Option<PathBuf>,
    keep_debug: bool,
    keep_reflection: bool,
    private_data: bool,
    root_signature: bool,
) -> Result<(), String> {
    let output = output.unwrap_or_else(|| {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        input.with_file_name(format!("{}.stripped.dxbc", stem))
    });
    let bytecode = read_file(&input)?;

    let mut flags = StripFlags::empty();
    if !keep_debug {
        flags |= StripFlags::DEBUG_INFO;
    }
    if !keep_reflection {
        flags |= StripFlags::REFLECTION_DATA;
    }
    if private_data {
        flags |= StripFlags::PRIVATE_DATA;
    }
    if root_signature {
        flags |= StripFlags::ROOT_SIGNATURE;
    }
    if flags.is_empty() {
        return Err("Nothing to strip (--keep-debug and --keep-reflection both specified)".into());
    }

    let stripped = strip_parts(&bytecode, flags).map_err(|e| format!("{}", e))?;
    write_file(&output, stripped.as_bytes())?;

    eprintln!(
        "Stripped {} -> {} ({} -> {} bytes, saved {})",
        input.display(),
        output.display(),
        bytecode.len(),
        stripped.len(),
        bytecode.len().saturating_sub(stripped.len())
    );
    Ok(())
}

fn extract_part(input: PathBuf, output: Option<PathBuf>, part: ExtractPart) -> Result<(), String> {
    let bytecode = read_file(&input)?;
    let blob = get_blob_part(&bytecode, part.into()).map_err(|e| format!("{}", e))?;
    write_output(output.as_deref(), blob.as_bytes())?;
    if let Some(output) = output {
        eprintln!("Extracted {} ({} bytes)", output.display(), blob.len());
    }
    Ok(())
}

fn inject_part(input: PathBuf, output: PathBuf, data: PathBuf, part: InjectPart) -> Result<(), String> {
    let bytecode = read_file(&input)?;
    let payload = read_file(&data)?;
    let part = match part {
        InjectPart::PrivateData => BlobPart::PrivateData,
        InjectPart::RootSignature => BlobPart::RootSignature,
    };

    let result = set_blob_part(&bytecode, part, payload.as_bytes()).map_err(|e| format!("{}", e))?;
    write_file(&output, result.as_bytes())?;

    eprintln!(
        "Injected {} bytes from {} into {} -> {}",
        payload.len(),
        data.display(),
        input.display(),
        output.display()
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            entry,
            target,
            output,
            optimize,
            defines,
            includes,
            debug,
            skip_validation,
            warnings_as_errors,
            emit,
            arguments,
        } => compile_shader(
            input,
            entry,
            target,
            output,
            optimize,
            defines,
            includes,
            debug,
            skip_validation,
            warnings_as_errors,
            emit,
            arguments,
        ),
        Commands::Preprocess {
            input,
            output,
            defines,
            includes,
        } => preprocess_shader(input, output, defines, includes),
        Commands::Disasm {
            input,
            output,
            no_listing,
            debug_program,
        } => disassemble_program(input, output, no_listing, debug_program),
        Commands::Assemble { input, output } => assemble_module(input, output),
        Commands::Validate { input, output } => validate_container(input, output),
        Commands::Optimize {
            input,
            output,
            passes,
        } => optimize_program(input, output, passes),
        Commands::Passes => list_passes(),
        Commands::Parts { input } => list_parts(input),
        Commands::Reflect { input } => reflect_shader(input),
        Commands::Strip {
            input,
            output,
            keep_debug,
            keep_reflection,
            private_data,
            root_signature,
        } => strip_container(
            input,
            output,
            keep_debug,
            keep_reflection,
            private_data,
            root_signature,
        ),
        Commands::Extract {
            input,
            output,
            part,
        } => extract_part(input, output, part),
        Commands::Inject {
            input,
            output,
            data,
            part,
        } => inject_part(input, output, data, part),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
