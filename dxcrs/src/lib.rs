//! Shader compilation driver
//!
//! This crate is the control surface over the `dxcompiler` engines: it
//! moves source and binaries around as [`Blob`]s, reports every stage
//! through an [`OperationResult`], and offers services to compile,
//! optimize, validate, assemble, disassemble and inspect shader
//! containers.
//!
//! # Example
//!
//! ```
//! use dxcrs::{compile, Container, PartKind, ShaderReflection, ShaderTarget};
//!
//! let source = r#"
//!     float4 main(float4 pos : SV_Position) : SV_Target {
//!         return pos;
//!     }
//! "#;
//!
//! // Compile a pixel shader
//! let bytecode = compile(source, "main", ShaderTarget::PS_6_0).unwrap();
//!
//! // Look inside the container
//! let container = Container::load(&bytecode).unwrap();
//! assert!(container.find_part(PartKind::DXIL).is_some());
//!
//! // Reflect on the compiled shader
//! let reflection = ShaderReflection::new(&bytecode).unwrap();
//! println!("Instructions: {}", reflection.desc().instruction_count);
//! ```

mod assembler;
mod backend;
mod blob;
mod blob_parts;
mod compile;
mod container;
mod disassemble;
mod error;
mod flags;
mod include;
mod library;
mod optimizer;
mod preprocess;
pub mod reflect;
mod result;
mod service;
mod strip;
mod validator;

pub use assembler::{Assembler, build_container, decode_module, module_from_container};
pub use backend::{BackendReport, emit_backend_output};
pub use blob::{Blob, CodePage, EncodedBlob};
pub use blob_parts::{
    BlobPart, get_blob_part, get_debug_info, get_input_signature, get_output_signature,
    get_private_data, set_blob_part,
};
pub use compile::{
    CompileBuilder, CompileResult, Compiler, DEFAULT_SOURCE_NAME, Define, compile,
};
pub use container::{
    CONTAINER_MAGIC, Container, ContainerBuilder, ContainerPart, PartKind, compute_digest, sign,
};
pub use disassemble::{DisassembleBuilder, disassemble};
pub use error::{Error, ErrorKind, HResult, Result};
pub use flags::{StripFlags, ValidatorFlags};
pub use include::{FileSystemInclude, IncludeResolver, MemoryInclude};
pub use library::Library;
pub use optimizer::{
    Optimizer, OptimizerPass, OptimizerRun, PASS_CATALOG, PassArg, PassId, PassInvocation,
    apply_pipeline, is_pass_option_name, optimize_module, parse_pipeline,
};
pub use preprocess::{PreprocessBuilder, PreprocessResult, preprocess};
pub use reflect::{ReflectionCapability, ReflectionView, ShaderReflection};
pub use result::OperationResult;
pub use service::{
    ContainerReflection, Service, ServiceKind, VersionInfo, create_instance,
    create_instance_by_clsid,
};
pub use strip::{strip_debug_info, strip_parts, strip_reflection_data};
pub use validator::{ValidationRule, Validator, check_container};

pub use dxcompiler::{BackendAction, ShaderModel, ShaderTarget, ShaderType};
