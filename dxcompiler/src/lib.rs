//! Shader compilation engine
//!
//! This crate holds the pieces that turn HLSL text into an intermediate
//! module and move that module between its text and bitcode forms:
//! the preprocessor, the front end, the module representation, its
//! transformation passes and a small code generator. The `dxcrs` crate
//! layers the blob, result and container APIs on top of it.

pub mod backend;
pub mod bitcode;
pub mod codec;
pub mod codegen;
pub mod diagnostic;
mod error;
pub mod frontend;
mod lexer;
pub mod module;
pub mod options;
pub mod preprocess;
pub mod target;
pub mod transform;

pub use backend::BackendAction;
pub use diagnostic::{Diagnostic, Diagnostics, Severity, SourceLocation, Stage};
pub use error::{Error, Result};
pub use module::Module;
pub use options::CompileOptions;
pub use target::{ShaderModel, ShaderTarget, ShaderType};
