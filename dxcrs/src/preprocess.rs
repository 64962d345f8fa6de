//! HLSL preprocessing API

use crate::compile::{Compiler, Define};
use crate::include::IncludeResolver;
use crate::{Blob, EncodedBlob, Error, Result};

/// Result of successful preprocessing
#[derive(Debug)]
pub struct PreprocessResult {
    /// The preprocessed source code
    pub source: Blob,
    /// Any warning messages
    pub warnings: Option<String>,
}

/// Builder for HLSL preprocessing
///
/// # Example
/// ```
/// use dxcrs::PreprocessBuilder;
///
/// let source = r#"
///     #define PI 3.14159
///     float4 main() : SV_Target { return float4(PI, 0, 0, 1); }
/// "#;
///
/// let result = PreprocessBuilder::new(source)
///     .source_name("my_shader.hlsl")
///     .define("EXTRA", "1")
///     .preprocess()
///     .unwrap();
///
/// assert!(result.source.to_string_lossy().contains("3.14159"));
/// ```
pub struct PreprocessBuilder<'a> {
    source: EncodedBlob,
    source_name: Option<String>,
    defines: Vec<Define>,
    arguments: Vec<String>,
    include: Option<&'a mut dyn IncludeResolver>,
}

impl<'a> PreprocessBuilder<'a> {
    /// Creates a new preprocess builder.
    pub fn new(source: &str) -> Self {
        Self::from_blob(EncodedBlob::from_text(source))
    }

    /// Creates a preprocess builder from raw bytes of unknown encoding.
    pub fn from_bytes(source: &[u8]) -> Self {
        Self::from_blob(EncodedBlob::new(Blob::from(source), None))
    }

    /// Creates a preprocess builder from an encoded blob.
    pub fn from_blob(source: EncodedBlob) -> Self {
        PreprocessBuilder {
            source,
            source_name: None,
            defines: Vec::new(),
            arguments: Vec::new(),
            include: None,
        }
    }

    /// Sets the source file name (used in error messages and `#line` markers).
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

    /// Adds a pre-built Define.
    pub fn with_define(mut self, define: Define) -> Self {
        self.defines.push(define);
        self
    }

    /// Appends a front-end argument such as `-DNAME=1` or `-WX`.
    pub fn argument(mut self, argument: &str) -> Self {
        self.arguments.push(argument.to_string());
        self
    }

    /// Sets the include resolver.
    pub fn include_handler(mut self, include: &'a mut dyn IncludeResolver) -> Self {
        self.include = Some(include);
        self
    }

    /// Preprocesses the source.
    pub fn preprocess(self) -> Result<PreprocessResult> {
        let result = Compiler::new().preprocess(
            &self.source,
            self.source_name.as_deref(),
            &self.arguments,
            &self.defines,
            self.include,
        );
        let warnings = Some(result.diagnostics_text()).filter(|s| !s.is_empty());
        let source = result.into_result(|hresult, message| Error::Preprocessing { hresult, message })?;
        Ok(PreprocessResult { source, warnings })
    }
}

/// Convenience function for simple preprocessing.
///
/// # Example
/// ```
/// use dxcrs::preprocess;
///
/// let source = "#define X 1\nfloat4 main() : SV_Target { return X; }";
/// let preprocessed = preprocess(source).unwrap();
/// ```
pub fn preprocess(source: &str) -> Result<Blob> {
    PreprocessBuilder::new(source)
        .preprocess()
        .map(|r| r.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HResult, MemoryInclude};

    #[test]
    fn test_preprocess_simple() {
        let source = r#"
            #define PI 3.14159
            float4 main() : SV_Target { return float4(PI, 0, 0, 1); }
        "#;

        let text = preprocess(source).unwrap().to_string_lossy();
        assert!(text.contains("3.14159"), "Should contain expanded PI value");
        assert!(!text.contains("#define PI"), "Defines should be expanded");
    }

    #[test]
    fn test_defines_and_includes() {
        let mut files = MemoryInclude::new().with_file("shared/common.hlsli", b"#pragma once\nfloat common;\n");
        let result = PreprocessBuilder::new(
            "#include \"shared/common.hlsli\"\n#include \"shared/common.hlsli\"\n#if defined(FLAG) && LEVEL > 1\nok\n#endif\n",
        )
        .define_flag("FLAG")
        .argument("-DLEVEL=2")
        .include_handler(&mut files)
        .preprocess()
        .unwrap();
        let text = result.source.to_string_lossy();
        assert_eq!(text.matches("float common;").count(), 1);
        assert!(text.contains("ok"));
        assert!(result.warnings.is_none());
    }

    #[test]
    fn test_missing_include() {
        let err = preprocess("#include \"missing.h\"\n").unwrap_err();
        assert_eq!(err.hresult(), HResult::E_SOURCE);
        assert!(err.to_string().contains("'missing.h' file not found"), "{err}");
    }

    #[test]
    fn test_error_directive() {
        let err = PreprocessBuilder::new("#error no\n").preprocess().unwrap_err();
        assert!(matches!(err, Error::Preprocessing { .. }));
    }
}
