//! Front-end argument parsing

use crate::backend::BackendAction;
use crate::diagnostic::{Diagnostic, Stage};

/// Settings derived from the compile argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// 0 to 3, `-Od` maps to 0
    pub optimization_level: u8,
    /// Keep debug locations (`-Zi`)
    pub debug_info: bool,
    /// Skip container validation and signing (`-Vd`)
    pub skip_validation: bool,
    /// Treat warnings as errors (`-WX`)
    pub warnings_are_errors: bool,
    /// Drop all warnings (`-no-warnings`)
    pub suppress_warnings: bool,
    /// Remove debug parts from the container (`-Qstrip_debug`)
    pub strip_debug: bool,
    /// Remove reflection parts from the container (`-Qstrip_reflect`)
    pub strip_reflection: bool,
    /// Stop after the front end, without any optimizer pass (`-fcgl`)
    pub high_level_only: bool,
    /// `-D` defines in argument order, applied before API defines
    pub defines: Vec<(String, Option<String>)>,
    /// What the back end emits
    pub action: BackendAction,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            optimization_level: 3,
            debug_info: false,
            skip_validation: false,
            warnings_are_errors: false,
            suppress_warnings: false,
            strip_debug: false,
            strip_reflection: false,
            high_level_only: false,
            defines: Vec::new(),
            action: BackendAction::EmitObject,
        }
    }
}

impl CompileOptions {
    /// Parses a compile argument list.
    ///
    /// Any argument the front end does not understand is rejected.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, Diagnostic> {
        let mut options = CompileOptions::default();
        let mut iter = args.iter().map(AsRef::as_ref);

        while let Some(arg) = iter.next() {
            match arg {
                "-Od" | "-O0" => options.optimization_level = 0,
                "-O1" => options.optimization_level = 1,
                "-O2" => options.optimization_level = 2,
                "-O3" => options.optimization_level = 3,
                "-Zi" => options.debug_info = true,
                "-Vd" => options.skip_validation = true,
                "-WX" => options.warnings_are_errors = true,
                "-no-warnings" => options.suppress_warnings = true,
                "-Qstrip_debug" => options.strip_debug = true,
                "-Qstrip_reflect" => options.strip_reflection = true,
                "-fcgl" => {
                    options.high_level_only = true;
                    options.action = BackendAction::EmitIrText;
                }
                "-emit-ll" => options.action = BackendAction::EmitIrText,
                "-emit-bc" => options.action = BackendAction::EmitBitcode,
                "-emit-asm" => options.action = BackendAction::EmitAssembly,
                "-emit-obj" => options.action = BackendAction::EmitObject,
                "-emit-none" => options.action = BackendAction::EmitNothing,
                "-emit-codegen-only" => options.action = BackendAction::EmitCodegenOnly,
                "-emit-passes" => options.action = BackendAction::EmitPassConfig,
                "-D" => {
                    let value = iter.next().ok_or_else(|| {
                        Diagnostic::error(Stage::Compile, "missing value for argument '-D'")
                    })?;
                    options.defines.push(parse_define(value)?);
                }
                _ => match arg.strip_prefix("-D") {
                    Some(value) => options.defines.push(parse_define(value)?),
                    None => {
                        return Err(Diagnostic::error(
                            Stage::Compile,
                            format!("unknown argument: '{arg}'"),
                        ));
                    }
                },
            }
        }

        Ok(options)
    }

    /// Optimizer pass options run after the front end
    pub fn optimizer_pipeline(&self) -> Vec<String> {
        if self.high_level_only {
            return Vec::new();
        }
        let mut passes: Vec<String> = match self.optimization_level {
            0 => Vec::new(),
            1 => vec!["-simplifycfg".to_string()],
            _ => ["-simplifycfg", "-dce", "-globaldce", "-dxil-remove-unused-resources"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        if !self.debug_info {
            passes.push("-strip-debug".to_string());
        }
        passes
    }
}

/// Splits `NAME[=VALUE]`
fn parse_define(text: &str) -> Result<(String, Option<String>), Diagnostic> {
    let (name, value) = match text.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (text, None),
    };
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Diagnostic::error(
            Stage::Compile,
            format!("invalid macro name in define '{text}'"),
        ));
    }
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::parse::<&str>(&[]).unwrap();
        assert_eq!(options.optimization_level, 3);
        assert_eq!(options.action, BackendAction::EmitObject);
        assert_eq!(
            options.optimizer_pipeline(),
            ["-simplifycfg", "-dce", "-globaldce", "-dxil-remove-unused-resources", "-strip-debug"]
        );
    }

    #[test]
    fn test_debug_keeps_locations() {
        let options = CompileOptions::parse(&["-Od", "-Zi"]).unwrap();
        assert!(options.optimizer_pipeline().is_empty());
    }

    #[test]
    fn test_defines_in_order() {
        let options = CompileOptions::parse(&["-D", "A=1", "-DB", "-DC=x=y"]).unwrap();
        assert_eq!(
            options.defines,
            vec![
                ("A".to_string(), Some("1".to_string())),
                ("B".to_string(), None),
                ("C".to_string(), Some("x=y".to_string())),
            ]
        );
    }

    #[test]
    fn test_unknown_argument() {
        let err = CompileOptions::parse(&["-O3", "-Gfa"]).unwrap_err();
        assert!(err.message.contains("-Gfa"));
        assert!(CompileOptions::parse(&["-D"]).is_err());
        assert!(CompileOptions::parse(&["-D1X"]).is_err());
    }

    #[test]
    fn test_fcgl_skips_optimizer() {
        let options = CompileOptions::parse(&["-fcgl"]).unwrap();
        assert_eq!(options.action, BackendAction::EmitIrText);
        assert!(options.optimizer_pipeline().is_empty());
    }
}
