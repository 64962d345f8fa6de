//! Back-end output actions

use std::fmt;

/// What the back end produces once the module is final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendAction {
    /// Human-readable program listing
    EmitAssembly,
    /// Module bitcode
    EmitBitcode,
    /// Module text
    EmitIrText,
    /// Run code generation, write nothing
    EmitNothing,
    /// Run code generation, write nothing, skip object finalization
    EmitCodegenOnly,
    /// Full program container
    #[default]
    EmitObject,
    /// Configured pass list, without running code generation
    EmitPassConfig,
}

impl BackendAction {
    /// Every action
    pub const ALL: [BackendAction; 7] = [
        BackendAction::EmitAssembly,
        BackendAction::EmitBitcode,
        BackendAction::EmitIrText,
        BackendAction::EmitNothing,
        BackendAction::EmitCodegenOnly,
        BackendAction::EmitObject,
        BackendAction::EmitPassConfig,
    ];

    /// Short name used by the `-emit-*` arguments
    pub fn name(&self) -> &'static str {
        match self {
            BackendAction::EmitAssembly => "asm",
            BackendAction::EmitBitcode => "bc",
            BackendAction::EmitIrText => "ll",
            BackendAction::EmitNothing => "none",
            BackendAction::EmitCodegenOnly => "codegen-only",
            BackendAction::EmitObject => "obj",
            BackendAction::EmitPassConfig => "passes",
        }
    }

    /// Looks an action up by its short name
    pub fn from_name(name: &str) -> Option<BackendAction> {
        BackendAction::ALL.into_iter().find(|a| a.name() == name)
    }

    /// Returns true if the action runs code generation
    pub fn runs_codegen(&self) -> bool {
        matches!(
            self,
            BackendAction::EmitAssembly
                | BackendAction::EmitNothing
                | BackendAction::EmitCodegenOnly
                | BackendAction::EmitObject
        )
    }

    /// Returns true if the action writes bytes to its output
    pub fn writes_output(&self) -> bool {
        !matches!(
            self,
            BackendAction::EmitNothing | BackendAction::EmitCodegenOnly
        )
    }
}

impl fmt::Display for BackendAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
