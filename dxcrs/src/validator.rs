//! Container validation and signing

use crate::container::{self, Container, PartKind};
use crate::reflect::decode_signature;
use crate::result::{OperationResult, diagnostics_blob};
use crate::{Blob, HResult, ValidatorFlags};
use dxcompiler::{Diagnostic, Diagnostics, Module, Stage, bitcode};
use log::{debug, warn};
use std::fmt;

/// Parts a container may hold at most once
const UNIQUE_PARTS: [PartKind; 4] = [PartKind::DXIL, PartKind::ISG1, PartKind::OSG1, PartKind::PSV0];

/// A broken validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRule {
    /// No `DXIL` part
    MissingProgram,
    /// A part that must be unique appears more than once
    DuplicatePart(PartKind),
    /// The `DXIL` part is not a decodable module
    UndecodableProgram(String),
    /// The program module breaks a structural rule
    ProgramVerification(String),
    /// A signature part does not describe the program
    SignatureMismatch(PartKind),
    /// The stored digest is set but does not match the contents
    DigestMismatch,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::MissingProgram => f.write_str("container has no program part (DXIL)"),
            ValidationRule::DuplicatePart(kind) => {
                write!(f, "container has more than one '{kind}' part")
            }
            ValidationRule::UndecodableProgram(reason) => {
                write!(f, "program part could not be decoded: {reason}")
            }
            ValidationRule::ProgramVerification(reason) => {
                write!(f, "program failed verification: {reason}")
            }
            ValidationRule::SignatureMismatch(kind) => {
                write!(f, "signature part '{kind}' does not match the program")
            }
            ValidationRule::DigestMismatch => {
                f.write_str("container digest does not match its contents")
            }
        }
    }
}

/// Checks a loaded container, returning every broken rule in check order
pub fn check_container(container: &Container) -> Vec<ValidationRule> {
    let mut broken = Vec::new();

    for kind in UNIQUE_PARTS {
        if container.parts().iter().filter(|p| p.kind == kind).count() > 1 {
            broken.push(ValidationRule::DuplicatePart(kind));
        }
    }

    match container.find_part(PartKind::DXIL) {
        None => broken.push(ValidationRule::MissingProgram),
        Some(program) => match bitcode::decode(program.as_bytes()) {
            Err(err) => broken.push(ValidationRule::UndecodableProgram(err.to_string())),
            Ok(module) => {
                if let Err(err) = module.verify() {
                    broken.push(ValidationRule::ProgramVerification(err.to_string()));
                }
                check_signatures(container, &module, &mut broken);
            }
        },
    }

    if container.is_signed() && !container.digest_matches() {
        broken.push(ValidationRule::DigestMismatch);
    }
    broken
}

fn check_signatures(container: &Container, module: &Module, broken: &mut Vec<ValidationRule>) {
    for (kind, elements) in [(PartKind::ISG1, &module.inputs), (PartKind::OSG1, &module.outputs)] {
        let Some(part) = container.find_part(kind) else {
            continue;
        };
        let matches = decode_signature(part.as_bytes()).is_ok_and(|decoded| &decoded == elements);
        if !matches {
            broken.push(ValidationRule::SignatureMismatch(kind));
        }
    }
}

/// Validator service
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Creates the service
    pub fn new() -> Self {
        Validator
    }

    /// Validates a container.
    ///
    /// Without [`ValidatorFlags::IN_PLACE_EDIT`] a valid container comes back
    /// unchanged. With it the result is a new, signed copy; the input blob
    /// is never modified. Flags outside the valid mask fail with
    /// `E_INVALIDARG`.
    pub fn validate(&self, shader: &Blob, flags: ValidatorFlags) -> OperationResult {
        let unknown = flags.bits() & !ValidatorFlags::all().bits();
        if unknown != 0 {
            let diagnostics = Diagnostics::from(Diagnostic::error(
                Stage::Validate,
                format!("invalid validator flags 0x{unknown:x}"),
            ));
            return OperationResult::failure(HResult::E_INVALIDARG, diagnostics_blob(&diagnostics));
        }

        let container = match Container::load(shader) {
            Ok(container) => container,
            Err(err) => {
                let diagnostics = Diagnostics::from(Diagnostic::error(Stage::Validate, err.to_string()));
                return OperationResult::failure(err.hresult(), diagnostics_blob(&diagnostics));
            }
        };

        let broken = check_container(&container);
        if !broken.is_empty() {
            warn!("container failed {} validation rules", broken.len());
            let mut diagnostics = Diagnostics::new();
            diagnostics.extend(
                broken
                    .iter()
                    .map(|rule| Diagnostic::error(Stage::Validate, rule.to_string())),
            );
            return OperationResult::failure(HResult::E_VALIDATION, diagnostics_blob(&diagnostics));
        }

        if flags.contains(ValidatorFlags::IN_PLACE_EDIT) {
            match container::sign(shader) {
                Ok(signed) => {
                    debug!("validated and signed {} byte container", signed.len());
                    OperationResult::success(signed, None)
                }
                Err(err) => OperationResult::from_error(&err),
            }
        } else {
            debug!("validated {} byte container", shader.len());
            OperationResult::success(shader.clone(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::build_container;
    use crate::container::ContainerBuilder;
    use dxcompiler::module::{Function, Instruction, Opcode};
    use dxcompiler::ShaderTarget;

    fn module() -> Module {
        let mut module = Module::new(ShaderTarget::PS_6_0, "main");
        module.functions.push(Function {
            name: "main".to_string(),
            return_type: "float4".to_string(),
            params: Vec::new(),
            body: vec![Instruction::new(Opcode::Ret, "0")],
        });
        module
    }

    #[test]
    fn test_valid_container_unchanged() {
        let blob = build_container(&module()).unwrap();
        let result = Validator::new().validate(&blob, ValidatorFlags::DEFAULT);
        assert!(result.is_success(), "{}", result.diagnostics_text());
        assert_eq!(result.result(), Some(&blob));
        assert!(result.diagnostics().is_none());
    }

    #[test]
    fn test_in_place_edit_signs_a_copy() {
        let blob = build_container(&module()).unwrap();
        let result = Validator::new().validate(&blob, ValidatorFlags::IN_PLACE_EDIT);
        let signed = Container::load(result.result().unwrap()).unwrap();
        assert!(signed.is_signed());
        assert!(signed.digest_matches());
        assert!(!Container::load(&blob).unwrap().is_signed());
    }

    #[test]
    fn test_unknown_flags() {
        let blob = build_container(&module()).unwrap();
        let result = Validator::new().validate(&blob, ValidatorFlags::from_bits_retain(6));
        assert_eq!(result.status(), HResult::E_INVALIDARG);
    }

    #[test]
    fn test_missing_program() {
        let blob = ContainerBuilder::new()
            .with_part(PartKind::PRIV, b"data".to_vec())
            .build()
            .unwrap();
        let result = Validator::new().validate(&blob, ValidatorFlags::DEFAULT);
        assert_eq!(result.status(), HResult::E_VALIDATION);
        assert!(result.result().is_none());
        assert_eq!(
            result.diagnostics_text(),
            "error: container has no program part (DXIL) [validate]\n"
        );
    }

    #[test]
    fn test_rules_reported_together() {
        let program = bitcode::encode(&module());
        let blob = ContainerBuilder::new()
            .with_part(PartKind::OSG1, b"junk".to_vec())
            .with_part(PartKind::DXIL, program.clone())
            .with_part(PartKind::DXIL, program)
            .build()
            .unwrap();
        let container = Container::load(&blob).unwrap();
        assert_eq!(
            check_container(&container),
            [
                ValidationRule::DuplicatePart(PartKind::DXIL),
                ValidationRule::SignatureMismatch(PartKind::OSG1)
            ]
        );
    }

    #[test]
    fn test_tampered_digest() {
        let signed = container::sign(&build_container(&module()).unwrap()).unwrap();
        let mut bytes = signed.to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let result = Validator::new().validate(&Blob::from_vec(bytes), ValidatorFlags::DEFAULT);
        assert_eq!(result.status(), HResult::E_VALIDATION);
        assert!(result.diagnostics_text().contains("digest does not match"));
    }

    #[test]
    fn test_undecodable_program() {
        let blob = ContainerBuilder::new()
            .with_part(PartKind::DXIL, b"not a module".to_vec())
            .build()
            .unwrap();
        let container = Container::load(&blob).unwrap();
        assert!(matches!(
            check_container(&container).as_slice(),
            [ValidationRule::UndecodableProgram(_)]
        ));
    }
}
