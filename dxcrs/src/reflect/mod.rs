//! Container part reflection
//!
//! Every container part can be viewed through one or more reflection
//! capabilities. The program part offers the full shader reflection as well
//! as its bindings and signatures; the smaller parts each offer the view
//! they store.
//!
//! # Example
//! ```no_run
//! use dxcrs::{Container, PartKind, ReflectionCapability, compile, ShaderTarget};
//!
//! let container = compile(
//!     r#"
//!     cbuffer Constants : register(b0) {
//!         float4x4 worldViewProj;
//!     };
//!     float4 main(float4 pos : SV_POSITION) : SV_TARGET {
//!         return mul(pos, worldViewProj);
//!     }
//!     "#,
//!     "main",
//!     ShaderTarget::PS_6_0,
//! )
//! .unwrap();
//!
//! let container = Container::load(&container).unwrap();
//! let index = container.find_first_part_kind(PartKind::DXIL).unwrap();
//! let view = container
//!     .part_reflection(index, ReflectionCapability::ShaderReflection)
//!     .unwrap();
//! let reflection = view.as_shader().unwrap();
//!
//! println!("Constant buffers: {}", reflection.desc().constant_buffers);
//! for cb in reflection.constant_buffers() {
//!     println!("CB: {} ({} variables)", cb.name, cb.variables.len());
//! }
//! ```

mod bindings;
mod pipeline;
mod root_signature;
mod signature;

pub use bindings::{ResourceBinding, ResourceDimension, ResourceReturnType, ResourceType};
pub use pipeline::PipelineStateInfo;
pub use root_signature::{RootParameter, RootSignatureDesc};
pub use signature::{ComponentType, SignatureParameter, SignatureView, SystemValueType};

pub(crate) use pipeline::encode_pipeline_state;
pub(crate) use root_signature::encode_root_signature;
pub(crate) use signature::{decode_signature, encode_signature};

use crate::container::{Container, PartKind};
use crate::{Blob, Error, Result};
use dxcompiler::codec::{Reader, Writer};
use dxcompiler::module::{Opcode, Resource, ResourceClass, SignatureElement};
use dxcompiler::{Module, ShaderModel, ShaderType, codegen};

/// Reflection view kinds a part may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectionCapability {
    /// Whole-shader summary
    ShaderReflection,
    /// Resource bindings only
    ResourceBindings,
    /// Input, output and patch constant signatures
    Signature,
    /// Pipeline state
    PipelineState,
    /// Root signature
    RootSignature,
}

impl ReflectionCapability {
    /// Every capability
    pub const ALL: [ReflectionCapability; 5] = [
        ReflectionCapability::ShaderReflection,
        ReflectionCapability::ResourceBindings,
        ReflectionCapability::Signature,
        ReflectionCapability::PipelineState,
        ReflectionCapability::RootSignature,
    ];

    /// Capabilities offered by parts of `kind`
    pub fn supported_by(kind: PartKind) -> &'static [ReflectionCapability] {
        match kind {
            PartKind::DXIL | PartKind::ILDB => &[
                ReflectionCapability::ShaderReflection,
                ReflectionCapability::ResourceBindings,
                ReflectionCapability::Signature,
            ],
            PartKind::ISG1 | PartKind::OSG1 | PartKind::PSG1 => &[ReflectionCapability::Signature],
            PartKind::PSV0 => &[
                ReflectionCapability::PipelineState,
                ReflectionCapability::ResourceBindings,
            ],
            PartKind::RTS0 => &[ReflectionCapability::RootSignature],
            PartKind::STAT => &[ReflectionCapability::ShaderReflection],
            _ => &[],
        }
    }
}

/// A reflection view of one part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionView {
    /// Whole-shader summary
    Shader(ShaderReflection),
    /// Resource bindings
    ResourceBindings(Vec<ResourceBinding>),
    /// Signatures
    Signature(SignatureView),
    /// Pipeline state
    PipelineState(PipelineStateInfo),
    /// Root signature
    RootSignature(RootSignatureDesc),
}

impl ReflectionView {
    /// Capability this view answers
    pub fn capability(&self) -> ReflectionCapability {
        match self {
            ReflectionView::Shader(_) => ReflectionCapability::ShaderReflection,
            ReflectionView::ResourceBindings(_) => ReflectionCapability::ResourceBindings,
            ReflectionView::Signature(_) => ReflectionCapability::Signature,
            ReflectionView::PipelineState(_) => ReflectionCapability::PipelineState,
            ReflectionView::RootSignature(_) => ReflectionCapability::RootSignature,
        }
    }

    /// Shader summary, if this is one
    pub fn as_shader(&self) -> Option<&ShaderReflection> {
        match self {
            ReflectionView::Shader(reflection) => Some(reflection),
            _ => None,
        }
    }

    /// Resource bindings, if this is a binding view
    pub fn as_resource_bindings(&self) -> Option<&[ResourceBinding]> {
        match self {
            ReflectionView::ResourceBindings(bindings) => Some(bindings),
            _ => None,
        }
    }

    /// Signatures, if this is a signature view
    pub fn as_signature(&self) -> Option<&SignatureView> {
        match self {
            ReflectionView::Signature(view) => Some(view),
            _ => None,
        }
    }

    /// Pipeline state, if this is one
    pub fn as_pipeline_state(&self) -> Option<&PipelineStateInfo> {
        match self {
            ReflectionView::PipelineState(info) => Some(info),
            _ => None,
        }
    }

    /// Root signature, if this is one
    pub fn as_root_signature(&self) -> Option<&RootSignatureDesc> {
        match self {
            ReflectionView::RootSignature(desc) => Some(desc),
            _ => None,
        }
    }
}

/// High-level shader description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    /// Shader version: kind in the high 16 bits, then major and minor nibbles
    pub version: u32,
    /// Creator string (compiler version)
    pub creator: String,
    /// Number of constant buffers
    pub constant_buffers: u32,
    /// Number of bound resources
    pub bound_resources: u32,
    /// Number of input parameters
    pub input_parameters: u32,
    /// Number of output parameters
    pub output_parameters: u32,
    /// Total instruction count of the generated code
    pub instruction_count: u32,
    /// Number of temporary registers used
    pub temp_register_count: u32,
    /// Number of dynamic flow control instructions
    pub dynamic_flow_control_count: u32,
    /// Number of functions
    pub function_count: u32,
}

impl ShaderDesc {
    /// Shader stage encoded in [`ShaderDesc::version`]
    pub fn shader_type(&self) -> Option<ShaderType> {
        ShaderType::from_kind_code(self.version >> 16)
    }

    /// Shader model encoded in [`ShaderDesc::version`]
    pub fn shader_model(&self) -> Option<ShaderModel> {
        if (self.version >> 4) & 0xf != 6 {
            return None;
        }
        ShaderModel::from_minor(self.version & 0xf)
    }
}

/// Constant buffer reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBufferDesc {
    /// Buffer name, `$Globals` for loose globals
    pub name: String,
    /// Bind point (register number)
    pub bind_point: u32,
    /// Register space
    pub space: u32,
    /// Member names in declaration order
    pub variables: Vec<String>,
}

/// Whole-shader reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReflection {
    desc: ShaderDesc,
    entry_point: String,
    thread_group: Option<[u32; 3]>,
    constant_buffers: Vec<ConstantBufferDesc>,
    bindings: Vec<ResourceBinding>,
    inputs: Vec<SignatureParameter>,
    outputs: Vec<SignatureParameter>,
}

/// Module facts the summary is built from
struct Summary<'a> {
    desc: ShaderDesc,
    entry_point: &'a str,
    thread_group: Option<[u32; 3]>,
    resources: &'a [Resource],
    inputs: &'a [SignatureElement],
    outputs: &'a [SignatureElement],
}

impl Summary<'_> {
    fn of(module: &Module) -> Summary<'_> {
        let listing = codegen::generate(module);
        let target = module.target;
        let flow_control = module
            .functions
            .iter()
            .flat_map(|f| &f.body)
            .filter(|i| matches!(i.opcode, Opcode::If | Opcode::Loop))
            .count();
        let desc = ShaderDesc {
            version: (target.shader_type.kind_code() << 16)
                | (target.model.major() << 4)
                | target.model.minor(),
            creator: format!("dxcrs {}", env!("CARGO_PKG_VERSION")),
            constant_buffers: module
                .resources
                .iter()
                .filter(|r| r.class == ResourceClass::Cbv)
                .count() as u32,
            bound_resources: module.resources.len() as u32,
            input_parameters: module.inputs.len() as u32,
            output_parameters: module.outputs.len() as u32,
            instruction_count: listing.instruction_count() as u32,
            temp_register_count: listing.functions.iter().map(|f| f.temps).max().unwrap_or(0),
            dynamic_flow_control_count: flow_control as u32,
            function_count: module.functions.len() as u32,
        };
        Summary {
            desc,
            entry_point: &module.entry_point,
            thread_group: module.thread_group,
            resources: &module.resources,
            inputs: &module.inputs,
            outputs: &module.outputs,
        }
    }

    fn reflection(&self) -> ShaderReflection {
        let constant_buffers = self
            .resources
            .iter()
            .filter(|r| r.class == ResourceClass::Cbv)
            .map(|r| ConstantBufferDesc {
                name: r.name.clone(),
                bind_point: r.slot,
                space: r.space,
                variables: r.fields.clone(),
            })
            .collect();
        ShaderReflection {
            desc: self.desc.clone(),
            entry_point: self.entry_point.to_string(),
            thread_group: self.thread_group,
            constant_buffers,
            bindings: self.resources.iter().map(ResourceBinding::from_resource).collect(),
            inputs: signature::parameters(self.inputs),
            outputs: signature::parameters(self.outputs),
        }
    }
}

impl ShaderReflection {
    /// Creates a shader reflection from a container blob.
    ///
    /// Uses the reflection summary when present, otherwise the program.
    pub fn new(container: &Blob) -> Result<Self> {
        let container = Container::load(container)?;
        let index = [PartKind::STAT, PartKind::DXIL, PartKind::ILDB]
            .into_iter()
            .find_map(|kind| container.find_first_part_kind(kind))
            .ok_or(Error::PartNotFound(PartKind::DXIL))?;
        match container.part_reflection(index, ReflectionCapability::ShaderReflection)? {
            ReflectionView::Shader(reflection) => Ok(reflection),
            other => Err(Error::Format(format!(
                "expected a shader reflection, found {:?}",
                other.capability()
            ))),
        }
    }

    /// Reflects a module directly
    pub fn from_module(module: &Module) -> Self {
        Summary::of(module).reflection()
    }

    /// Gets the shader description.
    pub fn desc(&self) -> &ShaderDesc {
        &self.desc
    }

    /// Entry point name, empty for libraries
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Constant buffers in binding order
    pub fn constant_buffers(&self) -> std::slice::Iter<'_, ConstantBufferDesc> {
        self.constant_buffers.iter()
    }

    /// Gets a constant buffer by name.
    pub fn constant_buffer_by_name(&self, name: &str) -> Option<&ConstantBufferDesc> {
        self.constant_buffers.iter().find(|cb| cb.name == name)
    }

    /// Input signature parameters
    pub fn input_parameters(&self) -> std::slice::Iter<'_, SignatureParameter> {
        self.inputs.iter()
    }

    /// Output signature parameters
    pub fn output_parameters(&self) -> std::slice::Iter<'_, SignatureParameter> {
        self.outputs.iter()
    }

    /// Resource bindings in declaration order
    pub fn resource_bindings(&self) -> std::slice::Iter<'_, ResourceBinding> {
        self.bindings.iter()
    }

    /// Gets a resource binding by name.
    pub fn resource_binding_by_name(&self, name: &str) -> Option<&ResourceBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Gets the thread group size, zero for stages without one.
    pub fn thread_group_size(&self) -> (u32, u32, u32) {
        let [x, y, z] = self.thread_group.unwrap_or([0; 3]);
        (x, y, z)
    }
}

/// Serializes the reflection summary (`STAT`) of `module`
pub(crate) fn encode_summary(module: &Module) -> Vec<u8> {
    let summary = Summary::of(module);
    let d = &summary.desc;
    let mut w = Writer::new();
    for value in [
        d.version,
        d.constant_buffers,
        d.bound_resources,
        d.input_parameters,
        d.output_parameters,
        d.instruction_count,
        d.temp_register_count,
        d.dynamic_flow_control_count,
        d.function_count,
    ] {
        w.u32(value);
    }
    w.str(&d.creator);
    w.str(summary.entry_point);
    match summary.thread_group {
        Some(dims) => {
            w.u8(1);
            dims.iter().for_each(|v| w.u32(*v));
        }
        None => w.u8(0),
    }
    bindings::write_resources(&mut w, summary.resources);
    dxcompiler::bitcode::write_elements(&mut w, summary.inputs);
    dxcompiler::bitcode::write_elements(&mut w, summary.outputs);
    w.into_bytes()
}

fn decode_summary(bytes: &[u8]) -> dxcompiler::Result<ShaderReflection> {
    let mut r = Reader::new(bytes);
    let mut fields = [0u32; 9];
    for field in &mut fields {
        *field = r.u32()?;
    }
    let [
        version,
        constant_buffers,
        bound_resources,
        input_parameters,
        output_parameters,
        instruction_count,
        temp_register_count,
        dynamic_flow_control_count,
        function_count,
    ] = fields;
    let creator = r.str()?;
    let entry_point = r.str()?;
    let thread_group = match r.u8()? {
        0 => None,
        1 => Some([r.u32()?, r.u32()?, r.u32()?]),
        other => return Err(r.error(format!("invalid thread group flag {other}"))),
    };
    let resources = bindings::read_resources(&mut r)?;
    let inputs = dxcompiler::bitcode::read_elements(&mut r)?;
    let outputs = dxcompiler::bitcode::read_elements(&mut r)?;
    if !r.is_at_end() {
        return Err(r.error("trailing bytes after reflection summary"));
    }
    let summary = Summary {
        desc: ShaderDesc {
            version,
            creator,
            constant_buffers,
            bound_resources,
            input_parameters,
            output_parameters,
            instruction_count,
            temp_register_count,
            dynamic_flow_control_count,
            function_count,
        },
        entry_point: &entry_point,
        thread_group,
        resources: &resources,
        inputs: &inputs,
        outputs: &outputs,
    };
    Ok(summary.reflection())
}

/// Builds the `capability` view of a part of `kind` holding `content`
pub(crate) fn reflect_part(
    kind: PartKind,
    content: &[u8],
    capability: ReflectionCapability,
) -> Result<ReflectionView> {
    if !ReflectionCapability::supported_by(kind).contains(&capability) {
        return Err(Error::UnsupportedCapability { kind, capability });
    }
    let malformed = |err: dxcompiler::Error| Error::Format(format!("'{kind}' part: {err}"));

    let view = match kind {
        PartKind::DXIL | PartKind::ILDB => {
            let module = dxcompiler::bitcode::decode(content).map_err(malformed)?;
            match capability {
                ReflectionCapability::ShaderReflection => {
                    ReflectionView::Shader(ShaderReflection::from_module(&module))
                }
                ReflectionCapability::ResourceBindings => ReflectionView::ResourceBindings(
                    module.resources.iter().map(ResourceBinding::from_resource).collect(),
                ),
                _ => ReflectionView::Signature(SignatureView {
                    inputs: signature::parameters(&module.inputs),
                    outputs: signature::parameters(&module.outputs),
                    patch_constants: Vec::new(),
                }),
            }
        }
        PartKind::ISG1 | PartKind::OSG1 | PartKind::PSG1 => {
            let parameters = signature::parameters(&decode_signature(content).map_err(malformed)?);
            let mut view = SignatureView::default();
            match kind {
                PartKind::ISG1 => view.inputs = parameters,
                PartKind::OSG1 => view.outputs = parameters,
                _ => view.patch_constants = parameters,
            }
            ReflectionView::Signature(view)
        }
        PartKind::PSV0 => {
            let info = pipeline::decode_pipeline_state(content).map_err(malformed)?;
            match capability {
                ReflectionCapability::ResourceBindings => ReflectionView::ResourceBindings(info.resources),
                _ => ReflectionView::PipelineState(info),
            }
        }
        PartKind::RTS0 => ReflectionView::RootSignature(
            root_signature::decode_root_signature(content).map_err(malformed)?,
        ),
        _ => ReflectionView::Shader(decode_summary(content).map_err(malformed)?),
    };
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxcompiler::ShaderTarget;
    use dxcompiler::module::{Function, Instruction};

    fn module() -> Module {
        let mut m = Module::new(ShaderTarget::PS_6_0, "main");
        m.resources.push(Resource {
            class: ResourceClass::Cbv,
            type_name: "cbuffer".to_string(),
            name: "Constants".to_string(),
            space: 0,
            slot: 0,
            count: 1,
            kind: 0,
            dimension: 0,
            return_type: 0,
            fields: vec!["tint".to_string()],
        });
        m.outputs.push(SignatureElement {
            semantic_name: "SV_Target".to_string(),
            semantic_index: 0,
            register: 0,
            system_value: 64,
            component_type: 3,
            mask: 0xf,
        });
        m.functions.push(Function {
            name: "main".to_string(),
            return_type: "float4".to_string(),
            params: Vec::new(),
            body: vec![
                Instruction::new(Opcode::If, "tint.x > 0"),
                Instruction::new(Opcode::Discard, ""),
                Instruction::new(Opcode::End, ""),
                Instruction::new(Opcode::Ret, "tint"),
            ],
        });
        m
    }

    #[test]
    fn test_reflection_from_module() {
        let reflection = ShaderReflection::from_module(&module());
        let desc = reflection.desc();
        assert_eq!(desc.shader_type(), Some(ShaderType::Pixel));
        assert_eq!(desc.shader_model(), Some(ShaderModel::SM6_0));
        assert_eq!(desc.constant_buffers, 1);
        assert_eq!(desc.output_parameters, 1);
        assert_eq!(desc.dynamic_flow_control_count, 1);
        assert!(desc.instruction_count > 0);
        let cb = reflection.constant_buffer_by_name("Constants").unwrap();
        assert_eq!(cb.variables, ["tint"]);
        assert_eq!(reflection.thread_group_size(), (0, 0, 0));
    }

    #[test]
    fn test_summary_matches_program_view() {
        let m = module();
        let from_stat = reflect_part(
            PartKind::STAT,
            &encode_summary(&m),
            ReflectionCapability::ShaderReflection,
        )
        .unwrap();
        let from_program = reflect_part(
            PartKind::DXIL,
            &dxcompiler::bitcode::encode(&m),
            ReflectionCapability::ShaderReflection,
        )
        .unwrap();
        assert_eq!(from_stat, from_program);
    }

    #[test]
    fn test_unsupported_capability() {
        let err = reflect_part(PartKind::RTS0, &[], ReflectionCapability::Signature).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedCapability {
                kind: PartKind::RTS0,
                capability: ReflectionCapability::Signature
            }
        ));
        assert!(ReflectionCapability::supported_by(PartKind::PRIV).is_empty());
    }

    #[test]
    fn test_signature_part_fills_one_list() {
        let m = module();
        let view = reflect_part(
            PartKind::OSG1,
            &encode_signature(&m.outputs),
            ReflectionCapability::Signature,
        )
        .unwrap();
        let signature = view.as_signature().unwrap();
        assert!(signature.inputs.is_empty());
        assert_eq!(signature.outputs[0].semantic_name, "SV_Target");
    }

    #[test]
    fn test_malformed_part_is_format_error() {
        let err = reflect_part(PartKind::DXIL, b"nope", ReflectionCapability::Signature).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
