//! Pipeline state part (`PSV0`)
//!
//! Holds what a runtime needs to create a pipeline without parsing the
//! program: stage, shader model, thread group size, signature sizes and the
//! resource bindings.

use super::bindings::{ResourceBinding, read_resources, write_resources};
use dxcompiler::codec::{Reader, Writer};
use dxcompiler::{Module, ShaderModel, ShaderType};

/// Pipeline state reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStateInfo {
    /// Shader stage
    pub shader_type: ShaderType,
    /// Shader model
    pub shader_model: ShaderModel,
    /// Entry point, empty for libraries
    pub entry_point: String,
    /// Thread group size for compute, mesh and amplification shaders
    pub thread_group: Option<[u32; 3]>,
    /// Number of input signature elements
    pub input_count: u32,
    /// Number of output signature elements
    pub output_count: u32,
    /// Resource bindings
    pub resources: Vec<ResourceBinding>,
}

/// Serializes the pipeline state of `module`
pub(crate) fn encode_pipeline_state(module: &Module) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(module.target.shader_type.kind_code());
    w.u32(module.target.model.minor());
    w.str(&module.entry_point);
    match module.thread_group {
        Some(dims) => {
            w.u8(1);
            dims.iter().for_each(|d| w.u32(*d));
        }
        None => w.u8(0),
    }
    w.u32(module.inputs.len() as u32);
    w.u32(module.outputs.len() as u32);
    write_resources(&mut w, &module.resources);
    w.into_bytes()
}

/// Parses a pipeline state part payload
pub(crate) fn decode_pipeline_state(bytes: &[u8]) -> dxcompiler::Result<PipelineStateInfo> {
    let mut r = Reader::new(bytes);
    let kind = r.u32()?;
    let shader_type =
        ShaderType::from_kind_code(kind).ok_or_else(|| r.error(format!("unknown shader kind {kind}")))?;
    let minor = r.u32()?;
    let shader_model = ShaderModel::from_minor(minor)
        .ok_or_else(|| r.error(format!("unknown shader model 6.{minor}")))?;
    let entry_point = r.str()?;
    let thread_group = match r.u8()? {
        0 => None,
        1 => Some([r.u32()?, r.u32()?, r.u32()?]),
        other => return Err(r.error(format!("invalid thread group flag {other}"))),
    };
    let input_count = r.u32()?;
    let output_count = r.u32()?;
    let resources = read_resources(&mut r)?;
    if !r.is_at_end() {
        return Err(r.error("trailing bytes after pipeline state"));
    }
    Ok(PipelineStateInfo {
        shader_type,
        shader_model,
        entry_point,
        thread_group,
        input_count,
        output_count,
        resources: resources.iter().map(ResourceBinding::from_resource).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxcompiler::ShaderTarget;

    #[test]
    fn test_compute_pipeline_state() {
        let mut module = Module::new(ShaderTarget::CS_6_0, "main");
        module.thread_group = Some([8, 8, 1]);
        let info = decode_pipeline_state(&encode_pipeline_state(&module)).unwrap();
        assert_eq!(info.shader_type, ShaderType::Compute);
        assert_eq!(info.shader_model, ShaderModel::SM6_0);
        assert_eq!(info.entry_point, "main");
        assert_eq!(info.thread_group, Some([8, 8, 1]));
        assert!(info.resources.is_empty());
    }

    #[test]
    fn test_truncated_pipeline_state() {
        let module = Module::new(ShaderTarget::PS_6_0, "main");
        let bytes = encode_pipeline_state(&module);
        assert!(decode_pipeline_state(&bytes[..bytes.len() - 1]).is_err());
    }
}
