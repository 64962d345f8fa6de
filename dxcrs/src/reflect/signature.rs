//! Input/output signature parameter reflection

use dxcompiler::bitcode::{read_elements, write_elements};
use dxcompiler::codec::{Reader, Writer};
use dxcompiler::module::SignatureElement;

/// System value semantic type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SystemValueType {
    /// Undefined (user-defined semantic)
    Undefined = 0,
    /// SV_Position
    Position = 1,
    /// SV_ClipDistance
    ClipDistance = 2,
    /// SV_CullDistance
    CullDistance = 3,
    /// SV_RenderTargetArrayIndex
    RenderTargetArrayIndex = 4,
    /// SV_ViewportArrayIndex
    ViewportArrayIndex = 5,
    /// SV_VertexID
    VertexId = 6,
    /// SV_PrimitiveID
    PrimitiveId = 7,
    /// SV_InstanceID
    InstanceId = 8,
    /// SV_IsFrontFace
    IsFrontFace = 9,
    /// SV_SampleIndex
    SampleIndex = 10,
    /// SV_Target
    Target = 64,
    /// SV_Depth
    Depth = 65,
    /// SV_Coverage
    Coverage = 66,
    /// SV_DepthGreaterEqual
    DepthGreaterEqual = 67,
    /// SV_DepthLessEqual
    DepthLessEqual = 68,
}

impl From<u32> for SystemValueType {
    fn from(value: u32) -> Self {
        match value {
            1 => SystemValueType::Position,
            2 => SystemValueType::ClipDistance,
            3 => SystemValueType::CullDistance,
            4 => SystemValueType::RenderTargetArrayIndex,
            5 => SystemValueType::ViewportArrayIndex,
            6 => SystemValueType::VertexId,
            7 => SystemValueType::PrimitiveId,
            8 => SystemValueType::InstanceId,
            9 => SystemValueType::IsFrontFace,
            10 => SystemValueType::SampleIndex,
            64 => SystemValueType::Target,
            65 => SystemValueType::Depth,
            66 => SystemValueType::Coverage,
            67 => SystemValueType::DepthGreaterEqual,
            68 => SystemValueType::DepthLessEqual,
            _ => SystemValueType::Undefined,
        }
    }
}

/// Component type for shader parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ComponentType {
    /// Unknown type
    Unknown = 0,
    /// Unsigned 32-bit integer
    Uint32 = 1,
    /// Signed 32-bit integer
    Sint32 = 2,
    /// 32-bit float
    Float32 = 3,
}

impl From<u32> for ComponentType {
    fn from(value: u32) -> Self {
        match value {
            1 => ComponentType::Uint32,
            2 => ComponentType::Sint32,
            3 => ComponentType::Float32,
            _ => ComponentType::Unknown,
        }
    }
}

/// Shader input/output signature parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParameter {
    /// Semantic name (e.g., "POSITION", "TEXCOORD")
    pub semantic_name: String,
    /// Semantic index (e.g., 0 for TEXCOORD0)
    pub semantic_index: u32,
    /// Register number
    pub register: u32,
    /// System value type
    pub system_value_type: SystemValueType,
    /// Component type
    pub component_type: ComponentType,
    /// Mask of used components (x=1, y=2, z=4, w=8)
    pub mask: u8,
}

impl SignatureParameter {
    pub(crate) fn from_element(element: &SignatureElement) -> Self {
        SignatureParameter {
            semantic_name: element.semantic_name.clone(),
            semantic_index: element.semantic_index,
            register: element.register,
            system_value_type: SystemValueType::from(element.system_value),
            component_type: ComponentType::from(element.component_type),
            mask: element.mask,
        }
    }

    /// Returns the number of components used (1-4).
    pub fn component_count(&self) -> u32 {
        self.mask.count_ones()
    }

    /// Returns true if this is a system value (SV_*).
    pub fn is_system_value(&self) -> bool {
        self.system_value_type != SystemValueType::Undefined
    }
}

/// Signature parameters of a part
///
/// A program part fills inputs and outputs; a signature part fills only
/// the list it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureView {
    /// Input parameters
    pub inputs: Vec<SignatureParameter>,
    /// Output parameters
    pub outputs: Vec<SignatureParameter>,
    /// Patch constant parameters
    pub patch_constants: Vec<SignatureParameter>,
}

pub(crate) fn parameters(elements: &[SignatureElement]) -> Vec<SignatureParameter> {
    elements.iter().map(SignatureParameter::from_element).collect()
}

/// Serializes a signature part payload
pub(crate) fn encode_signature(elements: &[SignatureElement]) -> Vec<u8> {
    let mut w = Writer::new();
    write_elements(&mut w, elements);
    w.into_bytes()
}

/// Parses a signature part payload
pub(crate) fn decode_signature(bytes: &[u8]) -> dxcompiler::Result<Vec<SignatureElement>> {
    let mut r = Reader::new(bytes);
    let elements = read_elements(&mut r)?;
    if !r.is_at_end() {
        return Err(r.error("trailing bytes after signature"));
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, system_value: u32) -> SignatureElement {
        SignatureElement {
            semantic_name: name.to_string(),
            semantic_index: 0,
            register: 0,
            system_value,
            component_type: 3,
            mask: 0xf,
        }
    }

    #[test]
    fn test_signature_payload() {
        let elements = vec![element("SV_Position", 1), element("TEXCOORD", 0)];
        let bytes = encode_signature(&elements);
        assert_eq!(decode_signature(&bytes).unwrap(), elements);

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(decode_signature(&padded).is_err());
    }

    #[test]
    fn test_parameter_from_element() {
        let param = SignatureParameter::from_element(&element("SV_Target", 64));
        assert_eq!(param.system_value_type, SystemValueType::Target);
        assert_eq!(param.component_type, ComponentType::Float32);
        assert_eq!(param.component_count(), 4);
        assert!(param.is_system_value());
    }
}
