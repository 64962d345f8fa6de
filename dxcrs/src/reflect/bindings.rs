//! Resource binding reflection

use dxcompiler::bitcode::{read_resource, write_resource};
use dxcompiler::codec::{Reader, Writer};
use dxcompiler::module::Resource;

/// Resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResourceType {
    /// Constant buffer (cbuffer)
    CBuffer = 0,
    /// Texture buffer (tbuffer)
    TBuffer = 1,
    /// Texture
    Texture = 2,
    /// Sampler
    Sampler = 3,
    /// UAV read/write typed
    UavRwTyped = 4,
    /// Structured buffer
    Structured = 5,
    /// UAV read/write structured
    UavRwStructured = 6,
    /// Byte address buffer
    ByteAddress = 7,
    /// UAV read/write byte address
    UavRwByteAddress = 8,
    /// UAV append structured
    UavAppendStructured = 9,
    /// UAV consume structured
    UavConsumeStructured = 10,
    /// UAV read/write structured with counter
    UavRwStructuredWithCounter = 11,
}

impl From<u32> for ResourceType {
    fn from(value: u32) -> Self {
        match value {
            1 => ResourceType::TBuffer,
            2 => ResourceType::Texture,
            3 => ResourceType::Sampler,
            4 => ResourceType::UavRwTyped,
            5 => ResourceType::Structured,
            6 => ResourceType::UavRwStructured,
            7 => ResourceType::ByteAddress,
            8 => ResourceType::UavRwByteAddress,
            9 => ResourceType::UavAppendStructured,
            10 => ResourceType::UavConsumeStructured,
            11 => ResourceType::UavRwStructuredWithCounter,
            _ => ResourceType::CBuffer,
        }
    }
}

/// Resource return type (for textures)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResourceReturnType {
    /// Not applicable (buffers, samplers)
    None = 0,
    /// Unorm
    Unorm = 1,
    /// Snorm
    Snorm = 2,
    /// Signed integer
    Sint = 3,
    /// Unsigned integer
    Uint = 4,
    /// Float
    Float = 5,
    /// Mixed
    Mixed = 6,
    /// Double
    Double = 7,
}

impl From<u32> for ResourceReturnType {
    fn from(value: u32) -> Self {
        match value {
            1 => ResourceReturnType::Unorm,
            2 => ResourceReturnType::Snorm,
            3 => ResourceReturnType::Sint,
            4 => ResourceReturnType::Uint,
            5 => ResourceReturnType::Float,
            6 => ResourceReturnType::Mixed,
            7 => ResourceReturnType::Double,
            _ => ResourceReturnType::None,
        }
    }
}

/// Resource dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResourceDimension {
    /// Unknown
    Unknown = 0,
    /// Buffer
    Buffer = 1,
    /// Texture1D
    Texture1D = 2,
    /// Texture1D array
    Texture1DArray = 3,
    /// Texture2D
    Texture2D = 4,
    /// Texture2D array
    Texture2DArray = 5,
    /// Texture2D multisample
    Texture2DMs = 6,
    /// Texture2D multisample array
    Texture2DMsArray = 7,
    /// Texture3D
    Texture3D = 8,
    /// TextureCube
    TextureCube = 9,
    /// TextureCube array
    TextureCubeArray = 10,
    /// Raw or structured buffer
    BufferEx = 11,
}

impl From<u32> for ResourceDimension {
    fn from(value: u32) -> Self {
        match value {
            1 => ResourceDimension::Buffer,
            2 => ResourceDimension::Texture1D,
            3 => ResourceDimension::Texture1DArray,
            4 => ResourceDimension::Texture2D,
            5 => ResourceDimension::Texture2DArray,
            6 => ResourceDimension::Texture2DMs,
            7 => ResourceDimension::Texture2DMsArray,
            8 => ResourceDimension::Texture3D,
            9 => ResourceDimension::TextureCube,
            10 => ResourceDimension::TextureCubeArray,
            11 => ResourceDimension::BufferEx,
            _ => ResourceDimension::Unknown,
        }
    }
}

/// Resource binding information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    /// Resource name
    pub name: String,
    /// Resource type
    pub resource_type: ResourceType,
    /// Register letter: b, t, u or s
    pub register_class: char,
    /// Bind point (register number)
    pub bind_point: u32,
    /// Bind count (number of consecutive bindings)
    pub bind_count: u32,
    /// Register space
    pub space: u32,
    /// Return type (for textures)
    pub return_type: ResourceReturnType,
    /// Dimension
    pub dimension: ResourceDimension,
}

impl ResourceBinding {
    pub(crate) fn from_resource(resource: &Resource) -> Self {
        ResourceBinding {
            name: resource.name.clone(),
            resource_type: ResourceType::from(resource.kind),
            register_class: resource.class.register_letter(),
            bind_point: resource.slot,
            bind_count: resource.count,
            space: resource.space,
            return_type: ResourceReturnType::from(resource.return_type),
            dimension: ResourceDimension::from(resource.dimension),
        }
    }

    /// Returns true if this is a constant buffer.
    pub fn is_constant_buffer(&self) -> bool {
        self.resource_type == ResourceType::CBuffer
    }

    /// Returns true if this is a texture.
    pub fn is_texture(&self) -> bool {
        self.resource_type == ResourceType::Texture
    }

    /// Returns true if this is a sampler.
    pub fn is_sampler(&self) -> bool {
        self.resource_type == ResourceType::Sampler
    }

    /// Returns true if this is a UAV.
    pub fn is_uav(&self) -> bool {
        matches!(
            self.resource_type,
            ResourceType::UavRwTyped
                | ResourceType::UavRwStructured
                | ResourceType::UavRwByteAddress
                | ResourceType::UavAppendStructured
                | ResourceType::UavConsumeStructured
                | ResourceType::UavRwStructuredWithCounter
        )
    }

    /// Register annotation such as `t3` or `b0, space1`
    pub fn register(&self) -> String {
        if self.space == 0 {
            format!("{}{}", self.register_class, self.bind_point)
        } else {
            format!("{}{}, space{}", self.register_class, self.bind_point, self.space)
        }
    }
}

pub(crate) fn write_resources(w: &mut Writer, resources: &[Resource]) {
    w.u32(resources.len() as u32);
    for resource in resources {
        write_resource(w, resource);
    }
}

pub(crate) fn read_resources(r: &mut Reader<'_>) -> dxcompiler::Result<Vec<Resource>> {
    // class byte, two string lengths, six fields and a field count
    let count = r.count(37)?;
    (0..count).map(|_| read_resource(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxcompiler::module::ResourceClass;

    #[test]
    fn test_binding_from_resource() {
        let resource = Resource {
            class: ResourceClass::Uav,
            type_name: "RWStructuredBuffer<float>".to_string(),
            name: "output".to_string(),
            space: 2,
            slot: 1,
            count: 1,
            kind: 6,
            dimension: 11,
            return_type: 6,
            fields: Vec::new(),
        };
        let binding = ResourceBinding::from_resource(&resource);
        assert!(binding.is_uav());
        assert_eq!(binding.dimension, ResourceDimension::BufferEx);
        assert_eq!(binding.return_type, ResourceReturnType::Mixed);
        assert_eq!(binding.register(), "u1, space2");
    }

    #[test]
    fn test_enum_fallbacks() {
        assert_eq!(ResourceType::from(99), ResourceType::CBuffer);
        assert_eq!(ResourceDimension::from(99), ResourceDimension::Unknown);
        assert_eq!(ResourceReturnType::from(0), ResourceReturnType::None);
    }
}
