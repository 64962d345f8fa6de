//! Built-in types, intrinsics, resource shapes and system values

use crate::module::ResourceClass;

const SCALARS: &[&str] = &[
    "min16float",
    "min10float",
    "min16uint",
    "min16int",
    "min12int",
    "float16_t",
    "float32_t",
    "float64_t",
    "uint16_t",
    "uint32_t",
    "uint64_t",
    "int16_t",
    "int32_t",
    "int64_t",
    "double",
    "float",
    "dword",
    "half",
    "uint",
    "bool",
    "int",
];

const OTHER_TYPES: &[&str] = &[
    "void",
    "vector",
    "matrix",
    "string",
    "PointStream",
    "LineStream",
    "TriangleStream",
    "InputPatch",
    "OutputPatch",
];

const INTRINSICS: &[&str] = &[
    "abs", "acos", "all", "and", "any", "asdouble", "asfloat", "asfloat16", "asin", "asint",
    "asint16", "asuint", "asuint16", "atan", "atan2", "ceil", "clamp", "clip", "cos", "cosh",
    "countbits", "cross", "ddx", "ddx_coarse", "ddx_fine", "ddy", "ddy_coarse", "ddy_fine",
    "degrees", "determinant", "distance", "dot", "dot2add", "dst", "exp", "exp2", "f16tof32",
    "f32tof16", "faceforward", "firstbithigh", "firstbitlow", "floor", "fma", "fmod", "frac",
    "frexp", "fwidth", "isfinite", "isinf", "isnan", "ldexp", "length", "lerp", "lit", "log",
    "log10", "log2", "mad", "max", "min", "modf", "msad4", "mul", "noise", "normalize", "or",
    "pow", "radians", "rcp", "reflect", "refract", "reversebits", "round", "rsqrt", "saturate",
    "select", "sign", "sin", "sincos", "sinh", "smoothstep", "sqrt", "step", "tan", "tanh",
    "transpose", "trunc", "abort", "printf", "errorf",
    "InterlockedAdd", "InterlockedAnd", "InterlockedCompareExchange", "InterlockedCompareStore",
    "InterlockedExchange", "InterlockedMax", "InterlockedMin", "InterlockedOr", "InterlockedXor",
    "GroupMemoryBarrier", "GroupMemoryBarrierWithGroupSync", "DeviceMemoryBarrier",
    "DeviceMemoryBarrierWithGroupSync", "AllMemoryBarrier", "AllMemoryBarrierWithGroupSync",
    "WaveGetLaneCount", "WaveGetLaneIndex", "WaveIsFirstLane", "WaveActiveAnyTrue",
    "WaveActiveAllTrue", "WaveActiveBallot", "WaveReadLaneAt", "WaveReadLaneFirst",
    "WaveActiveAllEqual", "WaveActiveCountBits", "WaveActiveSum", "WaveActiveProduct",
    "WaveActiveBitAnd", "WaveActiveBitOr", "WaveActiveBitXor", "WaveActiveMin", "WaveActiveMax",
    "WavePrefixCountBits", "WavePrefixSum", "WavePrefixProduct", "QuadReadAcrossX",
    "QuadReadAcrossY", "QuadReadAcrossDiagonal", "QuadReadLaneAt", "EvaluateAttributeAtSample",
    "EvaluateAttributeCentroid", "EvaluateAttributeSnapped", "GetRenderTargetSampleCount",
    "GetRenderTargetSamplePosition", "NonUniformResourceIndex", "SetMeshOutputCounts",
    "DispatchMesh",
];

const EXPRESSION_KEYWORDS: &[&str] = &[
    "true",
    "false",
    "sizeof",
    "ResourceDescriptorHeap",
    "SamplerDescriptorHeap",
];

/// Declaration qualifiers that may precede a type
pub(crate) const QUALIFIERS: &[&str] = &[
    "static",
    "const",
    "uniform",
    "extern",
    "precise",
    "groupshared",
    "volatile",
    "shared",
    "row_major",
    "column_major",
    "nointerpolation",
    "linear",
    "centroid",
    "noperspective",
    "sample",
    "in",
    "out",
    "inout",
    "inline",
    "export",
    "snorm",
    "unorm",
    "point",
    "line",
    "triangle",
    "lineadj",
    "triangleadj",
    "vertices",
    "indices",
    "primitives",
    "payload",
];

/// Returns true for scalar, vector and matrix type names such as `float4x4`
pub(crate) fn is_builtin_type(name: &str) -> bool {
    if OTHER_TYPES.contains(&name) || classify_resource(name).is_some() {
        return true;
    }
    let Some(scalar) = SCALARS.iter().find(|s| name.starts_with(**s)) else {
        return false;
    };
    let dims = &name[scalar.len()..];
    let dim = |c: u8| (b'1'..=b'4').contains(&c);
    match dims.as_bytes() {
        [] => true,
        [n] => dim(*n),
        [r, b'x', c] => dim(*r) && dim(*c),
        _ => false,
    }
}

/// Returns true for intrinsic functions and identifiers usable in any expression
pub(crate) fn is_intrinsic(name: &str) -> bool {
    INTRINSICS.contains(&name) || EXPRESSION_KEYWORDS.contains(&name)
}

/// Signature component type and mask for a type name.
///
/// Returns `(component_type, mask)` with 1 = uint, 2 = int, 3 = float.
pub(crate) fn component_layout(ty: &str) -> (u32, u8) {
    let Some(scalar) = SCALARS.iter().find(|s| ty.starts_with(**s)) else {
        return (3, 0x0f);
    };
    let component = match *scalar {
        "uint" | "dword" | "bool" | "min16uint" | "uint16_t" | "uint32_t" | "uint64_t" => 1,
        "int" | "min16int" | "min12int" | "int16_t" | "int32_t" | "int64_t" => 2,
        _ => 3,
    };
    let width = ty[scalar.len()..]
        .bytes()
        .next()
        .filter(|b| (b'1'..=b'4').contains(b))
        .map(|b| b - b'0')
        .unwrap_or(1);
    (component, (1u8 << width) - 1)
}

/// Register class and codes of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourceShape {
    pub class: ResourceClass,
    pub kind: u32,
    pub dimension: u32,
}

const fn shape(class: ResourceClass, kind: u32, dimension: u32) -> Option<ResourceShape> {
    Some(ResourceShape {
        class,
        kind,
        dimension,
    })
}

/// Classifies a resource type by its base name (`Texture2D`, `RWBuffer`, ...)
pub(crate) fn classify_resource(base: &str) -> Option<ResourceShape> {
    use ResourceClass::{Cbv, Sampler, Srv, Uav};
    let base = base.strip_prefix("RasterizerOrdered").map_or_else(
        || base.to_string(),
        |rest| format!("RW{rest}"),
    );
    match base.as_str() {
        "ConstantBuffer" | "cbuffer" => shape(Cbv, 0, 0),
        "TextureBuffer" | "tbuffer" => shape(Srv, 1, 0),
        "Buffer" => shape(Srv, 2, 1),
        "Texture1D" => shape(Srv, 2, 2),
        "Texture1DArray" => shape(Srv, 2, 3),
        "Texture2D" => shape(Srv, 2, 4),
        "Texture2DArray" => shape(Srv, 2, 5),
        "Texture2DMS" => shape(Srv, 2, 6),
        "Texture2DMSArray" => shape(Srv, 2, 7),
        "Texture3D" => shape(Srv, 2, 8),
        "TextureCube" => shape(Srv, 2, 9),
        "TextureCubeArray" => shape(Srv, 2, 10),
        "StructuredBuffer" => shape(Srv, 5, 11),
        "ByteAddressBuffer" => shape(Srv, 7, 11),
        "SamplerState" | "SamplerComparisonState" | "sampler" => shape(Sampler, 3, 0),
        "RWBuffer" => shape(Uav, 4, 1),
        "RWTexture1D" => shape(Uav, 4, 2),
        "RWTexture1DArray" => shape(Uav, 4, 3),
        "RWTexture2D" => shape(Uav, 4, 4),
        "RWTexture2DArray" => shape(Uav, 4, 5),
        "RWTexture3D" => shape(Uav, 4, 8),
        "RWStructuredBuffer" => shape(Uav, 6, 11),
        "RWByteAddressBuffer" => shape(Uav, 8, 11),
        "AppendStructuredBuffer" => shape(Uav, 9, 11),
        "ConsumeStructuredBuffer" => shape(Uav, 10, 11),
        _ => None,
    }
}

/// Return type code for a resource: 1 unorm, 2 snorm, 3 sint, 4 uint,
/// 5 float, 6 mixed, 7 double, 0 when not applicable.
pub(crate) fn resource_return_type(
    shape: &ResourceShape,
    template: Option<&str>,
    norm: Option<&str>,
) -> u32 {
    match shape.kind {
        0 | 1 | 3 => return 0,
        5..=10 => return 6,
        _ => {}
    }
    match norm {
        Some("unorm") => return 1,
        Some("snorm") => return 2,
        _ => {}
    }
    let Some(element) = template else { return 5 };
    match SCALARS.iter().find(|s| element.starts_with(**s)).copied() {
        Some("double" | "float64_t") => 7,
        Some("int" | "min16int" | "min12int" | "int16_t" | "int32_t" | "int64_t") => 3,
        Some("uint" | "dword" | "bool" | "min16uint" | "uint16_t" | "uint32_t" | "uint64_t") => 4,
        Some(_) => 5,
        None => 6,
    }
}

/// System value code for a semantic name, 0 for user semantics
pub(crate) fn system_value(semantic: &str) -> u32 {
    match semantic.to_ascii_uppercase().as_str() {
        "SV_POSITION" => 1,
        "SV_CLIPDISTANCE" => 2,
        "SV_CULLDISTANCE" => 3,
        "SV_RENDERTARGETARRAYINDEX" => 4,
        "SV_VIEWPORTARRAYINDEX" => 5,
        "SV_VERTEXID" => 6,
        "SV_PRIMITIVEID" => 7,
        "SV_INSTANCEID" => 8,
        "SV_ISFRONTFACE" => 9,
        "SV_SAMPLEINDEX" => 10,
        "SV_TARGET" => 64,
        "SV_DEPTH" => 65,
        "SV_COVERAGE" => 66,
        "SV_DEPTHGREATEREQUAL" => 67,
        "SV_DEPTHLESSEQUAL" => 68,
        _ => 0,
    }
}

/// Returns true for compute system values, which never appear in signatures
pub(crate) fn is_compute_system_value(semantic: &str) -> bool {
    matches!(
        semantic.to_ascii_uppercase().as_str(),
        "SV_DISPATCHTHREADID" | "SV_GROUPID" | "SV_GROUPTHREADID" | "SV_GROUPINDEX"
    )
}

/// Splits a semantic into its name and trailing index (`TEXCOORD3` -> `TEXCOORD`, 3)
pub(crate) fn split_semantic(semantic: &str) -> (&str, u32) {
    let digits = semantic
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    let (name, index) = semantic.split_at(semantic.len() - digits);
    if name.is_empty() {
        return (semantic, 0);
    }
    (name, index.parse().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        assert!(is_builtin_type("float"));
        assert!(is_builtin_type("float4"));
        assert!(is_builtin_type("half3x3"));
        assert!(is_builtin_type("uint2"));
        assert!(is_builtin_type("Texture2D"));
        assert!(!is_builtin_type("float5"));
        assert!(!is_builtin_type("floaty"));
        assert!(!is_builtin_type("MyStruct"));
    }

    #[test]
    fn test_component_layout() {
        assert_eq!(component_layout("float4"), (3, 0x0f));
        assert_eq!(component_layout("uint"), (1, 0x01));
        assert_eq!(component_layout("int2"), (2, 0x03));
    }

    #[test]
    fn test_split_semantic() {
        assert_eq!(split_semantic("TEXCOORD3"), ("TEXCOORD", 3));
        assert_eq!(split_semantic("SV_Target"), ("SV_Target", 0));
        assert_eq!(split_semantic("COLOR"), ("COLOR", 0));
    }

    #[test]
    fn test_classify_resource() {
        let tex = classify_resource("Texture2D").unwrap();
        assert_eq!((tex.class, tex.kind, tex.dimension), (ResourceClass::Srv, 2, 4));
        let rov = classify_resource("RasterizerOrderedTexture2D").unwrap();
        assert_eq!(rov.class, ResourceClass::Uav);
        assert_eq!(resource_return_type(&tex, Some("uint4"), None), 4);
        assert_eq!(resource_return_type(&tex, None, None), 5);
        assert_eq!(resource_return_type(&tex, Some("float4"), Some("unorm")), 1);
        let sb = classify_resource("StructuredBuffer").unwrap();
        assert_eq!(resource_return_type(&sb, Some("float4"), None), 6);
        assert!(classify_resource("float4").is_none());
    }

    #[test]
    fn test_system_values() {
        assert_eq!(system_value("SV_Position"), 1);
        assert_eq!(system_value("SV_Target"), 64);
        assert_eq!(system_value("TEXCOORD"), 0);
        assert!(is_compute_system_value("SV_DispatchThreadID"));
    }
}
