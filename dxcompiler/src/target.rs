//! Shader target profiles (shader type + shader model)

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Shader type (vertex, pixel, compute, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// Vertex shader
    Vertex,
    /// Pixel (fragment) shader
    Pixel,
    /// Geometry shader
    Geometry,
    /// Hull (tessellation control) shader
    Hull,
    /// Domain (tessellation evaluation) shader
    Domain,
    /// Compute shader
    Compute,
    /// Mesh shader
    Mesh,
    /// Amplification shader
    Amplification,
    /// Library of exported functions
    Library,
}

impl ShaderType {
    /// Every shader type, in profile prefix order
    pub const ALL: [ShaderType; 9] = [
        ShaderType::Vertex,
        ShaderType::Pixel,
        ShaderType::Geometry,
        ShaderType::Hull,
        ShaderType::Domain,
        ShaderType::Compute,
        ShaderType::Mesh,
        ShaderType::Amplification,
        ShaderType::Library,
    ];

    /// Returns the profile prefix (vs, ps, gs, hs, ds, cs, ms, as, lib)
    pub fn prefix(&self) -> &'static str {
        match self {
            ShaderType::Vertex => "vs",
            ShaderType::Pixel => "ps",
            ShaderType::Geometry => "gs",
            ShaderType::Hull => "hs",
            ShaderType::Domain => "ds",
            ShaderType::Compute => "cs",
            ShaderType::Mesh => "ms",
            ShaderType::Amplification => "as",
            ShaderType::Library => "lib",
        }
    }

    /// Looks a shader type up by its profile prefix
    pub fn from_prefix(prefix: &str) -> Option<ShaderType> {
        ShaderType::ALL.into_iter().find(|t| t.prefix() == prefix)
    }

    /// Numeric shader kind stored in pipeline state parts
    pub fn kind_code(&self) -> u32 {
        match self {
            ShaderType::Pixel => 0,
            ShaderType::Vertex => 1,
            ShaderType::Geometry => 2,
            ShaderType::Hull => 3,
            ShaderType::Domain => 4,
            ShaderType::Compute => 5,
            ShaderType::Library => 6,
            ShaderType::Mesh => 13,
            ShaderType::Amplification => 14,
        }
    }

    /// Inverse of [`ShaderType::kind_code`]
    pub fn from_kind_code(code: u32) -> Option<ShaderType> {
        ShaderType::ALL.into_iter().find(|t| t.kind_code() == code)
    }

    /// Lowest shader model minor version supporting this type
    pub fn min_minor(&self) -> u32 {
        match self {
            ShaderType::Library => 3,
            ShaderType::Mesh | ShaderType::Amplification => 5,
            _ => 0,
        }
    }

    /// Returns true for stages that run with a thread group size
    pub fn uses_thread_groups(&self) -> bool {
        matches!(
            self,
            ShaderType::Compute | ShaderType::Mesh | ShaderType::Amplification
        )
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Shader model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderModel {
    /// Shader Model 6.0
    SM6_0,
    /// Shader Model 6.1
    SM6_1,
    /// Shader Model 6.2
    SM6_2,
    /// Shader Model 6.3
    SM6_3,
    /// Shader Model 6.4
    SM6_4,
    /// Shader Model 6.5
    SM6_5,
    /// Shader Model 6.6
    SM6_6,
    /// Shader Model 6.7
    SM6_7,
    /// Shader Model 6.8
    SM6_8,
}

impl ShaderModel {
    /// Newest supported model
    pub const LATEST: ShaderModel = ShaderModel::SM6_8;

    /// Returns the model for a 6.x minor version
    pub fn from_minor(minor: u32) -> Option<ShaderModel> {
        Some(match minor {
            0 => ShaderModel::SM6_0,
            1 => ShaderModel::SM6_1,
            2 => ShaderModel::SM6_2,
            3 => ShaderModel::SM6_3,
            4 => ShaderModel::SM6_4,
            5 => ShaderModel::SM6_5,
            6 => ShaderModel::SM6_6,
            7 => ShaderModel::SM6_7,
            8 => ShaderModel::SM6_8,
            _ => return None,
        })
    }

    /// Returns the major version number
    pub fn major(&self) -> u32 {
        6
    }

    /// Returns the minor version number
    pub fn minor(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.major(), self.minor())
    }
}

/// Complete shader target (type + model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderTarget {
    /// The shader type
    pub shader_type: ShaderType,
    /// The shader model
    pub model: ShaderModel,
}

impl ShaderTarget {
    pub const VS_6_0: ShaderTarget = ShaderTarget::new(ShaderType::Vertex, ShaderModel::SM6_0);
    pub const PS_6_0: ShaderTarget = ShaderTarget::new(ShaderType::Pixel, ShaderModel::SM6_0);
    pub const GS_6_0: ShaderTarget = ShaderTarget::new(ShaderType::Geometry, ShaderModel::SM6_0);
    pub const HS_6_0: ShaderTarget = ShaderTarget::new(ShaderType::Hull, ShaderModel::SM6_0);
    pub const DS_6_0: ShaderTarget = ShaderTarget::new(ShaderType::Domain, ShaderModel::SM6_0);
    pub const CS_6_0: ShaderTarget = ShaderTarget::new(ShaderType::Compute, ShaderModel::SM6_0);
    pub const LIB_6_3: ShaderTarget = ShaderTarget::new(ShaderType::Library, ShaderModel::SM6_3);
    pub const MS_6_5: ShaderTarget = ShaderTarget::new(ShaderType::Mesh, ShaderModel::SM6_5);
    pub const AS_6_5: ShaderTarget =
        ShaderTarget::new(ShaderType::Amplification, ShaderModel::SM6_5);

    /// Creates a new shader target
    pub const fn new(shader_type: ShaderType, model: ShaderModel) -> Self {
        ShaderTarget { shader_type, model }
    }

    /// Returns the profile string (e.g., "ps_6_0")
    pub fn as_str(&self) -> String {
        self.to_string()
    }

    /// Returns true for library targets, which have no single entry point
    pub fn is_library(&self) -> bool {
        self.shader_type == ShaderType::Library
    }
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.shader_type.prefix(), self.model)
    }
}

impl FromStr for ShaderTarget {
    type Err = Error;

    fn from_str(profile: &str) -> Result<Self> {
        let unknown = || Error::UnknownProfile(profile.to_string());
        let mut pieces = profile.split('_');
        let (Some(prefix), Some(major), Some(minor), None) =
            (pieces.next(), pieces.next(), pieces.next(), pieces.next())
        else {
            return Err(unknown());
        };
        let shader_type = ShaderType::from_prefix(prefix).ok_or_else(unknown)?;
        if major != "6" {
            return Err(unknown());
        }
        let minor: u32 = minor.parse().map_err(|_| unknown())?;
        let model = ShaderModel::from_minor(minor).ok_or_else(unknown)?;
        if minor < shader_type.min_minor() {
            return Err(unknown());
        }
        Ok(ShaderTarget::new(shader_type, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_strings() {
        assert_eq!(ShaderTarget::VS_6_0.as_str(), "vs_6_0");
        assert_eq!(ShaderTarget::PS_6_0.as_str(), "ps_6_0");
        assert_eq!(ShaderTarget::LIB_6_3.as_str(), "lib_6_3");
        assert_eq!(ShaderTarget::AS_6_5.as_str(), "as_6_5");
    }

    #[test]
    fn test_parse_profiles() {
        assert_eq!("cs_6_6".parse::<ShaderTarget>().unwrap().model, ShaderModel::SM6_6);
        assert_eq!("ms_6_5".parse::<ShaderTarget>().unwrap(), ShaderTarget::MS_6_5);
        assert!("ps_5_0".parse::<ShaderTarget>().is_err());
        assert!("lib_6_2".parse::<ShaderTarget>().is_err());
        assert!("as_6_4".parse::<ShaderTarget>().is_err());
        assert!("ps_6_9".parse::<ShaderTarget>().is_err());
        assert!("xs_6_0".parse::<ShaderTarget>().is_err());
        assert!("ps_6_0_1".parse::<ShaderTarget>().is_err());
    }

    #[test]
    fn test_shader_model_versions() {
        assert_eq!(ShaderModel::SM6_0.major(), 6);
        assert_eq!(ShaderModel::SM6_5.minor(), 5);
        assert_eq!(ShaderModel::LATEST.minor(), 8);
    }

    #[test]
    fn test_kind_codes_round_trip() {
        for t in ShaderType::ALL {
            assert_eq!(ShaderType::from_kind_code(t.kind_code()), Some(t));
        }
    }
}
