//! Service factory
//!
//! Every service is a plain value; [`create_instance`] picks one by kind.
//! Class identifiers are kept for interop with tools that still name
//! services by CLSID.

use crate::container::Container;
use crate::{Assembler, Blob, Compiler, Error, Library, Optimizer, Result, Validator};
use std::fmt;
use uuid::Uuid;

/// Service kinds the factory can construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Compiler,
    Library,
    Validator,
    Assembler,
    ContainerReflection,
    Optimizer,
}

impl ServiceKind {
    /// All kinds in declaration order
    pub const ALL: [ServiceKind; 6] = [
        ServiceKind::Compiler,
        ServiceKind::Library,
        ServiceKind::Validator,
        ServiceKind::Assembler,
        ServiceKind::ContainerReflection,
        ServiceKind::Optimizer,
    ];

    /// Class identifier of the service
    pub fn clsid(self) -> Uuid {
        match self {
            ServiceKind::Compiler => Uuid::from_u128(0x73e22d93_e6ce_47f3_b5bf_f0664f39c1b0),
            ServiceKind::Library => Uuid::from_u128(0x6245d6af_66e0_48fd_80b4_4d271796748c),
            ServiceKind::Validator => Uuid::from_u128(0x8ca3e215_f728_4cf3_8cdd_88af917587a1),
            ServiceKind::Assembler => Uuid::from_u128(0xd728db68_f903_4f80_94cd_dccf76ec7151),
            ServiceKind::ContainerReflection => {
                Uuid::from_u128(0xb9f54489_55b8_400c_ba3a_1675e4728b91)
            }
            ServiceKind::Optimizer => Uuid::from_u128(0xae2cd79f_cc22_453f_9b6b_b124e7a5204c),
        }
    }

    /// Kind with the given class identifier
    pub fn from_clsid(clsid: &Uuid) -> Option<ServiceKind> {
        Self::ALL.into_iter().find(|kind| kind.clsid() == *clsid)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceKind::Compiler => "compiler",
            ServiceKind::Library => "library",
            ServiceKind::Validator => "validator",
            ServiceKind::Assembler => "assembler",
            ServiceKind::ContainerReflection => "container reflection",
            ServiceKind::Optimizer => "optimizer",
        };
        f.write_str(name)
    }
}

/// Loads containers for part enumeration and reflection
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerReflection;

impl ContainerReflection {
    /// Creates the service.
    pub fn new() -> Self {
        ContainerReflection
    }

    /// Parses `container`; see [`Container::load`].
    pub fn load(&self, container: &Blob) -> Result<Container> {
        Container::load(container)
    }
}

/// A constructed service
#[derive(Debug, Clone, Copy)]
pub enum Service {
    Compiler(Compiler),
    Library(Library),
    Validator(Validator),
    Assembler(Assembler),
    ContainerReflection(ContainerReflection),
    Optimizer(Optimizer),
}

impl Service {
    /// Kind this service was created as
    pub fn kind(&self) -> ServiceKind {
        match self {
            Service::Compiler(_) => ServiceKind::Compiler,
            Service::Library(_) => ServiceKind::Library,
            Service::Validator(_) => ServiceKind::Validator,
            Service::Assembler(_) => ServiceKind::Assembler,
            Service::ContainerReflection(_) => ServiceKind::ContainerReflection,
            Service::Optimizer(_) => ServiceKind::Optimizer,
        }
    }
}

/// Creates the service of the given kind.
///
/// # Example
/// ```
/// use dxcrs::{create_instance, Service, ServiceKind};
///
/// let Service::Compiler(compiler) = create_instance(ServiceKind::Compiler) else {
///     unreachable!();
/// };
/// assert_eq!(compiler.version().major, 0);
/// ```
pub fn create_instance(kind: ServiceKind) -> Service {
    match kind {
        ServiceKind::Compiler => Service::Compiler(Compiler::new()),
        ServiceKind::Library => Service::Library(Library::new()),
        ServiceKind::Validator => Service::Validator(Validator::new()),
        ServiceKind::Assembler => Service::Assembler(Assembler::new()),
        ServiceKind::ContainerReflection => Service::ContainerReflection(ContainerReflection::new()),
        ServiceKind::Optimizer => Service::Optimizer(Optimizer::new()),
    }
}

/// Creates the service with the given class identifier.
pub fn create_instance_by_clsid(clsid: &Uuid) -> Result<Service> {
    ServiceKind::from_clsid(clsid)
        .map(create_instance)
        .ok_or_else(|| Error::InvalidParameter(format!("no service has class id {clsid}")))
}

/// Compiler version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    /// Built with debug assertions
    pub debug: bool,
}

impl VersionInfo {
    /// No flags set
    pub const FLAGS_NONE: u32 = 0;
    /// Debug build
    pub const FLAGS_DEBUG: u32 = 1;

    /// Version of this build
    pub fn current() -> Self {
        VersionInfo {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default(),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default(),
            debug: cfg!(debug_assertions),
        }
    }

    /// Flag word: [`Self::FLAGS_DEBUG`] for debug builds
    pub fn flags(&self) -> u32 {
        if self.debug {
            Self::FLAGS_DEBUG
        } else {
            Self::FLAGS_NONE
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.debug {
            f.write_str(" (debug)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clsid_round_trip() {
        for kind in ServiceKind::ALL {
            assert_eq!(ServiceKind::from_clsid(&kind.clsid()), Some(kind));
            assert_eq!(create_instance(kind).kind(), kind);
        }
        assert_eq!(
            ServiceKind::Compiler.clsid().to_string(),
            "73e22d93-e6ce-47f3-b5bf-f0664f39c1b0"
        );
        assert_eq!(ServiceKind::from_clsid(&Uuid::nil()), None);
    }

    #[test]
    fn test_unknown_clsid() {
        let err = create_instance_by_clsid(&Uuid::nil()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_container_reflection_service() {
        let Service::ContainerReflection(reflection) = create_instance(ServiceKind::ContainerReflection) else {
            panic!("wrong service");
        };
        assert!(reflection.load(&Blob::from("nope")).is_err());
    }

    #[test]
    fn test_version_flags() {
        let version = VersionInfo::current();
        assert_eq!(version.flags() == VersionInfo::FLAGS_DEBUG, version.debug);
        assert!(version.to_string().starts_with("0.1"));
    }
}
