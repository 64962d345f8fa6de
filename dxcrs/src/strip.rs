//! Container stripping

use crate::container::{self, Container, ContainerBuilder, PartKind};
use crate::{Blob, Result, StripFlags};
use log::debug;

/// Part kinds removed by `flags`
fn stripped_kinds(flags: StripFlags) -> Vec<PartKind> {
    let mut kinds = Vec::new();
    if flags.contains(StripFlags::DEBUG_INFO) {
        kinds.extend([PartKind::ILDB, PartKind::ILDN]);
    }
    if flags.contains(StripFlags::REFLECTION_DATA) {
        kinds.push(PartKind::STAT);
    }
    if flags.contains(StripFlags::PRIVATE_DATA) {
        kinds.push(PartKind::PRIV);
    }
    if flags.contains(StripFlags::ROOT_SIGNATURE) {
        kinds.push(PartKind::RTS0);
    }
    kinds
}

/// Removes the parts selected by `flags` from a container.
///
/// A signed container comes back re-signed.
///
/// # Example
/// ```
/// use dxcrs::{CompileBuilder, ShaderTarget, StripFlags, strip_parts};
///
/// // Compile with debug info
/// let result = CompileBuilder::new(
///     "float4 main() : SV_Target { return 1; }",
///     "main",
///     ShaderTarget::PS_6_0,
/// )
/// .debug()
/// .compile()
/// .unwrap();
///
/// // Strip the debug info for release
/// let stripped = strip_parts(&result.bytecode, StripFlags::DEBUG_INFO).unwrap();
/// assert!(stripped.len() < result.bytecode.len());
/// ```
pub fn strip_parts(container: &Blob, flags: StripFlags) -> Result<Blob> {
    let loaded = Container::load(container)?;
    let kinds = stripped_kinds(flags);
    let mut builder = ContainerBuilder::from_container(&loaded);
    let removed = builder.remove_parts(|kind| kinds.contains(&kind));
    if removed == 0 {
        return Ok(container.clone());
    }
    debug!("stripped {removed} parts");
    let rebuilt = builder.build()?;
    if loaded.is_signed() {
        container::sign(&rebuilt)
    } else {
        Ok(rebuilt)
    }
}

/// Removes the debug program and debug name parts
pub fn strip_debug_info(container: &Blob) -> Result<Blob> {
    strip_parts(container, StripFlags::DEBUG_INFO)
}

/// Removes the reflection summary part
pub fn strip_reflection_data(container: &Blob) -> Result<Blob> {
    strip_parts(container, StripFlags::REFLECTION_DATA)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Blob {
        ContainerBuilder::new()
            .with_part(PartKind::STAT, b"stat".to_vec())
            .with_part(PartKind::ILDB, b"debug".to_vec())
            .with_part(PartKind::ILDN, b"name".to_vec())
            .with_part(PartKind::PRIV, b"private".to_vec())
            .with_part(PartKind::DXIL, b"program".to_vec())
            .build()
            .unwrap()
    }

    fn kinds(blob: &Blob) -> Vec<PartKind> {
        Container::load(blob)
            .unwrap()
            .parts()
            .iter()
            .map(|p| p.kind)
            .collect()
    }

    #[test]
    fn test_strip_debug() {
        let stripped = strip_debug_info(&sample()).unwrap();
        assert_eq!(kinds(&stripped), [PartKind::STAT, PartKind::PRIV, PartKind::DXIL]);
    }

    #[test]
    fn test_strip_combined() {
        let stripped = strip_parts(
            &sample(),
            StripFlags::REFLECTION_DATA | StripFlags::PRIVATE_DATA | StripFlags::ROOT_SIGNATURE,
        )
        .unwrap();
        assert_eq!(kinds(&stripped), [PartKind::ILDB, PartKind::ILDN, PartKind::DXIL]);
    }

    #[test]
    fn test_nothing_to_strip() {
        let blob = strip_reflection_data(&sample()).unwrap();
        let again = strip_reflection_data(&blob).unwrap();
        assert_eq!(blob, again);
    }

    #[test]
    fn test_signed_stays_signed() {
        let signed = container::sign(&sample()).unwrap();
        let stripped = strip_debug_info(&signed).unwrap();
        assert!(Container::load(&stripped).unwrap().digest_matches());
    }
}
