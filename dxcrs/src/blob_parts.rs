//! Container part extraction and replacement

use crate::container::{self, Container, ContainerBuilder, PartKind};
use crate::{Blob, Error, Result};
use log::debug;

/// Container parts addressable by [`get_blob_part`] and [`set_blob_part`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobPart {
    /// Input signature
    InputSignature,
    /// Output signature
    OutputSignature,
    /// Input and output signatures as a container of their own
    InputAndOutputSignature,
    /// Patch constant signature
    PatchConstantSignature,
    /// Every signature as a container of its own
    AllSignatures,
    /// Program with debug locations
    DebugInfo,
    /// Debug program name
    DebugName,
    /// Program without debug locations
    Program,
    /// Pipeline state
    PipelineState,
    /// Reflection summary
    ReflectionData,
    /// Private data section
    PrivateData,
    /// Root signature
    RootSignature,
}

impl BlobPart {
    /// Part kind of a single-part selector, `None` for combined selectors
    pub fn part_kind(&self) -> Option<PartKind> {
        match self {
            BlobPart::InputSignature => Some(PartKind::ISG1),
            BlobPart::OutputSignature => Some(PartKind::OSG1),
            BlobPart::PatchConstantSignature => Some(PartKind::PSG1),
            BlobPart::DebugInfo => Some(PartKind::ILDB),
            BlobPart::DebugName => Some(PartKind::ILDN),
            BlobPart::Program => Some(PartKind::DXIL),
            BlobPart::PipelineState => Some(PartKind::PSV0),
            BlobPart::ReflectionData => Some(PartKind::STAT),
            BlobPart::PrivateData => Some(PartKind::PRIV),
            BlobPart::RootSignature => Some(PartKind::RTS0),
            BlobPart::InputAndOutputSignature | BlobPart::AllSignatures => None,
        }
    }

    fn combined_kinds(&self) -> &'static [PartKind] {
        match self {
            BlobPart::InputAndOutputSignature => &[PartKind::ISG1, PartKind::OSG1],
            BlobPart::AllSignatures => &[PartKind::ISG1, PartKind::OSG1, PartKind::PSG1],
            _ => &[],
        }
    }
}

/// Extracts a part from a container.
///
/// Single parts come back as zero-copy views of the container. Combined
/// selectors build a new container holding whichever of their parts exist.
/// A missing part fails with [`Error::PartNotFound`].
///
/// # Example
/// ```
/// use dxcrs::{compile, get_blob_part, BlobPart, ShaderTarget};
///
/// let bytecode = compile(
///     "float4 main(float4 pos : SV_Position) : SV_Target { return pos; }",
///     "main",
///     ShaderTarget::PS_6_0,
/// ).unwrap();
///
/// let input_sig = get_blob_part(&bytecode, BlobPart::InputSignature).unwrap();
/// assert!(!input_sig.is_empty());
/// ```
pub fn get_blob_part(container: &Blob, part: BlobPart) -> Result<Blob> {
    let container = Container::load(container)?;
    if let Some(kind) = part.part_kind() {
        return container.find_part(kind).cloned().ok_or(Error::PartNotFound(kind));
    }

    let kinds = part.combined_kinds();
    let mut builder = ContainerBuilder::new();
    for kind in kinds {
        if let Some(content) = container.find_part(*kind) {
            builder.add_part(*kind, content.clone());
        }
    }
    if builder.part_count() == 0 {
        return Err(Error::PartNotFound(kinds[0]));
    }
    builder.build()
}

/// Replaces the first part of `part`'s kind, or appends one.
///
/// A signed container comes back re-signed. Combined selectors cannot be
/// set.
pub fn set_blob_part(container: &Blob, part: BlobPart, data: &[u8]) -> Result<Blob> {
    let kind = part.part_kind().ok_or_else(|| {
        Error::InvalidParameter(format!("{part:?} cannot be set as a single part"))
    })?;
    let loaded = Container::load(container)?;
    let mut builder = ContainerBuilder::from_container(&loaded);
    builder.set_part(kind, data.to_vec());
    let rebuilt = builder.build()?;
    debug!("set '{kind}' part to {} bytes", data.len());
    if loaded.is_signed() {
        container::sign(&rebuilt)
    } else {
        Ok(rebuilt)
    }
}

/// Extracts the input signature part
pub fn get_input_signature(container: &Blob) -> Result<Blob> {
    get_blob_part(container, BlobPart::InputSignature)
}

/// Extracts the output signature part
pub fn get_output_signature(container: &Blob) -> Result<Blob> {
    get_blob_part(container, BlobPart::OutputSignature)
}

/// Extracts the debug program part (if present)
pub fn get_debug_info(container: &Blob) -> Result<Blob> {
    get_blob_part(container, BlobPart::DebugInfo)
}

/// Extracts the private data part (if present)
pub fn get_private_data(container: &Blob) -> Result<Blob> {
    get_blob_part(container, BlobPart::PrivateData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HResult;

    fn sample(signed: bool) -> Blob {
        let blob = ContainerBuilder::new()
            .with_part(PartKind::ISG1, b"in".to_vec())
            .with_part(PartKind::OSG1, b"out".to_vec())
            .with_part(PartKind::DXIL, b"program".to_vec())
            .build()
            .unwrap();
        if signed { container::sign(&blob).unwrap() } else { blob }
    }

    #[test]
    fn test_get_single_part() {
        let blob = sample(false);
        assert_eq!(get_input_signature(&blob).unwrap().as_bytes(), b"in");
        assert_eq!(get_output_signature(&blob).unwrap().as_bytes(), b"out");
    }

    #[test]
    fn test_missing_part() {
        let err = get_private_data(&sample(false)).unwrap_err();
        assert_eq!(err.hresult(), HResult::E_NOT_FOUND);
        assert!(matches!(get_debug_info(&sample(false)), Err(Error::PartNotFound(PartKind::ILDB))));
    }

    #[test]
    fn test_combined_signatures() {
        let sigs = get_blob_part(&sample(false), BlobPart::AllSignatures).unwrap();
        let container = Container::load(&sigs).unwrap();
        let kinds: Vec<_> = container.parts().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, [PartKind::ISG1, PartKind::OSG1]);
    }

    #[test]
    fn test_set_private_data() {
        let blob = sample(true);
        let modified = set_blob_part(&blob, BlobPart::PrivateData, b"metadata").unwrap();
        let container = Container::load(&modified).unwrap();
        assert_eq!(container.part_count(), 4);
        assert_eq!(get_private_data(&modified).unwrap().as_bytes(), b"metadata");
        assert!(container.digest_matches());

        let replaced = set_blob_part(&modified, BlobPart::PrivateData, b"x").unwrap();
        assert_eq!(Container::load(&replaced).unwrap().part_count(), 4);
    }

    #[test]
    fn test_set_combined_rejected() {
        let err = set_blob_part(&sample(false), BlobPart::AllSignatures, b"").unwrap_err();
        assert_eq!(err.hresult(), HResult::E_INVALIDARG);
    }
}
