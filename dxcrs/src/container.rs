//! Program containers
//!
//! A container is an ordered list of typed parts behind a fixed header:
//!
//! ```text
//! offset 0   magic        "DXBC"
//! offset 4   digest       16 bytes, all zero when unsigned
//! offset 20  version      u16 major = 1, u16 minor = 0
//! offset 24  total size   u32
//! offset 28  part count   u32
//! offset 32  part offsets u32 * part count
//! part:      kind u32 (FourCC), size u32, payload
//! ```
//!
//! All fields are little endian. Parts of kinds a reader does not know are
//! skipped by their size.

use crate::reflect::{self, ReflectionCapability, ReflectionView};
use crate::{Blob, Error, Result};
use log::{debug, trace};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Container magic
pub const CONTAINER_MAGIC: [u8; 4] = *b"DXBC";

/// Size of the fixed header before the part offset table
pub const HEADER_SIZE: usize = 32;

/// Size of each part header (kind and size)
pub const PART_HEADER_SIZE: usize = 8;

const DIGEST_RANGE: std::ops::Range<usize> = 4..20;

/// Four-character part tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartKind(pub u32);

impl PartKind {
    /// Program bitcode
    pub const DXIL: PartKind = PartKind::from_fourcc(*b"DXIL");
    /// Input signature
    pub const ISG1: PartKind = PartKind::from_fourcc(*b"ISG1");
    /// Output signature
    pub const OSG1: PartKind = PartKind::from_fourcc(*b"OSG1");
    /// Patch constant signature
    pub const PSG1: PartKind = PartKind::from_fourcc(*b"PSG1");
    /// Pipeline state
    pub const PSV0: PartKind = PartKind::from_fourcc(*b"PSV0");
    /// Root signature
    pub const RTS0: PartKind = PartKind::from_fourcc(*b"RTS0");
    /// Reflection summary
    pub const STAT: PartKind = PartKind::from_fourcc(*b"STAT");
    /// Program bitcode with debug information
    pub const ILDB: PartKind = PartKind::from_fourcc(*b"ILDB");
    /// Debug name
    pub const ILDN: PartKind = PartKind::from_fourcc(*b"ILDN");
    /// Private data
    pub const PRIV: PartKind = PartKind::from_fourcc(*b"PRIV");
    /// Shader hash
    pub const HASH: PartKind = PartKind::from_fourcc(*b"HASH");

    /// Builds a kind from its four characters
    pub const fn from_fourcc(tag: [u8; 4]) -> Self {
        PartKind(u32::from_le_bytes(tag))
    }

    /// The kind's four characters
    pub fn fourcc(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.fourcc();
        if tag.iter().all(|b| b.is_ascii_graphic()) {
            tag.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl fmt::Debug for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartKind({self})")
    }
}

impl FromStr for PartKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidParameter(format!("part kind '{s}' is not four characters")))?;
        if !bytes.iter().all(u8::is_ascii_graphic) {
            return Err(Error::InvalidParameter(format!(
                "part kind '{s}' is not printable ASCII"
            )));
        }
        Ok(PartKind::from_fourcc(bytes))
    }
}

/// One typed part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPart {
    /// Part kind
    pub kind: PartKind,
    /// Part payload
    pub content: Blob,
}

/// A loaded container
///
/// Part contents are views into the loaded blob; loading never copies or
/// parses part payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    blob: Blob,
    digest: [u8; 16],
    parts: Vec<ContainerPart>,
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl Container {
    /// Parses the container header and part table of `blob`.
    ///
    /// Fails with [`Error::Format`] if the magic, version, size or any part
    /// header does not fit the layout.
    pub fn load(blob: &Blob) -> Result<Self> {
        let bytes = blob.as_bytes();
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Format(format!(
                "container is too small ({} bytes)",
                bytes.len()
            )));
        }
        if bytes[..4] != CONTAINER_MAGIC {
            return Err(Error::Format("bad container magic".to_string()));
        }
        let (major, minor) = (read_u16(bytes, 20), read_u16(bytes, 22));
        if major != 1 {
            return Err(Error::Format(format!(
                "unsupported container version {major}.{minor}"
            )));
        }
        let total_size = read_u32(bytes, 24) as usize;
        if total_size != bytes.len() {
            return Err(Error::Format(format!(
                "container size field {total_size} does not match blob size {}",
                bytes.len()
            )));
        }
        let part_count = read_u32(bytes, 28) as usize;
        let table_end = part_count
            .checked_mul(4)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| Error::Format(format!("part count {part_count} exceeds the container")))?;

        let mut parts = Vec::with_capacity(part_count);
        for index in 0..part_count {
            let offset = read_u32(bytes, HEADER_SIZE + index * 4) as usize;
            if offset < table_end || offset + PART_HEADER_SIZE > bytes.len() {
                return Err(Error::Format(format!(
                    "part {index} header at offset {offset} is outside the container"
                )));
            }
            let kind = PartKind(read_u32(bytes, offset));
            let size = read_u32(bytes, offset + 4) as usize;
            let content = blob
                .sub_blob(offset + PART_HEADER_SIZE, size)
                .map_err(|_| Error::Format(format!("part {index} ('{kind}') of {size} bytes is truncated")))?;
            trace!("part {index}: '{kind}', {size} bytes");
            parts.push(ContainerPart { kind, content });
        }

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&bytes[DIGEST_RANGE]);
        debug!("loaded container of {} bytes with {part_count} parts", bytes.len());
        Ok(Container {
            blob: blob.clone(),
            digest,
            parts,
        })
    }

    /// Number of parts
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// All parts in stored order
    pub fn parts(&self) -> &[ContainerPart] {
        &self.parts
    }

    fn part(&self, index: usize) -> Result<&ContainerPart> {
        self.parts.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.parts.len(),
        })
    }

    /// Kind of the part at `index`
    pub fn part_kind(&self, index: usize) -> Result<PartKind> {
        self.part(index).map(|p| p.kind)
    }

    /// Content of the part at `index`
    pub fn part_content(&self, index: usize) -> Result<Blob> {
        self.part(index).map(|p| p.content.clone())
    }

    /// Index of the first part of `kind`, in stored order
    pub fn find_first_part_kind(&self, kind: PartKind) -> Option<usize> {
        self.parts.iter().position(|p| p.kind == kind)
    }

    /// Content of the first part of `kind`
    pub fn find_part(&self, kind: PartKind) -> Option<&Blob> {
        self.parts.iter().find(|p| p.kind == kind).map(|p| &p.content)
    }

    /// Builds the `capability` view of the part at `index`.
    ///
    /// Fails with [`Error::UnsupportedCapability`] when parts of that kind do
    /// not offer the view.
    pub fn part_reflection(
        &self,
        index: usize,
        capability: ReflectionCapability,
    ) -> Result<ReflectionView> {
        let part = self.part(index)?;
        reflect::reflect_part(part.kind, part.content.as_bytes(), capability)
    }

    /// The digest stored in the header
    pub fn digest(&self) -> [u8; 16] {
        self.digest
    }

    /// Returns true if the header carries a digest
    pub fn is_signed(&self) -> bool {
        self.digest != [0; 16]
    }

    /// Returns true if the stored digest matches the contents
    pub fn digest_matches(&self) -> bool {
        compute_digest(self.blob.as_bytes()) == self.digest
    }

    /// The loaded bytes
    pub fn as_blob(&self) -> &Blob {
        &self.blob
    }
}

/// Assembles parts into container bytes
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    parts: Vec<ContainerPart>,
}

impl ContainerBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the parts of an existing container.
    pub fn from_container(container: &Container) -> Self {
        ContainerBuilder {
            parts: container.parts.clone(),
        }
    }

    /// Appends a part (builder pattern).
    pub fn with_part(mut self, kind: PartKind, content: impl Into<Blob>) -> Self {
        self.add_part(kind, content);
        self
    }

    /// Appends a part.
    pub fn add_part(&mut self, kind: PartKind, content: impl Into<Blob>) {
        self.parts.push(ContainerPart {
            kind,
            content: content.into(),
        });
    }

    /// Replaces the first part of `kind`, or appends one if there is none.
    pub fn set_part(&mut self, kind: PartKind, content: impl Into<Blob>) {
        let content = content.into();
        match self.parts.iter_mut().find(|p| p.kind == kind) {
            Some(part) => part.content = content,
            None => self.parts.push(ContainerPart { kind, content }),
        }
    }

    /// Removes every part matching `predicate`, returning how many went.
    pub fn remove_parts(&mut self, mut predicate: impl FnMut(PartKind) -> bool) -> usize {
        let before = self.parts.len();
        self.parts.retain(|p| !predicate(p.kind));
        before - self.parts.len()
    }

    /// Number of parts added so far
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Writes the container with an all-zero digest.
    pub fn build(&self) -> Result<Blob> {
        let table_end = HEADER_SIZE + self.parts.len() * 4;
        let total: usize = table_end
            + self
                .parts
                .iter()
                .map(|p| PART_HEADER_SIZE + p.content.len())
                .sum::<usize>();
        let too_large = || Error::Format(format!("container of {total} bytes is too large"));
        let total_u32 = u32::try_from(total).map_err(|_| too_large())?;

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&CONTAINER_MAGIC);
        bytes.extend_from_slice(&[0; 16]);
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&total_u32.to_le_bytes());
        bytes.extend_from_slice(&(self.parts.len() as u32).to_le_bytes());

        let mut offset = table_end;
        for part in &self.parts {
            bytes.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += PART_HEADER_SIZE + part.content.len();
        }
        for part in &self.parts {
            let size = u32::try_from(part.content.len()).map_err(|_| too_large())?;
            bytes.extend_from_slice(&part.kind.0.to_le_bytes());
            bytes.extend_from_slice(&size.to_le_bytes());
            bytes.extend_from_slice(part.content.as_bytes());
        }
        debug!("built container of {total} bytes with {} parts", self.parts.len());
        Ok(Blob::from_vec(bytes))
    }
}

/// First 16 bytes of the SHA-1 of everything after the digest field
pub fn compute_digest(container: &[u8]) -> [u8; 16] {
    let hash = Sha1::digest(container.get(DIGEST_RANGE.end..).unwrap_or(&[]));
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hash[..16]);
    digest
}

/// Returns a copy of `container` with its digest filled in
pub fn sign(container: &Blob) -> Result<Blob> {
    Container::load(container)?;
    let mut bytes = container.to_vec();
    let digest = compute_digest(&bytes);
    bytes[DIGEST_RANGE].copy_from_slice(&digest);
    Ok(Blob::from_vec(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Blob {
        ContainerBuilder::new()
            .with_part(PartKind(1), b"one".to_vec())
            .with_part(PartKind(2), b"two!".to_vec())
            .with_part(PartKind(1), b"again".to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn test_load_built_container() {
        let blob = sample();
        let container = Container::load(&blob).unwrap();
        assert_eq!(container.part_count(), 3);
        assert_eq!(container.part_kind(1).unwrap(), PartKind(2));
        assert_eq!(container.part_content(2).unwrap().as_bytes(), b"again");
        assert!(!container.is_signed());
    }

    #[test]
    fn test_find_first_returns_first_match() {
        let container = Container::load(&sample()).unwrap();
        assert_eq!(container.find_first_part_kind(PartKind(1)), Some(0));
        assert_eq!(container.find_first_part_kind(PartKind(3)), None);
    }

    #[test]
    fn test_index_out_of_range() {
        let container = Container::load(&sample()).unwrap();
        assert!(matches!(
            container.part_kind(3),
            Err(Error::IndexOutOfRange { index: 3, count: 3 })
        ));
        assert!(container.part_content(7).is_err());
    }

    #[test]
    fn test_load_is_idempotent() {
        let blob = sample();
        assert_eq!(Container::load(&blob).unwrap(), Container::load(&blob).unwrap());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(Container::load(&Blob::new(8)), Err(Error::Format(_))));

        let mut bytes = sample().to_vec();
        bytes[0] = b'X';
        assert!(Container::load(&Blob::from_vec(bytes)).is_err());

        let mut bytes = sample().to_vec();
        bytes.pop();
        assert!(Container::load(&Blob::from_vec(bytes)).is_err());

        let mut bytes = sample().to_vec();
        bytes[28] = 200;
        assert!(Container::load(&Blob::from_vec(bytes)).is_err());

        // first part claims more bytes than remain
        let mut bytes = sample().to_vec();
        let offset = read_u32(&bytes, HEADER_SIZE) as usize;
        bytes[offset + 4] = 0xff;
        assert!(Container::load(&Blob::from_vec(bytes)).is_err());
    }

    #[test]
    fn test_unknown_kinds_are_skipped_by_size() {
        let blob = ContainerBuilder::new()
            .with_part(PartKind::from_fourcc(*b"XYZW"), vec![9; 13])
            .with_part(PartKind::PRIV, b"data".to_vec())
            .build()
            .unwrap();
        let container = Container::load(&blob).unwrap();
        assert_eq!(container.find_part(PartKind::PRIV).unwrap().as_bytes(), b"data");
    }

    #[test]
    fn test_sign() {
        let signed = sign(&sample()).unwrap();
        let container = Container::load(&signed).unwrap();
        assert!(container.is_signed());
        assert!(container.digest_matches());
        assert_eq!(&signed[20..], &sample()[20..]);
    }

    #[test]
    fn test_part_kind_text() {
        assert_eq!(PartKind::DXIL.to_string(), "DXIL");
        assert_eq!(format!("{:?}", PartKind::STAT), "PartKind(STAT)");
        assert_eq!(PartKind(1).to_string(), "0x00000001");
        assert_eq!("RTS0".parse::<PartKind>().unwrap(), PartKind::RTS0);
        assert!("RTS".parse::<PartKind>().is_err());
    }

    #[test]
    fn test_set_and_remove_parts() {
        let container = Container::load(&sample()).unwrap();
        let mut builder = ContainerBuilder::from_container(&container);
        builder.set_part(PartKind(1), b"first".to_vec());
        builder.set_part(PartKind(5), b"new".to_vec());
        assert_eq!(builder.part_count(), 4);
        assert_eq!(builder.remove_parts(|k| k == PartKind(2)), 1);
        let rebuilt = Container::load(&builder.build().unwrap()).unwrap();
        let kinds: Vec<_> = rebuilt.parts().iter().map(|p| p.kind.0).collect();
        assert_eq!(kinds, [1, 1, 5]);
        assert_eq!(rebuilt.part_content(0).unwrap().as_bytes(), b"first");
    }
}
