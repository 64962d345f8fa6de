//! Immutable byte buffers and encoded text

use crate::{Error, Result};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Clone)]
enum Storage {
    Owned(Arc<[u8]>),
    Pinned(&'static [u8]),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(data) => data,
            Storage::Pinned(data) => data,
        }
    }
}

/// Immutable, shareable byte buffer
///
/// Cloning a blob or taking a sub-range never copies the bytes: the views
/// keep the parent's storage alive for as long as they exist.
#[derive(Clone)]
pub struct Blob {
    storage: Storage,
    start: usize,
    len: usize,
}

impl Blob {
    /// Creates a zero-filled blob of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::from_vec(vec![0; size])
    }

    /// Takes ownership of `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Blob {
            storage: Storage::Owned(bytes.into()),
            start: 0,
            len,
        }
    }

    /// Wraps static memory without copying it.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Blob {
            storage: Storage::Pinned(bytes),
            start: 0,
            len: bytes.len(),
        }
    }

    /// Returns a view of `length` bytes starting at `offset`.
    ///
    /// Fails with [`Error::OutOfRange`] if the range does not fit inside
    /// this blob.
    pub fn sub_blob(&self, offset: usize, length: usize) -> Result<Blob> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len => Ok(Blob {
                storage: self.storage.clone(),
                start: self.start + offset,
                len: length,
            }),
            _ => Err(Error::OutOfRange {
                offset,
                length,
                size: self.len,
            }),
        }
    }

    /// Returns the blob data as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[self.start..self.start + self.len]
    }

    /// Returns the size of the blob in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Interprets the blob as UTF-8 text.
    ///
    /// Trailing null bytes are trimmed.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(trim_nuls(self.as_bytes())).map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Converts the blob to a String, trimming trailing nulls.
    ///
    /// Invalid UTF-8 sequences are replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(trim_nuls(self.as_bytes())).into_owned()
    }

    /// Copies the contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

fn trim_nuls(bytes: &[u8]) -> &[u8] {
    bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| &bytes[..=i])
        .unwrap_or(&[])
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Blob {}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob::from_vec(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob::from_vec(bytes.to_vec())
    }
}

impl From<String> for Blob {
    fn from(text: String) -> Self {
        Blob::from_vec(text.into_bytes())
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Self {
        Blob::from_vec(text.as_bytes().to_vec())
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.len)
            .field("pinned", &matches!(self.storage, Storage::Pinned(_)))
            .finish()
    }
}

/// Windows-style code page identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodePage(pub u32);

impl CodePage {
    /// UTF-8
    pub const UTF8: CodePage = CodePage(65001);
    /// UTF-16, little endian
    pub const UTF16: CodePage = CodePage(1200);
    /// UTF-16, big endian
    pub const UTF16_BE: CodePage = CodePage(1201);
    /// 7-bit ASCII
    pub const ASCII: CodePage = CodePage(20127);
    /// ISO 8859-1
    pub const LATIN1: CodePage = CodePage(28591);

    /// Returns true if text in this code page can be decoded
    pub fn is_supported(&self) -> bool {
        matches!(
            *self,
            CodePage::UTF8 | CodePage::UTF16 | CodePage::UTF16_BE | CodePage::ASCII | CodePage::LATIN1
        )
    }

    /// Guesses the code page of `bytes`.
    ///
    /// Byte order marks win; then a NUL in every odd byte of the first
    /// pairs means UTF-16LE; then valid UTF-8; anything else is Latin-1.
    pub fn sniff(bytes: &[u8]) -> CodePage {
        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return CodePage::UTF8;
        }
        if bytes.starts_with(&[0xFF, 0xFE]) {
            return CodePage::UTF16;
        }
        if bytes.starts_with(&[0xFE, 0xFF]) {
            return CodePage::UTF16_BE;
        }
        if bytes.len() >= 2 && bytes.len() % 2 == 0 {
            let pairs = bytes.chunks_exact(2).take(8);
            if pairs.clone().all(|p| p[1] == 0) && pairs.clone().any(|p| p[0] != 0) {
                return CodePage::UTF16;
            }
        }
        if std::str::from_utf8(bytes).is_ok() {
            CodePage::UTF8
        } else {
            CodePage::LATIN1
        }
    }

    /// Decodes `bytes`, skipping a leading byte order mark.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match *self {
            CodePage::UTF8 => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| Error::Encoding(e.to_string()))
            }
            CodePage::UTF16 | CodePage::UTF16_BE => {
                if bytes.len() % 2 != 0 {
                    return Err(Error::Encoding(format!(
                        "UTF-16 text has an odd length of {} bytes",
                        bytes.len()
                    )));
                }
                let big_endian = *self == CodePage::UTF16_BE;
                let mut units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|p| {
                        if big_endian {
                            u16::from_be_bytes([p[0], p[1]])
                        } else {
                            u16::from_le_bytes([p[0], p[1]])
                        }
                    })
                    .collect();
                if units.first() == Some(&0xFEFF) {
                    units.remove(0);
                }
                String::from_utf16(&units).map_err(|e| Error::Encoding(e.to_string()))
            }
            CodePage::ASCII => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(index) => Err(Error::Encoding(format!(
                    "byte 0x{:02x} at offset {index} is not ASCII",
                    bytes[index]
                ))),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
            CodePage::LATIN1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            CodePage(other) => Err(Error::UnsupportedCodePage(other)),
        }
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blob tagged with the text encoding of its contents
///
/// When the encoding is not known the code page carries no meaning and
/// readers sniff the bytes instead.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    blob: Blob,
    code_page: CodePage,
    known_encoding: bool,
}

impl EncodedBlob {
    /// Tags `blob` with `code_page`, or leaves it untagged for `None`.
    pub fn new(blob: Blob, code_page: Option<CodePage>) -> Self {
        EncodedBlob {
            blob,
            code_page: code_page.unwrap_or(CodePage(0)),
            known_encoding: code_page.is_some(),
        }
    }

    /// UTF-8 blob holding `text`
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(Blob::from(text.into()), Some(CodePage::UTF8))
    }

    /// Underlying bytes
    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    /// Unwraps the underlying bytes
    pub fn into_blob(self) -> Blob {
        self.blob
    }

    /// Returns true if the code page is known
    pub fn is_known_encoding(&self) -> bool {
        self.known_encoding
    }

    /// Code page, when known
    pub fn code_page(&self) -> Option<CodePage> {
        self.known_encoding.then_some(self.code_page)
    }

    /// Code page to decode with: the tag, or a guess for untagged blobs
    pub fn effective_code_page(&self) -> CodePage {
        self.code_page()
            .unwrap_or_else(|| CodePage::sniff(self.blob.as_bytes()))
    }

    /// Decodes the contents to a String, trimming trailing nulls.
    pub fn to_text(&self) -> Result<String> {
        let text = self.effective_code_page().decode(self.blob.as_bytes())?;
        Ok(text.trim_end_matches('\0').to_string())
    }

    /// Converts to UTF-8.
    ///
    /// The result is only marked as known if this blob's encoding was.
    pub fn as_utf8(&self) -> Result<EncodedBlob> {
        if self.code_page() == Some(CodePage::UTF8) {
            return Ok(self.clone());
        }
        let text = self.to_text()?;
        Ok(self.converted(text.into_bytes(), CodePage::UTF8))
    }

    /// Converts to little-endian UTF-16 without a byte order mark.
    ///
    /// The result is only marked as known if this blob's encoding was.
    pub fn as_utf16(&self) -> Result<EncodedBlob> {
        if self.code_page() == Some(CodePage::UTF16) {
            return Ok(self.clone());
        }
        let text = self.to_text()?;
        let bytes = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        Ok(self.converted(bytes, CodePage::UTF16))
    }

    fn converted(&self, bytes: Vec<u8>, code_page: CodePage) -> EncodedBlob {
        EncodedBlob {
            blob: Blob::from_vec(bytes),
            code_page,
            known_encoding: self.known_encoding,
        }
    }
}

impl Deref for EncodedBlob {
    type Target = Blob;

    fn deref(&self) -> &Self::Target {
        &self.blob
    }
}

impl AsRef<[u8]> for EncodedBlob {
    fn as_ref(&self) -> &[u8] {
        self.blob.as_bytes()
    }
}

impl fmt::Debug for EncodedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedBlob")
            .field("len", &self.blob.len())
            .field("code_page", &self.code_page())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_create() {
        let blob = Blob::new(256);
        assert_eq!(blob.len(), 256);
        assert!(!blob.is_empty());
        assert!(blob.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sub_blob() {
        let blob = Blob::from_vec((0u8..16).collect());
        let sub = blob.sub_blob(4, 6).unwrap();
        assert_eq!(sub.as_bytes(), &[4, 5, 6, 7, 8, 9]);
        let nested = sub.sub_blob(2, 4).unwrap();
        assert_eq!(nested.as_bytes(), &[6, 7, 8, 9]);
        assert!(blob.sub_blob(16, 0).unwrap().is_empty());
        drop(blob);
        assert_eq!(nested.as_bytes()[0], 6);
    }

    #[test]
    fn test_sub_blob_out_of_range() {
        let blob = Blob::new(10);
        assert!(matches!(
            blob.sub_blob(4, 7),
            Err(Error::OutOfRange {
                offset: 4,
                length: 7,
                size: 10
            })
        ));
        assert!(blob.sub_blob(usize::MAX, 2).is_err());
        let sub = blob.sub_blob(2, 4).unwrap();
        assert!(sub.sub_blob(1, 4).is_err());
    }

    #[test]
    fn test_as_str_trims_nuls() {
        let blob = Blob::from_static(b"error: bad\0\0");
        assert_eq!(blob.as_str().unwrap(), "error: bad");
        assert!(Blob::from_static(&[0xff, 0xfe, 0x41]).as_str().is_err());
    }

    #[test]
    fn test_sniffing() {
        assert_eq!(CodePage::sniff(b"\xEF\xBB\xBFabc"), CodePage::UTF8);
        assert_eq!(CodePage::sniff(b"\xFF\xFEa\0"), CodePage::UTF16);
        assert_eq!(CodePage::sniff(b"\xFE\xFF\0a"), CodePage::UTF16_BE);
        assert_eq!(CodePage::sniff(b"m\0a\0i\0n\0"), CodePage::UTF16);
        assert_eq!(CodePage::sniff("caf\u{e9}".as_bytes()), CodePage::UTF8);
        assert_eq!(CodePage::sniff(b"caf\xe9"), CodePage::LATIN1);
    }

    #[test]
    fn test_utf16_conversion() {
        let text = EncodedBlob::from_text("float4 \u{00e9}");
        let wide = text.as_utf16().unwrap();
        assert_eq!(wide.code_page(), Some(CodePage::UTF16));
        assert_eq!(wide.len(), 16);
        let back = wide.as_utf8().unwrap();
        assert!(back.is_known_encoding());
        assert_eq!(back.as_bytes(), text.as_bytes());
    }

    #[test]
    fn test_unknown_encoding_is_reduced_confidence() {
        let raw = EncodedBlob::new(Blob::from_static(b"m\0a\0i\0n\0"), None);
        assert_eq!(raw.code_page(), None);
        let utf8 = raw.as_utf8().unwrap();
        assert!(!utf8.is_known_encoding());
        assert_eq!(utf8.code_page(), None);
        assert_eq!(utf8.to_text().unwrap(), "main");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            CodePage(932).decode(b"abc"),
            Err(Error::UnsupportedCodePage(932))
        ));
        assert!(CodePage::ASCII.decode(b"caf\xe9").is_err());
        assert!(CodePage::UTF16.decode(b"abc").is_err());
        assert_eq!(CodePage::LATIN1.decode(b"caf\xe9").unwrap(), "caf\u{e9}");
    }
}
