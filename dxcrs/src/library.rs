//! Blob construction and encoding conversion service

use crate::{Blob, CodePage, EncodedBlob, FileSystemInclude, Result};
use log::debug;
use std::path::Path;

/// Creates blobs and converts their encodings
///
/// # Example
/// ```
/// use dxcrs::{CodePage, Library};
///
/// let library = Library::new();
/// let source = library.create_blob_with_encoding(b"float4 x;", Some(CodePage::UTF8));
/// let utf16 = library.get_blob_as_utf16(&source).unwrap();
/// assert_eq!(utf16.len(), 18);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Library;

impl Library {
    /// Creates the service.
    pub fn new() -> Self {
        Library
    }

    /// Sub-range view of `parent` sharing its storage.
    ///
    /// Fails with [`crate::Error::OutOfRange`] when `offset + length`
    /// exceeds the parent.
    pub fn create_blob_from_blob(&self, parent: &Blob, offset: usize, length: usize) -> Result<Blob> {
        parent.sub_blob(offset, length)
    }

    /// Copies `bytes` into a new blob tagged with `code_page`.
    pub fn create_blob_with_encoding(&self, bytes: &[u8], code_page: Option<CodePage>) -> EncodedBlob {
        EncodedBlob::new(Blob::from(bytes), code_page)
    }

    /// Wraps `bytes` without copying.
    pub fn create_blob_from_pinned(
        &self,
        bytes: &'static [u8],
        code_page: Option<CodePage>,
    ) -> EncodedBlob {
        EncodedBlob::new(Blob::from_static(bytes), code_page)
    }

    /// Reads a whole file into a blob tagged with `code_page`.
    pub fn create_blob_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        code_page: Option<CodePage>,
    ) -> Result<EncodedBlob> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        debug!("read {} bytes from {}", bytes.len(), path.display());
        Ok(EncodedBlob::new(Blob::from_vec(bytes), code_page))
    }

    /// Zero-filled blob of `size` bytes
    pub fn create_blob(&self, size: usize) -> Blob {
        Blob::new(size)
    }

    /// Converts to UTF-8. Untagged input is sniffed and stays untagged.
    pub fn get_blob_as_utf8(&self, blob: &EncodedBlob) -> Result<EncodedBlob> {
        blob.as_utf8()
    }

    /// Converts to UTF-16 little endian. Untagged input is sniffed and stays untagged.
    pub fn get_blob_as_utf16(&self, blob: &EncodedBlob) -> Result<EncodedBlob> {
        blob.as_utf16()
    }

    /// Include resolver that searches the current directory.
    pub fn create_include_handler(&self) -> FileSystemInclude {
        FileSystemInclude::with_current_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, IncludeResolver};
    use std::io::Write;

    #[test]
    fn test_sub_blob_matches_parent() {
        let library = Library::new();
        let parent = Blob::from(&b"0123456789"[..]);
        let child = library.create_blob_from_blob(&parent, 3, 4).unwrap();
        assert_eq!(child.as_bytes(), b"3456");
        assert!(matches!(
            library.create_blob_from_blob(&parent, 8, 3),
            Err(Error::OutOfRange { offset: 8, length: 3, size: 10 })
        ));
    }

    #[test]
    fn test_pinned_and_zeroed() {
        static SOURCE: &[u8] = b"float4 main();";
        let library = Library::new();
        let pinned = library.create_blob_from_pinned(SOURCE, Some(CodePage::ASCII));
        assert_eq!(pinned.as_ptr(), SOURCE.as_ptr());
        assert_eq!(pinned.code_page(), Some(CodePage::ASCII));
        assert_eq!(library.create_blob(4).as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_unknown_encoding_stays_unknown() {
        let library = Library::new();
        let untagged = library.create_blob_with_encoding(b"abc", None);
        let utf8 = library.get_blob_as_utf8(&untagged).unwrap();
        assert!(!utf8.is_known_encoding());
        assert_eq!(utf8.to_text().unwrap(), "abc");

        let tagged = library.create_blob_with_encoding(b"abc", Some(CodePage::UTF8));
        let utf16 = library.get_blob_as_utf16(&tagged).unwrap();
        assert!(utf16.is_known_encoding());
        assert_eq!(utf16.as_bytes(), b"a\0b\0c\0");
    }

    #[test]
    fn test_blob_from_file() {
        let path = std::env::temp_dir().join(format!("dxcrs-library-{}.hlsl", std::process::id()));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"// shader")
            .unwrap();
        let blob = Library::new()
            .create_blob_from_file(&path, Some(CodePage::UTF8))
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(blob.to_text().unwrap(), "// shader");

        let missing = Library::new().create_blob_from_file(&path, None);
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_include_handler_misses_cleanly() {
        let mut handler = Library::new().create_include_handler();
        assert!(handler.load("definitely/not/here.hlsli").unwrap().is_none());
    }
}
