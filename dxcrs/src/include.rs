//! Include resolvers for custom #include resolution

use crate::{Blob, EncodedBlob, Error, Result};
use dxcompiler::preprocess::{IncludeLoader, IncludedFile};
use log::trace;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Trait for custom include file resolution
///
/// Implement this trait to provide custom handling for #include directives
/// in your HLSL shaders. The driver calls it with candidate file names:
/// first relative to the directory of the including file, then the name
/// exactly as written.
///
/// # Example
/// ```no_run
/// use dxcrs::{Blob, EncodedBlob, IncludeResolver, Result};
///
/// struct MyResolver {
///     base_path: std::path::PathBuf,
/// }
///
/// impl IncludeResolver for MyResolver {
///     fn load(&mut self, filename: &str) -> Result<Option<EncodedBlob>> {
///         match std::fs::read(self.base_path.join(filename)) {
///             Ok(bytes) => Ok(Some(EncodedBlob::new(Blob::from_vec(bytes), None))),
///             Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
///             Err(e) => Err(e.into()),
///         }
///     }
/// }
/// ```
pub trait IncludeResolver {
    /// Loads an include file.
    ///
    /// Returns `Ok(None)` when the file does not exist; errors are reserved
    /// for failures such as permission problems and abort the compilation.
    fn load(&mut self, filename: &str) -> Result<Option<EncodedBlob>>;
}

/// File system include resolver that searches a list of directories.
///
/// # Example
/// ```no_run
/// use dxcrs::FileSystemInclude;
///
/// let include = FileSystemInclude::new()
///     .with_path("shaders/include")
///     .with_path("/usr/local/share/hlsl");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileSystemInclude {
    search_paths: Vec<PathBuf>,
}

impl FileSystemInclude {
    /// Creates a new file system resolver with no search paths.
    pub fn new() -> Self {
        FileSystemInclude {
            search_paths: Vec::new(),
        }
    }

    /// Creates a new resolver with the current directory as the first search path.
    pub fn with_current_dir() -> Self {
        let mut resolver = Self::new();
        if let Ok(cwd) = std::env::current_dir() {
            resolver.search_paths.push(cwd);
        }
        resolver
    }

    /// Adds a search path (builder pattern).
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Adds a search path.
    pub fn add_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.search_paths.push(path.into());
    }

    /// Returns the search paths.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Reads `path`; a missing file or a directory counts as not found
    fn read(path: &Path) -> Result<Option<EncodedBlob>> {
        if path.is_dir() {
            trace!("skipping directory {}", path.display());
            return Ok(None);
        }
        match std::fs::read(path) {
            Ok(bytes) => {
                trace!("resolved include {}", path.display());
                Ok(Some(EncodedBlob::new(Blob::from_vec(bytes), None)))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::IsADirectory) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl IncludeResolver for FileSystemInclude {
    fn load(&mut self, filename: &str) -> Result<Option<EncodedBlob>> {
        let path = Path::new(filename);
        if path.is_absolute() {
            return Self::read(path);
        }
        for search_path in &self.search_paths {
            if let Some(blob) = Self::read(&search_path.join(path))? {
                return Ok(Some(blob));
            }
        }
        Self::read(path)
    }
}

/// In-memory include resolver for testing or embedded includes.
///
/// # Example
/// ```
/// use dxcrs::MemoryInclude;
///
/// let mut resolver = MemoryInclude::new();
/// resolver.add("common.hlsl", b"float4 white = float4(1,1,1,1);");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryInclude {
    files: HashMap<String, EncodedBlob>,
}

impl MemoryInclude {
    /// Creates a new empty memory resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with unknown encoding.
    pub fn add(&mut self, filename: &str, contents: &[u8]) {
        self.insert(filename, EncodedBlob::new(Blob::from(contents), None));
    }

    /// Adds a file (builder pattern).
    pub fn with_file(mut self, filename: &str, contents: &[u8]) -> Self {
        self.add(filename, contents);
        self
    }

    /// Adds an already encoded file.
    pub fn insert(&mut self, filename: &str, contents: EncodedBlob) {
        self.files.insert(normalize(filename), contents);
    }

    /// Number of files held
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files are held
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IncludeResolver for MemoryInclude {
    fn load(&mut self, filename: &str) -> Result<Option<EncodedBlob>> {
        Ok(self.files.get(&normalize(filename)).cloned())
    }
}

/// Unifies separators and drops `./` prefixes
fn normalize(filename: &str) -> String {
    let unified = filename.replace('\\', "/");
    let mut name = unified.as_str();
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.to_string()
}

/// Candidate names for `name` included from `includer`, in lookup order
fn candidates(name: &str, includer: &str) -> Vec<String> {
    let mut list = Vec::with_capacity(2);
    let relative = !Path::new(name).is_absolute();
    if let Some(dir) = includer.rfind(['/', '\\']).map(|i| &includer[..i])
        && relative
        && !dir.is_empty()
    {
        list.push(format!("{dir}/{name}"));
    }
    list.push(name.to_string());
    list
}

/// Adapts an [`IncludeResolver`] to the preprocessor's loader interface
pub(crate) struct ResolverLoader<'a> {
    resolver: &'a mut dyn IncludeResolver,
}

impl<'a> ResolverLoader<'a> {
    pub(crate) fn new(resolver: &'a mut dyn IncludeResolver) -> Self {
        ResolverLoader { resolver }
    }
}

impl IncludeLoader for ResolverLoader<'_> {
    fn load(&mut self, name: &str, includer: &str) -> io::Result<Option<IncludedFile>> {
        for candidate in candidates(name, includer) {
            let found = match self.resolver.load(&candidate) {
                Ok(found) => found,
                Err(Error::Io(e)) => return Err(e),
                Err(e) => return Err(io::Error::other(e.to_string())),
            };
            if let Some(blob) = found {
                let text = blob
                    .to_text()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                return Ok(Some(IncludedFile {
                    name: candidate,
                    text,
                }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_include() {
        let mut resolver = MemoryInclude::new().with_file("test.hlsl", b"float x = 1.0;");

        let found = resolver.load("test.hlsl").unwrap().unwrap();
        assert_eq!(found.as_bytes(), b"float x = 1.0;");
        assert!(!found.is_known_encoding());
        assert!(resolver.load("./test.hlsl").unwrap().is_some());

        assert!(resolver.load("missing.hlsl").unwrap().is_none());
    }

    #[test]
    fn test_candidates() {
        assert_eq!(candidates("a.h", "main.hlsl"), ["a.h"]);
        assert_eq!(candidates("a.h", "shaders/main.hlsl"), ["shaders/a.h", "a.h"]);
        assert_eq!(candidates("a.h", "shaders\\main.hlsl"), ["shaders/a.h", "a.h"]);
    }

    #[test]
    fn test_loader_prefers_includer_directory() {
        let mut resolver = MemoryInclude::new()
            .with_file("lib/common.h", b"near")
            .with_file("common.h", b"far");
        let mut loader = ResolverLoader::new(&mut resolver);
        let file = loader.load("common.h", "lib/main.hlsl").unwrap().unwrap();
        assert_eq!(file.name, "lib/common.h");
        assert_eq!(file.text, "near");
        let file = loader.load("common.h", "main.hlsl").unwrap().unwrap();
        assert_eq!(file.text, "far");
        assert!(loader.load("other.h", "main.hlsl").unwrap().is_none());
    }

    #[test]
    fn test_file_system_include() {
        let dir = std::env::temp_dir().join(format!("dxcrs-include-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("defs.hlsli"), "#define ONE 1\n").unwrap();

        let mut resolver = FileSystemInclude::new().with_path(&dir);
        assert_eq!(resolver.search_paths().len(), 1);
        let blob = resolver.load("defs.hlsli").unwrap().unwrap();
        assert_eq!(blob.to_text().unwrap(), "#define ONE 1\n");
        assert!(resolver.load("nothing.hlsli").unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_directory_is_skipped() {
        let dir = std::env::temp_dir().join(format!("dxcrs-include-dirs-{}", std::process::id()));
        let (a, b) = (dir.join("a"), dir.join("b"));
        std::fs::create_dir_all(a.join("common")).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(b.join("common"), "float k;\n").unwrap();

        let mut resolver = FileSystemInclude::new().with_path(&a).with_path(&b);
        let blob = resolver.load("common").unwrap().unwrap();
        assert_eq!(blob.to_text().unwrap(), "float k;\n");

        let mut only_dir = FileSystemInclude::new().with_path(&a);
        assert!(only_dir.load("common").unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
