use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque URI-like identity of a container or a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `file://` locator for a filesystem path, with forward slashes.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let mut normalized = path.as_ref().to_string_lossy().to_string();
        if normalized.contains('\\') {
            normalized = normalized.replace('\\', "/");
        }
        if normalized.starts_with('/') {
            Self(format!("file://{normalized}"))
        } else {
            Self(format!("file:///{normalized}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used for indexer/file-name matching.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where the contents of a file come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Disk(PathBuf),
    Memory(Arc<str>),
}

/// A file handed out by contributors. Identity is its locator.
#[derive(Debug, Clone)]
pub struct FileHandle {
    locator: Locator,
    source: FileSource,
}

impl FileHandle {
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            locator: Locator::from_path(&path),
            source: FileSource::Disk(path),
        }
    }

    pub fn in_memory(locator: impl Into<Locator>, text: impl Into<Arc<str>>) -> Self {
        Self {
            locator: locator.into(),
            source: FileSource::Memory(text.into()),
        }
    }

    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match &self.source {
            FileSource::Disk(path) => path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_else(|| self.locator.file_name()),
            FileSource::Memory(_) => self.locator.file_name(),
        }
    }

    #[must_use]
    pub const fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn read_contents(&self) -> std::io::Result<Arc<str>> {
        match &self.source {
            FileSource::Disk(path) => std::fs::read_to_string(path).map(Arc::from),
            FileSource::Memory(text) => Ok(Arc::clone(text)),
        }
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl Eq for FileHandle {}

impl Hash for FileHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.locator.hash(state);
    }
}

impl PartialOrd for FileHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.locator.cmp(&other.locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_normalizes_separators() {
        assert_eq!(
            Locator::from_path("/tmp/project/app.js").as_str(),
            "file:///tmp/project/app.js"
        );
        assert_eq!(
            Locator::from_path(r"C:\work\app.js").as_str(),
            "file:///C:/work/app.js"
        );
    }

    #[test]
    fn handles_compare_by_locator() {
        let a = FileHandle::in_memory("mem://a.js", "var a;");
        let b = FileHandle::in_memory("mem://a.js", "var b;");
        assert_eq!(a, b);
        assert_eq!(a.name(), "a.js");
    }
}
