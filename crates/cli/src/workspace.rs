//! Filesystem-backed contributor and filter for a project directory.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use jsindex_indexer::{FileContributor, FileHandle, FileSource, FilterParticipant, Locator};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("Invalid glob '{pattern}'"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `root`-relative path with forward slashes.
fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Lists the files under one root, honouring `.gitignore` and hidden-file rules.
pub struct DirectoryContributor {
    container: Locator,
    root: PathBuf,
    include: GlobSet,
}

impl DirectoryContributor {
    pub fn new(container: Locator, root: impl Into<PathBuf>, include: &[String]) -> Result<Self> {
        Ok(Self {
            container,
            root: root.into(),
            include: build_globset(include)?,
        })
    }
}

impl FileContributor for DirectoryContributor {
    fn files_for(&self, container: &Locator) -> BTreeSet<FileHandle> {
        if *container != self.container {
            return BTreeSet::new();
        }

        let mut files = BTreeSet::new();
        let walker = WalkBuilder::new(&self.root).require_git(false).build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Skipping unreadable entry under {}: {err}", self.root.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            if self.include.is_match(relative(&self.root, entry.path())) {
                files.insert(FileHandle::on_disk(entry.into_path()));
            }
        }
        log::debug!("{} files under {}", files.len(), self.root.display());
        files
    }
}

/// Drops files whose root-relative path matches any exclude glob.
pub struct ExcludeFilter {
    root: PathBuf,
    exclude: GlobSet,
}

impl ExcludeFilter {
    pub fn new(root: impl Into<PathBuf>, exclude: &[String]) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            exclude: build_globset(exclude)?,
        })
    }

    fn excludes(&self, file: &FileHandle) -> bool {
        match file.source() {
            FileSource::Disk(path) => self.exclude.is_match(relative(&self.root, path)),
            FileSource::Memory(_) => self.exclude.is_match(file.locator().as_str()),
        }
    }
}

impl FilterParticipant for ExcludeFilter {
    fn apply_filter(&self, files: BTreeSet<FileHandle>) -> BTreeSet<FileHandle> {
        files.into_iter().filter(|file| !self.excludes(file)).collect()
    }
}
