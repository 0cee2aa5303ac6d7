//! URL path → filesystem resolution.
//!
//! Paths are built component by component under the canonical root. Any
//! `..`, absolute or prefix component is refused outright, and the
//! canonicalised result must still live under the root so symlinks cannot
//! escape it. Refusals surface as [`Resolution::NotFound`], never as content.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;

use crate::files::listing::{DirectoryListing, EntryKind, ListingEntry};
use crate::http::response::FileError;

/// A regular file ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Outcome of resolving one URL path.
#[derive(Debug)]
pub enum Resolution {
    File(ServedFile),
    Directory(DirectoryListing),
    NotFound,
}

/// Maps URL paths onto the served directory tree.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
    hide_dotfiles: bool,
    cache_max_age: Duration,
}

impl FileResolver {
    /// `root` must already be canonical (see `lifecycle::startup::prepare_root`).
    pub fn new(root: PathBuf, hide_dotfiles: bool, cache_max_age: Duration) -> Self {
        Self {
            root,
            hide_dotfiles,
            cache_max_age,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_max_age(&self) -> Duration {
        self.cache_max_age
    }

    /// Resolve a decoded URL path (leading `/` optional).
    pub async fn resolve(&self, url_path: &str) -> Result<Resolution, FileError> {
        let Some(candidate) = build_path(&self.root, url_path, self.hide_dotfiles) else {
            return Ok(Resolution::NotFound);
        };

        let canonical = match fs::canonicalize(&candidate).await {
            Ok(p) => p,
            Err(e) if is_missing(&e) => return Ok(Resolution::NotFound),
            Err(e) => return Err(FileError::Io(e)),
        };

        if !canonical.starts_with(&self.root) {
            tracing::warn!(
                requested = %url_path,
                resolved = %canonical.display(),
                "Symlink escape attempt refused"
            );
            return Ok(Resolution::NotFound);
        }

        // A symlink with a plain name may still point at a hidden entry.
        if self.hide_dotfiles && is_hidden_below(&self.root, &canonical) {
            tracing::debug!(
                requested = %url_path,
                resolved = %canonical.display(),
                "Symlink to dotfile refused"
            );
            return Ok(Resolution::NotFound);
        }

        let metadata = match fs::metadata(&canonical).await {
            Ok(m) => m,
            Err(e) if is_missing(&e) => return Ok(Resolution::NotFound),
            Err(e) => return Err(FileError::Io(e)),
        };

        if metadata.is_file() {
            Ok(Resolution::File(ServedFile {
                path: canonical,
                len: metadata.len(),
                modified: metadata.modified().ok(),
            }))
        } else if metadata.is_dir() {
            let entries = self.list_directory(&canonical).await?;
            Ok(Resolution::Directory(DirectoryListing::new(
                url_path,
                canonical == self.root,
                entries,
            )))
        } else {
            Ok(Resolution::NotFound)
        }
    }

    /// Whether `entry` is a symlink whose target is a hidden entry under the root.
    async fn links_to_hidden(&self, entry: &fs::DirEntry) -> bool {
        let is_link = entry.file_type().await.is_ok_and(|t| t.is_symlink());
        if !is_link {
            return false;
        }
        match fs::canonicalize(entry.path()).await {
            Ok(target) => is_hidden_below(&self.root, &target),
            Err(_) => false,
        }
    }

    /// Immediate children of `dir`, dotfile-filtered and sorted by name.
    async fn list_directory(&self, dir: &Path) -> Result<Vec<ListingEntry>, FileError> {
        let mut reader = fs::read_dir(dir).await.map_err(FileError::Io)?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await.map_err(FileError::Io)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.hide_dotfiles && name.starts_with('.') {
                continue;
            }
            if self.hide_dotfiles && self.links_to_hidden(&entry).await {
                continue;
            }

            // Follow symlinks so linked directories list as directories.
            let kind = match fs::metadata(entry.path()).await {
                Ok(m) if m.is_dir() => EntryKind::Directory,
                _ => EntryKind::for_file_name(&name),
            };
            entries.push(ListingEntry { name, kind });
        }

        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }
}

/// True if any component of `path` below `root` starts with `.`.
fn is_hidden_below(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root).is_ok_and(|relative| {
        relative
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')))
    })
}

fn is_missing(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

/// Join `relative` onto `root`, refusing anything that could step outside it.
///
/// With `hide_dotfiles`, a component starting with `.` is refused as well.
fn build_path(root: &Path, relative: &str, hide_dotfiles: bool) -> Option<PathBuf> {
    let relative = relative.trim_start_matches('/');
    let mut result = root.to_path_buf();

    if relative.contains('\0') {
        tracing::warn!("Path contains null byte");
        return None;
    }

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if hide_dotfiles && name.to_string_lossy().starts_with('.') {
                    tracing::debug!(path = %relative, "Dotfile request refused");
                    return None;
                }
                result.push(name);
            }
            Component::CurDir => continue,
            Component::ParentDir => {
                tracing::warn!(path = %relative, "Path traversal attempt refused");
                return None;
            }
            Component::RootDir | Component::Prefix(_) => {
                tracing::warn!(path = %relative, "Absolute path component refused");
                return None;
            }
        }
    }

    Some(result)
}
