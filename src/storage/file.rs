//! Directory-backed store.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── pages/<project>/<page>.json    PageRecord (commits, tiers, heads)
//! └── projects/<project>.json        ProjectMembers
//! ```
//!
//! Every write is atomic: serialize to a temporary file in the target
//! directory, fsync it, then rename over the target. A crash mid-write
//! leaves either the old or the new record, never a torn one. Stray
//! temporary files are ignored on load.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::access::ProjectMembers;
use crate::error::LedgerError;
use crate::model::{PageKey, PageNum, ProjectId};
use crate::page::PageRecord;

use super::StorageBackend;

/// Durable backend rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a store at `root`.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let root = root.into();
        for dir in [root.join("pages"), root.join("projects")] {
            fs::create_dir_all(&dir)
                .map_err(|e| LedgerError::storage(format!("create {}: {e}", dir.display())))?;
        }
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a page record.
    #[must_use]
    pub fn page_path(&self, key: PageKey) -> PathBuf {
        self.root
            .join("pages")
            .join(key.project_id.to_string())
            .join(format!("{}.json", key.page_num))
    }

    /// Path of a membership table.
    #[must_use]
    pub fn project_path(&self, project: ProjectId) -> PathBuf {
        self.root.join("projects").join(format!("{project}.json"))
    }
}

// ---------------------------------------------------------------------------
// StorageBackend
// ---------------------------------------------------------------------------

impl StorageBackend for FileBackend {
    fn load_pages(&self) -> Result<Vec<PageRecord>, LedgerError> {
        let mut out = Vec::new();
        for project_dir in list_dir(&self.root.join("pages"))? {
            if !project_dir.is_dir() {
                continue;
            }
            let Some(project) = stem_parse::<u64>(&project_dir) else {
                tracing::warn!(path = %project_dir.display(), "skipping unrecognized page directory");
                continue;
            };
            for path in list_dir(&project_dir)? {
                if !is_record(&path) {
                    continue;
                }
                let Some(page_num) = stem_parse::<u32>(&path).and_then(|n| PageNum::new(n).ok())
                else {
                    tracing::warn!(path = %path.display(), "skipping unrecognized page file");
                    continue;
                };
                let mut page: PageRecord = read_json(&path)?;
                let expected = PageKey::new(ProjectId(project), page_num);
                if page.key != expected {
                    return Err(LedgerError::storage(format!(
                        "{}: holds {} but its path names {expected}",
                        path.display(),
                        page.key
                    )));
                }
                page.reindex()?;
                out.push(page);
            }
        }
        out.sort_by_key(|p| p.key);
        Ok(out)
    }

    fn load_projects(&self) -> Result<Vec<ProjectMembers>, LedgerError> {
        let mut out = Vec::new();
        for path in list_dir(&self.root.join("projects"))? {
            if !is_record(&path) {
                continue;
            }
            let members: ProjectMembers = read_json(&path)?;
            out.push(members);
        }
        out.sort_by_key(|m| m.project_id);
        Ok(out)
    }

    fn write_page(&self, page: &PageRecord) -> Result<(), LedgerError> {
        write_json_atomic(&self.page_path(page.key), page)
    }

    fn write_project(&self, members: &ProjectMembers) -> Result<(), LedgerError> {
        write_json_atomic(&self.project_path(members.project_id), members)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, LedgerError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LedgerError::storage(format!("read {}: {e}", dir.display()))),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| LedgerError::storage(format!("read {}: {e}", dir.display())))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
}

fn stem_parse<T: std::str::FromStr>(path: &Path) -> Option<T> {
    let name = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    name.and_then(|n| n.to_str()).and_then(|s| s.parse().ok())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LedgerError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| LedgerError::storage(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| LedgerError::storage(format!("parse {}: {e}", path.display())))
}

/// Write `value` as pretty JSON to `path` atomically.
///
/// 1. Serialize.
/// 2. Write to `.<name>.tmp` in the same directory.
/// 3. fsync the temporary file.
/// 4. Rename over the target (atomic on POSIX).
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| LedgerError::storage(format!("serialize {}: {e}", path.display())))?;

    let dir = path
        .parent()
        .ok_or_else(|| LedgerError::storage(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)
        .map_err(|e| LedgerError::storage(format!("create {}: {e}", dir.display())))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LedgerError::storage(format!("bad file name {}", path.display())))?;
    let tmp_path = dir.join(format!(".{name}.tmp"));

    let mut file = fs::File::create(&tmp_path)
        .map_err(|e| LedgerError::storage(format!("create {}: {e}", tmp_path.display())))?;
    file.write_all(json.as_bytes())
        .map_err(|e| LedgerError::storage(format!("write {}: {e}", tmp_path.display())))?;
    file.sync_all()
        .map_err(|e| LedgerError::storage(format!("fsync {}: {e}", tmp_path.display())))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        LedgerError::storage(format!(
            "rename {} → {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
