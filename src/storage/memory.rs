//! In-process backend.
//!
//! Keeps the last written copy of every record so a second ledger opened on
//! the same backend sees the same state. Nothing survives the process.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::access::ProjectMembers;
use crate::error::LedgerError;
use crate::model::{PageKey, ProjectId};
use crate::page::PageRecord;

use super::StorageBackend;

/// Reference backend holding records in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pages: Mutex<BTreeMap<PageKey, PageRecord>>,
    projects: Mutex<BTreeMap<ProjectId, ProjectMembers>>,
}

impl MemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load_pages(&self) -> Result<Vec<PageRecord>, LedgerError> {
        let pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        pages
            .values()
            .cloned()
            .map(|mut page| {
                page.reindex()?;
                Ok(page)
            })
            .collect()
    }

    fn load_projects(&self) -> Result<Vec<ProjectMembers>, LedgerError> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(projects.values().cloned().collect())
    }

    fn write_page(&self, page: &PageRecord) -> Result<(), LedgerError> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page.key, page.clone());
        Ok(())
    }

    fn write_project(&self, members: &ProjectMembers) -> Result<(), LedgerError> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(members.project_id, members.clone());
        Ok(())
    }
}
