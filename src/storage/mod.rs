//! Persistence backends for ledger state.
//!
//! The ledger keeps its working state in memory and writes every committed
//! mutation through a [`StorageBackend`] before making it visible. A backend
//! stores two kinds of record:
//!
//! - [`PageRecord`]: one per `(project, page)`: commits, tiers, heads.
//! - [`ProjectMembers`]: one per project: the membership table.
//!
//! Writes replace a whole record at once, so a failed write leaves the
//! previous version intact.

use std::fmt;

use crate::access::ProjectMembers;
use crate::error::LedgerError;
use crate::page::PageRecord;

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Where ledger records are persisted.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Load every stored page. Returned records are already reindexed.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if a record cannot be read or is
    /// structurally invalid.
    fn load_pages(&self) -> Result<Vec<PageRecord>, LedgerError>;

    /// Load every stored membership table.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] if a record cannot be read.
    fn load_projects(&self) -> Result<Vec<ProjectMembers>, LedgerError>;

    /// Replace the stored version of a page.
    ///
    /// # Errors
    /// Returns [`LedgerError::Storage`] on I/O or serialization failure; the
    /// previously stored version must then still be readable.
    fn write_page(&self, page: &PageRecord) -> Result<(), LedgerError>;

    /// Replace the stored membership table of a project.
    ///
    /// # Errors
    /// Same contract as [`StorageBackend::write_page`].
    fn write_project(&self, members: &ProjectMembers) -> Result<(), LedgerError>;
}
