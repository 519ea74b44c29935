//! # Sv39/Sv48 Page Table
//!
//! One 4 KiB frame holding 512 [`PageTableEntry`] values. The same layout is
//! used at every [`TranslationLevel`](crate::TranslationLevel); what an entry
//! means depends only on its own bits (see [`EntryKind`]).
//!
//! ## Invariants & Notes
//!
//! - [`PageTable`] is 4 KiB-aligned and contains exactly 512 entries.
//! - A table must be zeroed before it is linked into its parent.
//! - Writes through a live root need TLB maintenance by the caller.

mod entry;

pub use crate::page_table::entry::{EntryKind, PageTableEntry};
use crate::level::TableIndex;

/// A 4 KiB-aligned array of 512 entries.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; 512],
}

impl PageTable {
    pub const ENTRIES: usize = 512;

    /// An all-absent table, usable in `static` initializers.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [PageTableEntry::new(); Self::ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PageTableEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PageTableEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Reset every entry to absent.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageTableEntry::new());
    }

    /// Number of valid entries.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_present()).count()
    }

    /// `true` if no entry was ever written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.is_absent())
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};
