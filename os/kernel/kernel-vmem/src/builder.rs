//! # Mapping Builder
//!
//! Installs single block mappings into a page-table tree, creating missing
//! intermediate tables on the way down.
//!
//! ## Rules
//!
//! - The walk starts at the mode's root level; the target level is the one
//!   whose block size equals the request size.
//! - A vacant (absent or cleared) target slot receives the leaf. An occupied
//!   one is left alone: the first mapping wins.
//! - A missing intermediate table is allocated, zeroed and only then linked
//!   into its parent.
//! - A leaf found above the target level already covers the address; the
//!   request is a no-op.
//!
//! No TLB maintenance happens here. Creating entries needs none; callers that
//! replace live entries must flush themselves.

use crate::access::TableAccess;
use crate::level::{PagingMode, TranslationLevel};
use crate::page_table::{EntryKind, PageTableEntry};
use crate::protection::PageProtection;
use crate::table_alloc::TablePageSource;
use kernel_info::memory::FixedAddress;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// First address past the physical address space: 44 PPN bits above the
/// 12-bit page offset.
pub const PHYS_ADDR_LIMIT: u64 = 1 << 56;

/// Errors from building page tables.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The static early tables cannot cover the address.
    #[error("early {level} table budget exceeded at {va}")]
    BudgetExceeded {
        level: TranslationLevel,
        va: VirtualAddress,
    },
    /// The frame allocator is exhausted.
    #[error("out of memory allocating a {level} table for {va}")]
    OutOfMemory {
        level: TranslationLevel,
        va: VirtualAddress,
    },
    /// No level of the paging mode has leaves of this size.
    #[error("block size {size:#x} not supported in {mode}")]
    UnsupportedBlockSize { size: u64, mode: PagingMode },
    /// Either end of the mapping is not aligned to its block size.
    #[error("{va} -> {pa} not aligned to {size:#x}")]
    Misaligned {
        va: VirtualAddress,
        pa: PhysicalAddress,
        size: u64,
    },
    /// The block does not fit below [`PHYS_ADDR_LIMIT`].
    #[error("{pa}+{size:#x} lies outside the 56-bit physical address space")]
    PhysicalOutOfRange { pa: PhysicalAddress, size: u64 },
    /// The fixmap slot is a guard slot.
    #[error("fixmap slot {0:?} is reserved")]
    ReservedFixmapSlot(FixedAddress),
}

/// One block mapping: `size` bytes at `va` backed by `pa`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MappingRequest {
    pub va: VirtualAddress,
    pub pa: PhysicalAddress,
    pub size: u64,
    pub prot: PageProtection,
}

impl MappingRequest {
    #[must_use]
    pub const fn new(va: VirtualAddress, pa: PhysicalAddress, size: u64, prot: PageProtection) -> Self {
        Self { va, pa, size, prot }
    }
}

/// What [`MappingBuilder::insert`] did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InsertOutcome {
    /// A leaf was written at this level.
    Installed(TranslationLevel),
    /// The target slot was already occupied and left untouched.
    AlreadyPresent,
    /// A leaf at this higher level already covers the address.
    CoveredByLeaf(TranslationLevel),
}

/// Result of a successful [`MappingBuilder::translate`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Translation {
    pub pa: PhysicalAddress,
    pub prot: PageProtection,
    pub level: TranslationLevel,
}

/// Walks and extends page-table trees of one paging mode.
pub struct MappingBuilder<'b, P: TableAccess, S: TablePageSource> {
    port: &'b mut P,
    pages: &'b mut S,
    mode: PagingMode,
}

impl<'b, P: TableAccess, S: TablePageSource> MappingBuilder<'b, P, S> {
    pub const fn new(port: &'b mut P, pages: &'b mut S, mode: PagingMode) -> Self {
        Self { port, pages, mode }
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> PagingMode {
        self.mode
    }

    /// Install `req` in the tree rooted at `root`.
    ///
    /// # Errors
    /// - [`MapError::UnsupportedBlockSize`] / [`MapError::Misaligned`] for bad requests.
    /// - [`MapError::PhysicalOutOfRange`] for frames a PTE cannot name.
    /// - Allocation errors of the page source.
    pub fn insert(&mut self, root: PhysicalPage<Size4K>, req: &MappingRequest) -> Result<InsertOutcome, MapError> {
        self.insert_at(self.mode.root_level(), root, req)
    }

    /// Like [`insert`](Self::insert), but starting at a `level` sub-table.
    ///
    /// Used to extend statically wired chains such as the fixmap tables.
    ///
    /// # Errors
    /// See [`insert`](Self::insert); additionally `UnsupportedBlockSize` if the
    /// block lives above `level`.
    pub fn insert_at(
        &mut self,
        level: TranslationLevel,
        table: PhysicalPage<Size4K>,
        req: &MappingRequest,
    ) -> Result<InsertOutcome, MapError> {
        let target = self
            .mode
            .level_for_block(req.size)
            .filter(|t| !t.is_above(level))
            .ok_or(MapError::UnsupportedBlockSize {
                size: req.size,
                mode: self.mode,
            })?;

        if !req.va.is_aligned_to(req.size) || !req.pa.is_aligned_to(req.size) {
            return Err(MapError::Misaligned {
                va: req.va,
                pa: req.pa,
                size: req.size,
            });
        }

        if req.pa.as_u64().checked_add(req.size).is_none_or(|end| end > PHYS_ADDR_LIMIT) {
            return Err(MapError::PhysicalOutOfRange {
                pa: req.pa,
                size: req.size,
            });
        }

        let mut level = level;
        let mut table = table;
        loop {
            let index = level.index(req.va);

            if level == target {
                let mut t = self.port.resolve(level, table);
                let slot = t.get(index);
                if !slot.is_vacant() {
                    log::trace!("{} already mapped at {level}", req.va);
                    return Ok(InsertOutcome::AlreadyPresent);
                }
                t.set(index, PageTableEntry::leaf(req.pa, req.prot));
                return Ok(InsertOutcome::Installed(level));
            }

            let Some(child_level) = level.next() else {
                return Err(MapError::UnsupportedBlockSize {
                    size: req.size,
                    mode: self.mode,
                });
            };

            // Copy the entry out; the port is needed again for the child.
            let entry = self.port.resolve(level, table).get(index);
            table = match entry.kind() {
                EntryKind::Table(next) => next,
                EntryKind::Leaf(..) => return Ok(InsertOutcome::CoveredByLeaf(level)),
                EntryKind::Absent | EntryKind::Cleared => {
                    let next = self.pages.allocate_zero_page(&mut *self.port, child_level, req.va)?;
                    self.port
                        .resolve(level, table)
                        .set(index, PageTableEntry::table(next));
                    next
                }
            };
            level = child_level;
        }
    }

    /// Walk the tree rooted at `root` for `va`.
    pub fn translate(&mut self, root: PhysicalPage<Size4K>, va: VirtualAddress) -> Option<Translation> {
        let mut table = root;
        for level in self.mode.walk() {
            let entry = self.port.resolve(level, table).get(level.index(va));
            match entry.kind() {
                EntryKind::Table(next) => table = next,
                EntryKind::Leaf(pa, prot) => {
                    let offset = va.as_u64() & (level.block_size() - 1);
                    return Some(Translation {
                        pa: pa + offset,
                        prot,
                        level,
                    });
                }
                EntryKind::Absent | EntryKind::Cleared => return None,
            }
        }
        None
    }
}
