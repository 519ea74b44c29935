//! # Statically Reserved Tables
//!
//! Early boot cannot allocate, so every table phase 1 needs lives in the
//! image. Phase 2 reuses the fixmap chain and the permanent root; intermediate
//! tables it adds come from the frame allocator.
//!
//! | Table             | Linked from                 | Purpose                          |
//! |-------------------|-----------------------------|----------------------------------|
//! | `early_root`      | `satp` (phase 1)            | image, identity block, fixmap    |
//! | `trampoline_root` | `satp` (switch instant)     | first 2 MiB of the image         |
//! | `swapper_root`    | `satp` (phase 2 onward)     | linear map of all RAM            |
//! | `fixmap_pud/pmd`  | any root                    | path to `fixmap_pte`             |
//! | `fixmap_pte`      | `fixmap_pmd`                | fixmap slots                     |
//! | `trampoline_pud/pmd` | `trampoline_root`        | path to the 2 MiB leaf           |
//! | `early_pud/pmd`   | `early_root`                | scratch for the image mapping    |
//!
//! The `*_pud` tables are only linked under Sv48.

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::{PageTable, PagingMode};

/// Frames of all statically reserved tables.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StaticTables {
    pub early_root: PhysicalPage<Size4K>,
    pub trampoline_root: PhysicalPage<Size4K>,
    pub swapper_root: PhysicalPage<Size4K>,
    pub fixmap_pud: PhysicalPage<Size4K>,
    pub fixmap_pmd: PhysicalPage<Size4K>,
    pub fixmap_pte: PhysicalPage<Size4K>,
    pub trampoline_pud: PhysicalPage<Size4K>,
    pub trampoline_pmd: PhysicalPage<Size4K>,
    pub early_pud: PhysicalPage<Size4K>,
    pub early_pmd: PhysicalPage<Size4K>,
}

impl StaticTables {
    /// Number of tables.
    pub const COUNT: usize = 10;

    /// Consecutive frames starting at `base`, in field order.
    #[must_use]
    pub const fn contiguous(base: PhysicalPage<Size4K>) -> Self {
        let b = base.base().as_u64();
        Self {
            early_root: frame(b, 0),
            trampoline_root: frame(b, 1),
            swapper_root: frame(b, 2),
            fixmap_pud: frame(b, 3),
            fixmap_pmd: frame(b, 4),
            fixmap_pte: frame(b, 5),
            trampoline_pud: frame(b, 6),
            trampoline_pmd: frame(b, 7),
            early_pud: frame(b, 8),
            early_pmd: frame(b, 9),
        }
    }

    /// The three roots.
    #[must_use]
    pub const fn roots(&self) -> [PhysicalPage<Size4K>; 3] {
        [self.early_root, self.trampoline_root, self.swapper_root]
    }

    /// Tables below a root on the way to `fixmap_pte`, `fixmap_pte` last.
    #[must_use]
    pub const fn fixmap_chain(&self, mode: PagingMode) -> Chain {
        Chain::for_mode(mode, [self.fixmap_pud, self.fixmap_pmd, self.fixmap_pte])
    }

    /// Tables below the trampoline root on the way to its 2 MiB leaf.
    #[must_use]
    pub const fn trampoline_chain(&self, mode: PagingMode) -> Chain {
        Chain::for_mode(mode, [self.trampoline_pud, self.trampoline_pmd, self.trampoline_pmd])
            .truncated(1)
    }
}

const fn frame(base: u64, i: u64) -> PhysicalPage<Size4K> {
    PhysicalPage::from_addr(PhysicalAddress::new(base + i * 4096))
}

/// Up to three tables linked one below the other.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Chain {
    pages: [PhysicalPage<Size4K>; 3],
    len: usize,
}

impl Chain {
    /// Drops the first (`pud`) table under Sv39, where the root links the
    /// `pmd` directly.
    const fn for_mode(mode: PagingMode, full: [PhysicalPage<Size4K>; 3]) -> Self {
        match mode {
            PagingMode::Sv48 => Self { pages: full, len: 3 },
            PagingMode::Sv39 => Self {
                pages: [full[1], full[2], full[2]],
                len: 2,
            },
        }
    }

    const fn truncated(mut self, by: usize) -> Self {
        self.len -= by;
        self
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PhysicalPage<Size4K>] {
        &self.pages[..self.len]
    }

    /// The deepest table of the chain.
    #[must_use]
    pub const fn last(&self) -> PhysicalPage<Size4K> {
        self.pages[self.len - 1]
    }
}

/// Backing storage for [`StaticTables`], placed in `.bss.boot` by the entry
/// glue.
#[repr(C, align(4096))]
pub struct BootTableStorage([PageTable; StaticTables::COUNT]);

impl BootTableStorage {
    #[must_use]
    pub const fn new() -> Self {
        Self([const { PageTable::new() }; StaticTables::COUNT])
    }

    /// The table frames, assuming this storage is addressed physically.
    #[must_use]
    pub fn tables(&self) -> StaticTables {
        let base = PhysicalAddress::new(core::ptr::from_ref(self).addr() as u64);
        StaticTables::contiguous(PhysicalPage::from_addr(base))
    }
}

impl Default for BootTableStorage {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = assert!(size_of::<BootTableStorage>() == StaticTables::COUNT * 4096);

#[cfg(test)]
mod tests {
    use super::*;

    fn page(pa: u64) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(pa))
    }

    #[test]
    fn contiguous_in_field_order() {
        let t = StaticTables::contiguous(page(0x8050_0000));
        assert_eq!(t.early_root, page(0x8050_0000));
        assert_eq!(t.fixmap_pte, page(0x8050_5000));
        assert_eq!(t.early_pmd, page(0x8050_9000));
        assert_eq!(t.roots()[2], t.swapper_root);
    }

    #[test]
    fn chains_follow_depth() {
        let t = StaticTables::contiguous(page(0x8050_0000));
        assert_eq!(
            t.fixmap_chain(PagingMode::Sv48).as_slice(),
            &[t.fixmap_pud, t.fixmap_pmd, t.fixmap_pte]
        );
        assert_eq!(t.fixmap_chain(PagingMode::Sv39).as_slice(), &[t.fixmap_pmd, t.fixmap_pte]);
        assert_eq!(
            t.trampoline_chain(PagingMode::Sv48).as_slice(),
            &[t.trampoline_pud, t.trampoline_pmd]
        );
        assert_eq!(t.trampoline_chain(PagingMode::Sv39).as_slice(), &[t.trampoline_pmd]);
        assert_eq!(t.trampoline_chain(PagingMode::Sv39).last(), t.trampoline_pmd);
    }

    #[test]
    fn storage_is_page_aligned() {
        let storage = Box::new(BootTableStorage::new());
        let t = storage.tables();
        assert!(t.early_root.base().is_aligned_to(4096));
        assert_eq!(t.early_pmd.base().as_u64() - t.early_root.base().as_u64(), 9 * 4096);
    }
}
