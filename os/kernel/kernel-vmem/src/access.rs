//! # Table Access
//!
//! Page tables are named by their *physical* frame. Before translation is on
//! the frame can be dereferenced directly; afterwards it has to be mapped
//! somewhere first. [`TableAccess`] hides that difference.
//!
//! - [`IdentityAccess`]: translation off, the pointer is the physical address
//!   (through a [`PhysMapper`]).
//! - [`WindowedAccess`]: translation on, the frame is installed into the
//!   fixmap slot reserved for its level, evicting whatever was there.
//!
//! A [`TableGuard`] mutably borrows its port, so only one table can be open at
//! a time. Walkers copy what they need out of a parent entry before resolving
//! the child.

use crate::PhysMapper;
use crate::builder::MapError;
use crate::config::FixmapLayout;
use crate::level::TranslationLevel;
use crate::page_table::{PageTable, PageTableEntry};
use crate::protection::PageProtection;
use core::ops::{Deref, DerefMut};
use kernel_info::memory::FixedAddress;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// A page table made accessible by a [`TableAccess`] port.
pub struct TableGuard<'g> {
    table: &'g mut PageTable,
    level: TranslationLevel,
    frame: PhysicalPage<Size4K>,
}

impl<'g> TableGuard<'g> {
    fn new(table: &'g mut PageTable, level: TranslationLevel, frame: PhysicalPage<Size4K>) -> Self {
        Self { table, level, frame }
    }

    #[inline]
    #[must_use]
    pub const fn level(&self) -> TranslationLevel {
        self.level
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> PhysicalPage<Size4K> {
        self.frame
    }
}

impl Deref for TableGuard<'_> {
    type Target = PageTable;

    fn deref(&self) -> &Self::Target {
        self.table
    }
}

impl DerefMut for TableGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.table
    }
}

/// Turns a table frame into something that can be read and written.
pub trait TableAccess {
    /// Make the `level` table in `table` accessible until the guard drops.
    fn resolve(&mut self, level: TranslationLevel, table: PhysicalPage<Size4K>) -> TableGuard<'_>;
}

/// Table access with translation disabled (or through a direct map).
pub struct IdentityAccess<'m, M: PhysMapper> {
    mapper: &'m M,
}

impl<'m, M: PhysMapper> IdentityAccess<'m, M> {
    /// # Safety
    /// Every frame later passed to [`resolve`](TableAccess::resolve) must be a
    /// page table reachable and writable through `mapper`, and not otherwise
    /// borrowed while the guard is live.
    pub const unsafe fn new(mapper: &'m M) -> Self {
        Self { mapper }
    }
}

impl<M: PhysMapper> TableAccess for IdentityAccess<'_, M> {
    fn resolve(&mut self, level: TranslationLevel, table: PhysicalPage<Size4K>) -> TableGuard<'_> {
        // SAFETY: upheld by the contract of `IdentityAccess::new`.
        let t = unsafe { self.mapper.phys_to_mut::<PageTable>(table.base()) };
        TableGuard::new(t, level, table)
    }
}

/// The MMU as seen from code running with translation enabled.
pub trait ActiveTranslation {
    /// Dereference a virtual address of the current address space.
    ///
    /// # Safety
    /// `va` must be mapped writable and hold a valid `T`; no other reference
    /// to it may be live for `'a`.
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T;

    /// Drop cached translations for the page containing `va`.
    fn flush_page(&self, va: VirtualAddress);

    /// Drop all cached translations.
    fn flush_all(&self);
}

/// [`ActiveTranslation`] of the executing hart.
#[derive(Debug, Default, Copy, Clone)]
pub struct HartTranslation;

impl ActiveTranslation for HartTranslation {
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        unsafe { &mut *(va.as_u64() as usize as *mut T) }
    }

    fn flush_page(&self, va: VirtualAddress) {
        // SAFETY: only reachable from supervisor code building its own tables.
        unsafe { kernel_registers::sfence::flush_tlb_page(va) }
    }

    fn flush_all(&self) {
        // SAFETY: see `flush_page`.
        unsafe { kernel_registers::sfence::flush_tlb_all() }
    }
}

/// Table access through the fixmap while translation is on.
///
/// Each level has its own slot ([`FixmapLayout::table_window`]), so resolving
/// a child never evicts a parent that is about to be resolved again.
pub struct WindowedAccess<'v, V: ActiveTranslation> {
    mmu: &'v V,
    fixmap_pte: VirtualAddress,
    fixmap: FixmapLayout,
}

impl<'v, V: ActiveTranslation> WindowedAccess<'v, V> {
    /// # Safety
    /// `fixmap_pte` must be the virtual address of the last-level table that
    /// maps `fixmap`, reachable and writable in the active address space, and
    /// frames later passed to [`resolve`](TableAccess::resolve) must be page
    /// tables.
    pub const unsafe fn new(mmu: &'v V, fixmap_pte: VirtualAddress, fixmap: FixmapLayout) -> Self {
        Self {
            mmu,
            fixmap_pte,
            fixmap,
        }
    }

    fn pte_table(&mut self) -> &mut PageTable {
        // SAFETY: upheld by the contract of `WindowedAccess::new`.
        unsafe { self.mmu.virt_to_mut::<PageTable>(self.fixmap_pte) }
    }

    /// Map `pa` at `slot`; returns the address of `pa` through the slot.
    ///
    /// An empty `prot` clears the slot instead.
    ///
    /// # Errors
    /// [`MapError::ReservedFixmapSlot`] for `Hole` and `End`.
    pub fn set_fixmap(
        &mut self,
        slot: FixedAddress,
        pa: PhysicalAddress,
        prot: PageProtection,
    ) -> Result<VirtualAddress, MapError> {
        if !FixmapLayout::is_mappable(slot) {
            return Err(MapError::ReservedFixmapSlot(slot));
        }
        let va = self.fixmap.slot(slot);
        if prot.is_empty() {
            self.clear_fixmap(slot);
        } else {
            let index = TranslationLevel::L0.index(va);
            self.pte_table().set(index, PageTableEntry::leaf(pa.page::<Size4K>().base(), prot));
        }
        Ok(va + pa.offset::<Size4K>())
    }

    /// Invalidate `slot` and its TLB entry.
    pub fn clear_fixmap(&mut self, slot: FixedAddress) {
        let va = self.fixmap.slot(slot);
        let index = TranslationLevel::L0.index(va);
        self.pte_table().set(index, PageTableEntry::cleared());
        self.mmu.flush_page(va);
    }

    /// Unmap every table window.
    pub fn release_all(&mut self) {
        for level in [
            TranslationLevel::L0,
            TranslationLevel::L1,
            TranslationLevel::L2,
            TranslationLevel::L3,
        ] {
            self.clear_fixmap(FixmapLayout::table_window(level));
        }
    }

    /// The fixmap placement this port writes into.
    #[must_use]
    pub const fn fixmap(&self) -> &FixmapLayout {
        &self.fixmap
    }
}

impl<V: ActiveTranslation> TableAccess for WindowedAccess<'_, V> {
    fn resolve(&mut self, level: TranslationLevel, table: PhysicalPage<Size4K>) -> TableGuard<'_> {
        let slot = FixmapLayout::table_window(level);
        self.clear_fixmap(slot);
        let va = self.fixmap.slot(slot);
        let index = TranslationLevel::L0.index(va);
        self.pte_table()
            .set(index, PageTableEntry::leaf(table.base(), PageProtection::PAGE_KERNEL));
        log::trace!("window {slot:?} -> {table} ({level})");

        // SAFETY: the slot now maps `table`, which the caller promised is a table.
        let t = unsafe { self.mmu.virt_to_mut::<PageTable>(va) };
        TableGuard::new(t, level, table)
    }
}
