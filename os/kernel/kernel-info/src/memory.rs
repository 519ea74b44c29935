//! # Memory Layout
//!
//! Link-time and boot-time constants for the RISC-V kernel virtual layout.
//! Everything mode dependent (Sv39 vs Sv48) is derived from these values at
//! runtime once the translation depth is known.

/// Base page shift (4 KiB).
pub const PAGE_SHIFT: u32 = 12;

/// Base page size.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Start of the linear map when running with 4-level (Sv48) tables.
pub const PAGE_OFFSET_L4: u64 = 0xffff_c000_0000_0000;

/// Start of the linear map when running with 3-level (Sv39) tables.
///
/// Used after the depth fallback; the kernel is relocated here.
pub const PAGE_OFFSET_L3: u64 = 0xffff_ffe0_0000_0000;

/// Where the kernel image is linked (VMA), matches the linker script.
///
/// The image is relocated from here to the final `PAGE_OFFSET` in phase 1.
pub const KERNEL_LINK_BASE: u64 = PAGE_OFFSET_L4;

/// The early page tables can map at most this much of the kernel image.
///
/// Only one scratch table per level exists before translation is on.
pub const MAX_EARLY_MAPPING_SIZE: u64 = 128 * 1024 * 1024;

/// Size of the fixmap area (exactly one last-level table).
pub const FIXADDR_SIZE: u64 = 2 * 1024 * 1024;

/// Size of the fixmap window used to stage the flattened device tree.
pub const FIX_FDT_SIZE: u64 = 1024 * 1024;

/// Size of the PCI I/O window placed directly above the fixmap.
pub const PCI_IO_SIZE: u64 = 16 * 1024 * 1024;

/// log2 of the largest `struct page` the vmemmap has to hold.
pub const STRUCT_PAGE_MAX_SHIFT: u32 = 6;

const FIX_FDT_PAGES: usize = 256;

/// Fixed virtual-address slots below `FIXADDR_TOP`.
///
/// Slot `i` lives at `FIXADDR_TOP - i * PAGE_SIZE`; the FDT window spans the
/// slots from [`FdtEnd`](Self::FdtEnd) up to [`Fdt`](Self::Fdt), so its lowest
/// address is the one of `Fdt`.
#[repr(usize)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FixedAddress {
    Hole = 0,
    FdtEnd = 1,
    Fdt = 1 + FIX_FDT_PAGES - 1,
    /// Window for last-level (PTE) tables while building page tables.
    Pte,
    /// Window for level-1 (PMD) tables.
    Pmd,
    /// Window for level-2 (PUD) tables.
    Pud,
    /// Window for Sv48 root tables.
    Pgd,
    TextPoke1,
    TextPoke0,
    EarlyconMemBase,
    End,
}

impl FixedAddress {
    /// Slot number, counted downwards from `FIXADDR_TOP`.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u64 {
        self as u64
    }
}

const _: () = {
    assert!(PAGE_OFFSET_L4 % (1 << 39) == 0);
    assert!(PAGE_OFFSET_L3 % (1 << 30) == 0);
    assert!(MAX_EARLY_MAPPING_SIZE < (1 << 30));
    assert!(FixedAddress::End.index() * PAGE_SIZE <= FIXADDR_SIZE);
    assert!(FixedAddress::Fdt.index() - FixedAddress::FdtEnd.index() + 1 == FIX_FDT_SIZE / PAGE_SIZE);
};
