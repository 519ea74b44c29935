use crate::protection::PageProtection;
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Software marker written into the RSW bits of an entry that was invalidated
/// on purpose, so it can be told apart from one that was never written.
const CLEARED_MARKER: u8 = 0b01;

/// A single Sv39/Sv48 page-table entry in its raw bitfield form.
///
/// The format is identical at every level.
///
/// ### Bit layout
///
/// | Bits   | Name   | Meaning |
/// |--------|--------|---------|
/// | 0      | `V`    | Valid |
/// | 1–3    | `R W X`| Permissions; all clear means "pointer to next table" |
/// | 4      | `U`    | U-mode accessible |
/// | 5      | `G`    | Global |
/// | 6–7    | `A D`  | Accessed / Dirty |
/// | 8–9    | `RSW`  | Reserved for software |
/// | 10–53  | `PPN`  | Physical page number |
/// | 54–60  |        | Reserved |
/// | 61–62  | `PBMT` | Svpbmt memory type |
/// | 63     | `N`    | Svnapot |
///
/// ### States
/// - **absent**: raw value zero, never written.
/// - **cleared**: `V = 0` but written; carries a software marker.
/// - **table**: `V = 1`, `R = W = X = 0`.
/// - **leaf**: `V = 1` and any of `R`, `W`, `X`.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    pub valid: bool,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub user: bool,
    pub global: bool,
    pub accessed: bool,
    pub dirty: bool,

    /// RSW, ignored by hardware.
    #[bits(2)]
    pub software: u8,

    /// Physical page number (PA bits 55:12).
    #[bits(44)]
    ppn: u64,

    #[bits(7)]
    __: u8,

    /// Svpbmt page-based memory type.
    #[bits(2)]
    pub pbmt: u8,

    /// Svnapot contiguous mapping.
    pub napot: bool,
}

/// Decoded view of a [`PageTableEntry`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EntryKind {
    /// Never written.
    Absent,
    /// Explicitly invalidated.
    Cleared,
    /// Points to the next-level table.
    Table(PhysicalPage<Size4K>),
    /// Maps a block starting at the given address.
    Leaf(PhysicalAddress, PageProtection),
}

impl PageTableEntry {
    /// A leaf mapping `pa` with `prot`.
    ///
    /// `prot` should satisfy [`PageProtection::is_leaf`]; alignment of `pa` to
    /// the block size of the target level is the caller's business.
    #[inline]
    #[must_use]
    pub const fn leaf(pa: PhysicalAddress, prot: PageProtection) -> Self {
        Self::from_bits(prot.bits() & 0xFF).with_ppn(pa.pfn())
    }

    /// A pointer to the next-level table in `page`.
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage<Size4K>) -> Self {
        Self::from_bits(PageProtection::PAGE_TABLE.bits()).with_ppn(page.pfn())
    }

    /// An invalidated entry, distinct from one that was never written.
    #[inline]
    #[must_use]
    pub const fn cleared() -> Self {
        Self::new().with_software(CLEARED_MARKER)
    }

    /// Permission and status bits.
    #[inline]
    #[must_use]
    pub const fn protection(self) -> PageProtection {
        PageProtection::from_bits_truncate(self.into_bits() & 0xFF)
    }

    /// Physical address stored in the PPN field.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::from_pfn(self.ppn())
    }

    #[inline]
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.into_bits() == 0
    }

    /// `V = 0` but not [`absent`](Self::is_absent).
    #[inline]
    #[must_use]
    pub const fn is_cleared(self) -> bool {
        !self.valid() && !self.is_absent()
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.valid()
    }

    /// Free for a new mapping: absent or cleared.
    #[inline]
    #[must_use]
    pub const fn is_vacant(self) -> bool {
        !self.valid()
    }

    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.protection().is_leaf()
    }

    #[must_use]
    pub const fn kind(self) -> EntryKind {
        if self.is_absent() {
            EntryKind::Absent
        } else if !self.valid() {
            EntryKind::Cleared
        } else if self.is_leaf() {
            EntryKind::Leaf(self.physical_address(), self.protection())
        } else {
            EntryKind::Table(PhysicalPage::from_addr(self.physical_address()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_encoding() {
        let e = PageTableEntry::leaf(
            PhysicalAddress::new(0x8020_0000),
            PageProtection::PAGE_KERNEL_EXEC,
        );
        assert_eq!(e.into_bits(), (0x80200 << 10) | 0xEF);
        assert_eq!(
            e.kind(),
            EntryKind::Leaf(
                PhysicalAddress::new(0x8020_0000),
                PageProtection::PAGE_KERNEL_EXEC
            )
        );
    }

    #[test]
    fn table_pointer_encoding() {
        let page = PhysicalPage::from_addr(PhysicalAddress::new(0x8100_1000));
        let e = PageTableEntry::table(page);
        assert_eq!(e.into_bits(), (0x81001 << 10) | 0x1);
        assert_eq!(e.kind(), EntryKind::Table(page));
        assert!(!e.is_leaf());
    }

    #[test]
    fn absent_and_cleared_are_distinct() {
        let absent = PageTableEntry::new();
        let cleared = PageTableEntry::cleared();
        assert!(absent.is_absent() && !absent.is_cleared());
        assert!(cleared.is_cleared() && !cleared.is_absent());
        assert!(absent.is_vacant() && cleared.is_vacant());
        assert!(!cleared.is_present());
        assert_eq!(cleared.kind(), EntryKind::Cleared);
        assert_eq!(absent.kind(), EntryKind::Absent);
    }
}
