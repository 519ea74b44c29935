//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw addresses and page bases used by the boot
//! page-table code.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A physical address (RAM, MMIO, table frames). |
//! | [`VirtualAddress`] | An address translated through the active page tables. |
//! | [`PhysicalPage<S>`] | A physical page base aligned to [`S: PageSize`](PageSize). |
//!
//! ## Page Sizes
//!
//! RISC-V Sv39/Sv48 leaves can terminate at any level, giving four block
//! sizes. Each is a marker type implementing [`PageSize`]:
//!
//! - [`Size4K`]: base page (level 0)
//! - [`Size2M`]: megapage (level 1)
//! - [`Size1G`]: gigapage (level 2)
//! - [`Size512G`]: terapage (level 3, Sv48 only)
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let load = PhysicalAddress::new(0x8020_0000);
//! assert!(load.is_aligned::<Size2M>());
//! assert_eq!(load.page::<Size4K>().pfn(), 0x80200);
//!
//! let va = VirtualAddress::new(0xFFFF_FFE0_0000_0000);
//! assert_eq!(va.wrapping_sub(VirtualAddress::new(0xFFFF_FFD0_0000_0000)), 0x10_0000_0000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;

pub use crate::page_size::{PageSize, Size1G, Size2M, Size4K, Size512G};
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0x8020_1234, 4096), 0x8020_1000);
/// assert_eq!(align_down(4096, 4096), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two and `x + (a - 1)` must not overflow.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(1, 4096), 4096);
/// assert_eq!(align_up(0x20_0000, 0x20_0000), 0x20_0000);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

/// `true` if `x` is a multiple of the power of two `a`.
#[inline(always)]
#[must_use]
pub const fn is_aligned(x: u64, a: u64) -> bool {
    x & (a - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_page_alignment() {
        let pa = PhysicalAddress::new(0x8040_1234);
        assert_eq!(pa.page::<Size2M>().base().as_u64(), 0x8040_0000);
        assert_eq!(pa.offset::<Size2M>(), 0x1234);
        assert!(PhysicalPage::<Size4K>::try_from_addr(PhysicalAddress::new(0x8040_1000)).is_some());
        assert!(PhysicalPage::<Size2M>::try_from_addr(PhysicalAddress::new(0x8040_1000)).is_none());
    }

    #[test]
    fn pfn_round_trip() {
        let pa = PhysicalAddress::from_pfn(0x80200);
        assert_eq!(pa.as_u64(), 0x8020_0000);
        assert_eq!(pa.pfn(), 0x80200);
    }

    #[test]
    fn wrapping_helpers() {
        let page_offset = VirtualAddress::new(0xFFFF_FFE0_0000_0000);
        let va_pa_offset = page_offset.as_u64().wrapping_sub(0x8020_0000);
        assert_eq!(
            VirtualAddress::new(0x8020_0000).wrapping_add(va_pa_offset),
            page_offset
        );
        assert!(page_offset.is_aligned_to(Size1G::SIZE));
        assert!(!page_offset.is_aligned_to(Size512G::SIZE));
    }
}
