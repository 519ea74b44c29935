//! # Virtual Memory Support
//!
//! RISC-V Sv39/Sv48 page-table construction for early boot.
//!
//! ## What you get
//! - A 4 KiB-aligned [`PageTable`] of [`PageTableEntry`] values, with absent,
//!   cleared, table and leaf states kept apart ([`EntryKind`]).
//! - [`PageProtection`] bits and the usual kernel presets.
//! - [`TranslationLevel`] and [`PagingMode`]: the walk depth is a runtime value.
//! - [`AddressSpaceConfig`]: `PAGE_OFFSET`, `va_pa_offset`, fixmap and layout.
//! - [`TableAccess`] ports for translation off ([`IdentityAccess`]) and on
//!   ([`WindowedAccess`]).
//! - [`TablePageSource`]s for new tables: [`EarlyScratch`] and [`GeneralPool`].
//! - [`MappingBuilder`] to install and look up block mappings.
//!
//! ## Sv48 Virtual Address → Physical Address Walk
//!
//! ```text
//!  satp.PPN
//!     │
//!     ▼
//!  L3 (root) ──► L2 ──► L1 ──► L0 ──► 4 KiB page
//!     │           │      │
//!     │           │      └──► leaf: 2 MiB megapage
//!     │           └─────────► leaf: 1 GiB gigapage
//!     └─────────────────────► leaf: 512 GiB terapage
//! ```
//!
//! Sv39 is the same walk starting at `L2`. Any level may hold a leaf; an entry
//! with `V=1` and `R=W=X=0` points to the next table instead.
//!
//! ## Example
//!
//! ```rust
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_vmem::{AddressSpaceConfig, Granularity, PagingMode};
//!
//! let cfg = AddressSpaceConfig::for_mode(PagingMode::Sv48, PhysicalAddress::new(0x8020_0000));
//! let g = Granularity::select(cfg.load_base().as_u64(), 128 << 20);
//! assert_eq!(g, Granularity::Mega2M);
//! assert_eq!(cfg.pa_to_va(cfg.load_base()), cfg.page_offset());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod access;
pub mod address_space;
pub mod builder;
pub mod config;
pub mod granularity;
pub mod level;
pub mod page_table;
pub mod protection;
pub mod table_alloc;

#[cfg(test)]
mod test_support;

pub use crate::access::{
    ActiveTranslation, HartTranslation, IdentityAccess, TableAccess, TableGuard, WindowedAccess,
};
pub use crate::address_space::{AddressSpace, RootPage};
pub use crate::builder::{InsertOutcome, MapError, MappingBuilder, MappingRequest, PHYS_ADDR_LIMIT, Translation};
pub use crate::config::{AddressSpaceConfig, FixmapLayout, KernelVirtualLayout, VirtualRange};
pub use crate::granularity::Granularity;
pub use crate::level::{PagingMode, TableIndex, TranslationLevel};
pub use crate::page_table::{EntryKind, PageTable, PageTableEntry};
pub use crate::protection::PageProtection;
pub use crate::table_alloc::{EarlyScratch, GeneralPool, TablePageSource};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

/// Minimal frame allocator used to obtain **physical** 4 KiB frames
/// for page tables.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;
}

/// Converts physical addresses to usable pointers in the current address
/// space.
///
/// Before translation is on this is the identity; hosted tests map into a
/// simulated RAM buffer.
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be reachable and writable for `&mut T`.
    /// - Type `T` must match the bytes at `pa` (no aliasing UB).
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for code running with translation disabled.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityMapper;

impl PhysMapper for IdentityMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *(pa.as_u64() as usize as *mut T) }
    }
}
