//! # Address Space
//!
//! A root table plus the paging mode it is walked with. Building mappings
//! goes through a [`MappingBuilder`]; this type only ties the pieces
//! together and remembers whether the root is live in `satp`.

use crate::access::TableAccess;
use crate::builder::{InsertOutcome, MapError, MappingBuilder, MappingRequest, Translation};
use crate::level::{PagingMode, TranslationLevel};
use crate::table_alloc::TablePageSource;
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_registers::satp::Satp;

/// The root page for an [`AddressSpace`].
pub type RootPage = PhysicalPage<Size4K>;

/// Handle to a single page-table tree.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressSpace {
    root: RootPage,
    mode: PagingMode,
    active: bool,
}

impl AddressSpace {
    #[must_use]
    pub const fn new(root: RootPage, mode: PagingMode) -> Self {
        Self {
            root,
            mode,
            active: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn root_page(&self) -> RootPage {
        self.root
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> PagingMode {
        self.mode
    }

    /// `true` once this root has been written to `satp`.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub const fn mark_active(&mut self) {
        self.active = true;
    }

    /// The `satp` value selecting this address space.
    #[inline]
    #[must_use]
    pub const fn satp(&self) -> Satp {
        Satp::for_root(self.mode.satp_mode(), self.root)
    }

    /// Install one mapping.
    ///
    /// # Errors
    /// See [`MappingBuilder::insert`].
    pub fn map<P: TableAccess, S: TablePageSource>(
        &self,
        port: &mut P,
        pages: &mut S,
        req: &MappingRequest,
    ) -> Result<InsertOutcome, MapError> {
        MappingBuilder::new(port, pages, self.mode).insert(self.root, req)
    }

    /// Translate `va` by walking this tree.
    pub fn query<P: TableAccess>(&self, port: &mut P, va: VirtualAddress) -> Option<Translation> {
        MappingBuilder::new(port, &mut NoTables, self.mode).translate(self.root, va)
    }
}

/// Page source for read-only walks.
struct NoTables;

impl TablePageSource for NoTables {
    fn take_page(&mut self, level: TranslationLevel, va: VirtualAddress) -> Result<PhysicalPage<Size4K>, MapError> {
        Err(MapError::OutOfMemory { level, va })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::IdentityAccess;
    use crate::protection::PageProtection;
    use crate::table_alloc::GeneralPool;
    use crate::test_support::{BumpAlloc, TestPhys};
    use kernel_memory_addresses::PhysicalAddress;
    use kernel_registers::satp::SatpMode;

    #[test]
    fn map_and_query() {
        let phys = TestPhys::new(0x8000_0000, 8);
        let mut frames = BumpAlloc::new(phys.frame(1).base(), phys.end());
        let mut pool = GeneralPool::new(&mut frames);
        let mut port = unsafe { IdentityAccess::new(&phys) };
        let aspace = AddressSpace::new(phys.frame(0), PagingMode::Sv39);

        let va = VirtualAddress::new(0xFFFF_FFE0_0020_0000);
        let req = MappingRequest::new(va, PhysicalAddress::new(0x8020_0000), 1 << 21, PageProtection::PAGE_KERNEL);
        assert!(aspace.map(&mut port, &mut pool, &req).is_ok());
        assert_eq!(
            aspace.query(&mut port, va + 0x10).map(|t| t.pa),
            Some(PhysicalAddress::new(0x8020_0010))
        );
        assert_eq!(aspace.query(&mut port, va + (1 << 21)), None);

        let satp = aspace.satp();
        assert_eq!(satp.mode(), SatpMode::Sv39);
        assert_eq!(satp.root(), phys.frame(0).base());
        assert!(!aspace.is_active());
    }
}
