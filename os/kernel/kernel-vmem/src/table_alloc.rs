//! # Table Page Allocation
//!
//! Where new intermediate tables come from.
//!
//! - [`EarlyScratch`]: before translation is on there is no allocator at all,
//!   only one static page per level. A request that would need a second page
//!   of the same level fails with [`MapError::BudgetExceeded`].
//! - [`GeneralPool`]: afterwards, pages come from the general [`FrameAlloc`].
//!
//! Either way, the page is zeroed through the caller's [`TableAccess`] port
//! before it is handed out.

use crate::FrameAlloc;
use crate::access::TableAccess;
use crate::builder::MapError;
use crate::level::TranslationLevel;
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// Supplies frames for new page tables.
pub trait TablePageSource {
    /// Pick the frame for a new `level` table covering `va`.
    ///
    /// # Errors
    /// Implementation specific; see [`EarlyScratch`] and [`GeneralPool`].
    fn take_page(&mut self, level: TranslationLevel, va: VirtualAddress) -> Result<PhysicalPage<Size4K>, MapError>;

    /// Pick a frame and zero it through `port`.
    ///
    /// # Errors
    /// Whatever [`take_page`](Self::take_page) reports.
    fn allocate_zero_page<P: TableAccess>(
        &mut self,
        port: &mut P,
        level: TranslationLevel,
        va: VirtualAddress,
    ) -> Result<PhysicalPage<Size4K>, MapError> {
        let page = self.take_page(level, va)?;
        port.resolve(level, page).zero();
        Ok(page)
    }
}

/// The statically reserved next-level tables used before translation is on.
#[derive(Debug, Copy, Clone)]
pub struct EarlyScratch {
    pud: PhysicalPage<Size4K>,
    pmd: PhysicalPage<Size4K>,
    page_offset: VirtualAddress,
}

impl EarlyScratch {
    #[must_use]
    pub const fn new(pud: PhysicalPage<Size4K>, pmd: PhysicalPage<Size4K>, page_offset: VirtualAddress) -> Self {
        Self { pud, pmd, page_offset }
    }
}

impl TablePageSource for EarlyScratch {
    fn take_page(&mut self, level: TranslationLevel, va: VirtualAddress) -> Result<PhysicalPage<Size4K>, MapError> {
        let (page, parent) = match level {
            TranslationLevel::L2 => (self.pud, TranslationLevel::L3),
            TranslationLevel::L1 => (self.pmd, TranslationLevel::L2),
            // Early mappings never go below 2 MiB and the root is static.
            TranslationLevel::L0 | TranslationLevel::L3 => {
                return Err(MapError::BudgetExceeded { level, va });
            }
        };

        // Only the first parent-level block above `PAGE_OFFSET` has a table.
        if va.wrapping_sub(self.page_offset) >> parent.shift() != 0 {
            return Err(MapError::BudgetExceeded { level, va });
        }

        log::trace!("early {level} table for {va} at {page}");
        Ok(page)
    }
}

/// Frames from the general physical allocator.
pub struct GeneralPool<'a, A: FrameAlloc> {
    frames: &'a mut A,
    allocated: usize,
}

impl<'a, A: FrameAlloc> GeneralPool<'a, A> {
    pub const fn new(frames: &'a mut A) -> Self {
        Self { frames, allocated: 0 }
    }

    /// Number of tables handed out so far.
    #[must_use]
    pub const fn allocated(&self) -> usize {
        self.allocated
    }
}

impl<A: FrameAlloc> TablePageSource for GeneralPool<'_, A> {
    fn take_page(&mut self, level: TranslationLevel, va: VirtualAddress) -> Result<PhysicalPage<Size4K>, MapError> {
        let page = self
            .frames
            .alloc_4k()
            .ok_or(MapError::OutOfMemory { level, va })?;
        self.allocated += 1;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::IdentityAccess;
    use crate::test_support::{BumpAlloc, TestPhys};
    use kernel_memory_addresses::PhysicalAddress;

    const PO: u64 = 0xFFFF_C000_0000_0000;

    #[test]
    fn scratch_budget() {
        let phys = TestPhys::new(0x8000_0000, 2);
        let mut scratch = EarlyScratch::new(phys.frame(0), phys.frame(1), VirtualAddress::new(PO));

        let inside = VirtualAddress::new(PO + 0x3FE0_0000);
        assert_eq!(scratch.take_page(TranslationLevel::L1, inside), Ok(phys.frame(1)));
        assert_eq!(scratch.take_page(TranslationLevel::L2, inside), Ok(phys.frame(0)));

        let next_gig = VirtualAddress::new(PO + 0x4000_0000);
        assert_eq!(
            scratch.take_page(TranslationLevel::L1, next_gig),
            Err(MapError::BudgetExceeded {
                level: TranslationLevel::L1,
                va: next_gig
            })
        );
        assert!(scratch.take_page(TranslationLevel::L2, next_gig).is_ok());
        assert!(scratch.take_page(TranslationLevel::L0, inside).is_err());

        let below = VirtualAddress::new(PO - 0x1000);
        assert!(scratch.take_page(TranslationLevel::L2, below).is_err());
    }

    #[test]
    fn pool_zeroes_and_counts() {
        let phys = TestPhys::filled(0x8000_0000, 4, 0xA5);
        let mut frames = BumpAlloc::new(PhysicalAddress::new(0x8000_0000), phys.end());
        let mut pool = GeneralPool::new(&mut frames);
        let mut port = unsafe { IdentityAccess::new(&phys) };

        for _ in 0..4 {
            let page = pool
                .allocate_zero_page(&mut port, TranslationLevel::L0, VirtualAddress::zero())
                .expect("frame");
            assert!(phys.table(page).is_empty());
        }
        assert_eq!(pool.allocated(), 4);
        assert!(matches!(
            pool.allocate_zero_page(&mut port, TranslationLevel::L0, VirtualAddress::zero()),
            Err(MapError::OutOfMemory { .. })
        ));
    }
}
