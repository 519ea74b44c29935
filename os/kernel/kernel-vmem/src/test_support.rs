//! Simulated RAM, frame allocator and MMU for unit tests.

use crate::access::ActiveTranslation;
use crate::config::FixmapLayout;
use crate::level::TranslationLevel;
use crate::page_table::PageTable;
use crate::{FrameAlloc, PhysMapper};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// A block of "physical memory" starting at `base`.
///
/// Physical addresses outside `[base, base + frames * 4K)` panic.
pub struct TestPhys {
    base: u64,
    frames: usize,
    mem: *mut u8,
    layout: Layout,
}

impl TestPhys {
    pub fn new(base: u64, frames: usize) -> Self {
        let layout = Layout::from_size_align(frames * 4096, 4096).unwrap();
        let mem = unsafe { alloc_zeroed(layout) };
        assert!(!mem.is_null());
        Self {
            base,
            frames,
            mem,
            layout,
        }
    }

    /// Like [`new`](Self::new), but every byte set to `byte`.
    pub fn filled(base: u64, frames: usize, byte: u8) -> Self {
        let phys = Self::new(base, frames);
        unsafe { phys.mem.write_bytes(byte, frames * 4096) };
        phys
    }

    pub fn frame(&self, i: usize) -> PhysicalPage<Size4K> {
        assert!(i < self.frames);
        PhysicalPage::from_addr(PhysicalAddress::new(self.base + (i as u64) * 4096))
    }

    pub fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base + (self.frames as u64) * 4096)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn table(&self, page: PhysicalPage<Size4K>) -> &mut PageTable {
        unsafe { self.phys_to_mut(page.base()) }
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let off = pa.as_u64().checked_sub(self.base).expect("below simulated RAM");
        assert!(
            off as usize + size_of::<T>() <= self.frames * 4096,
            "{pa:?} beyond simulated RAM"
        );
        unsafe { &mut *self.mem.add(off as usize).cast::<T>() }
    }
}

impl Drop for TestPhys {
    fn drop(&mut self) {
        unsafe { dealloc(self.mem, self.layout) };
    }
}

/// Hands out consecutive 4 KiB frames from `[next, end)`.
pub struct BumpAlloc {
    next: u64,
    end: u64,
    pub handed_out: usize,
}

impl BumpAlloc {
    pub fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self {
            next: start.as_u64(),
            end: end.as_u64(),
            handed_out: 0,
        }
    }
}

impl FrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        if self.next + 4096 > self.end {
            return None;
        }
        let p = self.next;
        self.next += 4096;
        self.handed_out += 1;
        Some(PhysicalPage::from_addr(PhysicalAddress::new(p)))
    }
}

/// Start of a linear alias of all simulated RAM, untouched by the TLB model.
const ALIAS_BASE: u64 = 0xFFFF_FFF0_0000_0000;

/// MMU that translates the fixmap through a real last-level table and keeps
/// a TLB for it, so missing flushes show up as stale reads.
pub struct TestMmu<'p> {
    phys: &'p TestPhys,
    fixmap: FixmapLayout,
    fixmap_pte: PhysicalPage<Size4K>,
    tlb: RefCell<HashMap<u64, u64>>,
    page_flushes: Cell<usize>,
    full_flushes: Cell<usize>,
}

impl<'p> TestMmu<'p> {
    pub fn with_fixmap(phys: &'p TestPhys, fixmap: FixmapLayout, fixmap_pte: PhysicalPage<Size4K>) -> Self {
        Self {
            phys,
            fixmap,
            fixmap_pte,
            tlb: RefCell::new(HashMap::new()),
            page_flushes: Cell::new(0),
            full_flushes: Cell::new(0),
        }
    }

    pub fn alias_of(&self, page: PhysicalPage<Size4K>) -> VirtualAddress {
        VirtualAddress::new(ALIAS_BASE + page.base().as_u64())
    }

    pub fn page_flushes(&self) -> usize {
        self.page_flushes.get()
    }

    pub fn full_flushes(&self) -> usize {
        self.full_flushes.get()
    }

    fn translate(&self, va: VirtualAddress) -> PhysicalAddress {
        let page = va.align_down::<Size4K>().as_u64();
        let offset = va.offset::<Size4K>();
        if let Some(pa) = self.tlb.borrow().get(&page) {
            return PhysicalAddress::new(pa + offset);
        }
        if va.as_u64() >= ALIAS_BASE {
            return PhysicalAddress::new(va.as_u64() - ALIAS_BASE);
        }
        assert!(
            va >= self.fixmap.start() && va < self.fixmap.top(),
            "{va:?} is not mapped"
        );
        let e = self
            .phys
            .table(self.fixmap_pte)
            .get(TranslationLevel::L0.index(va));
        assert!(e.is_leaf(), "fixmap slot {va:?} is not mapped");
        let pa = e.physical_address().as_u64();
        self.tlb.borrow_mut().insert(page, pa);
        PhysicalAddress::new(pa + offset)
    }
}

impl ActiveTranslation for TestMmu<'_> {
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        let pa = self.translate(va);
        unsafe { self.phys.phys_to_mut(pa) }
    }

    fn flush_page(&self, va: VirtualAddress) {
        self.page_flushes.set(self.page_flushes.get() + 1);
        self.tlb
            .borrow_mut()
            .remove(&va.align_down::<Size4K>().as_u64());
    }

    fn flush_all(&self) {
        self.full_flushes.set(self.full_flushes.get() + 1);
        self.tlb.borrow_mut().clear();
    }
}
