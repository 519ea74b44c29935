//! A simulated machine: RAM, a bump frame allocator and a hart whose MMU
//! walks whatever root `satp` holds, with a TLB that only flushes evict.

#![allow(dead_code, clippy::missing_panics_doc)]

use kernel_info::boot::{MemoryRegion, RegionFlags};
use kernel_info::memory::KERNEL_LINK_BASE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_registers::satp::{Satp, SatpMode};
use kernel_vmem::{
    ActiveTranslation, EntryKind, FrameAlloc, PageTable, PagingMode, PhysMapper, TranslationLevel,
};
use kernel_vmem_boot::{Elf64Rela, KernelImage, StaticTables, TranslationControl, VmBootstrap};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub const RAM_BASE: u64 = 0x8000_0000;
pub const RAM_SIZE: u64 = 8 << 20;
pub const LOAD: u64 = 0x8020_0000;
pub const IMAGE_SIZE: u64 = 4 << 20;
pub const TABLES: u64 = 0x8050_0000;
pub const FRAMES_START: u64 = 0x8060_0000;
pub const FRAMES_END: u64 = 0x8070_0000;
pub const BLOB_PA: u64 = 0x8070_0123;

/// Slot patched by the relocation that points into the image.
pub const RELOC_INTO_IMAGE: u64 = LOAD + 0x1000;
/// Slot patched by the relocation that holds an absolute value.
pub const RELOC_ABSOLUTE: u64 = LOAD + 0x1008;
/// Slot named by a relocation of another kind.
pub const RELOC_OTHER: u64 = LOAD + 0x1010;
pub const SENTINEL: u64 = 0x5A5A_5A5A_5A5A_5A5A;

/// Zeroed "physical memory" at `[base, base + size)`.
pub struct TestPhys {
    base: u64,
    size: u64,
    mem: *mut u8,
    layout: Layout,
}

impl TestPhys {
    pub fn new(base: u64, size: u64) -> Self {
        let layout = Layout::from_size_align(usize::try_from(size).unwrap(), 4096).unwrap();
        let mem = unsafe { alloc_zeroed(layout) };
        assert!(!mem.is_null());
        Self {
            base,
            size,
            mem,
            layout,
        }
    }

    pub fn read_u64(&self, pa: u64) -> u64 {
        let bytes: &mut [u8; 8] = unsafe { self.phys_to_mut(PhysicalAddress::new(pa)) };
        u64::from_le_bytes(*bytes)
    }

    pub fn write_u64(&self, pa: u64, value: u64) {
        let bytes: &mut [u8; 8] = unsafe { self.phys_to_mut(PhysicalAddress::new(pa)) };
        *bytes = value.to_le_bytes();
    }

    #[allow(clippy::mut_from_ref)]
    pub fn table(&self, page: PhysicalPage<Size4K>) -> &mut PageTable {
        unsafe { self.phys_to_mut(page.base()) }
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let off = pa
            .as_u64()
            .checked_sub(self.base)
            .unwrap_or_else(|| panic!("{pa} below simulated RAM"));
        assert!(off + size_of::<T>() as u64 <= self.size, "{pa} beyond simulated RAM");
        unsafe { &mut *self.mem.add(usize::try_from(off).unwrap()).cast::<T>() }
    }
}

impl Drop for TestPhys {
    fn drop(&mut self) {
        unsafe { dealloc(self.mem, self.layout) };
    }
}

/// Consecutive 4 KiB frames from `[next, end)`.
pub struct BumpAlloc {
    next: u64,
    end: u64,
}

impl BumpAlloc {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { next: start, end }
    }

    pub const fn empty() -> Self {
        Self::new(0, 0)
    }
}

impl FrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        if self.next + 4096 > self.end {
            return None;
        }
        let page = PhysicalPage::from_addr(PhysicalAddress::new(self.next));
        self.next += 4096;
        Some(page)
    }
}

/// A hart implementing at most `max_mode`.
pub struct SimHart<'p> {
    phys: &'p TestPhys,
    max_mode: PagingMode,
    satp: Cell<Satp>,
    tlb: RefCell<HashMap<u64, u64>>,
    satp_writes: Cell<usize>,
    full_flushes: Cell<usize>,
}

impl<'p> SimHart<'p> {
    pub fn new(phys: &'p TestPhys, max_mode: PagingMode) -> Self {
        Self {
            phys,
            max_mode,
            satp: Cell::new(Satp::new()),
            tlb: RefCell::new(HashMap::new()),
            satp_writes: Cell::new(0),
            full_flushes: Cell::new(0),
        }
    }

    pub fn satp(&self) -> Satp {
        self.satp.get()
    }

    pub fn satp_writes(&self) -> usize {
        self.satp_writes.get()
    }

    pub fn full_flushes(&self) -> usize {
        self.full_flushes.get()
    }

    /// Walk the live root; panics like a page fault on unmapped addresses.
    fn translate(&self, va: VirtualAddress) -> PhysicalAddress {
        let page = va.align_down::<Size4K>().as_u64();
        let offset = va.offset::<Size4K>();
        if let Some(pa) = self.tlb.borrow().get(&page) {
            return PhysicalAddress::new(pa + offset);
        }

        let satp = self.satp.get();
        let mode = match satp.mode() {
            SatpMode::Bare => return PhysicalAddress::new(va.as_u64()),
            SatpMode::Sv39 => PagingMode::Sv39,
            SatpMode::Sv48 => PagingMode::Sv48,
        };

        let mut table = PhysicalPage::from_addr(satp.root());
        for level in mode.walk() {
            match self.phys.table(table).get(level.index(va)).kind() {
                EntryKind::Table(next) => table = next,
                EntryKind::Leaf(base, _) => {
                    let pa = base.as_u64() + (va.as_u64() & (level.block_size() - 1));
                    self.tlb.borrow_mut().insert(page, pa - offset);
                    return PhysicalAddress::new(pa);
                }
                EntryKind::Absent | EntryKind::Cleared => break,
            }
        }
        panic!("page fault at {va}");
    }
}

impl ActiveTranslation for SimHart<'_> {
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        let pa = self.translate(va);
        unsafe { self.phys.phys_to_mut(pa) }
    }

    fn flush_page(&self, va: VirtualAddress) {
        self.tlb.borrow_mut().remove(&va.align_down::<Size4K>().as_u64());
    }

    fn flush_all(&self) {
        self.tlb.borrow_mut().clear();
    }
}

impl TranslationControl for SimHart<'_> {
    fn supports(&self, mode: PagingMode, _probe_root: PhysicalPage<Size4K>) -> bool {
        mode == PagingMode::Sv39 || self.max_mode == PagingMode::Sv48
    }

    unsafe fn write_satp(&self, satp: Satp) {
        self.satp_writes.set(self.satp_writes.get() + 1);
        self.satp.set(satp);
    }

    fn flush_tlb_all(&self) {
        self.full_flushes.set(self.full_flushes.get() + 1);
        self.tlb.borrow_mut().clear();
    }
}

/// RAM with a kernel image at [`LOAD`] and its tables at [`TABLES`].
pub struct Machine {
    pub phys: TestPhys,
    pub relocations: Vec<Elf64Rela>,
}

impl Machine {
    #[allow(clippy::cast_possible_wrap)]
    pub fn new() -> Self {
        let phys = TestPhys::new(RAM_BASE, RAM_SIZE);
        phys.write_u64(RELOC_OTHER, SENTINEL);
        let link = KERNEL_LINK_BASE;
        let relocations = vec![
            Elf64Rela::relative(link + (RELOC_INTO_IMAGE - LOAD), (link + 0x40) as i64),
            Elf64Rela::relative(link + (RELOC_ABSOLUTE - LOAD), 0x10),
            Elf64Rela {
                r_offset: link + (RELOC_OTHER - LOAD),
                r_info: 2,
                r_addend: 0x99,
            },
        ];
        Self { phys, relocations }
    }

    pub fn image(load: u64, size: u64) -> KernelImage {
        KernelImage {
            link_base: VirtualAddress::new(KERNEL_LINK_BASE),
            load_base: PhysicalAddress::new(load),
            size,
        }
    }

    pub fn tables() -> StaticTables {
        StaticTables::contiguous(PhysicalPage::from_addr(PhysicalAddress::new(TABLES)))
    }

    pub fn bootstrap(&self) -> VmBootstrap {
        self.bootstrap_at(LOAD, IMAGE_SIZE)
    }

    pub fn bootstrap_at(&self, load: u64, size: u64) -> VmBootstrap {
        // SAFETY: the tables are zeroed simulated RAM reachable through `phys`.
        unsafe { VmBootstrap::new(Self::image(load, size), Self::tables()) }
    }

    pub fn frames() -> BumpAlloc {
        BumpAlloc::new(FRAMES_START, FRAMES_END)
    }
}

/// The regions the firmware would report for [`Machine`].
pub fn regions() -> Vec<MemoryRegion> {
    vec![
        MemoryRegion::new(PhysicalAddress::new(0x1000_0000), 0x1000),
        MemoryRegion::new(PhysicalAddress::new(RAM_BASE), RAM_SIZE),
        MemoryRegion::new(PhysicalAddress::new(0x8800_0000), 0),
        MemoryRegion::new(PhysicalAddress::new(0x8900_0000), 1 << 20).with_flags(RegionFlags::NOMAP),
        MemoryRegion::new(PhysicalAddress::new(0x9000_1000), 0x3000),
    ]
}

/// Level of a fixmap table window.
pub const WINDOW_LEVELS: [TranslationLevel; 4] = [
    TranslationLevel::L0,
    TranslationLevel::L1,
    TranslationLevel::L2,
    TranslationLevel::L3,
];
