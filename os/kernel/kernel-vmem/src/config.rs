//! # Address Space Configuration
//!
//! The handful of values that decide where everything lives: paging mode,
//! final virtual base of the linear map (`PAGE_OFFSET`) and the physical load
//! address of the kernel. Everything else (fixmap, vmemmap, vmalloc, the
//! linear-map offset) is derived from these three.
//!
//! ```text
//!  FIXADDR_START  FIXADDR_TOP      VMEMMAP_START    VMALLOC_START    PAGE_OFFSET
//!        │ fixmap      │   PCI I/O     │   vmemmap     │   vmalloc     │  lowmem …
//!        ▼  (2 MiB)    ▼   (16 MiB)    ▼               ▼               ▼
//! ───────┴─────────────┴───────────────┴───────────────┴───────────────┴──────────
//! ```

use crate::level::{PagingMode, TranslationLevel};
use core::fmt;
use kernel_info::memory::{
    FIX_FDT_SIZE, FIXADDR_SIZE, FixedAddress, PAGE_SHIFT, PAGE_SIZE, PCI_IO_SIZE,
    STRUCT_PAGE_MAX_SHIFT,
};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Paging mode plus final virtual base and physical load base.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressSpaceConfig {
    mode: PagingMode,
    page_offset: VirtualAddress,
    load_base: PhysicalAddress,
}

impl AddressSpaceConfig {
    #[must_use]
    pub const fn new(mode: PagingMode, page_offset: VirtualAddress, load_base: PhysicalAddress) -> Self {
        Self {
            mode,
            page_offset,
            load_base,
        }
    }

    /// Configuration with the default linear-map base for `mode`.
    #[must_use]
    pub const fn for_mode(mode: PagingMode, load_base: PhysicalAddress) -> Self {
        Self::new(mode, mode.default_page_offset(), load_base)
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> PagingMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub const fn page_offset(&self) -> VirtualAddress {
        self.page_offset
    }

    #[inline]
    #[must_use]
    pub const fn load_base(&self) -> PhysicalAddress {
        self.load_base
    }

    /// `PAGE_OFFSET - load_pa`, wrapping.
    #[inline]
    #[must_use]
    pub const fn va_pa_offset(&self) -> u64 {
        self.page_offset.as_u64().wrapping_sub(self.load_base.as_u64())
    }

    /// First page frame of the kernel image.
    #[inline]
    #[must_use]
    pub const fn pfn_base(&self) -> u64 {
        self.load_base.pfn()
    }

    /// Linear-map address of `pa` (`__va`).
    #[inline]
    #[must_use]
    pub const fn pa_to_va(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(self.va_pa_offset()))
    }

    /// Physical address behind a linear-map address (`__pa`).
    #[inline]
    #[must_use]
    pub const fn va_to_pa(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.va_pa_offset()))
    }

    /// Fixmap placement for this configuration.
    #[must_use]
    pub const fn fixmap(&self) -> FixmapLayout {
        FixmapLayout::new(self.regions().pci_io.start.as_u64())
    }

    /// Kernel virtual layout with the linear map ending at `memory_end`.
    #[must_use]
    pub const fn layout(&self, memory_end: PhysicalAddress) -> KernelVirtualLayout {
        let end = self.pa_to_va(memory_end);
        let mut layout = self.regions();
        layout.lowmem.end = end;
        layout
    }

    const fn regions(&self) -> KernelVirtualLayout {
        let page_offset = self.page_offset.as_u64();
        let vmalloc_size = page_offset.wrapping_neg() >> 1;
        let vmalloc_start = page_offset - vmalloc_size;
        let vmemmap_shift = self.mode.va_bits() - PAGE_SHIFT - 1 + STRUCT_PAGE_MAX_SHIFT;
        let vmemmap_start = vmalloc_start - (1 << vmemmap_shift);
        let pci_io_start = vmemmap_start - PCI_IO_SIZE;
        let fixaddr_start = pci_io_start - FIXADDR_SIZE;

        KernelVirtualLayout {
            fixmap: VirtualRange::new(fixaddr_start, pci_io_start),
            pci_io: VirtualRange::new(pci_io_start, vmemmap_start),
            vmemmap: VirtualRange::new(vmemmap_start, vmalloc_start),
            vmalloc: VirtualRange::new(vmalloc_start, page_offset),
            lowmem: VirtualRange::new(page_offset, page_offset),
        }
    }
}

/// Half-open virtual range `[start, end)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VirtualRange {
    pub start: VirtualAddress,
    pub end: VirtualAddress,
}

impl VirtualRange {
    const fn new(start: u64, end: u64) -> Self {
        Self {
            start: VirtualAddress::new(start),
            end: VirtualAddress::new(end),
        }
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.end.wrapping_sub(self.start)
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.wrapping_sub(self.start) < self.size()
    }
}

/// Placement of the fixmap: one last-level table directly below `FIXADDR_TOP`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FixmapLayout {
    top: VirtualAddress,
}

impl FixmapLayout {
    #[must_use]
    pub const fn new(top: u64) -> Self {
        Self {
            top: VirtualAddress::new(top),
        }
    }

    /// `FIXADDR_TOP`, exclusive.
    #[inline]
    #[must_use]
    pub const fn top(&self) -> VirtualAddress {
        self.top
    }

    /// `FIXADDR_START`, 2 MiB aligned.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        VirtualAddress::new(self.top.as_u64() - FIXADDR_SIZE)
    }

    /// `fix_to_virt(slot)`.
    #[inline]
    #[must_use]
    pub const fn slot(&self, slot: FixedAddress) -> VirtualAddress {
        VirtualAddress::new(self.top.as_u64() - slot.index() * PAGE_SIZE)
    }

    /// The window the boot blob is staged through.
    #[must_use]
    pub const fn fdt_window(&self) -> VirtualRange {
        let start = self.slot(FixedAddress::Fdt).as_u64();
        VirtualRange::new(start, start + FIX_FDT_SIZE)
    }

    /// Slot used to reach a table of `level` while translation is on.
    #[inline]
    #[must_use]
    pub const fn table_window(level: TranslationLevel) -> FixedAddress {
        match level {
            TranslationLevel::L3 => FixedAddress::Pgd,
            TranslationLevel::L2 => FixedAddress::Pud,
            TranslationLevel::L1 => FixedAddress::Pmd,
            TranslationLevel::L0 => FixedAddress::Pte,
        }
    }

    /// `true` for slots that may carry a mapping.
    #[inline]
    #[must_use]
    pub const fn is_mappable(slot: FixedAddress) -> bool {
        !matches!(slot, FixedAddress::Hole | FixedAddress::End)
    }
}

/// The kernel half of the virtual address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KernelVirtualLayout {
    pub fixmap: VirtualRange,
    pub pci_io: VirtualRange,
    pub vmemmap: VirtualRange,
    pub vmalloc: VirtualRange,
    pub lowmem: VirtualRange,
}

impl fmt::Display for KernelVirtualLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn line(f: &mut fmt::Formatter<'_>, name: &str, r: &VirtualRange, shift: u32, unit: &str) -> fmt::Result {
            writeln!(
                f,
                "    {name:<8}: {:#018x} - {:#018x}   ({:>6} {unit})",
                r.start.as_u64(),
                r.end.as_u64(),
                r.size() >> shift
            )
        }

        writeln!(f, "Virtual kernel memory layout:")?;
        line(f, "fixmap", &self.fixmap, 10, "kB")?;
        line(f, "pci io", &self.pci_io, 20, "MB")?;
        line(f, "vmemmap", &self.vmemmap, 30, "GB")?;
        line(f, "vmalloc", &self.vmalloc, 30, "GB")?;
        line(f, "lowmem", &self.lowmem, 20, "MB")
    }
}
