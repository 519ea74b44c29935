//! # Kernel Boot Information

use kernel_memory_addresses::PhysicalAddress;

bitflags::bitflags! {
    /// Attributes of a physical memory region reported by the region tracker.
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
    pub struct RegionFlags: u32 {
        /// Must not be added to the linear map.
        const NOMAP = 1 << 0;
    }
}

/// One physical memory region as supplied by the region tracker.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: PhysicalAddress,
    pub size: u64,
    pub flags: RegionFlags,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: PhysicalAddress, size: u64) -> Self {
        Self {
            base,
            size,
            flags: RegionFlags::empty(),
        }
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: RegionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Exclusive end, or `None` if the region wraps the physical address space.
    #[must_use]
    pub const fn end(&self) -> Option<PhysicalAddress> {
        self.base.checked_add(self.size)
    }

    #[must_use]
    pub const fn is_nomap(&self) -> bool {
        self.flags.contains(RegionFlags::NOMAP)
    }

    #[must_use]
    pub fn contains(&self, pa: PhysicalAddress) -> bool {
        self.end().is_some_and(|end| self.base <= pa && pa < end)
    }
}
