//! # Page Protection Bits
//!
//! The low eight bits of a RISC-V page-table entry. The same bits are used
//! for leaves at every level; an entry with `V` set and `R`/`W`/`X` all clear
//! is a pointer to the next-level table instead of a leaf.

bitflags::bitflags! {
    /// Permission and status bits of a Sv39/Sv48 PTE (bits 0–7).
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct PageProtection: u64 {
        /// Entry is valid.
        const VALID    = 1 << 0;
        /// Readable.
        const READ     = 1 << 1;
        /// Writable. Hardware requires `READ` as well.
        const WRITE    = 1 << 2;
        /// Executable.
        const EXEC     = 1 << 3;
        /// Accessible from U-mode.
        const USER     = 1 << 4;
        /// Mapping exists in all address spaces.
        const GLOBAL   = 1 << 5;
        /// Accessed. Set up front so harts without hardware A/D updates do not fault.
        const ACCESSED = 1 << 6;
        /// Dirty. Set up front for the same reason as `ACCESSED`.
        const DIRTY    = 1 << 7;
    }
}

impl PageProtection {
    /// Pointer to a next-level table.
    pub const PAGE_TABLE: Self = Self::VALID;

    /// Kernel read/write data.
    pub const PAGE_KERNEL: Self = Self::VALID
        .union(Self::READ)
        .union(Self::WRITE)
        .union(Self::GLOBAL)
        .union(Self::ACCESSED)
        .union(Self::DIRTY);

    /// Kernel read/write/execute, used for the image and the linear map.
    pub const PAGE_KERNEL_EXEC: Self = Self::PAGE_KERNEL.union(Self::EXEC);

    /// `true` if these bits describe a leaf mapping.
    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.contains(Self::VALID) && self.intersects(Self::READ.union(Self::WRITE).union(Self::EXEC))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pointer_is_not_a_leaf() {
        assert!(!PageProtection::PAGE_TABLE.is_leaf());
        assert!(PageProtection::PAGE_KERNEL.is_leaf());
        assert!(PageProtection::PAGE_KERNEL_EXEC.contains(PageProtection::EXEC));
        assert!(!(PageProtection::READ | PageProtection::WRITE).is_leaf());
    }
}
