use crate::PageSize;
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// Does not validate canonical form (Sv39 requires bits 63..39 to equal bit
/// 38, Sv48 bits 63..48 to equal bit 47); it only tags the value as virtual.
///
/// Kernel-half arithmetic routinely wraps (`PAGE_OFFSET - load_pa`), so the
/// offset helpers use wrapping semantics on purpose.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xFFFF_FFE0_0020_1234);
/// assert_eq!(va.align_down::<Size2M>().as_u64(), 0xFFFF_FFE0_0020_0000);
/// assert_eq!(va.offset::<Size4K>(), 0x234);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> u64 {
        self.0 & (S::SIZE - 1)
    }

    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !(S::SIZE - 1))
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, align: u64) -> bool {
        crate::is_aligned(self.0, align)
    }

    /// `self + delta`, wrapping around the 64-bit space.
    #[inline]
    #[must_use]
    pub const fn wrapping_add(self, delta: u64) -> Self {
        Self(self.0.wrapping_add(delta))
    }

    /// Distance `self - base`, wrapping around the 64-bit space.
    #[inline]
    #[must_use]
    pub const fn wrapping_sub(self, base: Self) -> u64 {
        self.0.wrapping_sub(base.0)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
