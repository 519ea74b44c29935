use crate::{PageSize, PhysicalAddress};
use core::fmt;
use core::marker::PhantomData;

/// Physical page base for size `S`.
///
/// The low `S::SHIFT` bits of the base are always zero. Page-table frames are
/// passed around as `PhysicalPage<Size4K>` so alignment is carried in the type.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x8040_1234);
/// let pp = pa.page::<Size2M>();
/// assert_eq!(pp.base().as_u64(), 0x8040_0000);
/// assert!(PhysicalPage::<Size4K>::try_from_addr(pa).is_none());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize> {
    base: u64,
    _size: PhantomData<S>,
}

impl<S: PageSize> PhysicalPage<S> {
    /// The page containing `pa` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(pa: PhysicalAddress) -> Self {
        Self {
            base: pa.as_u64() & !(S::SIZE - 1),
            _size: PhantomData,
        }
    }

    /// The page starting exactly at `pa`, or `None` if `pa` is not aligned to `S`.
    #[inline]
    #[must_use]
    pub const fn try_from_addr(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_aligned::<S>() {
            Some(Self::from_addr(pa))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.base)
    }

    /// 4 KiB frame number of the page base.
    #[inline]
    #[must_use]
    pub const fn pfn(self) -> u64 {
        self.base().pfn()
    }
}

impl<S> fmt::Display for PhysicalPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}/{}", self.base, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage<{}>({:#018X})", S::as_str(), self.base)
    }
}
