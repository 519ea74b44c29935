//! # Translation Levels and Paging Modes
//!
//! Sv39 and Sv48 share the same table format; they only differ in how many
//! levels a walk goes through. Levels are named after the virtual-address
//! bits they decode:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  L3   |  L2   |  L1   |  L0   | Offset |
//! ```
//!
//! Sv48 walks `L3 → L2 → L1 → L0`; Sv39 starts at `L2`. Code that walks the
//! tree starts at [`PagingMode::root_level`] and follows
//! [`TranslationLevel::next`], so the depth is consulted in exactly one place.

use core::fmt;
use kernel_info::memory::{PAGE_OFFSET_L3, PAGE_OFFSET_L4};
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::satp::SatpMode;

/// One tier of the page-table tree, root-most first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TranslationLevel {
    /// Sv48 root; leaves map 512 GiB.
    L3,
    /// Sv39 root / Sv48 PUD; leaves map 1 GiB.
    L2,
    /// PMD; leaves map 2 MiB.
    L1,
    /// PTE; leaves map 4 KiB.
    L0,
}

/// Index into a 512-entry table, derived from one 9-bit field of a VA.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl TableIndex {
    /// Construct from a raw value.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 512` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 512);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TranslationLevel {
    /// Lowest VA bit decoded by this level.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::L3 => 39,
            Self::L2 => 30,
            Self::L1 => 21,
            Self::L0 => 12,
        }
    }

    /// Bytes covered by one entry (leaf block size) at this level.
    #[inline]
    #[must_use]
    pub const fn block_size(self) -> u64 {
        1 << self.shift()
    }

    /// Table index for `va` at this level.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self, va: VirtualAddress) -> TableIndex {
        TableIndex::new(((va.as_u64() >> self.shift()) & 0x1FF) as u16)
    }

    /// The level below, or `None` for [`L0`](Self::L0).
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::L3 => Some(Self::L2),
            Self::L2 => Some(Self::L1),
            Self::L1 => Some(Self::L0),
            Self::L0 => None,
        }
    }

    /// The level above, or `None` for [`L3`](Self::L3).
    #[inline]
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::L3 => None,
            Self::L2 => Some(Self::L3),
            Self::L1 => Some(Self::L2),
            Self::L0 => Some(Self::L1),
        }
    }

    /// `true` if `self` sits closer to the root than `other`.
    #[inline]
    #[must_use]
    pub const fn is_above(self, other: Self) -> bool {
        self.shift() > other.shift()
    }
}

impl fmt::Display for TranslationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::L3 => "pgd",
            Self::L2 => "pud",
            Self::L1 => "pmd",
            Self::L0 => "pte",
        })
    }
}

/// Translation depth, decided at boot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PagingMode {
    /// 3 levels, 39-bit VAs.
    Sv39,
    /// 4 levels, 48-bit VAs.
    Sv48,
}

impl PagingMode {
    #[inline]
    #[must_use]
    pub const fn root_level(self) -> TranslationLevel {
        match self {
            Self::Sv39 => TranslationLevel::L2,
            Self::Sv48 => TranslationLevel::L3,
        }
    }

    #[inline]
    #[must_use]
    pub const fn levels(self) -> usize {
        match self {
            Self::Sv39 => 3,
            Self::Sv48 => 4,
        }
    }

    #[inline]
    #[must_use]
    pub const fn va_bits(self) -> u32 {
        match self {
            Self::Sv39 => 39,
            Self::Sv48 => 48,
        }
    }

    /// Value for `satp.MODE`.
    #[inline]
    #[must_use]
    pub const fn satp_mode(self) -> SatpMode {
        match self {
            Self::Sv39 => SatpMode::Sv39,
            Self::Sv48 => SatpMode::Sv48,
        }
    }

    /// Start of the linear map for this depth.
    #[inline]
    #[must_use]
    pub const fn default_page_offset(self) -> VirtualAddress {
        match self {
            Self::Sv39 => VirtualAddress::new(PAGE_OFFSET_L3),
            Self::Sv48 => VirtualAddress::new(PAGE_OFFSET_L4),
        }
    }

    /// Bytes covered by one root entry.
    #[inline]
    #[must_use]
    pub const fn root_block_size(self) -> u64 {
        self.root_level().block_size()
    }

    /// `true` if a walk in this mode visits `level`.
    #[inline]
    #[must_use]
    pub const fn has_level(self, level: TranslationLevel) -> bool {
        !level.is_above(self.root_level())
    }

    /// The levels of a walk, root first.
    pub fn walk(self) -> impl Iterator<Item = TranslationLevel> {
        core::iter::successors(Some(self.root_level()), |l| l.next())
    }

    /// The level whose leaves are exactly `size` bytes, if this mode has one.
    #[must_use]
    pub fn level_for_block(self, size: u64) -> Option<TranslationLevel> {
        self.walk().find(|l| l.block_size() == size)
    }
}

impl fmt::Display for PagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sv39 => "sv39",
            Self::Sv48 => "sv48",
        })
    }
}
