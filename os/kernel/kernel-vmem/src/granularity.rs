//! # Mapping Granularity
//!
//! Picks the block size used to map a range. Larger blocks need fewer
//! tables and TLB entries, but only work when everything involved is
//! aligned to them.

use crate::level::TranslationLevel;
use core::fmt;

/// Block sizes used for kernel mappings.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Granularity {
    Page4K,
    Mega2M,
    Giga1G,
}

impl Granularity {
    /// Candidates, largest first.
    pub const DESCENDING: [Self; 3] = [Self::Giga1G, Self::Mega2M, Self::Page4K];

    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.level().block_size()
    }

    /// The level at which a leaf of this size lives.
    #[inline]
    #[must_use]
    pub const fn level(self) -> TranslationLevel {
        match self {
            Self::Page4K => TranslationLevel::L0,
            Self::Mega2M => TranslationLevel::L1,
            Self::Giga1G => TranslationLevel::L2,
        }
    }

    /// Largest granularity that divides both `base` and `size`.
    ///
    /// Total: falls through to [`Page4K`](Self::Page4K) even if neither is
    /// page aligned.
    ///
    /// ```rust
    /// # use kernel_vmem::Granularity;
    /// assert_eq!(Granularity::select(0x8020_0000, 128 << 20), Granularity::Mega2M);
    /// assert_eq!(Granularity::select(0x8000_0000, 1 << 30), Granularity::Giga1G);
    /// assert_eq!(Granularity::select(0x8000_1000, 128 << 20), Granularity::Page4K);
    /// ```
    #[must_use]
    pub const fn select(base: u64, size: u64) -> Self {
        let mut i = 0;
        while i < Self::DESCENDING.len() {
            let g = Self::DESCENDING[i];
            let mask = g.bytes() - 1;
            if base & mask == 0 && size & mask == 0 {
                return g;
            }
            i += 1;
        }
        Self::Page4K
    }

    /// Largest granularity usable for the next block of a range: `pa` and
    /// `va` both aligned to it and at least that many bytes `remaining`.
    ///
    /// ```rust
    /// # use kernel_vmem::Granularity;
    /// // 1 GiB aligned physically, but the virtual side is only 2 MiB aligned.
    /// assert_eq!(
    ///     Granularity::fitting(0xC000_0000, 0xFFFF_FFE0_3FE0_0000, 4 << 30),
    ///     Granularity::Mega2M
    /// );
    /// assert_eq!(Granularity::fitting(0x8000_0000, 0, 0x1000), Granularity::Page4K);
    /// ```
    #[must_use]
    pub const fn fitting(pa: u64, va: u64, remaining: u64) -> Self {
        let mut i = 0;
        while i < Self::DESCENDING.len() {
            let g = Self::DESCENDING[i];
            let mask = g.bytes() - 1;
            if (pa | va) & mask == 0 && remaining >= g.bytes() {
                return g;
            }
            i += 1;
        }
        Self::Page4K
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Page4K => "4K",
            Self::Mega2M => "2M",
            Self::Giga1G => "1G",
        })
    }
}
