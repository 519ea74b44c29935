use core::fmt;
use core::hash::Hash;

/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for the block sizes a RISC-V Sv39/Sv48 page table can map.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Display + fmt::Debug
{
    /// Page size in bytes (power of two).
    const SIZE: u64;
    /// log2(SIZE), i.e., number of low bits used for the offset.
    const SHIFT: u32;

    fn as_str() -> &'static str;
}

macro_rules! page_size {
    ($(#[$meta:meta])* $name:ident, $shift:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SIZE: u64 = 1 << $shift;
            const SHIFT: u32 = $shift;

            fn as_str() -> &'static str {
                $label
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(Self::as_str())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self, f)
            }
        }
    };
}

page_size!(
    /// 4 KiB base page, mapped by a leaf in the last-level table.
    Size4K,
    12,
    "4K"
);

page_size!(
    /// 2 MiB megapage, mapped by a leaf in a PMD (level 1) table.
    Size2M,
    21,
    "2M"
);

page_size!(
    /// 1 GiB gigapage, mapped by a leaf in a PUD (level 2) table.
    ///
    /// Under Sv39 the PUD tier is the root table.
    Size1G,
    30,
    "1G"
);

page_size!(
    /// 512 GiB terapage, mapped by a leaf in the Sv48 root table.
    Size512G,
    39,
    "512G"
);
