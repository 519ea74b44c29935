//! # Self-Relocation
//!
//! The image is linked at `KERNEL_LINK_BASE` but runs at its final base,
//! which differs after the fallback to Sv39. Every `R_RISCV_RELATIVE` record
//! names a 64-bit slot inside the image and the link-time value it should
//! hold; values pointing into the image are shifted by `final - link`.
//!
//! Stores are computed from the record's addend, never from the slot, so
//! running the pass a second time with a different final base is fine.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::PhysMapper;

/// `R_RISCV_RELATIVE`.
pub const R_RISCV_RELATIVE: u32 = 3;

/// `Elf64_Rela`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Elf64Rela {
    pub r_offset: u64,
    pub r_info: u64,
    pub r_addend: i64,
}

/// What a relocation record asks for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RelocationKind {
    /// `B + A`, no symbol.
    Relative,
    /// Anything else; the early pass leaves these alone.
    Other { kind: u32, symbol: u32 },
}

impl Elf64Rela {
    #[must_use]
    pub fn relative(r_offset: u64, r_addend: i64) -> Self {
        Self {
            r_offset,
            r_info: u64::from(R_RISCV_RELATIVE),
            r_addend,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn kind(&self) -> RelocationKind {
        let kind = self.r_info as u32;
        let symbol = (self.r_info >> 32) as u32;
        if kind == R_RISCV_RELATIVE && symbol == 0 {
            RelocationKind::Relative
        } else {
            RelocationKind::Other { kind, symbol }
        }
    }
}

/// Counters of one relocation pass.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct RelocationStats {
    /// Values pointing into the image, shifted.
    pub shifted: usize,
    /// Values below the link base, stored unchanged.
    pub absolute: usize,
    /// Records of another kind.
    pub skipped: usize,
}

/// The relocation records of the running image.
#[derive(Debug, Copy, Clone)]
pub struct Relocations<'r> {
    records: &'r [Elf64Rela],
}

impl<'r> Relocations<'r> {
    /// # Safety
    /// `records` must be the dynamic relocations of the kernel image this
    /// bootstrap runs, so every target lies inside that image.
    #[must_use]
    pub const unsafe fn new(records: &'r [Elf64Rela]) -> Self {
        Self { records }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Patch the image loaded at `load_base` for running at `final_base`.
    #[must_use = "the stats tell whether anything was patched"]
    pub fn apply<M: PhysMapper>(
        &self,
        mapper: &M,
        link_base: VirtualAddress,
        final_base: VirtualAddress,
        load_base: PhysicalAddress,
    ) -> RelocationStats {
        let va_link_pa_offset = link_base.as_u64().wrapping_sub(load_base.as_u64());
        let reloc_offset = final_base.wrapping_sub(link_base);
        let mut stats = RelocationStats::default();

        for rela in self.records {
            if rela.kind() != RelocationKind::Relative {
                stats.skipped += 1;
                continue;
            }

            let slot = PhysicalAddress::new(rela.r_offset.wrapping_sub(va_link_pa_offset));
            let mut value = rela.r_addend.cast_unsigned();
            if value >= link_base.as_u64() {
                value = value.wrapping_add(reloc_offset);
                stats.shifted += 1;
            } else {
                stats.absolute += 1;
            }

            // SAFETY: `Relocations::new` guarantees the slot is inside the
            // image. Byte-array access keeps unaligned slots sound.
            let bytes = unsafe { mapper.phys_to_mut::<[u8; 8]>(slot) };
            *bytes = value.to_le_bytes();
        }

        log::debug!(
            "relocated {} slots for {final_base} ({} absolute, {} skipped)",
            stats.shifted,
            stats.absolute,
            stats.skipped
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::UnsafeCell;

    const LINK: u64 = 0xFFFF_C000_0000_0000;
    const LOAD: u64 = 0x8020_0000;

    /// 64 KiB of "image" at [`LOAD`].
    struct Image(UnsafeCell<[u8; 0x1_0000]>);

    impl Image {
        fn new() -> Self {
            Self(UnsafeCell::new([0; 0x1_0000]))
        }

        fn read(&self, off: usize) -> u64 {
            let mem = unsafe { &*self.0.get() };
            u64::from_le_bytes(mem[off..off + 8].try_into().unwrap())
        }
    }

    impl PhysMapper for Image {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let off = usize::try_from(pa.as_u64() - LOAD).unwrap();
            assert!(off + size_of::<T>() <= 0x1_0000);
            unsafe { &mut *self.0.get().cast::<u8>().add(off).cast::<T>() }
        }
    }

    #[test]
    fn kind_decoding() {
        assert_eq!(Elf64Rela::relative(0, 0).kind(), RelocationKind::Relative);
        let abs64 = Elf64Rela {
            r_offset: 0,
            r_info: (7 << 32) | 2,
            r_addend: 0,
        };
        assert_eq!(abs64.kind(), RelocationKind::Other { kind: 2, symbol: 7 });
        let relative_with_symbol = Elf64Rela {
            r_info: (1 << 32) | 3,
            ..abs64
        };
        assert!(matches!(relative_with_symbol.kind(), RelocationKind::Other { .. }));
    }

    #[test]
    #[allow(clippy::cast_possible_wrap)]
    fn shifts_only_image_pointers() {
        let image = Image::new();
        let final_base = 0xFFFF_FFE0_0000_0000;
        let records = [
            Elf64Rela::relative(LINK + 0x100, (LINK + 0x4242) as i64),
            Elf64Rela::relative(LINK + 0x108, 0x1234),
            Elf64Rela::relative(LINK + 0x113, LINK as i64),
            Elf64Rela {
                r_offset: LINK + 0x200,
                r_info: 2,
                r_addend: 0x77,
            },
        ];
        let relocs = unsafe { Relocations::new(&records) };
        let stats = relocs.apply(
            &image,
            VirtualAddress::new(LINK),
            VirtualAddress::new(final_base),
            PhysicalAddress::new(LOAD),
        );

        assert_eq!(
            stats,
            RelocationStats {
                shifted: 2,
                absolute: 1,
                skipped: 1
            }
        );
        assert_eq!(image.read(0x100), final_base + 0x4242);
        assert_eq!(image.read(0x108), 0x1234);
        assert_eq!(image.read(0x113), final_base);
        assert_eq!(image.read(0x200), 0);
    }

    #[test]
    #[allow(clippy::cast_possible_wrap)]
    fn rerun_derives_from_addend() {
        let image = Image::new();
        let records = [Elf64Rela::relative(LINK + 0x40, (LINK + 0x800) as i64)];
        let relocs = unsafe { Relocations::new(&records) };
        let link = VirtualAddress::new(LINK);
        let load = PhysicalAddress::new(LOAD);

        let first = relocs.apply(&image, link, link, load);
        assert_eq!(first.shifted, 1);
        assert_eq!(image.read(0x40), LINK + 0x800);

        let shallow = VirtualAddress::new(0xFFFF_FFE0_0000_0000);
        let second = relocs.apply(&image, link, shallow, load);
        assert_eq!(second, first);
        assert_eq!(image.read(0x40), 0xFFFF_FFE0_0000_0800);
    }
}
