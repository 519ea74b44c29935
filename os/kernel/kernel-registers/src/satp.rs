#[cfg(all(feature = "asm", target_arch = "riscv64"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Translation scheme selected by `satp.MODE`.
///
/// Values not listed decode as [`Bare`](Self::Bare). The field is WARL, so a
/// hart that lacks a scheme reads back `Bare` after a write requesting it.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SatpMode {
    /// No translation.
    Bare = 0,
    /// 3-level, 39-bit virtual addresses.
    Sv39 = 8,
    /// 4-level, 48-bit virtual addresses.
    Sv48 = 9,
}

impl SatpMode {
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value {
            8 => Self::Sv39,
            9 => Self::Sv48,
            _ => Self::Bare,
        }
    }
}

/// `satp`: Supervisor Address Translation and Protection register (RV64).
///
/// Holds the physical page number of the root page table, the address-space
/// identifier and the translation mode.
#[bitfield(u64)]
pub struct Satp {
    /// Bits 0–43: PPN of the root page table.
    ///
    /// `root_phys = ppn << 12`.
    #[bits(44)]
    pub ppn: u64,

    /// Bits 44–59: ASID.
    #[bits(16)]
    pub asid: u16,

    /// Bits 60–63: MODE.
    #[bits(4)]
    pub mode: SatpMode,
}

impl Satp {
    /// `satp` value selecting `root` under `mode`, ASID 0.
    #[must_use]
    pub const fn for_root(mode: SatpMode, root: PhysicalPage<Size4K>) -> Self {
        Self::new().with_ppn(root.pfn()).with_mode(mode)
    }

    /// Physical base of the root table.
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        PhysicalAddress::from_pfn(self.ppn())
    }
}

#[cfg(all(feature = "asm", target_arch = "riscv64"))]
impl LoadRegisterUnsafe for Satp {
    unsafe fn load_unsafe() -> Self {
        let satp: u64;
        unsafe {
            core::arch::asm!("csrr {}, satp", out(reg) satp, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(satp)
    }
}

#[cfg(all(feature = "asm", target_arch = "riscv64"))]
impl StoreRegisterUnsafe for Satp {
    unsafe fn store_unsafe(self) {
        let satp = self.into_bits();
        unsafe {
            core::arch::asm!("csrw satp, {}", in(reg) satp, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_mode_and_ppn() {
        let root = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x8120_3000));
        let satp = Satp::for_root(SatpMode::Sv48, root);
        assert_eq!(satp.into_bits(), (9 << 60) | 0x81203);
        assert_eq!(satp.root(), PhysicalAddress::new(0x8120_3000));
        assert_eq!(satp.asid(), 0);
    }

    #[test]
    fn unknown_mode_reads_as_bare() {
        let satp = Satp::from_bits(11 << 60);
        assert_eq!(satp.mode(), SatpMode::Bare);
        assert_eq!(Satp::from_bits(8 << 60).mode(), SatpMode::Sv39);
    }
}
