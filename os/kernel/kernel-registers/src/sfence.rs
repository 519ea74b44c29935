//! # `sfence.vma` TLB maintenance

use kernel_memory_addresses::VirtualAddress;

/// Invalidate every cached translation of the current hart.
///
/// # Safety
/// Supervisor mode only.
#[inline]
pub unsafe fn flush_tlb_all() {
    #[cfg(all(feature = "asm", target_arch = "riscv64"))]
    unsafe {
        core::arch::asm!("sfence.vma", options(nostack, preserves_flags));
    }
}

/// Invalidate cached translations of the page containing `va`, all ASIDs.
///
/// # Safety
/// Supervisor mode only.
#[inline]
pub unsafe fn flush_tlb_page(va: VirtualAddress) {
    #[cfg(all(feature = "asm", target_arch = "riscv64"))]
    unsafe {
        core::arch::asm!("sfence.vma {}, zero", in(reg) va.as_u64(), options(nostack, preserves_flags));
    }
    #[cfg(not(all(feature = "asm", target_arch = "riscv64")))]
    let _ = va;
}
