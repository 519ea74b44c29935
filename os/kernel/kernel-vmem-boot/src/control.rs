//! # Translation Control
//!
//! The two privileged operations bring-up needs besides table writes:
//! probing which depth the hart implements and switching roots.

use kernel_memory_addresses::{PhysicalPage, Size4K};
use kernel_registers::satp::Satp;
use kernel_vmem::PagingMode;

/// Access to `satp` and the TLB of the executing hart.
pub trait TranslationControl {
    /// `true` if the hart can translate in `mode`.
    ///
    /// `probe_root` must map the executing code at its current address, as
    /// probing may enable translation for an instant.
    fn supports(&self, mode: PagingMode, probe_root: PhysicalPage<Size4K>) -> bool;

    /// Write `satp`.
    ///
    /// # Safety
    /// The new root must map the executing code, its stack and all data in
    /// use at their current addresses.
    unsafe fn write_satp(&self, satp: Satp);

    /// Invalidate every cached translation.
    fn flush_tlb_all(&self);

    /// Install a new root: write `satp`, then flush the whole TLB. The two
    /// steps are never separated.
    ///
    /// # Safety
    /// See [`write_satp`](Self::write_satp).
    unsafe fn switch_root(&self, satp: Satp) {
        unsafe { self.write_satp(satp) };
        self.flush_tlb_all();
    }
}

/// [`TranslationControl`] of the executing hart.
#[cfg(target_arch = "riscv64")]
#[derive(Debug, Default, Copy, Clone)]
pub struct HartControl;

#[cfg(target_arch = "riscv64")]
impl TranslationControl for HartControl {
    fn supports(&self, mode: PagingMode, probe_root: PhysicalPage<Size4K>) -> bool {
        use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

        // MODE is WARL: an unsupported mode reads back as something else.
        let wanted = Satp::for_root(mode.satp_mode(), probe_root);
        // SAFETY: the caller passes a root with the executing code identity
        // mapped; translation is switched off again right away.
        let read_back = unsafe {
            wanted.store_unsafe();
            let satp = Satp::load_unsafe();
            Satp::new().store_unsafe();
            satp
        };
        self.flush_tlb_all();

        let ok = read_back.into_bits() == wanted.into_bits();
        log::debug!("satp probe for {mode}: {}", if ok { "ok" } else { "unsupported" });
        ok
    }

    unsafe fn write_satp(&self, satp: Satp) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { satp.store_unsafe() };
    }

    fn flush_tlb_all(&self) {
        // SAFETY: runs in supervisor mode.
        unsafe { kernel_registers::sfence::flush_tlb_all() }
    }
}
