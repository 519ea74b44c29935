//! # Boot Context
//!
//! The values the rest of the kernel needs from early VM setup, published
//! once and read-only afterwards.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_registers::satp::SatpMode;
use kernel_vmem::{AddressSpaceConfig, PagingMode};
use spin::Once;

static BOOT_CONTEXT: Once<BootContext> = Once::new();

/// Snapshot of the address-space decisions made during early boot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootContext {
    pub mode: PagingMode,
    pub satp_mode: SatpMode,
    /// Start of the linear map (`PAGE_OFFSET`).
    pub page_offset: VirtualAddress,
    /// `PAGE_OFFSET - load_pa`.
    pub va_pa_offset: u64,
    /// First page frame of the kernel image.
    pub pfn_base: u64,
    /// The boot blob through its fixmap window.
    pub blob_va: VirtualAddress,
    pub blob_pa: PhysicalAddress,
}

impl BootContext {
    #[must_use]
    pub const fn new(cfg: &AddressSpaceConfig, blob_va: VirtualAddress, blob_pa: PhysicalAddress) -> Self {
        Self {
            mode: cfg.mode(),
            satp_mode: cfg.mode().satp_mode(),
            page_offset: cfg.page_offset(),
            va_pa_offset: cfg.va_pa_offset(),
            pfn_base: cfg.pfn_base(),
            blob_va,
            blob_pa,
        }
    }

    /// `__va`.
    #[inline]
    #[must_use]
    pub const fn pa_to_va(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(self.va_pa_offset))
    }

    /// `__pa`.
    #[inline]
    #[must_use]
    pub const fn va_to_pa(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.va_pa_offset))
    }
}

/// Publish `ctx` for the rest of the kernel.
///
/// Only the first call has an effect; later calls get the value already
/// published back.
pub fn publish(ctx: BootContext) -> &'static BootContext {
    let published = BOOT_CONTEXT.call_once(|| ctx);
    if *published != ctx {
        log::warn!("boot context already published, ignoring {ctx:?}");
    }
    published
}

/// The published context, if early setup got that far.
#[must_use]
pub fn boot_context() -> Option<&'static BootContext> {
    BOOT_CONTEXT.get()
}
