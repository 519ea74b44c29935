//! # Bare-Metal Entry Points
//!
//! Called from `head.S`:
//!
//! ```text
//! _start:  ... a0 = dtb_pa
//!          call setup_vm             (translation off, probes and folds)
//!          csrw satp, trampoline_satp()
//!          csrw satp, early_satp()
//!          call mmu_enabled
//!          ... start_kernel -> paging_init(frames, regions)
//! ```
//!
//! The bootstrap instance lives in a `spin::Mutex`; nothing else runs this
//! early, so the lock is never contended.

use crate::control::HartControl;
use crate::error::{SetupError, fatal};
use crate::relocate::{Elf64Rela, Relocations};
use crate::setup::{FinalMapReport, KernelImage, VmBootstrap};
use crate::tables::BootTableStorage;
use crate::context;
use kernel_info::boot::MemoryRegion;
use kernel_info::memory::KERNEL_LINK_BASE;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{FrameAlloc, HartTranslation, IdentityMapper};
use spin::Mutex;

unsafe extern "C" {
    static _start: u8;
    static _end: u8;
    static __rela_dyn_start: Elf64Rela;
    static __rela_dyn_end: Elf64Rela;
}

/// The statically reserved page tables.
///
/// # Safety
/// - **`static mut`** because it is written through physical addresses by
///   the table builder, never through this symbol.
/// - `.bss.boot` keeps it zeroed and page aligned inside the image.
#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_TABLES: BootTableStorage = BootTableStorage::new();

static BOOTSTRAP: Mutex<Option<VmBootstrap>> = Mutex::new(None);

fn image() -> KernelImage {
    let start = (&raw const _start).addr() as u64;
    let end = (&raw const _end).addr() as u64;
    KernelImage {
        link_base: VirtualAddress::new(KERNEL_LINK_BASE),
        load_base: PhysicalAddress::new(start),
        size: end - start,
    }
}

fn relocations() -> Relocations<'static> {
    let start = &raw const __rela_dyn_start;
    let end = &raw const __rela_dyn_end;
    let len = (end.addr() - start.addr()) / size_of::<Elf64Rela>();
    // SAFETY: the linker script brackets `.rela.dyn` of this image with the
    // two symbols.
    unsafe { Relocations::new(core::slice::from_raw_parts(start, len)) }
}

fn with_bootstrap<T>(f: impl FnOnce(&mut VmBootstrap) -> Result<T, SetupError>) -> T {
    let mut guard = BOOTSTRAP.lock();
    let boot = guard.get_or_insert_with(|| {
        // SAFETY: called with translation off, so the storage address is its
        // physical address.
        let tables = unsafe { (*(&raw const BOOT_TABLES)).tables() };
        // SAFETY: the tables are zeroed `.bss.boot` inside the image and
        // `IdentityMapper` reaches all of it.
        unsafe { VmBootstrap::new(image(), tables) }
    });
    f(boot).unwrap_or_else(|err| fatal(&err))
}

/// Phase 1, then probe the hart and fall back to Sv39 if needed.
///
/// This is the only place the fallback is triggered; the assembly side just
/// reads back [`early_satp`] and [`trampoline_satp`].
///
/// # Safety
/// Translation off, single hart, before any relocated pointer is used.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setup_vm(dtb_pa: usize) {
    let relocs = relocations();
    with_bootstrap(|boot| {
        boot.setup_vm(&IdentityMapper, Some(&relocs), PhysicalAddress::new(dtb_pa as u64))?;
        boot.ensure_supported(&IdentityMapper, Some(&relocs), &HartControl)
    });
}

/// Raw `satp` for the early root.
#[unsafe(no_mangle)]
pub extern "C" fn early_satp() -> u64 {
    with_bootstrap(|boot| boot.early_satp()).into_bits()
}

/// Raw `satp` for the trampoline root.
#[unsafe(no_mangle)]
pub extern "C" fn trampoline_satp() -> u64 {
    with_bootstrap(|boot| boot.trampoline_satp()).into_bits()
}

/// Translation is on; publish the boot context.
#[unsafe(no_mangle)]
pub extern "C" fn mmu_enabled() {
    let ctx = with_bootstrap(VmBootstrap::translation_enabled);
    context::publish(ctx);
}

/// Phase 2: map all RAM and switch to the permanent root.
pub fn paging_init<A: FrameAlloc>(frames: &mut A, regions: &[MemoryRegion]) -> FinalMapReport {
    with_bootstrap(|boot| boot.setup_vm_final(&HartTranslation, frames, regions.iter().copied(), &HartControl))
}
