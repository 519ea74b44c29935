//! # Boot Errors
//!
//! Everything phase 1 can trip over is fatal: there is nothing to fall back to
//! before translation is on. The library surface still returns [`SetupError`]
//! so the entry glue decides when to halt ([`fatal`]).

use crate::setup::BootStage;
use kernel_info::boot::MemoryRegion;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{MapError, PagingMode};

/// A layout constant or load parameter the early mapping cannot work with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConfigInvariantViolation {
    #[error("link base {base} is not a multiple of the {mode} root block")]
    LinkBaseMisaligned { base: VirtualAddress, mode: PagingMode },
    #[error("final base {base} is not a multiple of the {mode} root block")]
    FinalBaseMisaligned { base: VirtualAddress, mode: PagingMode },
    #[error("load address {load} only allows 4 KiB early mappings")]
    BaseGranularityOnly { load: PhysicalAddress },
    #[error("load address {load} is not aligned to {align:#x}")]
    LoadBaseMisaligned { load: PhysicalAddress, align: u64 },
    #[error("kernel image of {size:#x} bytes exceeds the early mapping window")]
    ImageTooLarge { size: u64 },
    #[error("kernel image of {size:#x} bytes does not fit the 1 GiB block at {page_offset}")]
    ImageCrossesRootBlock { page_offset: VirtualAddress, size: u64 },
}

/// Errors of the boot orchestration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Invariant(#[from] ConfigInvariantViolation),
    #[error("early mapping failed: {0}")]
    EarlyMap(#[from] MapError),
    #[error("{operation} needs stage {expected:?}, currently {actual:?}")]
    WrongStage {
        operation: &'static str,
        expected: BootStage,
        actual: BootStage,
    },
    #[error("depth fallback is only possible from sv48 before translation is on")]
    FallbackUnavailable,
    #[error("hart cannot translate in {0}")]
    CapabilityShortfall(PagingMode),
}

/// A lookup hit an address that should have been mapped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("access to unmapped address {va}")]
pub struct UnmappedAccess {
    pub va: VirtualAddress,
}

/// Mapping one memory region into the permanent root failed.
///
/// Diagnostic only: the region is skipped and boot goes on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("cannot map region {}+{:#x}: {source}", region.base, region.size)]
pub struct RegionMapFailure {
    pub region: MemoryRegion,
    pub source: MapError,
}

/// Halt on an unrecoverable setup error.
#[cold]
pub fn fatal(err: &SetupError) -> ! {
    log::error!("virtual memory setup failed: {err}");
    panic!("virtual memory setup failed: {err}");
}
