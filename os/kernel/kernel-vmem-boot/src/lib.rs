//! # Early Virtual-Memory Bring-Up
//!
//! Takes the kernel from "loaded somewhere in RAM, translation off" to
//! "running at `PAGE_OFFSET` on its permanent root table":
//!
//! 1. [`VmBootstrap::setup_vm`] relocates the image and fills the static
//!    early tables ([`StaticTables`]).
//! 2. [`VmBootstrap::ensure_supported`] probes the hart and falls back from
//!    Sv48 to Sv39 ([`VmBootstrap::fold_to_shallow`]) if needed.
//! 3. The trampoline enables translation with [`VmBootstrap::early_satp`] and
//!    reports back through [`VmBootstrap::translation_enabled`]; the resulting
//!    [`BootContext`] is [`publish`]ed.
//! 4. [`VmBootstrap::setup_vm_final`] maps all memory into the permanent root
//!    and switches to it.
//!
//! On `riscv64` bare metal the `entry` module wires this to the assembly
//! entry points.
//!
//! ## Example
//!
//! ```rust
//! use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
//! use kernel_vmem_boot::{BootStage, KernelImage, StaticTables, VmBootstrap};
//!
//! let image = KernelImage {
//!     link_base: VirtualAddress::new(kernel_info::memory::KERNEL_LINK_BASE),
//!     load_base: PhysicalAddress::new(0x8020_0000),
//!     size: 0x40_0000,
//! };
//! let tables = StaticTables::contiguous(PhysicalPage::from_addr(PhysicalAddress::new(0x8050_0000)));
//! // SAFETY: nothing is mapped; the bootstrap is only inspected.
//! let boot = unsafe { VmBootstrap::new(image, tables) };
//! assert_eq!(boot.stage(), BootStage::Cold);
//! assert_eq!(boot.config().page_offset().as_u64(), 0xFFFF_C000_0000_0000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod context;
pub mod control;
pub mod error;
pub mod relocate;
pub mod setup;
pub mod tables;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub mod entry;

pub use crate::context::{BootContext, boot_context, publish};
#[cfg(target_arch = "riscv64")]
pub use crate::control::HartControl;
pub use crate::control::TranslationControl;
pub use crate::error::{ConfigInvariantViolation, RegionMapFailure, SetupError, UnmappedAccess, fatal};
pub use crate::relocate::{Elf64Rela, R_RISCV_RELATIVE, RelocationKind, RelocationStats, Relocations};
pub use crate::setup::{BootStage, FinalMapReport, KernelImage, RootKind, VmBootstrap};
pub use crate::tables::{BootTableStorage, Chain, StaticTables};
