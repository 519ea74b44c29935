//! # Kernel Configuration and Boot Interface
//!
//! Layout constants and boot-time input types shared by the early
//! virtual-memory code and the kernel proper.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! * **Linear map bases** for 4-level and 3-level translation
//!   ([`PAGE_OFFSET_L4`](memory::PAGE_OFFSET_L4), [`PAGE_OFFSET_L3`](memory::PAGE_OFFSET_L3))
//! * **Early mapping budget** ([`MAX_EARLY_MAPPING_SIZE`](memory::MAX_EARLY_MAPPING_SIZE))
//! * **Fixmap slots** ([`FixedAddress`](memory::FixedAddress)) below `FIXADDR_TOP`
//!
//! ### Boot Information ([`boot`])
//! * **Entry signature** of the phase-1 setup routine
//! * **Memory regions** handed over by the physical-region tracker
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Sv48 (4-level)                               Sv39 (3-level)
//!
//! 0xffff_9dff_fee0_0000  fixmap               0xffff_ffce_fee0_0000
//! 0xffff_9dff_ff00_0000  PCI I/O              0xffff_ffce_ff00_0000
//! 0xffff_9e00_0000_0000  vmemmap              0xffff_ffcf_0000_0000
//! 0xffff_a000_0000_0000  vmalloc              0xffff_ffd0_0000_0000
//! 0xffff_c000_0000_0000  lowmem / kernel      0xffff_ffe0_0000_0000
//! ```
//!
//! All values are `const` and validated with compile-time assertions.
//! [`KERNEL_LINK_BASE`](memory::KERNEL_LINK_BASE) has to agree with the
//! linker script:
//!
//! ```rust
//! use kernel_info::memory::KERNEL_LINK_BASE;
//! let arg = format!("--defsym=KERNEL_LINK_BASE={KERNEL_LINK_BASE:#x}");
//! assert!(arg.ends_with("0xffffc00000000000"));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
