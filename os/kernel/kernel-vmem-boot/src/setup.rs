//! # Boot Orchestration
//!
//! ```text
//!   Cold ──setup_vm──► EarlyMapped ──translation_enabled──► TranslationOn
//!    ▲                     │                                     │
//!    └── DepthFallback ◄───┘ fold_to_shallow        setup_vm_final
//!                                                                 ▼
//!                                                           FullyMapped
//! ```
//!
//! ## Phase 1 (translation off)
//!
//! Everything goes through [`IdentityAccess`] into the static tables:
//!
//! 1. the fixmap chain in the early root,
//! 2. the trampoline root with one 2 MiB leaf at `PAGE_OFFSET`,
//! 3. one root-sized identity block around the load address in both roots,
//!    so code keeps running the instant `satp` is written,
//! 4. the whole image at `PAGE_OFFSET` in the largest early granularity,
//! 5. the boot blob window in the fixmap.
//!
//! ## Phase 2 (translation on)
//!
//! Tables are reached through [`WindowedAccess`]. Every mappable memory
//! region goes into the permanent root, the windows are released and the
//! permanent root replaces the early one.

use crate::context::BootContext;
use crate::control::TranslationControl;
use crate::error::{ConfigInvariantViolation, RegionMapFailure, SetupError, UnmappedAccess};
use crate::relocate::Relocations;
use crate::tables::StaticTables;
use kernel_info::boot::MemoryRegion;
use kernel_info::memory::{FixedAddress, MAX_EARLY_MAPPING_SIZE, PAGE_SIZE};
use kernel_memory_addresses::{
    PageSize, PhysicalAddress, PhysicalPage, Size1G, Size2M, Size4K, VirtualAddress, align_down,
};
use kernel_registers::satp::Satp;
use kernel_vmem::{
    ActiveTranslation, AddressSpace, AddressSpaceConfig, EarlyScratch, FrameAlloc, GeneralPool, Granularity,
    IdentityAccess, MapError, MappingBuilder, MappingRequest, PageProtection, PageTableEntry, PagingMode,
    PhysMapper, TableAccess, TablePageSource, Translation, TranslationLevel, WindowedAccess,
};
use log::{debug, info, trace, warn};

/// Where the bootstrap is in its lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BootStage {
    Cold,
    EarlyMapped,
    /// Transient while the tables are rebuilt for Sv39.
    DepthFallback,
    TranslationOn,
    FullyMapped,
}

/// The running kernel image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct KernelImage {
    /// Virtual base the image was linked at.
    pub link_base: VirtualAddress,
    /// Physical base it was loaded at.
    pub load_base: PhysicalAddress,
    /// Bytes from the first to past the last byte of the image.
    pub size: u64,
}

/// Which of the three roots to walk.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RootKind {
    Early,
    Trampoline,
    Permanent,
}

/// What phase 2 did with the memory regions it was given.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FinalMapReport {
    pub regions_mapped: usize,
    pub blocks: usize,
    pub skipped_empty: usize,
    pub skipped_nomap: usize,
    /// Regions entirely below the load address.
    pub skipped_below_base: usize,
    pub failed: usize,
    pub tables_allocated: usize,
}

/// How phase 2 treats one region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum RegionPlan {
    Map { start: PhysicalAddress, end: PhysicalAddress },
    SkipEmpty,
    SkipNoMap,
    SkipBelowBase,
    Wraps,
}

/// Drives early virtual-memory setup from reset to the permanent root.
#[derive(Debug)]
pub struct VmBootstrap {
    image: KernelImage,
    tables: StaticTables,
    mode: PagingMode,
    page_offset: VirtualAddress,
    stage: BootStage,
    blob_pa: Option<PhysicalAddress>,
    context: Option<BootContext>,
    swapper: Option<AddressSpace>,
}

impl VmBootstrap {
    /// Bootstrap starting in Sv48 at its default `PAGE_OFFSET`.
    ///
    /// # Safety
    /// `tables` must be frames reserved for page tables, zeroed before the
    /// first [`setup_vm`](Self::setup_vm), and together with `image` reachable
    /// through every [`PhysMapper`] later passed in. Once translation is on,
    /// the image must be mapped linearly as set up by phase 1.
    #[must_use]
    pub const unsafe fn new(image: KernelImage, tables: StaticTables) -> Self {
        unsafe { Self::with_mode(image, tables, PagingMode::Sv48) }
    }

    /// Like [`new`](Self::new), starting in `mode`.
    ///
    /// # Safety
    /// See [`new`](Self::new).
    #[must_use]
    pub const unsafe fn with_mode(image: KernelImage, tables: StaticTables, mode: PagingMode) -> Self {
        Self {
            image,
            tables,
            mode,
            page_offset: mode.default_page_offset(),
            stage: BootStage::Cold,
            blob_pa: None,
            context: None,
            swapper: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn stage(&self) -> BootStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> PagingMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub const fn image(&self) -> &KernelImage {
        &self.image
    }

    #[inline]
    #[must_use]
    pub const fn tables(&self) -> &StaticTables {
        &self.tables
    }

    /// The context of the last successful phase 1.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> Option<&BootContext> {
        self.context.as_ref()
    }

    /// The permanent address space, once installed.
    #[inline]
    #[must_use]
    pub const fn permanent(&self) -> Option<&AddressSpace> {
        self.swapper.as_ref()
    }

    /// Configuration for the current mode and final base.
    #[must_use]
    pub const fn config(&self) -> AddressSpaceConfig {
        AddressSpaceConfig::new(self.mode, self.page_offset, self.image.load_base)
    }

    fn expect_stage(&self, operation: &'static str, expected: BootStage) -> Result<(), SetupError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(SetupError::WrongStage {
                operation,
                expected,
                actual: self.stage,
            })
        }
    }

    /// Early mapping granularity, if the layout allows an early mapping at all.
    fn validate(&self, cfg: &AddressSpaceConfig, relocating: bool) -> Result<Granularity, ConfigInvariantViolation> {
        let load = self.image.load_base;
        let root_block = self.mode.root_block_size();

        if relocating {
            let room = Size1G::SIZE - (cfg.page_offset().as_u64() & (Size1G::SIZE - 1));
            if room < self.image.size {
                return Err(ConfigInvariantViolation::ImageCrossesRootBlock {
                    page_offset: cfg.page_offset(),
                    size: self.image.size,
                });
            }
        }

        let map_size = Granularity::select(load.as_u64(), MAX_EARLY_MAPPING_SIZE);
        if map_size == Granularity::Page4K {
            return Err(ConfigInvariantViolation::BaseGranularityOnly { load });
        }
        if !self.image.link_base.is_aligned_to(root_block) {
            return Err(ConfigInvariantViolation::LinkBaseMisaligned {
                base: self.image.link_base,
                mode: self.mode,
            });
        }
        if !cfg.page_offset().is_aligned_to(root_block) {
            return Err(ConfigInvariantViolation::FinalBaseMisaligned {
                base: cfg.page_offset(),
                mode: self.mode,
            });
        }
        if !load.is_aligned_to(map_size.bytes()) {
            return Err(ConfigInvariantViolation::LoadBaseMisaligned {
                load,
                align: map_size.bytes(),
            });
        }
        if self.image.size > MAX_EARLY_MAPPING_SIZE {
            return Err(ConfigInvariantViolation::ImageTooLarge { size: self.image.size });
        }
        Ok(map_size)
    }

    /// Phase 1: build the early and trampoline roots.
    ///
    /// Relocates the image for the final base first if `relocations` are
    /// given. The blob at `blob_pa` is staged through the fixmap.
    ///
    /// # Errors
    /// - [`SetupError::WrongStage`] unless [`BootStage::Cold`].
    /// - [`SetupError::Invariant`] if the layout cannot be mapped early.
    /// - [`SetupError::EarlyMap`] if the static tables run out.
    pub fn setup_vm<M: PhysMapper>(
        &mut self,
        mapper: &M,
        relocations: Option<&Relocations<'_>>,
        blob_pa: PhysicalAddress,
    ) -> Result<BootContext, SetupError> {
        self.expect_stage("setup_vm", BootStage::Cold)?;
        let cfg = self.config();
        let map_size = self.validate(&cfg, relocations.is_some())?;
        info!(
            "early vm: {} image {}+{:#x} at {}, {map_size} blocks",
            self.mode,
            self.image.load_base,
            self.image.size,
            cfg.page_offset()
        );

        if let Some(relocs) = relocations {
            let stats = relocs.apply(mapper, self.image.link_base, cfg.page_offset(), self.image.load_base);
            trace!("{stats:?}");
        }

        let t = self.tables;
        let mode = self.mode;
        let fixmap = cfg.fixmap();
        let load = self.image.load_base;
        let page_offset = cfg.page_offset();

        // SAFETY: the static tables are reachable through `mapper`, as
        // required by `VmBootstrap::new`.
        let mut port = unsafe { IdentityAccess::new(mapper) };

        link_chain(&mut port, t.early_root, mode, fixmap.start(), t.fixmap_chain(mode).as_slice());

        let trampoline = t.trampoline_chain(mode);
        link_chain(&mut port, t.trampoline_root, mode, page_offset, trampoline.as_slice());

        let mut scratch = EarlyScratch::new(t.early_pud, t.early_pmd, page_offset);
        let mut builder = MappingBuilder::new(&mut port, &mut scratch, mode);

        builder.insert_at(
            TranslationLevel::L1,
            trampoline.last(),
            &MappingRequest::new(page_offset, load, Size2M::SIZE, PageProtection::PAGE_KERNEL_EXEC),
        )?;

        let block = mode.root_block_size();
        let identity_pa = PhysicalAddress::new(align_down(load.as_u64(), block));
        let identity = MappingRequest::new(
            VirtualAddress::new(identity_pa.as_u64()),
            identity_pa,
            block,
            PageProtection::PAGE_KERNEL_EXEC,
        );
        builder.insert(t.early_root, &identity)?;
        builder.insert(t.trampoline_root, &identity)?;

        let step = map_size.bytes();
        let mut offset = 0;
        while offset < self.image.size {
            let req = MappingRequest::new(page_offset + offset, load + offset, step, PageProtection::PAGE_KERNEL_EXEC);
            builder.insert(t.early_root, &req)?;
            offset += step;
        }

        let window = fixmap.fdt_window();
        let blob_page = blob_pa.page::<Size4K>().base();
        let mut offset = 0;
        while offset < window.size() {
            let req = MappingRequest::new(window.start + offset, blob_page + offset, PAGE_SIZE, PageProtection::PAGE_KERNEL);
            builder.insert_at(TranslationLevel::L0, t.fixmap_pte, &req)?;
            offset += PAGE_SIZE;
        }

        let blob_va = fixmap.slot(FixedAddress::Fdt) + blob_pa.offset::<Size4K>();
        let ctx = BootContext::new(&cfg, blob_va, blob_pa);
        debug!("boot blob {blob_pa} staged at {blob_va}");

        self.blob_pa = Some(blob_pa);
        self.context = Some(ctx);
        self.stage = BootStage::EarlyMapped;
        Ok(ctx)
    }

    /// Phase 1b: rebuild everything for Sv39.
    ///
    /// Clears the three roots and reruns [`setup_vm`](Self::setup_vm) at
    /// `PAGE_OFFSET_L3` with the blob address saved from the first run. The
    /// lower static tables keep their content; their indices are the same in
    /// both modes.
    ///
    /// # Errors
    /// - [`SetupError::WrongStage`] unless [`BootStage::EarlyMapped`].
    /// - [`SetupError::FallbackUnavailable`] when already in Sv39.
    /// - Whatever the rerun of phase 1 reports.
    pub fn fold_to_shallow<M: PhysMapper>(
        &mut self,
        mapper: &M,
        relocations: Option<&Relocations<'_>>,
    ) -> Result<BootContext, SetupError> {
        self.expect_stage("fold_to_shallow", BootStage::EarlyMapped)?;
        let (PagingMode::Sv48, Some(blob_pa)) = (self.mode, self.blob_pa) else {
            return Err(SetupError::FallbackUnavailable);
        };

        warn!("sv48 not available, falling back to sv39");
        self.stage = BootStage::DepthFallback;

        // SAFETY: as in `setup_vm`.
        let mut port = unsafe { IdentityAccess::new(mapper) };
        for root in self.tables.roots() {
            port.resolve(self.mode.root_level(), root).zero();
        }

        self.mode = PagingMode::Sv39;
        self.page_offset = PagingMode::Sv39.default_page_offset();
        self.context = None;
        self.stage = BootStage::Cold;
        self.setup_vm(mapper, relocations, blob_pa)
    }

    /// Make sure the hart can use the current mode, folding to Sv39 if not.
    ///
    /// # Errors
    /// - [`SetupError::CapabilityShortfall`] if neither depth works.
    /// - Whatever [`fold_to_shallow`](Self::fold_to_shallow) reports.
    pub fn ensure_supported<M: PhysMapper, C: TranslationControl>(
        &mut self,
        mapper: &M,
        relocations: Option<&Relocations<'_>>,
        control: &C,
    ) -> Result<PagingMode, SetupError> {
        self.expect_stage("ensure_supported", BootStage::EarlyMapped)?;
        if control.supports(self.mode, self.tables.early_root) {
            return Ok(self.mode);
        }
        if self.mode == PagingMode::Sv39 {
            return Err(SetupError::CapabilityShortfall(PagingMode::Sv39));
        }

        self.fold_to_shallow(mapper, relocations)?;
        if control.supports(PagingMode::Sv39, self.tables.early_root) {
            Ok(PagingMode::Sv39)
        } else {
            Err(SetupError::CapabilityShortfall(PagingMode::Sv39))
        }
    }

    /// `satp` selecting the early root.
    ///
    /// # Errors
    /// [`SetupError::WrongStage`] unless [`BootStage::EarlyMapped`].
    pub fn early_satp(&self) -> Result<Satp, SetupError> {
        self.expect_stage("early_satp", BootStage::EarlyMapped)?;
        Ok(AddressSpace::new(self.tables.early_root, self.mode).satp())
    }

    /// `satp` selecting the trampoline root.
    ///
    /// # Errors
    /// [`SetupError::WrongStage`] unless [`BootStage::EarlyMapped`].
    pub fn trampoline_satp(&self) -> Result<Satp, SetupError> {
        self.expect_stage("trampoline_satp", BootStage::EarlyMapped)?;
        Ok(AddressSpace::new(self.tables.trampoline_root, self.mode).satp())
    }

    /// Record that the early root is live in `satp`.
    ///
    /// # Errors
    /// [`SetupError::WrongStage`] unless [`BootStage::EarlyMapped`].
    pub fn translation_enabled(&mut self) -> Result<BootContext, SetupError> {
        self.expect_stage("translation_enabled", BootStage::EarlyMapped)?;
        let Some(ctx) = self.context else {
            return Err(SetupError::WrongStage {
                operation: "translation_enabled",
                expected: BootStage::EarlyMapped,
                actual: BootStage::Cold,
            });
        };
        info!("translation on ({}), linear map at {}", ctx.mode, ctx.page_offset);
        self.stage = BootStage::TranslationOn;
        Ok(ctx)
    }

    /// Phase 2: map all memory into the permanent root and switch to it.
    ///
    /// Regions that fail to map are logged and skipped.
    ///
    /// # Errors
    /// [`SetupError::WrongStage`] unless [`BootStage::TranslationOn`].
    pub fn setup_vm_final<V, A, C, I>(
        &mut self,
        mmu: &V,
        frames: &mut A,
        regions: I,
        control: &C,
    ) -> Result<FinalMapReport, SetupError>
    where
        V: ActiveTranslation,
        A: FrameAlloc,
        C: TranslationControl,
        I: IntoIterator<Item = MemoryRegion>,
    {
        self.expect_stage("setup_vm_final", BootStage::TranslationOn)?;
        let cfg = self.config();
        let t = self.tables;
        let mode = self.mode;
        let fixmap = cfg.fixmap();

        // SAFETY: `fixmap_pte` is part of the image, which the early root maps
        // linearly, and it maps the fixmap in every root.
        let mut port = unsafe { WindowedAccess::new(mmu, cfg.pa_to_va(t.fixmap_pte.base()), fixmap) };
        link_chain(&mut port, t.swapper_root, mode, fixmap.start(), t.fixmap_chain(mode).as_slice());

        let mut pool = GeneralPool::new(frames);
        let mut report = FinalMapReport::default();
        let mut memory_end = self.image.load_base;
        {
            let mut builder = MappingBuilder::new(&mut port, &mut pool, mode);
            for region in regions {
                let (start, end) = match self.plan(&region) {
                    RegionPlan::Map { start, end } => (start, end),
                    RegionPlan::SkipEmpty => {
                        report.skipped_empty += 1;
                        continue;
                    }
                    RegionPlan::SkipNoMap => {
                        trace!("{} is nomap", region.base);
                        report.skipped_nomap += 1;
                        continue;
                    }
                    RegionPlan::SkipBelowBase => {
                        debug!("{}+{:#x} lies below the kernel, not mapped", region.base, region.size);
                        report.skipped_below_base += 1;
                        continue;
                    }
                    RegionPlan::Wraps => {
                        warn!("region {}+{:#x} wraps, ignored", region.base, region.size);
                        report.failed += 1;
                        continue;
                    }
                };

                match map_linear(&mut builder, t.swapper_root, &cfg, start, end) {
                    Ok(blocks) => {
                        debug!("mapped {start}..{end} in {blocks} blocks");
                        report.regions_mapped += 1;
                        report.blocks += blocks;
                        memory_end = memory_end.max(end);
                    }
                    Err(source) => {
                        warn!("{}", RegionMapFailure { region, source });
                        report.failed += 1;
                    }
                }
            }
        }
        report.tables_allocated = pool.allocated();
        port.release_all();

        self.print_vm_layout(memory_end);

        let mut swapper = AddressSpace::new(t.swapper_root, mode);
        // SAFETY: the permanent root maps the image, the fixmap and all RAM
        // at the addresses the early root used.
        unsafe { control.switch_root(swapper.satp()) };
        swapper.mark_active();
        self.swapper = Some(swapper);
        self.stage = BootStage::FullyMapped;

        info!(
            "permanent root active: {} regions, {} blocks, {} new tables",
            report.regions_mapped, report.blocks, report.tables_allocated
        );
        Ok(report)
    }

    fn plan(&self, region: &MemoryRegion) -> RegionPlan {
        if region.size == 0 {
            return RegionPlan::SkipEmpty;
        }
        if region.is_nomap() {
            return RegionPlan::SkipNoMap;
        }
        let Some(end) = region.end() else {
            return RegionPlan::Wraps;
        };

        let load = self.image.load_base;
        let start = if region.contains(load) {
            load
        } else if end <= load {
            return RegionPlan::SkipBelowBase;
        } else {
            region.base
        };

        // Rounding up the start can still run off the top of the address space.
        let Some(start) = start.as_u64().checked_add(PAGE_SIZE - 1) else {
            return RegionPlan::Wraps;
        };
        let start = align_down(start, PAGE_SIZE);
        let end = align_down(end.as_u64(), PAGE_SIZE);
        if start >= end {
            return RegionPlan::SkipEmpty;
        }
        RegionPlan::Map {
            start: PhysicalAddress::new(start),
            end: PhysicalAddress::new(end),
        }
    }

    /// Log the kernel virtual layout with the linear map ending at `memory_end`.
    pub fn print_vm_layout(&self, memory_end: PhysicalAddress) {
        info!("{}", self.config().layout(memory_end));
    }

    /// Translate `va` through one of the roots.
    ///
    /// # Errors
    /// [`UnmappedAccess`] if nothing maps `va`.
    pub fn lookup<P: TableAccess>(
        &self,
        port: &mut P,
        root: RootKind,
        va: VirtualAddress,
    ) -> Result<Translation, UnmappedAccess> {
        let page = match root {
            RootKind::Early => self.tables.early_root,
            RootKind::Trampoline => self.tables.trampoline_root,
            RootKind::Permanent => self.tables.swapper_root,
        };
        AddressSpace::new(page, self.mode)
            .query(port, va)
            .ok_or(UnmappedAccess { va })
    }
}

/// Link `nexts` below `root` along the walk for `va`, one table per level.
///
/// Slots already in use are followed, not replaced.
fn link_chain<P: TableAccess>(
    port: &mut P,
    root: PhysicalPage<Size4K>,
    mode: PagingMode,
    va: VirtualAddress,
    nexts: &[PhysicalPage<Size4K>],
) {
    let mut table = root;
    for (level, &next) in mode.walk().zip(nexts) {
        let index = level.index(va);
        let mut t = port.resolve(level, table);
        if t.get(index).is_vacant() {
            t.set(index, PageTableEntry::table(next));
        }
        table = next;
    }
}

/// Map `[start, end)` at its linear address, largest blocks first.
fn map_linear<P: TableAccess, S: TablePageSource>(
    builder: &mut MappingBuilder<'_, P, S>,
    root: PhysicalPage<Size4K>,
    cfg: &AddressSpaceConfig,
    start: PhysicalAddress,
    end: PhysicalAddress,
) -> Result<usize, MapError> {
    let mut pa = start;
    let mut blocks = 0;
    while pa < end {
        let va = cfg.pa_to_va(pa);
        let g = Granularity::fitting(pa.as_u64(), va.as_u64(), end.as_u64() - pa.as_u64());
        builder.insert(root, &MappingRequest::new(va, pa, g.bytes(), PageProtection::PAGE_KERNEL_EXEC))?;
        pa += g.bytes();
        blocks += 1;
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::boot::RegionFlags;
    use kernel_info::memory::KERNEL_LINK_BASE;

    fn page(pa: u64) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(pa))
    }

    fn bootstrap(load: u64, size: u64) -> VmBootstrap {
        let image = KernelImage {
            link_base: VirtualAddress::new(KERNEL_LINK_BASE),
            load_base: PhysicalAddress::new(load),
            size,
        };
        unsafe { VmBootstrap::new(image, StaticTables::contiguous(page(0x8050_0000))) }
    }

    #[test]
    fn validation() {
        let b = bootstrap(0x8020_0000, 0x40_0000);
        assert_eq!(b.validate(&b.config(), true), Ok(Granularity::Mega2M));

        let b = bootstrap(0x8020_1000, 0x40_0000);
        assert_eq!(
            b.validate(&b.config(), false),
            Err(ConfigInvariantViolation::BaseGranularityOnly {
                load: PhysicalAddress::new(0x8020_1000)
            })
        );

        let b = bootstrap(0x8000_0000, MAX_EARLY_MAPPING_SIZE + PAGE_SIZE);
        assert_eq!(
            b.validate(&b.config(), false),
            Err(ConfigInvariantViolation::ImageTooLarge {
                size: MAX_EARLY_MAPPING_SIZE + PAGE_SIZE
            })
        );
    }

    #[test]
    fn link_base_must_cover_whole_root_blocks() {
        let image = KernelImage {
            link_base: VirtualAddress::new(KERNEL_LINK_BASE + Size1G::SIZE),
            load_base: PhysicalAddress::new(0x8020_0000),
            size: 0x40_0000,
        };
        let b = unsafe { VmBootstrap::new(image, StaticTables::contiguous(page(0x8050_0000))) };
        assert!(matches!(
            b.validate(&b.config(), false),
            Err(ConfigInvariantViolation::LinkBaseMisaligned { .. })
        ));
    }

    #[test]
    fn region_plans() {
        let b = bootstrap(0x8020_0000, 0x40_0000);
        let region = |base: u64, size: u64| MemoryRegion::new(PhysicalAddress::new(base), size);

        assert_eq!(b.plan(&region(0x8000_0000, 0)), RegionPlan::SkipEmpty);
        assert_eq!(
            b.plan(&region(0x8000_0000, 0x100_0000).with_flags(RegionFlags::NOMAP)),
            RegionPlan::SkipNoMap
        );
        assert_eq!(
            b.plan(&region(0x8000_0000, 0x100_0000)),
            RegionPlan::Map {
                start: PhysicalAddress::new(0x8020_0000),
                end: PhysicalAddress::new(0x8100_0000)
            }
        );
        assert_eq!(b.plan(&region(0x1000_0000, 0x1000)), RegionPlan::SkipBelowBase);
        assert_eq!(
            b.plan(&region(0x9000_0800, 0x2000)),
            RegionPlan::Map {
                start: PhysicalAddress::new(0x9000_1000),
                end: PhysicalAddress::new(0x9000_2000)
            }
        );
        assert_eq!(b.plan(&region(0x9000_0800, 0x400)), RegionPlan::SkipEmpty);
        assert_eq!(b.plan(&region(u64::MAX - 0xfff, 0x2000)), RegionPlan::Wraps);
        assert_eq!(b.plan(&region(u64::MAX - 0x800, 0x10)), RegionPlan::Wraps);
        assert_eq!(
            b.plan(&region(u64::MAX - 0x2fff, 0x2000)),
            RegionPlan::Map {
                start: PhysicalAddress::new(u64::MAX - 0x2fff),
                end: PhysicalAddress::new(u64::MAX - 0xfff)
            }
        );
    }

    #[test]
    fn stage_order_is_enforced() {
        let mut b = bootstrap(0x8020_0000, 0x40_0000);
        assert!(matches!(
            b.early_satp(),
            Err(SetupError::WrongStage {
                expected: BootStage::EarlyMapped,
                actual: BootStage::Cold,
                ..
            })
        ));
        assert!(b.translation_enabled().is_err());
        assert_eq!(b.stage(), BootStage::Cold);
    }
}
