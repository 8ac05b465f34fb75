//! The tracker: the allocator behind the realloc callback.
//!
//! Every request is classified by size. Up to [`ARENA_SIZE`] bytes are
//! pooled in arenas; anything larger goes to the system allocator as a
//! huge object. Both paths are accounted so a host can watch live bytes,
//! the pooled high-water mark, and the live allocation count, and so that
//! teardown can prove nothing leaked.

use std::fmt;
use std::ptr::NonNull;

use crate::allocators::arena::{ALIGNMENT, ARENA_SIZE};
use crate::allocators::free_list::FreeListError;
use crate::allocators::heap::{copy_payload, SystemHeap};
use crate::allocators::table::{ArenaId, ArenaTable, FreeError, Placement, MAX_ARENAS};
use crate::api::config::TrackerConfig;
use crate::api::snapshot::{ArenaSnapshot, TrackerSnapshot};
use crate::api::stats::TrackerStats;
#[cfg(feature = "debug")]
use crate::debug::{AllocationLedger, LedgerMismatch};
use crate::diagnostics::profiler::{plot_usage, MemoryEvent, ProfilerHooks, SizeClass};
use crate::util::layout::align_up;
use crate::{al_assert, al_emit, al_fatal};

/// Classify a request size.
#[inline]
pub fn size_class(size: usize) -> SizeClass {
    if size > ARENA_SIZE {
        SizeClass::Huge
    } else {
        SizeClass::Pooled
    }
}

/// A broken invariant found by [`Tracker::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// An arena's free list is malformed.
    FreeList { arena: ArenaId, error: FreeListError },
    /// Bytes missing from the free lists don't match the pooled counter.
    Accounting { pooled_bytes: usize, arena_used_bytes: usize },
    /// The address index is unsorted or out of step with the slots.
    AddressIndex,
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeList { arena, error } => write!(f, "arena {arena}: {error}"),
            Self::Accounting { pooled_bytes, arena_used_bytes } => write!(
                f,
                "pooled counter says {pooled_bytes} bytes, arenas hand out {arena_used_bytes}"
            ),
            Self::AddressIndex => write!(f, "arena address index is not sorted"),
        }
    }
}

impl std::error::Error for InvariantError {}

/// Arena-pooled allocator with built-in accounting.
///
/// A tracker is used from one execution context at a time (`&mut self`
/// everywhere). Wrap it in [`SharedTracker`](crate::SharedTracker) to share
/// it between threads.
///
/// # Example
///
/// ```rust
/// use arenalloc::Tracker;
///
/// let mut tracker = Tracker::new();
///
/// let a = tracker.allocate(100).unwrap();
/// let b = unsafe { tracker.realloc(Some(a), 100, 300) }.unwrap();
/// unsafe { tracker.free(b, 300) };
///
/// assert!(tracker.stats().is_quiescent());
/// tracker.destroy();
/// ```
pub struct Tracker {
    config: TrackerConfig,

    /// Pooled storage
    arenas: ArenaTable,

    /// Huge-object storage
    heap: SystemHeap,

    pooled_bytes: usize,
    peak_pooled_bytes: usize,
    huge_bytes: usize,
    live_count: usize,

    total_allocations: u64,
    total_frees: u64,
    total_resizes: u64,
    failed_requests: u64,

    hooks: ProfilerHooks,

    #[cfg(feature = "debug")]
    ledger: Option<AllocationLedger>,

    /// Set once the leak check ran
    torn_down: bool,
}

impl Tracker {
    /// Create a tracker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Create a tracker with the given configuration.
    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            #[cfg(feature = "debug")]
            ledger: config.ledger_enabled().then(AllocationLedger::new),
            config,
            arenas: ArenaTable::new(),
            heap: SystemHeap::new(),
            pooled_bytes: 0,
            peak_pooled_bytes: 0,
            huge_bytes: 0,
            live_count: 0,
            total_allocations: 0,
            total_frees: 0,
            total_resizes: 0,
            failed_requests: 0,
            hooks: ProfilerHooks::new(),
            torn_down: false,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Profiler hooks receiving every allocation event.
    pub fn profiler_hooks_mut(&mut self) -> &mut ProfilerHooks {
        &mut self.hooks
    }

    /// The four-argument callback: free, allocate, or resize depending on
    /// which arguments are present.
    ///
    /// | `ptr`  | `new_size` | action                        | returns       |
    /// |--------|------------|-------------------------------|---------------|
    /// | `None` | 0          | nothing                       | `None`        |
    /// | `Some` | 0          | free `old_size` bytes         | `None`        |
    /// | `None` | > 0        | allocate (`old_size` ignored) | new block     |
    /// | `Some` | > 0        | resize                        | moved block   |
    ///
    /// `None` from an allocation or resize means out of memory; a failed
    /// resize leaves the old block valid.
    ///
    /// # Safety
    ///
    /// A present `ptr` must be a live block from this tracker and `old_size`
    /// must be exactly the size it was allocated (or last resized) with.
    pub unsafe fn realloc(
        &mut self,
        ptr: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        match (ptr, new_size) {
            (None, 0) => None,
            (Some(ptr), 0) => {
                self.free(ptr, old_size);
                None
            }
            (None, _) => self.allocate(new_size),
            (Some(ptr), _) => self.resize(ptr, old_size, new_size),
        }
    }

    /// Allocate `size` bytes, 8-byte aligned. Zero-sized requests get `None`.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        let class = size_class(size);
        let ptr = match class {
            SizeClass::Huge => {
                let Some(ptr) = self.heap.alloc(size) else {
                    return self.out_of_memory(size);
                };
                self.huge_bytes += size;
                ptr
            }
            SizeClass::Pooled => {
                let Some(placement) = self.place(size) else {
                    return self.out_of_memory(size);
                };
                self.credit_pooled(size);
                placement.ptr
            }
        };

        self.live_count += 1;
        self.total_allocations += 1;
        self.record(ptr, size);

        self.hooks.emit(|| MemoryEvent::Alloc {
            ptr: ptr.as_ptr() as usize,
            size,
            class,
        });
        plot_usage(self.pooled_bytes, self.huge_bytes);

        Some(ptr)
    }

    /// Free a block of `size` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block from this tracker allocated with exactly
    /// `size` bytes. It must not be used afterwards.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>, size: usize) {
        self.live_count = Self::debit(self.live_count, 1, "live allocations");

        let class = size_class(size);
        match class {
            SizeClass::Huge => self.release_huge(ptr, size),
            SizeClass::Pooled => self.release_pooled(ptr, size),
        }

        self.total_frees += 1;

        self.hooks.emit(|| MemoryEvent::Free {
            ptr: ptr.as_ptr() as usize,
            size,
            class,
        });
        plot_usage(self.pooled_bytes, self.huge_bytes);
    }

    /// Move a block to a new size, copying the bytes both sizes share.
    ///
    /// Returns `None` on out of memory, leaving the old block untouched.
    /// A `new_size` of zero frees the block.
    ///
    /// # Safety
    ///
    /// Same contract as [`free`](Self::free) for `ptr` and `old_size`.
    pub unsafe fn resize(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if new_size == 0 {
            self.free(ptr, old_size);
            return None;
        }

        let new_ptr = match (size_class(old_size), size_class(new_size)) {
            (SizeClass::Pooled, SizeClass::Pooled) => {
                let Some(placement) = self.place(new_size) else {
                    return self.out_of_memory(new_size);
                };
                copy_payload(ptr, placement.ptr, old_size.min(new_size));
                self.release_pooled(ptr, old_size);
                self.credit_pooled(new_size);
                placement.ptr
            }
            (SizeClass::Huge, SizeClass::Huge) => {
                let Some(new_ptr) = self.heap.realloc(ptr, old_size, new_size) else {
                    return self.out_of_memory(new_size);
                };
                self.forget(ptr, old_size);
                self.huge_bytes = Self::debit(self.huge_bytes, old_size, "huge bytes") + new_size;
                new_ptr
            }
            (SizeClass::Pooled, SizeClass::Huge) => {
                let Some(new_ptr) = self.heap.alloc(new_size) else {
                    return self.out_of_memory(new_size);
                };
                copy_payload(ptr, new_ptr, old_size);
                self.release_pooled(ptr, old_size);
                self.huge_bytes += new_size;
                new_ptr
            }
            (SizeClass::Huge, SizeClass::Pooled) => {
                let Some(placement) = self.place(new_size) else {
                    return self.out_of_memory(new_size);
                };
                copy_payload(ptr, placement.ptr, new_size);
                self.release_huge(ptr, old_size);
                self.credit_pooled(new_size);
                placement.ptr
            }
        };

        self.total_resizes += 1;
        self.record(new_ptr, new_size);

        self.hooks.emit(|| MemoryEvent::Resize {
            old_ptr: ptr.as_ptr() as usize,
            old_size,
            new_ptr: new_ptr.as_ptr() as usize,
            new_size,
        });
        plot_usage(self.pooled_bytes, self.huge_bytes);

        Some(new_ptr)
    }

    /// Current accounting.
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            pooled_bytes: self.pooled_bytes,
            peak_pooled_bytes: self.peak_pooled_bytes,
            huge_bytes: self.huge_bytes,
            live_allocations: self.live_count,
            huge_allocations: self.heap.live_blocks(),
            arenas: self.arenas.len(),
            total_allocations: self.total_allocations,
            total_frees: self.total_frees,
            total_resizes: self.total_resizes,
            failed_requests: self.failed_requests,
        }
    }

    /// Stats plus the free-list layout of every arena.
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            stats: self.stats(),
            arenas: ArenaSnapshot::capture(&self.arenas),
        }
    }

    /// Verify every free list and the pooled accounting identity:
    /// bytes missing from the free lists equal the pooled counter.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let ids = self.arenas.ids_by_address();
        let base = |id: ArenaId| self.arenas.get(id).map_or(0, |arena| arena.base_addr());
        if ids.len() != self.arenas.len() || !ids.windows(2).all(|w| base(w[0]) < base(w[1])) {
            return Err(InvariantError::AddressIndex);
        }

        let mut arena_used_bytes = 0;
        for (id, arena) in self.arenas.iter() {
            let free = arena
                .check_free_list()
                .map_err(|error| InvariantError::FreeList { arena: id, error })?;
            arena_used_bytes += ARENA_SIZE - free;
        }

        if arena_used_bytes != self.pooled_bytes {
            return Err(InvariantError::Accounting {
                pooled_bytes: self.pooled_bytes,
                arena_used_bytes,
            });
        }
        Ok(())
    }

    /// Tear the tracker down, releasing every arena.
    ///
    /// # Panics
    ///
    /// With diagnostic `AL103` if any allocation is still live. Dropping a
    /// tracker performs the same check.
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.torn_down = true;

        if self.stats().is_quiescent() {
            #[cfg(feature = "log")]
            log::debug!(
                "arenalloc: teardown clean, peak pooled {} bytes over {} arenas",
                self.peak_pooled_bytes,
                self.arenas.len()
            );
            return;
        }

        let context = format!(
            "pooled={} huge={} live={}",
            self.pooled_bytes, self.huge_bytes, self.live_count
        );

        #[cfg(feature = "debug")]
        let context = match self.ledger.as_ref() {
            Some(ledger) => format!("{}\n{}", context, ledger.leak_report()),
            None => context,
        };

        al_fatal!(AL103, "{}", context);
    }

    /// Take pooled space, reporting arena creation and a full table.
    fn place(&mut self, size: usize) -> Option<Placement> {
        let placement = self.arenas.allocate(align_up(size, ALIGNMENT));

        match placement {
            Some(placement) if placement.fresh_arena => self.on_arena_created(placement.arena),
            None if self.arenas.is_full() && self.config.report_out_of_memory => {
                al_emit!(AL002, "request of {} bytes with all {} arenas in use", size, MAX_ARENAS);
            }
            _ => {}
        }

        placement
    }

    fn on_arena_created(&mut self, id: ArenaId) {
        let Some(base) = self.arenas.get(id).map(|arena| arena.base_addr()) else {
            return;
        };

        #[cfg(feature = "log")]
        log::debug!(
            "arenalloc: created arena {} at 0x{:x} ({} of {})",
            id,
            base,
            self.arenas.len(),
            MAX_ARENAS
        );

        self.hooks.emit(|| MemoryEvent::ArenaCreated { index: id.index(), base });
    }

    unsafe fn release_pooled(&mut self, ptr: NonNull<u8>, size: usize) {
        self.forget(ptr, size);

        let aligned = align_up(size, ALIGNMENT);
        self.pooled_bytes = Self::debit(self.pooled_bytes, aligned, "pooled bytes");

        match self.arenas.free(ptr, aligned, self.config.poison_freed) {
            Ok(arena) if self.config.validate_on_free => self.validate_arena(arena),
            Ok(_) => {}
            Err(FreeError::NotOwned) => al_fatal!(AL101, "pointer {:p}, size {}", ptr, size),
            Err(err) => al_fatal!(AL102, "pointer {:p}, size {}: {}", ptr, size, err),
        }
    }

    unsafe fn release_huge(&mut self, ptr: NonNull<u8>, size: usize) {
        self.forget(ptr, size);
        if let Err(err) = self.heap.dealloc(ptr, size) {
            al_fatal!(AL106, "pointer {:p}, size {}: {}", ptr, size, err);
        }
        self.huge_bytes = Self::debit(self.huge_bytes, size, "huge bytes");
    }

    fn validate_arena(&self, id: ArenaId) {
        if let Some(Err(err)) = self.arenas.get(id).map(|arena| arena.check_free_list()) {
            al_fatal!(AL104, "arena {}: {}", id, err);
        }
    }

    fn credit_pooled(&mut self, size: usize) {
        self.pooled_bytes += align_up(size, ALIGNMENT);
        self.peak_pooled_bytes = self.peak_pooled_bytes.max(self.pooled_bytes);
    }

    fn debit(counter: usize, amount: usize, what: &str) -> usize {
        al_assert!(
            counter >= amount,
            AL105,
            "{} would drop below zero ({} - {})",
            what,
            counter,
            amount
        );
        counter - amount
    }

    #[cold]
    fn out_of_memory(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.failed_requests += 1;
        if self.config.report_out_of_memory {
            al_emit!(
                AL001,
                "request of {} bytes; pooled={} huge={} arenas={}",
                size,
                self.pooled_bytes,
                self.huge_bytes,
                self.arenas.len()
            );
        }
        None
    }

    #[cfg(feature = "debug")]
    fn record(&mut self, ptr: NonNull<u8>, size: usize) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.record(ptr.as_ptr() as usize, size);
        }
    }

    #[cfg(not(feature = "debug"))]
    #[inline(always)]
    fn record(&mut self, _ptr: NonNull<u8>, _size: usize) {}

    #[cfg(feature = "debug")]
    fn forget(&mut self, ptr: NonNull<u8>, size: usize) {
        let Some(ledger) = self.ledger.as_mut() else {
            return;
        };

        match ledger.release(ptr.as_ptr() as usize, size) {
            Ok(_) => {}
            Err(LedgerMismatch::Unknown) => al_emit!(AL202, "pointer {:p}, size {}", ptr, size),
            Err(LedgerMismatch::Size { recorded }) => al_emit!(
                AL201,
                "pointer {:p} freed with {} bytes, allocated with {}",
                ptr,
                size,
                recorded
            ),
        }
    }

    #[cfg(not(feature = "debug"))]
    #[inline(always)]
    fn forget(&mut self, _ptr: NonNull<u8>, _size: usize) {}
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if !self.torn_down && !std::thread::panicking() {
            self.teardown();
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn align(size: usize) -> usize {
        align_up(size, ALIGNMENT)
    }

    fn tracker() -> Tracker {
        Tracker::with_config(TrackerConfig::default().with_validation(true))
    }

    #[test]
    fn test_exact_fit_reuse() {
        let mut tracker = tracker();

        let a = tracker.allocate(100).unwrap();
        let b = tracker.allocate(200).unwrap();
        unsafe { tracker.free(a, 100) };
        let c = tracker.allocate(100).unwrap();

        assert_eq!(c, a);
        assert_eq!(tracker.stats().pooled_bytes, align(200) + align(100));
        assert_eq!(tracker.stats().live_allocations, 2);

        unsafe {
            tracker.free(b, 200);
            tracker.free(c, 100);
        }
        tracker.destroy();
    }

    #[test]
    fn test_callback_dispatch() {
        let mut tracker = tracker();

        unsafe {
            // free(NULL) is a no-op and does not touch the live count
            assert_eq!(tracker.realloc(None, 0, 0), None);
            assert_eq!(tracker.stats().live_allocations, 0);

            // old_size is ignored for fresh allocations
            let p = tracker.realloc(None, 7, 64).unwrap();
            assert_eq!(tracker.stats().live_allocations, 1);

            let q = tracker.realloc(Some(p), 64, 128).unwrap();
            assert_eq!(tracker.stats().live_allocations, 1);
            assert_eq!(tracker.stats().pooled_bytes, 128);

            assert_eq!(tracker.realloc(Some(q), 128, 0), None);
        }

        let stats = tracker.stats();
        assert!(stats.is_quiescent());
        assert_eq!(stats.total_allocations, 1);
        assert_eq!(stats.total_resizes, 1);
        assert_eq!(stats.total_frees, 1);
        tracker.destroy();
    }

    #[test]
    fn test_whole_arena_request() {
        let mut tracker = tracker();

        let p = tracker.allocate(ARENA_SIZE).unwrap();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.stats.huge_bytes, 0);
        assert_eq!(snapshot.arenas.len(), 1);
        assert!(snapshot.arenas[0].free_blocks.is_empty());
        assert_eq!(snapshot.arenas[0].base, p.as_ptr() as usize);

        unsafe { tracker.free(p, ARENA_SIZE) };
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.arenas[0].free_blocks.len(), 1);
        assert_eq!(snapshot.arenas[0].free_blocks[0].offset, 0);
        assert_eq!(snapshot.arenas[0].free_blocks[0].size, ARENA_SIZE);
        tracker.destroy();
    }

    #[test]
    fn test_one_byte_over_is_huge() {
        let mut tracker = tracker();

        let p = tracker.allocate(ARENA_SIZE + 1).unwrap();
        let stats = tracker.stats();
        assert_eq!(stats.huge_bytes, ARENA_SIZE + 1);
        assert_eq!(stats.pooled_bytes, 0);
        assert_eq!(stats.arenas, 0);
        assert_eq!(stats.huge_allocations, 1);

        unsafe { tracker.free(p, ARENA_SIZE + 1) };
        assert!(tracker.stats().is_quiescent());
        tracker.destroy();
    }

    #[test]
    fn test_adjacent_frees_merge() {
        let mut tracker = tracker();

        let a = tracker.allocate(1000).unwrap();
        let b = tracker.allocate(1000).unwrap();
        unsafe {
            tracker.free(a, 1000);
            tracker.free(b, 1000);
        }

        // B was carved just below A; together they rejoin the head block
        let arena = &tracker.snapshot().arenas[0];
        assert_eq!(arena.free_blocks.len(), 1);
        assert_eq!(arena.free_bytes(), ARENA_SIZE);
        tracker.destroy();
    }

    #[test]
    fn test_adjacent_frees_merge_between_live_blocks() {
        let mut tracker = tracker();

        let guard_high = tracker.allocate(64).unwrap();
        let a = tracker.allocate(1000).unwrap();
        let b = tracker.allocate(1000).unwrap();
        let guard_low = tracker.allocate(64).unwrap();

        unsafe {
            tracker.free(a, 1000);
            tracker.free(b, 1000);
        }

        let arena = &tracker.snapshot().arenas[0];
        let merged: Vec<_> = arena
            .free_blocks
            .iter()
            .filter(|block| block.offset + arena.base == b.as_ptr() as usize)
            .collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].size, 2 * align(1000));

        unsafe {
            tracker.free(guard_high, 64);
            tracker.free(guard_low, 64);
        }
        tracker.destroy();
    }

    #[test]
    fn test_resize_transitions_move_bytes_between_counters() {
        let mut tracker = tracker();

        unsafe {
            let p = tracker.allocate(16).unwrap();
            p.as_ptr().copy_from_nonoverlapping([1u8, 2, 3, 4].as_ptr(), 4);

            // pooled -> huge
            let huge = tracker.resize(p, 16, 2 * ARENA_SIZE).unwrap();
            assert_eq!(tracker.stats().pooled_bytes, 0);
            assert_eq!(tracker.stats().huge_bytes, 2 * ARENA_SIZE);
            assert_eq!(std::slice::from_raw_parts(huge.as_ptr(), 4), &[1, 2, 3, 4]);

            // huge -> huge
            let bigger = tracker.resize(huge, 2 * ARENA_SIZE, 3 * ARENA_SIZE).unwrap();
            assert_eq!(tracker.stats().huge_bytes, 3 * ARENA_SIZE);

            // huge -> pooled copies only the new size
            let back = tracker.resize(bigger, 3 * ARENA_SIZE, 3).unwrap();
            assert_eq!(tracker.stats().huge_bytes, 0);
            assert_eq!(tracker.stats().pooled_bytes, 8);
            assert_eq!(std::slice::from_raw_parts(back.as_ptr(), 3), &[1, 2, 3]);

            assert_eq!(tracker.stats().live_allocations, 1);
            tracker.free(back, 3);
        }

        assert!(tracker.stats().is_quiescent());
        tracker.destroy();
    }

    #[test]
    fn test_peak_tracks_high_water_mark() {
        let mut tracker = tracker();

        let a = tracker.allocate(4096).unwrap();
        let b = tracker.allocate(4096).unwrap();
        unsafe {
            tracker.free(a, 4096);
            tracker.free(b, 4096);
        }
        let c = tracker.allocate(100).unwrap();

        let stats = tracker.stats();
        assert_eq!(stats.peak_pooled_bytes, 8192);
        assert_eq!(stats.pooled_bytes, 104);

        unsafe { tracker.free(c, 100) };
        tracker.destroy();
    }

    #[test]
    fn test_zero_size_allocation() {
        let mut tracker = tracker();
        assert_eq!(tracker.allocate(0), None);
        assert_eq!(tracker.stats().failed_requests, 0);
        tracker.destroy();
    }

    #[test]
    fn test_invariants_hold_after_mixed_work() {
        let mut tracker = tracker();
        let sizes = [24, 1, 4096, 333, 8, 65536, 17, 1000];

        let blocks: Vec<_> = sizes
            .iter()
            .map(|&size| (tracker.allocate(size).unwrap(), size))
            .collect();
        assert_eq!(tracker.check_invariants(), Ok(()));

        for (ptr, size) in blocks.iter().step_by(2) {
            unsafe { tracker.free(*ptr, *size) };
            assert_eq!(tracker.check_invariants(), Ok(()));
        }
        for (ptr, size) in blocks.iter().skip(1).step_by(2) {
            unsafe { tracker.free(*ptr, *size) };
            assert_eq!(tracker.check_invariants(), Ok(()));
        }

        assert_eq!(tracker.snapshot().free_bytes(), ARENA_SIZE);
        tracker.destroy();
    }

    #[test]
    #[should_panic(expected = "AL103")]
    fn test_destroy_with_live_allocation_is_fatal() {
        let mut tracker = tracker();
        let _leaked = tracker.allocate(32).unwrap();
        tracker.destroy();
    }

    #[test]
    #[should_panic(expected = "AL103")]
    fn test_drop_with_live_huge_allocation_is_fatal() {
        let mut tracker = tracker();
        let _leaked = tracker.allocate(ARENA_SIZE + 8).unwrap();
        drop(tracker);
    }

    #[test]
    #[should_panic(expected = "AL101")]
    fn test_free_of_foreign_pointer_is_fatal() {
        let mut tracker = Tracker::with_config(TrackerConfig::minimal());
        let _live = tracker.allocate(64).unwrap();

        let mut outside = [0u64; 4];
        unsafe { tracker.free(NonNull::from(&mut outside).cast(), 32) };
    }

    #[test]
    #[should_panic(expected = "AL102")]
    fn test_double_free_is_fatal() {
        let mut tracker = Tracker::with_config(TrackerConfig::minimal());
        let a = tracker.allocate(64).unwrap();
        let _b = tracker.allocate(64).unwrap();
        let _c = tracker.allocate(4096).unwrap();

        unsafe {
            tracker.free(a, 64);
            tracker.free(a, 64);
        }
    }

    #[cfg(feature = "debug")]
    #[test]
    #[should_panic(expected = "AL201")]
    fn test_ledger_catches_wrong_free_size() {
        use crate::diagnostics::StrictModeGuard;

        let mut tracker = Tracker::with_config(TrackerConfig::paranoid());
        let p = tracker.allocate(100).unwrap();

        // Same aligned size, so only the ledger can tell
        let _strict = StrictModeGuard::panic_on_error();
        unsafe { tracker.free(p, 101) };
    }

    #[cfg(feature = "debug")]
    #[test]
    fn test_ledger_tracks_resized_blocks() {
        let mut tracker = Tracker::with_config(TrackerConfig::paranoid());

        unsafe {
            let p = tracker.allocate(100).unwrap();
            let q = tracker.resize(p, 100, 5000).unwrap();
            assert_eq!(tracker.ledger.as_ref().map(|l| l.len()), Some(1));
            tracker.free(q, 5000);
        }

        assert!(tracker.ledger.as_ref().is_some_and(|l| l.is_empty()));
        tracker.destroy();
    }

    #[test]
    fn test_poisoned_double_free_reports_intact_free_block() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut tracker = Tracker::with_config(TrackerConfig::paranoid().with_debug(false));
        let x = tracker.allocate(64).unwrap();
        let y = tracker.allocate(64).unwrap();
        let _z = tracker.allocate(64).unwrap();

        unsafe { tracker.free(x, 64) };
        let before = tracker.snapshot().arenas[0].free_blocks.clone();

        let panic = catch_unwind(AssertUnwindSafe(|| unsafe { tracker.free(y, 128) }))
            .expect_err("overlapping free must be fatal");
        let message = panic.downcast_ref::<String>().cloned().unwrap_or_default();
        assert!(message.contains("AL102"), "{message}");
        assert!(
            message.contains(&format!("overlaps free block {}+64", ARENA_SIZE - 64)),
            "{message}"
        );

        // The rejected free wrote nothing into the arena
        let arena = &tracker.snapshot().arenas[0];
        assert_eq!(arena.free_blocks, before);

        // Counters were already debited before the fatal check
        std::mem::forget(tracker);
    }

    #[test]
    #[should_panic(expected = "AL105")]
    fn test_free_with_nothing_live_is_fatal() {
        let mut tracker = Tracker::with_config(TrackerConfig::minimal());
        unsafe { tracker.free(NonNull::dangling(), 8) };
    }

    #[test]
    #[should_panic(expected = "AL106")]
    fn test_huge_free_with_impossible_size_is_fatal() {
        let mut tracker = Tracker::with_config(TrackerConfig::minimal());
        let p = tracker.allocate(2 * ARENA_SIZE).unwrap();
        unsafe { tracker.free(p, usize::MAX) };
    }

    #[test]
    fn test_profiler_sees_events() {
        use std::sync::{Arc, Mutex};

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let mut tracker = tracker();
        tracker
            .profiler_hooks_mut()
            .set_callback(move |event| sink.lock().unwrap().push(event.clone()));

        let p = tracker.allocate(40).unwrap();
        unsafe { tracker.free(p, 40) };
        tracker.destroy();

        let events = events.lock().unwrap();
        assert!(matches!(events[0], MemoryEvent::ArenaCreated { index: 0, .. }));
        assert!(matches!(events[1], MemoryEvent::Alloc { size: 40, class: SizeClass::Pooled, .. }));
        assert!(matches!(events[2], MemoryEvent::Free { size: 40, .. }));
    }
}
