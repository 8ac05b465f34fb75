//! Arena table: stable slots plus an address-sorted lookup index.
//!
//! Arenas are created lazily and live until the table is dropped. They are
//! walked in two orders:
//! - **slot order** (creation order) when looking for space to allocate,
//! - **address order** when mapping a pointer back to its arena.
//!
//! Slots never move once assigned, so an [`ArenaId`] stays valid for the
//! table's lifetime; only the small `by_address` index is reordered.

use std::fmt;
use std::ptr::NonNull;

use super::arena::{Arena, FreeNode, ALIGNMENT, ARENA_SIZE, HEADER_SIZE};
use super::coalesce::CoalesceError;
use crate::util::layout::is_aligned;

/// Maximum number of arenas a table can hold.
pub const MAX_ARENAS: usize = 128;

/// Stable identity of an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaId(u8);

impl ArenaId {
    /// Slot index in creation order.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a pooled allocation landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Arena that satisfied the request.
    pub arena: ArenaId,
    /// Start of the allocation.
    pub ptr: NonNull<u8>,
    /// Whether a new arena had to be created for it.
    pub fresh_arena: bool,
}

/// Why a pooled free was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// No arena contains the pointer.
    NotOwned,
    /// The owning arena rejected the range.
    Corrupt(ArenaId, CoalesceError),
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwned => write!(f, "pointer is not inside any arena"),
            Self::Corrupt(id, err) => write!(f, "arena {id}: {err}"),
        }
    }
}

impl std::error::Error for FreeError {}

/// Fixed-capacity collection of arenas.
#[derive(Debug)]
pub struct ArenaTable {
    /// Arenas in creation order; never longer than `MAX_ARENAS`
    slots: Vec<Arena>,

    /// Slot ids sorted ascending by arena base address
    by_address: Vec<ArenaId>,
}

impl ArenaTable {
    /// Create an empty table. No arena buffer is allocated until needed.
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_ARENAS),
            by_address: Vec::with_capacity(MAX_ARENAS),
        }
    }

    /// Number of arenas created so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether every slot holds an arena.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.slots.len() == MAX_ARENAS
    }

    /// Access an arena by id.
    pub fn get(&self, id: ArenaId) -> Option<&Arena> {
        self.slots.get(id.index())
    }

    /// Arenas with their ids, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaId, &Arena)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, arena)| (ArenaId(i as u8), arena))
    }

    /// Arena ids in ascending base-address order.
    pub fn ids_by_address(&self) -> &[ArenaId] {
        &self.by_address
    }

    /// Find the arena whose buffer contains `ptr`.
    pub fn find_arena_containing(&self, ptr: *const u8) -> Option<ArenaId> {
        let addr = ptr as usize;

        // First arena whose base is above `addr`; the candidate precedes it
        let above = self
            .by_address
            .partition_point(|&id| self.slots[id.index()].base_addr() <= addr);
        let candidate = *self.by_address.get(above.checked_sub(1)?)?;

        self.slots[candidate.index()]
            .contains(ptr)
            .then_some(candidate)
    }

    /// Create a new arena at the first empty slot and take `size` bytes
    /// from it.
    ///
    /// `size` must be rounded to [`ALIGNMENT`] and at most [`ARENA_SIZE`].
    /// A request for the whole arena leaves it with an empty free list;
    /// otherwise the arena keeps one free block `[0, ARENA_SIZE - size)` and
    /// the tail is returned. Returns `None` when the table is full or the
    /// system refuses the buffer.
    pub fn insert_new_arena(&mut self, size: usize) -> Option<(ArenaId, NonNull<u8>)> {
        debug_assert!(size > 0 && size <= ARENA_SIZE && is_aligned(size, ALIGNMENT));

        if self.is_full() {
            return None;
        }

        let mut arena = Arena::allocate_buffer()?;
        let offset = ARENA_SIZE - size;
        if offset > 0 {
            arena.set_node(0, FreeNode { size: offset, next: None });
            arena.set_head(Some(0));
        }
        let ptr = arena.ptr_at(offset);

        let id = ArenaId(self.slots.len() as u8);
        let base = arena.base_addr();
        self.slots.push(arena);

        let position = self
            .by_address
            .partition_point(|&other| self.slots[other.index()].base_addr() < base);
        self.by_address.insert(position, id);

        Some((id, ptr))
    }

    /// Allocate `size` bytes (already aligned) from the first arena, in slot
    /// order, that can hold it, creating a new arena if none can.
    pub fn allocate(&mut self, size: usize) -> Option<Placement> {
        for (i, arena) in self.slots.iter_mut().enumerate() {
            if let Some(offset) = arena.allocate(size) {
                return Some(Placement {
                    arena: ArenaId(i as u8),
                    ptr: arena.ptr_at(offset),
                    fresh_arena: false,
                });
            }
        }

        let (arena, ptr) = self.insert_new_arena(size)?;
        Some(Placement { arena, ptr, fresh_arena: true })
    }

    /// Return a block of `size` bytes (already aligned) to its arena.
    ///
    /// With `poison` set, the bytes past the block's header position are
    /// overwritten with the freed pattern once the arena has accepted the
    /// range. A rejected free leaves the arena untouched.
    pub fn free(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
        poison: bool,
    ) -> Result<ArenaId, FreeError> {
        let id = self
            .find_arena_containing(ptr.as_ptr())
            .ok_or(FreeError::NotOwned)?;
        let arena = &mut self.slots[id.index()];
        let offset = arena.offset_of(ptr.as_ptr()).ok_or(FreeError::NotOwned)?;

        arena
            .free(offset, size)
            .map_err(|err| FreeError::Corrupt(id, err))?;

        // [offset + HEADER_SIZE, offset + size) never holds a header after
        // any merge: absorbed headers sit at or past `offset + size`
        if poison && size > HEADER_SIZE {
            arena.poison(offset + HEADER_SIZE, size - HEADER_SIZE);
        }

        Ok(id)
    }
}

impl Default for ArenaTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::arena::FREED_PATTERN;

    #[test]
    fn test_insert_seeds_head_free_block() {
        let mut table = ArenaTable::new();
        let (id, ptr) = table.insert_new_arena(104).unwrap();

        let arena = table.get(id).unwrap();
        assert_eq!(arena.offset_of(ptr.as_ptr()), Some(ARENA_SIZE - 104));

        let blocks: Vec<_> = arena.free_blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].offset, blocks[0].size), (0, ARENA_SIZE - 104));
    }

    #[test]
    fn test_insert_whole_arena_leaves_empty_list() {
        let mut table = ArenaTable::new();
        let (id, ptr) = table.insert_new_arena(ARENA_SIZE).unwrap();

        let arena = table.get(id).unwrap();
        assert_eq!(arena.head(), None);
        assert_eq!(ptr, arena.ptr_at(0));
    }

    #[test]
    fn test_address_index_stays_sorted() {
        let mut table = ArenaTable::new();
        for _ in 0..8 {
            table.insert_new_arena(ARENA_SIZE).unwrap();
        }

        let bases: Vec<usize> = table
            .ids_by_address()
            .iter()
            .map(|&id| table.get(id).unwrap().base_addr())
            .collect();
        assert!(bases.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bases.len(), 8);
    }

    #[test]
    fn test_find_arena_containing() {
        let mut table = ArenaTable::new();
        let ids: Vec<_> = (0..4)
            .map(|_| table.insert_new_arena(ARENA_SIZE).unwrap().0)
            .collect();

        for &id in &ids {
            let base = table.get(id).unwrap().ptr_at(0).as_ptr();
            assert_eq!(table.find_arena_containing(base), Some(id));
            assert_eq!(table.find_arena_containing(base.wrapping_add(ARENA_SIZE - 1)), Some(id));
        }

        let stack_value = 0u64;
        let outside = &stack_value as *const u64 as *const u8;
        assert_eq!(table.find_arena_containing(outside), None);
        assert_eq!(ArenaTable::new().find_arena_containing(outside), None);
    }

    #[test]
    fn test_allocate_walks_slots_then_creates() {
        let mut table = ArenaTable::new();

        let first = table.allocate(ARENA_SIZE - 64).unwrap();
        assert!(first.fresh_arena);

        // Fits in the 64-byte remainder of arena 0
        let second = table.allocate(64).unwrap();
        assert_eq!(second.arena, first.arena);
        assert!(!second.fresh_arena);

        // Arena 0 is now full
        let third = table.allocate(8).unwrap();
        assert!(third.fresh_arena);
        assert_ne!(third.arena, first.arena);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_table_full() {
        let mut table = ArenaTable::new();
        for _ in 0..MAX_ARENAS {
            assert!(table.allocate(ARENA_SIZE).is_some());
        }
        assert!(table.is_full());
        assert!(table.allocate(8).is_none());
        assert!(table.insert_new_arena(8).is_none());
    }

    #[test]
    fn test_free_foreign_pointer() {
        let mut table = ArenaTable::new();
        table.allocate(64).unwrap();

        let mut outside = 0u64;
        let ptr = NonNull::from(&mut outside).cast::<u8>();
        assert_eq!(table.free(ptr, 8, false), Err(FreeError::NotOwned));
    }

    #[test]
    fn test_rejected_poisoned_free_leaves_arena_intact() {
        let mut table = ArenaTable::new();
        let x = table.allocate(64).unwrap();
        let y = table.allocate(64).unwrap();
        let _z = table.allocate(64).unwrap();
        unsafe { y.ptr.as_ptr().write_bytes(0x22, 64) };

        table.free(x.ptr, 64, true).unwrap();
        let before: Vec<_> = table.get(x.arena).unwrap().free_blocks().collect();

        // y is live, but 128 bytes from y reach into the free block at x
        let err = table.free(y.ptr, 128, true).unwrap_err();
        assert_eq!(
            err,
            FreeError::Corrupt(
                x.arena,
                CoalesceError::Overlap {
                    offset: ARENA_SIZE - 128,
                    size: 128,
                    free_offset: ARENA_SIZE - 64,
                    free_size: 64,
                }
            )
        );

        let arena = table.get(x.arena).unwrap();
        let after: Vec<_> = arena.free_blocks().collect();
        assert_eq!(after, before);
        assert!(arena.check_free_list().is_ok());

        // The rejected range was not poisoned either
        let y_bytes = unsafe { std::slice::from_raw_parts(y.ptr.as_ptr(), 64) };
        assert!(y_bytes.iter().all(|&b| b == 0x22));
    }

    #[test]
    fn test_poison_spares_header() {
        let mut table = ArenaTable::new();
        let top = table.allocate(64).unwrap();
        let guard = table.allocate(64).unwrap();

        unsafe { top.ptr.as_ptr().write_bytes(0x11, 64) };
        table.free(top.ptr, 64, true).unwrap();

        let arena = table.get(top.arena).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(top.ptr.as_ptr(), 64) };
        assert!(bytes[HEADER_SIZE..].iter().all(|&b| b == FREED_PATTERN));
        assert_eq!(arena.check_free_list(), Ok(ARENA_SIZE - 128 + 64));

        table.free(guard.ptr, 64, true).unwrap();
        assert_eq!(table.get(top.arena).unwrap().free_bytes(), ARENA_SIZE);
    }

    #[test]
    fn test_free_returns_owner() {
        let mut table = ArenaTable::new();
        let placement = table.allocate(ARENA_SIZE).unwrap();

        assert_eq!(table.free(placement.ptr, ARENA_SIZE, true), Ok(placement.arena));

        let arena = table.get(placement.arena).unwrap();
        assert_eq!(arena.free_bytes(), ARENA_SIZE);
    }
}
