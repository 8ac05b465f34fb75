//! Arena buffers and in-place free-block headers.
//!
//! An arena is one fixed 1 MiB buffer obtained from the system allocator.
//! Its free regions carry their own bookkeeping: the first eight bytes of
//! every free block hold a [`FreeNode`] header (block size plus the offset
//! of the next free block). Once a block is handed out those same bytes
//! belong to the caller.
//!
//! **This is the only module that reads or writes those headers through raw
//! pointers.** The free-list engine and the coalescing deallocator work on
//! offsets and go through [`Arena::node`] / [`Arena::set_node`].

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::util::layout::is_aligned;
use crate::util::size::mb;

/// Size of every arena buffer in bytes.
pub const ARENA_SIZE: usize = mb(1);

/// Allocation granularity inside an arena.
pub const ALIGNMENT: usize = 8;

/// Bytes occupied by a free-block header.
pub const HEADER_SIZE: usize = std::mem::size_of::<RawHeader>();

/// Byte written over freed pooled memory when poisoning is enabled.
pub const FREED_PATTERN: u8 = 0xCD;

/// Alignment of the buffer itself; at least [`ALIGNMENT`].
const BUFFER_ALIGN: usize = 16;

/// Sentinel for "no next block" in the raw header.
const NIL: u32 = u32::MAX;

/// On-buffer representation of a free-block header.
#[repr(C)]
#[derive(Clone, Copy)]
struct RawHeader {
    size: u32,
    next: u32,
}

/// Decoded free-block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeNode {
    /// Size of the free block in bytes (a multiple of [`ALIGNMENT`]).
    pub size: usize,
    /// Offset of the next free block, `None` at the tail.
    pub next: Option<usize>,
}

/// One arena: an owned buffer plus the head of its free list.
pub struct Arena {
    /// Base of the `ARENA_SIZE` buffer
    base: NonNull<u8>,

    /// Offset of the first free block; `None` when fully allocated
    head: Option<usize>,
}

impl Arena {
    /// Obtain a fresh buffer from the system allocator.
    ///
    /// The arena starts with an empty free list: every byte counts as
    /// allocated until the caller seeds a free block.
    pub fn allocate_buffer() -> Option<Self> {
        let layout = Self::layout();

        // SAFETY: the layout has non-zero size
        let ptr = unsafe { alloc(layout) };

        NonNull::new(ptr).map(|base| Self { base, head: None })
    }

    fn layout() -> Layout {
        // ARENA_SIZE and BUFFER_ALIGN are valid constants
        match Layout::from_size_align(ARENA_SIZE, BUFFER_ALIGN) {
            Ok(layout) => layout,
            Err(_) => unreachable!("arena layout constants are valid"),
        }
    }

    /// Base address as an integer, for ordering and range checks.
    #[inline]
    pub fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Whether `ptr` falls inside `[base, base + ARENA_SIZE)`.
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        addr >= self.base_addr() && addr - self.base_addr() < ARENA_SIZE
    }

    /// Offset of `ptr` from the base, if it lies inside this arena.
    #[inline]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        if self.contains(ptr) {
            Some(ptr as usize - self.base_addr())
        } else {
            None
        }
    }

    /// Pointer to the byte at `offset`.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset < ARENA_SIZE, "offset {offset} outside arena");

        // SAFETY: offset is within the buffer, so the result is in bounds
        // and non-null
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Offset of the first free block.
    #[inline]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub(crate) fn set_head(&mut self, head: Option<usize>) {
        self.head = head;
    }

    /// Read the header of the free block at `offset`.
    pub(crate) fn node(&self, offset: usize) -> FreeNode {
        Self::check_header_offset(offset);

        // SAFETY: the header lies inside the buffer and is 8-aligned
        // (buffer is 16-aligned, offset is a multiple of 8)
        let raw = unsafe { (self.base.as_ptr().add(offset) as *const RawHeader).read() };

        FreeNode {
            size: raw.size as usize,
            next: if raw.next == NIL { None } else { Some(raw.next as usize) },
        }
    }

    /// Write the header of the free block at `offset`.
    pub(crate) fn set_node(&mut self, offset: usize, node: FreeNode) {
        Self::check_header_offset(offset);
        debug_assert!(node.size <= ARENA_SIZE);

        let raw = RawHeader {
            size: node.size as u32,
            next: node.next.map_or(NIL, |next| next as u32),
        };

        // SAFETY: same bounds and alignment argument as `node`; we own the
        // buffer exclusively through `&mut self`
        unsafe { (self.base.as_ptr().add(offset) as *mut RawHeader).write(raw) };
    }

    /// Rewrite only the `next` link of the block at `offset`.
    pub(crate) fn set_next(&mut self, offset: usize, next: Option<usize>) {
        let mut node = self.node(offset);
        node.next = next;
        self.set_node(offset, node);
    }

    /// Overwrite `[offset, offset + len)` with [`FREED_PATTERN`].
    pub(crate) fn poison(&mut self, offset: usize, len: usize) {
        assert!(
            offset <= ARENA_SIZE && len <= ARENA_SIZE - offset,
            "poison range {offset}+{len} outside arena"
        );

        // SAFETY: range checked against the buffer above
        unsafe { std::ptr::write_bytes(self.base.as_ptr().add(offset), FREED_PATTERN, len) };
    }

    #[inline]
    fn check_header_offset(offset: usize) {
        assert!(
            offset <= ARENA_SIZE - HEADER_SIZE && is_aligned(offset, ALIGNMENT),
            "free-block header at invalid offset {offset}"
        );
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: base was allocated in `allocate_buffer` with this layout
        unsafe { dealloc(self.base.as_ptr(), Self::layout()) };
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("head", &self.head)
            .finish()
    }
}

// SAFETY: an Arena exclusively owns its buffer; moving it to another thread
// moves that ownership. Shared access is not provided (no Sync).
unsafe impl Send for Arena {}
