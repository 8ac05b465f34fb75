//! Free-list engine: best-fit allocation with tail splitting.
//!
//! Each arena keeps a singly linked list of free blocks in ascending address
//! order. Allocation prefers an exact-size block (head first, then the first
//! exact match during the scan) and otherwise carves the requested size off
//! the *tail* of the smallest block that is large enough, so the header of
//! the remaining block stays where it is.

use std::fmt;

use super::arena::{Arena, FreeNode, ALIGNMENT, ARENA_SIZE, HEADER_SIZE};
use crate::util::layout::is_aligned;

/// Upper bound on the number of free blocks an arena can hold.
const MAX_BLOCKS: usize = ARENA_SIZE / HEADER_SIZE;

/// A free region of an arena, as seen from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Offset from the arena base.
    pub offset: usize,
    /// Size in bytes.
    pub size: usize,
}

impl FreeBlock {
    /// One past the last byte of the block.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Ways a free list can be found broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeListError {
    /// A block header sits at a misaligned offset or has a misaligned size.
    Misaligned { offset: usize, size: usize },
    /// A block is empty or reaches past the end of the arena.
    OutOfBounds { offset: usize, size: usize },
    /// A link points backwards or into the preceding block.
    Unordered { offset: usize, next: usize },
    /// Two consecutive blocks touch and should have been merged.
    Adjacent { offset: usize, next: usize },
    /// More links than the arena could possibly hold (a cycle).
    Cycle,
}

impl fmt::Display for FreeListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned { offset, size } => {
                write!(f, "misaligned free block at offset {offset} (size {size})")
            }
            Self::OutOfBounds { offset, size } => {
                write!(f, "free block at offset {offset} with size {size} leaves the arena")
            }
            Self::Unordered { offset, next } => {
                write!(f, "free block at offset {offset} links back to offset {next}")
            }
            Self::Adjacent { offset, next } => {
                write!(f, "free blocks at offsets {offset} and {next} are adjacent but unmerged")
            }
            Self::Cycle => write!(f, "free list does not terminate"),
        }
    }
}

impl std::error::Error for FreeListError {}

/// Iterator over an arena's free blocks in address order.
pub struct FreeBlocks<'a> {
    arena: &'a Arena,
    cursor: Option<usize>,
    remaining: usize,
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        let offset = self.cursor?;
        if self.remaining == 0 {
            // Corrupted list; `check_free_list` reports it
            self.cursor = None;
            return None;
        }
        self.remaining -= 1;

        let node = self.arena.node(offset);
        self.cursor = node.next;
        Some(FreeBlock { offset, size: node.size })
    }
}

impl Arena {
    /// Allocate `size` bytes from this arena's free list.
    ///
    /// `size` must already be rounded to [`ALIGNMENT`]. Returns the offset of
    /// the allocation, or `None` if no free block is large enough.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        debug_assert!(size > 0 && is_aligned(size, ALIGNMENT));

        let head = self.head()?;
        let first = self.node(head);

        // Fast path: the head is an exact fit
        if first.size == size {
            self.set_head(first.next);
            return Some(head);
        }

        // (offset, size) of the smallest block strictly larger than `size`
        let mut best = (first.size > size).then_some((head, first.size));

        let mut prev = head;
        let mut cursor = first.next;
        while let Some(offset) = cursor {
            let node = self.node(offset);

            if node.size == size {
                self.set_next(prev, node.next);
                return Some(offset);
            }

            if node.size > size && best.map_or(true, |(_, fit)| node.size < fit) {
                best = Some((offset, node.size));
            }

            prev = offset;
            cursor = node.next;
        }

        // Carve the tail of the best fit; its header stays at the low end
        let (offset, fit) = best?;
        let remaining = fit - size;
        let node = self.node(offset);
        self.set_node(offset, FreeNode { size: remaining, next: node.next });

        Some(offset + remaining)
    }

    /// Iterate over the free blocks in address order.
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            arena: self,
            cursor: self.head(),
            remaining: MAX_BLOCKS,
        }
    }

    /// Total bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.free_blocks().map(|block| block.size).sum()
    }

    /// Bytes currently handed out from this arena.
    pub fn used_bytes(&self) -> usize {
        ARENA_SIZE - self.free_bytes()
    }

    /// Walk the whole list and verify ordering, bounds, and that no two
    /// consecutive blocks touch. Returns the free byte total on success.
    pub fn check_free_list(&self) -> Result<usize, FreeListError> {
        let mut free = 0;
        let mut previous: Option<FreeBlock> = None;
        let mut cursor = self.head();
        let mut visited = 0;

        while let Some(offset) = cursor {
            visited += 1;
            if visited > MAX_BLOCKS {
                return Err(FreeListError::Cycle);
            }

            if let Some(prev) = previous {
                if offset < prev.end() {
                    return Err(FreeListError::Unordered { offset: prev.offset, next: offset });
                }
                if offset == prev.end() {
                    return Err(FreeListError::Adjacent { offset: prev.offset, next: offset });
                }
            }

            if !is_aligned(offset, ALIGNMENT) || offset > ARENA_SIZE - HEADER_SIZE {
                return Err(FreeListError::Misaligned { offset, size: 0 });
            }

            let node = self.node(offset);
            if !is_aligned(node.size, ALIGNMENT) {
                return Err(FreeListError::Misaligned { offset, size: node.size });
            }
            if node.size == 0 || node.size > ARENA_SIZE - offset {
                return Err(FreeListError::OutOfBounds { offset, size: node.size });
            }

            free += node.size;
            previous = Some(FreeBlock { offset, size: node.size });
            cursor = node.next;
        }

        Ok(free)
    }
}
