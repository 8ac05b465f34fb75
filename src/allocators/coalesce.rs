//! Coalescing deallocator.
//!
//! Freed blocks are reinserted into the address-ordered free list. Whether a
//! freed block touches its neighbours is decided purely by address
//! arithmetic during the walk: there are no boundary tags on live blocks.
//!
//! ```text
//!   prev          freed         next
//! [######]......[xxxxxx][######]          merge before `next`
//! [######][xxxxxx]......[######]          merge after `prev`
//! [######][xxxxxx][######]                triple merge
//! ```

use std::fmt;

use super::arena::{Arena, FreeNode, ALIGNMENT, ARENA_SIZE};
use crate::util::layout::is_aligned;

/// A free request that cannot be applied without corrupting the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceError {
    /// The range is misaligned, empty, or runs past the arena end.
    OutOfBounds { offset: usize, size: usize },
    /// The range overlaps a block that is already free (double free or
    /// wrong size).
    Overlap { offset: usize, size: usize, free_offset: usize, free_size: usize },
}

impl fmt::Display for CoalesceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { offset, size } => {
                write!(f, "freed range {offset}+{size} is not a valid arena range")
            }
            Self::Overlap { offset, size, free_offset, free_size } => write!(
                f,
                "freed range {offset}+{size} overlaps free block {free_offset}+{free_size}"
            ),
        }
    }
}

impl std::error::Error for CoalesceError {}

impl Arena {
    /// Return `[offset, offset + size)` to the free list, merging it with
    /// any free neighbour it touches.
    ///
    /// `size` must be the allocation size rounded to [`ALIGNMENT`].
    pub fn free(&mut self, offset: usize, size: usize) -> Result<(), CoalesceError> {
        if size == 0
            || !is_aligned(offset, ALIGNMENT)
            || !is_aligned(size, ALIGNMENT)
            || offset >= ARENA_SIZE
            || size > ARENA_SIZE - offset
        {
            return Err(CoalesceError::OutOfBounds { offset, size });
        }
        let end = offset + size;

        let Some(head) = self.head() else {
            self.set_node(offset, FreeNode { size, next: None });
            self.set_head(Some(offset));
            return Ok(());
        };

        let overlap = |free_offset: usize, free_size: usize| CoalesceError::Overlap {
            offset,
            size,
            free_offset,
            free_size,
        };

        let mut prev: Option<usize> = None;
        let mut current = head;
        loop {
            let node = self.node(current);

            if offset < current {
                if end > current {
                    return Err(overlap(current, node.size));
                }

                let freed = if end == current {
                    // Absorb `current`
                    FreeNode { size: size + node.size, next: node.next }
                } else {
                    FreeNode { size, next: Some(current) }
                };
                self.set_node(offset, freed);

                match prev {
                    Some(prev) => self.set_next(prev, Some(offset)),
                    None => self.set_head(Some(offset)),
                }
                return Ok(());
            }

            let current_end = current + node.size;
            if offset < current_end {
                return Err(overlap(current, node.size));
            }

            if offset == current_end {
                let mut grown = FreeNode { size: node.size + size, next: node.next };

                if let Some(next) = node.next {
                    if end > next {
                        return Err(overlap(next, self.node(next).size));
                    }
                    if end == next {
                        let after = self.node(next);
                        grown.size += after.size;
                        grown.next = after.next;
                    }
                }

                self.set_node(current, grown);
                return Ok(());
            }

            match node.next {
                Some(next) => {
                    prev = Some(current);
                    current = next;
                }
                None => {
                    self.set_node(offset, FreeNode { size, next: None });
                    self.set_next(current, Some(offset));
                    return Ok(());
                }
            }
        }
    }
}
