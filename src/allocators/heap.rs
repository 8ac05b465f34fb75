//! System heap wrapper for huge allocations.
//!
//! Requests larger than an arena go straight to the system allocator with
//! the same 8-byte alignment pooled blocks get. The caller supplies the size
//! again on free/realloc, so no per-block header is needed.

use std::alloc::{alloc, dealloc, realloc, Layout, LayoutError};
use std::ptr::NonNull;

use super::arena::ALIGNMENT;

/// Wrapper around the system allocator for huge objects.
#[derive(Debug, Default)]
pub struct SystemHeap {
    /// Number of blocks currently held
    live_blocks: usize,
}

impl SystemHeap {
    /// Create a new system heap wrapper.
    pub fn new() -> Self {
        Self { live_blocks: 0 }
    }

    fn layout(size: usize) -> Result<Layout, LayoutError> {
        Layout::from_size_align(size, ALIGNMENT)
    }

    /// Allocate `size` bytes. Returns `None` if the system is out of memory.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        debug_assert!(size > 0);
        let layout = Self::layout(size).ok()?;

        // SAFETY: layout has non-zero size
        let ptr = NonNull::new(unsafe { alloc(layout) })?;

        self.live_blocks += 1;
        Some(ptr)
    }

    /// Resize a block in place or by moving it.
    ///
    /// On failure the original block is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this heap with exactly `old_size` bytes.
    pub unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let layout = Self::layout(old_size).ok()?;
        Self::layout(new_size).ok()?;

        NonNull::new(realloc(ptr.as_ptr(), layout, new_size))
    }

    /// Release a block.
    ///
    /// A size no allocation could have had is refused and nothing is freed.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this heap with exactly `size` bytes.
    pub unsafe fn dealloc(&mut self, ptr: NonNull<u8>, size: usize) -> Result<(), LayoutError> {
        let layout = Self::layout(size)?;

        dealloc(ptr.as_ptr(), layout);
        self.live_blocks = self.live_blocks.saturating_sub(1);
        Ok(())
    }

    /// Number of blocks currently allocated from the system.
    pub fn live_blocks(&self) -> usize {
        self.live_blocks
    }
}

/// Copy `len` payload bytes between two live allocations.
///
/// # Safety
///
/// Both ranges must be valid for `len` bytes and must not overlap.
#[inline]
pub(crate) unsafe fn copy_payload(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), len);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_alloc_realloc_free() {
        let mut heap = SystemHeap::new();

        let ptr = heap.alloc(2 << 20).unwrap();
        assert_eq!(heap.live_blocks(), 1);
        assert_eq!(ptr.as_ptr() as usize % ALIGNMENT, 0);

        unsafe {
            ptr.as_ptr().write(0xAB);
            let grown = heap.realloc(ptr, 2 << 20, 3 << 20).unwrap();
            assert_eq!(grown.as_ptr().read(), 0xAB);
            heap.dealloc(grown, 3 << 20).unwrap();
        }

        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn test_dealloc_refuses_impossible_size() {
        let mut heap = SystemHeap::new();
        let ptr = heap.alloc(2 << 20).unwrap();

        unsafe {
            assert!(heap.dealloc(ptr, usize::MAX).is_err());
            assert_eq!(heap.live_blocks(), 1);

            heap.dealloc(ptr, 2 << 20).unwrap();
        }
        assert_eq!(heap.live_blocks(), 0);
    }

    #[test]
    fn test_copy_payload() {
        let src = [1u8, 2, 3, 4];
        let mut dst = [0u8; 4];
        unsafe {
            copy_payload(
                NonNull::from(&src).cast(),
                NonNull::from(&mut dst).cast(),
                3,
            );
        }
        assert_eq!(dst, [1, 2, 3, 0]);
    }
}
