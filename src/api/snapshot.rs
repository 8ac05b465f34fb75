//! Point-in-time view of every arena's free list.
//!
//! Useful for fragmentation analysis and for tests that need to look at the
//! exact block layout without touching raw memory.

use std::fmt;

use crate::allocators::arena::ARENA_SIZE;
use crate::allocators::free_list::FreeBlock;
use crate::allocators::table::{ArenaId, ArenaTable};
use crate::api::stats::TrackerStats;
use crate::util::size::format_bytes;

/// Free-list layout of one arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaSnapshot {
    /// Slot of the arena.
    pub id: ArenaId,
    /// Base address of the buffer.
    pub base: usize,
    /// Free blocks in address order.
    pub free_blocks: Vec<FreeBlock>,
}

impl ArenaSnapshot {
    pub(crate) fn capture(table: &ArenaTable) -> Vec<Self> {
        table
            .iter()
            .map(|(id, arena)| Self {
                id,
                base: arena.base_addr(),
                free_blocks: arena.free_blocks().collect(),
            })
            .collect()
    }

    /// Bytes in free blocks.
    pub fn free_bytes(&self) -> usize {
        self.free_blocks.iter().map(|b| b.size).sum()
    }

    /// Bytes handed out.
    pub fn used_bytes(&self) -> usize {
        ARENA_SIZE - self.free_bytes()
    }

    /// Size of the largest free block (0 when full).
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks.iter().map(|b| b.size).max().unwrap_or(0)
    }

    /// `1 - largest / total free`: 0 when all free space is one block.
    pub fn fragmentation(&self) -> f64 {
        let free = self.free_bytes();
        if free == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_block() as f64 / free as f64
    }

    /// Whether `addr` lies inside this arena.
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr - self.base < ARENA_SIZE
    }
}

impl fmt::Display for ArenaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arena {} @ 0x{:x}: used {}, free {} in {} blocks:",
            self.id,
            self.base,
            format_bytes(self.used_bytes()),
            format_bytes(self.free_bytes()),
            self.free_blocks.len()
        )?;

        // size[gap to next block] ...
        let mut blocks = self.free_blocks.iter().peekable();
        while let Some(block) = blocks.next() {
            write!(f, " {}", block.size)?;
            if let Some(next) = blocks.peek() {
                write!(f, "[{}]", next.offset - block.offset)?;
            }
        }
        Ok(())
    }
}

/// Stats plus the layout of every arena, in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub stats: TrackerStats,
    pub arenas: Vec<ArenaSnapshot>,
}

impl TrackerSnapshot {
    /// Snapshot of the arena containing `addr`.
    pub fn arena_of(&self, addr: usize) -> Option<&ArenaSnapshot> {
        self.arenas.iter().find(|arena| arena.contains(addr))
    }

    /// Free bytes across all arenas.
    pub fn free_bytes(&self) -> usize {
        self.arenas.iter().map(ArenaSnapshot::free_bytes).sum()
    }
}

impl fmt::Display for TrackerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        for arena in &self.arenas {
            writeln!(f, "{}", arena)?;
        }
        Ok(())
    }
}
