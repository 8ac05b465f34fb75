//! Allocation backends.
//!
//! This module contains the arena engine and the system-heap fallback.
//! **These are the only modules that should contain `unsafe` code.**

pub(crate) mod arena;
pub(crate) mod coalesce;
pub(crate) mod free_list;
pub(crate) mod heap;
pub(crate) mod table;
