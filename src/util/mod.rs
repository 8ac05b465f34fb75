//! Small helpers shared by the allocator and its reporting.

pub(crate) mod layout;
pub(crate) mod size;
