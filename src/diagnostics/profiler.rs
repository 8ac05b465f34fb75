//! Profiler integration.
//!
//! [`ProfilerHooks`] forwards every allocation event to a user callback so
//! a host can build its own timeline. With the `tracy` feature the pooled
//! and huge byte gauges are also plotted in Tracy.

/// Which path served an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    /// Served from an arena free list.
    Pooled,
    /// Larger than an arena; served by the system allocator.
    Huge,
}

/// Memory event for external profilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    /// Memory was allocated
    Alloc { ptr: usize, size: usize, class: SizeClass },
    /// Memory was freed
    Free { ptr: usize, size: usize, class: SizeClass },
    /// A block moved to a new address with a new size
    Resize {
        old_ptr: usize,
        old_size: usize,
        new_ptr: usize,
        new_size: usize,
    },
    /// A new arena buffer was created
    ArenaCreated { index: usize, base: usize },
}

/// Callback type for external profiler integration.
pub type ProfilerCallback = Box<dyn Fn(&MemoryEvent) + Send + Sync>;

/// Profiler hooks for external tools.
#[derive(Default)]
pub struct ProfilerHooks {
    callback: Option<ProfilerCallback>,
    enabled: bool,
}

impl ProfilerHooks {
    /// Create new, disabled profiler hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the profiler callback and enable the hooks.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn(&MemoryEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(callback));
        self.enabled = true;
    }

    /// Remove the callback.
    pub fn clear_callback(&mut self) {
        self.callback = None;
        self.enabled = false;
    }

    /// Enable or disable profiling.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if profiling is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.callback.is_some()
    }

    /// Deliver an event. The event is only built when someone listens.
    #[inline]
    pub fn emit(&self, event: impl FnOnce() -> MemoryEvent) {
        if !self.enabled {
            return;
        }
        if let Some(ref callback) = self.callback {
            callback(&event());
        }
    }
}

impl std::fmt::Debug for ProfilerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilerHooks")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Plot the current byte gauges in Tracy.
#[cfg(feature = "tracy")]
pub fn plot_usage(pooled_bytes: usize, huge_bytes: usize) {
    if let Some(client) = tracy_client::Client::running() {
        client.plot(tracy_client::plot_name!("arenalloc pooled bytes"), pooled_bytes as f64);
        client.plot(tracy_client::plot_name!("arenalloc huge bytes"), huge_bytes as f64);
    }
}

/// Plot the current byte gauges in Tracy (no-op without the `tracy` feature).
#[cfg(not(feature = "tracy"))]
#[inline(always)]
pub fn plot_usage(_pooled_bytes: usize, _huge_bytes: usize) {}
