//! C ABI for hosts with a `lua_Alloc`-style allocator hook.
//!
//! ```c
//! void *ud = arenalloc_new();
//! lua_State *L = lua_newstate(arenalloc_realloc, ud);
//! /* ... */
//! lua_close(L);
//! arenalloc_delete(ud);
//! ```
//!
//! A panic cannot unwind through these functions; fatal diagnostics abort
//! the process instead.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use crate::api::tracker::Tracker;
use crate::diagnostics::init_from_env;

/// Signature of the host's allocator hook.
pub type ReallocFn = unsafe extern "C" fn(*mut c_void, *mut c_void, usize, usize) -> *mut c_void;

/// Create a tracker with the default configuration.
///
/// Also applies `ARENALLOC_STRICT` from the environment, since C hosts have
/// no other way to set strict mode.
#[no_mangle]
pub extern "C" fn arenalloc_new() -> *mut c_void {
    init_from_env();
    Box::into_raw(Box::new(Tracker::new())).cast()
}

/// Destroy a tracker created by [`arenalloc_new`]. Null is ignored.
///
/// Aborts if allocations are still live.
///
/// # Safety
///
/// `ud` must come from `arenalloc_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn arenalloc_delete(ud: *mut c_void) {
    if ud.is_null() {
        return;
    }
    let tracker = *Box::from_raw(ud.cast::<Tracker>());
    tracker.destroy();
}

/// The four-argument allocator hook. See [`Tracker::realloc`].
///
/// Returns null on free, on out of memory, and when `ud` is null.
///
/// # Safety
///
/// `ud` must come from `arenalloc_new`; `ptr`/`osize` must satisfy the
/// contract of [`Tracker::realloc`].
#[no_mangle]
pub unsafe extern "C" fn arenalloc_realloc(
    ud: *mut c_void,
    ptr: *mut c_void,
    osize: usize,
    nsize: usize,
) -> *mut c_void {
    let Some(tracker) = ud.cast::<Tracker>().as_mut() else {
        return ptr::null_mut();
    };

    tracker
        .realloc(NonNull::new(ptr.cast()), osize, nsize)
        .map_or(ptr::null_mut(), |block| block.as_ptr().cast())
}

const _: ReallocFn = arenalloc_realloc;
