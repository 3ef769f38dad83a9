//! FFI bindings for Hepple Analytics
//!
//! C-compatible entry points through which a page runtime embeds the tracker.
//! Strings are null-terminated; returned strings are allocated here and must
//! be released with `hepple_free_string`. Functions returning `i32` use 0 for
//! success and -1 for failure.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::clock::SystemClock;
use crate::config::TrackerConfig;
use crate::signal::Signal;
use crate::storage::FileStore;
use crate::tracker::Tracker;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Opaque handle to a wall-clock tracker over a directory store
pub struct HeppleTrackerHandle {
    tracker: Tracker<FileStore, SystemClock>,
}

/// Create a tracker persisting under `store_dir`.
///
/// `config_json` may be NULL for the default configuration.
///
/// # Safety
/// - `store_dir` must be a valid null-terminated C string.
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `hepple_tracker_free`.
/// - Returns NULL on error; call `hepple_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_new(
    store_dir: *const c_char,
    config_json: *const c_char,
) -> *mut HeppleTrackerHandle {
    clear_last_error();

    let dir = match cstr_to_string(store_dir) {
        Some(s) => s,
        None => {
            set_last_error("Invalid store directory pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        TrackerConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match TrackerConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let store = match FileStore::open(&dir) {
        Ok(store) => store,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match Tracker::new(config, store, SystemClock) {
        Ok(tracker) => Box::into_raw(Box::new(HeppleTrackerHandle { tracker })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a tracker.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_free(handle: *mut HeppleTrackerHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Start tracking on the initial route.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
/// - `path` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_start(
    handle: *mut HeppleTrackerHandle,
    path: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    let handle = &mut *handle;

    match cstr_to_string(path) {
        Some(path) => {
            handle.tracker.start(&path);
            0
        }
        None => {
            set_last_error("Invalid path string pointer");
            -1
        }
    }
}

/// Forward one host signal encoded as JSON (e.g. `{"signal":"unload"}`).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
/// - `signal_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_handle_signal(
    handle: *mut HeppleTrackerHandle,
    signal_json: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    let handle = &mut *handle;

    let json = match cstr_to_string(signal_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid signal string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<Signal>(&json) {
        Ok(signal) => {
            handle.tracker.handle(&signal);
            0
        }
        Err(e) => {
            set_last_error(&format!("Invalid signal: {}", e));
            -1
        }
    }
}

/// Fire due hover, scroll and heartbeat timers; call periodically.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_poll(handle: *mut HeppleTrackerHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    (*handle).tracker.poll();
    0
}

/// Aggregate statistics as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
/// - Returns a newly allocated string that must be freed with `hepple_free_string`.
/// - Returns NULL on error; call `hepple_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_aggregates(
    handle: *mut HeppleTrackerHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string(&(*handle).tracker.aggregated_data()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Full event log as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
/// - Returns a newly allocated string that must be freed with `hepple_free_string`.
/// - Returns NULL on error; call `hepple_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_raw_data(handle: *mut HeppleTrackerHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string(&(*handle).tracker.raw_data()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Persisted anonymous identity.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `hepple_tracker_new`.
/// - Returns a newly allocated string that must be freed with `hepple_free_string`.
#[no_mangle]
pub unsafe extern "C" fn hepple_tracker_user_id(handle: *mut HeppleTrackerHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    string_to_cstr(&(*handle).tracker.user_id())
}

/// Free a string returned by this library.
///
/// # Safety
/// - `s` must be a pointer returned by a `hepple_*` function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn hepple_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Last error message on this thread, or NULL.
///
/// The returned pointer stays valid until the next `hepple_*` call on this
/// thread and must not be freed.
#[no_mangle]
pub extern "C" fn hepple_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(msg) => msg.as_ptr(),
        None => ptr::null(),
    })
}
