//! mtbridge-ffi: C-ABI exports for the mtbridge endpoint.
//!
//! A host opens an endpoint, then loops on `mtb_receive_request`, reads the
//! buffer it was routed to, fills in the reply and calls `mtb_send_reply`.
//! Targets are `u32`: `0` is the global buffer, anything else an indicator
//! handle from `mtb_create_indicator`.

mod args;
mod buffer;
mod endpoint;
mod error;
mod indicator;
mod types;

use std::panic::AssertUnwindSafe;

pub use buffer::{
    mtb_buffer_sizes, mtb_get_int_array, mtb_get_real_array, mtb_get_text_array,
    mtb_set_int_array, mtb_set_real_array, mtb_set_text_array,
};
pub use endpoint::{
    mtb_close_endpoint, mtb_endpoint_port, mtb_is_pending, mtb_open_endpoint, mtb_receive_request,
    mtb_send_reply,
};
pub use indicator::{
    mtb_create_indicator, mtb_destroy_indicator, mtb_find_indicator, mtb_list_indicator_names,
};
pub use types::{
    MtbEndpointHandle, MtbIndicatorInfo, MtbStatus, MtbString, MTB_OK, MTB_TARGET_GLOBAL,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

fn verbosity_level(verbosity: i32) -> Option<tracing::Level> {
    match verbosity {
        i32::MIN..=0 => None,
        1 => Some(tracing::Level::INFO),
        2 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Reset the calling thread's error state and, when `verbosity > 0`, log to
/// stderr (`1` info, `2` debug, `3+` trace).
///
/// Only the first subscriber installed in the process takes effect.
#[no_mangle]
pub extern "C" fn mtb_init(verbosity: i32) -> i32 {
    ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        if let Some(level) = verbosity_level(verbosity) {
            let _ = tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_max_level(level)
                .try_init();
        }
        MTB_OK
    })
}

#[no_mangle]
pub extern "C" fn mtb_cleanup() {
    ffi_boundary((), || {
        error::clear_error_state();
    });
}

/// Message of the last failure on the calling thread; empty after success.
///
/// The pointer stays valid until the next `mtb_*` call on the same thread.
#[no_mangle]
pub extern "C" fn mtb_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
