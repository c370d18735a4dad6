use mtbridge_endpoint::{Endpoint, Received, Target};
use tracing::debug;

use crate::error;
use crate::types::{EndpointHandle, MtbEndpointHandle, MtbStatus, MTB_OK};

/// Run `f` on the endpoint behind `handle`; null is `InvalidArgument`.
pub(crate) fn with_endpoint_mut(
    handle: MtbEndpointHandle,
    f: impl FnOnce(&mut Endpoint) -> i32,
) -> i32 {
    if handle.is_null() {
        return error::set_invalid_argument("endpoint handle cannot be null");
    }

    let endpoint_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &mut *(handle as *mut EndpointHandle) }
    };

    f(&mut endpoint_handle.endpoint)
}

/// Bind a reply endpoint on every interface at `port`.
///
/// Returns null on failure; see `mtb_last_error`.
#[no_mangle]
pub extern "C" fn mtb_open_endpoint(port: u16) -> MtbEndpointHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        match Endpoint::open(port) {
            Ok(endpoint) => {
                debug!(local_addr = %endpoint.local_addr(), "endpoint opened");
                let handle = EndpointHandle { endpoint };
                Box::into_raw(Box::new(handle)) as MtbEndpointHandle
            }
            Err(err) => {
                let _ = error::map_endpoint_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Port the endpoint is bound to, or a negative status.
///
/// # Safety
/// `ep` must be a valid endpoint handle.
#[no_mangle]
pub unsafe extern "C" fn mtb_endpoint_port(ep: MtbEndpointHandle) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();
        with_endpoint_mut(ep, |endpoint| i32::from(endpoint.local_addr().port()))
    })
}

/// Close the endpoint and free all its buffers and indicators.
///
/// # Safety
/// `ep` must be null or a handle returned by `mtb_open_endpoint`, not yet closed.
#[no_mangle]
pub unsafe extern "C" fn mtb_close_endpoint(ep: MtbEndpointHandle) {
    crate::ffi_boundary((), || {
        if ep.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by mtb_open_endpoint.
        let handle = unsafe { Box::from_raw(ep as *mut EndpointHandle) };
        handle.endpoint.close();
    });
}

/// Block until the next request and store it.
///
/// Returns `0` (global buffer), `1` (indicator buffer), `-1` (probe, already
/// answered) or a negative error status. When `out_target` is non-null it
/// receives the target to pass to the buffer getters and `mtb_send_reply`.
///
/// A request that fails to decode or route (`-2`, `-3`, `-6`) still owes a
/// reply; `-10` means the connection was dropped and nothing is owed.
/// `mtb_is_pending` answers the question in every case.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `out_target` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn mtb_receive_request(ep: MtbEndpointHandle, out_target: *mut u32) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        with_endpoint_mut(ep, |endpoint| {
            let (status, target) = match endpoint.receive() {
                Ok(Received::NoData) => (MtbStatus::NoData, Target::Global),
                Ok(Received::Global) => (MtbStatus::Global, Target::Global),
                Ok(Received::Indicator(handle)) => {
                    (MtbStatus::Indicator, Target::Indicator(handle))
                }
                Err(err) => return error::map_endpoint_error(&err),
            };

            if !out_target.is_null() {
                // SAFETY: Pointer was checked for null above.
                unsafe {
                    *out_target = target.raw();
                }
            }
            status.code()
        })
    })
}

/// `1` while a received request awaits `mtb_send_reply`, `0` otherwise,
/// or a negative status.
///
/// # Safety
/// `ep` must be a valid endpoint handle.
#[no_mangle]
pub unsafe extern "C" fn mtb_is_pending(ep: MtbEndpointHandle) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();
        with_endpoint_mut(ep, |endpoint| i32::from(endpoint.is_pending()))
    })
}

/// Reply to the pending request with the buffer of `target` (`0` = global).
///
/// # Safety
/// `ep` must be a valid endpoint handle.
#[no_mangle]
pub unsafe extern "C" fn mtb_send_reply(ep: MtbEndpointHandle, target: u32) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        with_endpoint_mut(ep, |endpoint| {
            match endpoint.send_reply(Target::from_raw(target)) {
                Ok(()) => MTB_OK,
                Err(err) => error::map_endpoint_error(&err),
            }
        })
    })
}
