use std::os::raw::c_char;

use mtbridge_exchange::{ExchangeError, IndicatorHandle};
use tracing::debug;

use crate::args;
use crate::buffer::write_strings;
use crate::endpoint::with_endpoint_mut;
use crate::error;
use crate::types::{MtbEndpointHandle, MtbIndicatorInfo, MtbStatus, MtbString, MTB_OK};

/// Create an indicator with an empty buffer.
///
/// Returns its handle (always `> 0`) or a negative status.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `name` and `symbol` must be
/// NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn mtb_create_indicator(
    ep: MtbEndpointHandle,
    name: *const c_char,
    symbol: *const c_char,
    period: i32,
) -> i64 {
    crate::ffi_boundary(i64::from(MtbStatus::Internal.code()), || {
        error::clear_error_state();

        // SAFETY: We validate null in helper.
        let Some(name) = (unsafe { args::required_str_arg(name, "name") }) else {
            return i64::from(MtbStatus::InvalidArgument.code());
        };
        // SAFETY: We validate null in helper.
        let Some(symbol) = (unsafe { args::required_str_arg(symbol, "symbol") }) else {
            return i64::from(MtbStatus::InvalidArgument.code());
        };

        let mut created = None;
        let status = with_endpoint_mut(ep, |endpoint| {
            match endpoint.state_mut().registry_mut().create(name, symbol, period) {
                Ok(handle) => {
                    created = Some(handle);
                    MTB_OK
                }
                Err(err) => error::map_exchange_error(&err),
            }
        });

        match created {
            Some(handle) => i64::from(handle.raw()),
            None => i64::from(status),
        }
    })
}

/// Copy the names of all live indicators, in creation order, into `dest`.
///
/// Returns the count copied. String buffers follow the `mtb_get_text_array`
/// contract.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `dest` must be writable for `capacity`
/// entries, each with a non-overlapping writable `data` of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mtb_list_indicator_names(
    ep: MtbEndpointHandle,
    dest: *mut MtbString,
    capacity: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and capacity are validated in helper.
        let Some(dest) = (unsafe { args::slice_out_arg(dest, capacity, "dest") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_endpoint_mut(ep, |endpoint| {
            let names = endpoint.state().registry().list_names();
            // SAFETY: Forwarded caller guarantee on the string buffers.
            unsafe { write_strings(&names, dest) }
        })
    })
}

/// Report every live indicator named exactly `name`, in creation order.
///
/// Each `dest[i].symbol` is an output string. Returns the count reported;
/// nothing is written when `dest` cannot hold every match.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `name` must be a NUL-terminated C
/// string; `dest` must be writable for `capacity` entries.
#[no_mangle]
pub unsafe extern "C" fn mtb_find_indicator(
    ep: MtbEndpointHandle,
    name: *const c_char,
    dest: *mut MtbIndicatorInfo,
    capacity: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: We validate null in helper.
        let Some(name) = (unsafe { args::required_str_arg(name, "name") }) else {
            return MtbStatus::InvalidArgument.code();
        };
        // SAFETY: Pointer and capacity are validated in helper.
        let Some(dest) = (unsafe { args::slice_out_arg(dest, capacity, "dest") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_endpoint_mut(ep, |endpoint| {
            let found = endpoint.state().registry().find(&name);
            debug!(name = %name, matches = found.len(), "indicator lookup");
            if found.len() > dest.len() {
                return error::map_exchange_error(&ExchangeError::BufferTooSmall {
                    needed: found.len(),
                    capacity: dest.len(),
                });
            }

            let dest = &mut dest[..found.len()];
            let symbols: Vec<&str> = found.iter().map(|info| info.symbol.as_str()).collect();
            let mut symbol_out: Vec<MtbString> = dest
                .iter()
                .map(|info| MtbString {
                    len: info.symbol.len,
                    data: info.symbol.data,
                })
                .collect();

            // SAFETY: Forwarded caller guarantee on the symbol buffers.
            let status = unsafe { write_strings(&symbols, &mut symbol_out) };
            if status < 0 {
                return status;
            }

            for ((out, info), symbol) in dest.iter_mut().zip(&found).zip(symbol_out) {
                out.handle = info.handle.raw();
                out.period = info.period;
                out.symbol.len = symbol.len;
            }
            args::count_ret(found.len())
        })
    })
}

/// Destroy the indicator designated by `handle`.
///
/// # Safety
/// `ep` must be a valid endpoint handle.
#[no_mangle]
pub unsafe extern "C" fn mtb_destroy_indicator(ep: MtbEndpointHandle, handle: u32) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        let Some(handle) = IndicatorHandle::from_raw(handle) else {
            return error::map_exchange_error(&ExchangeError::InvalidHandle(0));
        };

        with_endpoint_mut(ep, |endpoint| {
            match endpoint.state_mut().registry_mut().destroy(handle) {
                Ok(()) => MTB_OK,
                Err(err) => error::map_exchange_error(&err),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;
    use crate::endpoint::{mtb_close_endpoint, mtb_open_endpoint};

    fn out_string(storage: &mut [u8]) -> MtbString {
        MtbString {
            len: storage.len(),
            data: storage.as_mut_ptr().cast(),
        }
    }

    #[test]
    fn list_names_follows_creation_and_destruction() {
        let ep = mtb_open_endpoint(0);

        // SAFETY: every pointer below refers to a live local of the stated length.
        unsafe {
            let a = mtb_create_indicator(ep, c"A".as_ptr(), c"EURUSD".as_ptr(), 1);
            let b = mtb_create_indicator(ep, c"B".as_ptr(), c"EURUSD".as_ptr(), 5);
            let c = mtb_create_indicator(ep, c"C".as_ptr(), c"GBPUSD".as_ptr(), 15);
            assert!(a > 0 && b > 0 && c > 0);

            assert_eq!(mtb_destroy_indicator(ep, b as u32), MTB_OK);
            assert_eq!(
                mtb_destroy_indicator(ep, b as u32),
                MtbStatus::InvalidHandle.code()
            );

            let mut first = [0u8; 8];
            let mut second = [0u8; 8];
            let mut dest = [out_string(&mut first), out_string(&mut second)];
            assert_eq!(mtb_list_indicator_names(ep, dest.as_mut_ptr(), 2), 2);
            assert_eq!(dest[0].len, 2);
            assert_eq!(CStr::from_bytes_until_nul(&first).unwrap(), c"A");
            assert_eq!(CStr::from_bytes_until_nul(&second).unwrap(), c"C");

            let mut only = [0u8; 8];
            let mut short = [out_string(&mut only)];
            assert_eq!(
                mtb_list_indicator_names(ep, short.as_mut_ptr(), 1),
                MtbStatus::BufferTooSmall.code()
            );

            mtb_close_endpoint(ep);
        }
    }

    #[test]
    fn find_reports_handle_symbol_and_period() {
        let ep = mtb_open_endpoint(0);

        // SAFETY: every pointer below refers to a live local of the stated length.
        unsafe {
            let handle = mtb_create_indicator(ep, c"X".as_ptr(), c"EURUSD".as_ptr(), 60);
            assert_eq!(handle, 1);

            let mut symbol = [0u8; 16];
            let mut dest = [MtbIndicatorInfo {
                handle: 0,
                period: 0,
                symbol: out_string(&mut symbol),
            }];
            assert_eq!(mtb_find_indicator(ep, c"X".as_ptr(), dest.as_mut_ptr(), 1), 1);
            assert_eq!(dest[0].handle, 1);
            assert_eq!(dest[0].period, 60);
            assert_eq!(dest[0].symbol.len, 7);
            assert_eq!(&symbol[..7], b"EURUSD\0");

            assert_eq!(mtb_find_indicator(ep, c"Y".as_ptr(), dest.as_mut_ptr(), 1), 0);

            assert_eq!(mtb_destroy_indicator(ep, 1), MTB_OK);
            assert_eq!(mtb_find_indicator(ep, c"X".as_ptr(), std::ptr::null_mut(), 0), 0);
            assert_eq!(
                mtb_destroy_indicator(ep, 0),
                MtbStatus::InvalidHandle.code()
            );

            mtb_close_endpoint(ep);
        }
    }
}
