use mtbridge_endpoint::{Endpoint, ExchangeBuffer, Target};
use mtbridge_exchange::{copy_texts_into, ExchangeError, TextSlot};

use crate::args;
use crate::endpoint::with_endpoint_mut;
use crate::error;
use crate::types::{MtbEndpointHandle, MtbStatus, MtbString, MTB_OK};

fn with_buffer_mut(
    ep: MtbEndpointHandle,
    target: u32,
    f: impl FnOnce(&mut ExchangeBuffer) -> i32,
) -> i32 {
    with_endpoint_mut(ep, |endpoint: &mut Endpoint| {
        match endpoint.state_mut().buffer_mut(Target::from_raw(target)) {
            Ok(buffer) => f(buffer),
            Err(err) => error::map_exchange_error(&err),
        }
    })
}

/// Copy strings into caller `MtbString`s and report each written length.
///
/// # Safety
/// Every `dest[i].data` must be writable for `dest[i].len` bytes, with no overlap.
pub(crate) unsafe fn write_strings<S: AsRef<str>>(src: &[S], dest: &mut [MtbString]) -> i32 {
    if src.is_empty() {
        return MTB_OK;
    }
    if dest.len() < src.len() {
        return error::map_exchange_error(&ExchangeError::BufferTooSmall {
            needed: src.len(),
            capacity: dest.len(),
        });
    }

    let dest = &mut dest[..src.len()];
    let mut slots = Vec::with_capacity(dest.len());
    for value in dest.iter() {
        // SAFETY: Forwarded caller guarantee on each string buffer.
        match unsafe { args::string_out(value, "dest[].data") } {
            Some(buf) => slots.push(TextSlot::new(buf)),
            None => return MtbStatus::InvalidArgument.code(),
        }
    }

    match copy_texts_into(src, &mut slots) {
        Ok(count) => {
            let written: Vec<usize> = slots.iter().map(TextSlot::written_len).collect();
            drop(slots);
            for (value, len) in dest.iter_mut().zip(written) {
                value.len = len;
            }
            args::count_ret(count)
        }
        Err(err) => error::map_exchange_error(&err),
    }
}

/// Current sizes of the buffer of `target`, written as `[ints, reals, texts]`.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `out3` must be writable for 3 values.
#[no_mangle]
pub unsafe extern "C" fn mtb_buffer_sizes(ep: MtbEndpointHandle, target: u32, out3: *mut usize) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and length are validated in helper.
        let Some(out) = (unsafe { args::slice_out_arg(out3, 3, "out3") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_buffer_mut(ep, target, |buffer| {
            let sizes = buffer.sizes();
            out.copy_from_slice(&[sizes.ints, sizes.reals, sizes.texts]);
            MTB_OK
        })
    })
}

/// Copy the integers of `target` into `dest`. Returns the count copied.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `dest` must be writable for `capacity` values.
#[no_mangle]
pub unsafe extern "C" fn mtb_get_int_array(
    ep: MtbEndpointHandle,
    target: u32,
    dest: *mut i64,
    capacity: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and capacity are validated in helper.
        let Some(dest) = (unsafe { args::slice_out_arg(dest, capacity, "dest") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_buffer_mut(ep, target, |buffer| match buffer.copy_ints(dest) {
            Ok(count) => args::count_ret(count),
            Err(err) => error::map_exchange_error(&err),
        })
    })
}

/// Copy the reals of `target` into `dest`. Returns the count copied.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `dest` must be writable for `capacity` values.
#[no_mangle]
pub unsafe extern "C" fn mtb_get_real_array(
    ep: MtbEndpointHandle,
    target: u32,
    dest: *mut f64,
    capacity: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and capacity are validated in helper.
        let Some(dest) = (unsafe { args::slice_out_arg(dest, capacity, "dest") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_buffer_mut(ep, target, |buffer| match buffer.copy_reals(dest) {
            Ok(count) => args::count_ret(count),
            Err(err) => error::map_exchange_error(&err),
        })
    })
}

/// Copy the texts of `target` into caller strings. Returns the count copied.
///
/// On entry each `dest[i].len` is the capacity of `dest[i].data`; on success
/// it holds the written length, NUL included.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `dest` must be writable for `capacity`
/// entries, each with a non-overlapping writable `data` of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mtb_get_text_array(
    ep: MtbEndpointHandle,
    target: u32,
    dest: *mut MtbString,
    capacity: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and capacity are validated in helper.
        let Some(dest) = (unsafe { args::slice_out_arg(dest, capacity, "dest") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_buffer_mut(ep, target, |buffer| {
            // SAFETY: Forwarded caller guarantee on the string buffers.
            unsafe { write_strings(buffer.texts(), dest) }
        })
    })
}

/// Replace the integers of `target`. A zero count clears them.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `values` must be readable for `count` values.
#[no_mangle]
pub unsafe extern "C" fn mtb_set_int_array(
    ep: MtbEndpointHandle,
    target: u32,
    values: *const i64,
    count: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and count are validated in helper.
        let Some(values) = (unsafe { args::slice_arg(values, count, "values") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_buffer_mut(ep, target, |buffer| {
            buffer.set_ints(values);
            MTB_OK
        })
    })
}

/// Replace the reals of `target`. A zero count clears them.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `values` must be readable for `count` values.
#[no_mangle]
pub unsafe extern "C" fn mtb_set_real_array(
    ep: MtbEndpointHandle,
    target: u32,
    values: *const f64,
    count: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and count are validated in helper.
        let Some(values) = (unsafe { args::slice_arg(values, count, "values") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        with_buffer_mut(ep, target, |buffer| {
            buffer.set_reals(values);
            MTB_OK
        })
    })
}

/// Replace the texts of `target`. A zero count clears them.
///
/// # Safety
/// `ep` must be a valid endpoint handle; `values` must be readable for `count`
/// entries, each with `data` readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mtb_set_text_array(
    ep: MtbEndpointHandle,
    target: u32,
    values: *const MtbString,
    count: usize,
) -> i32 {
    crate::ffi_boundary(MtbStatus::Internal.code(), || {
        error::clear_error_state();

        // SAFETY: Pointer and count are validated in helper.
        let Some(values) = (unsafe { args::slice_arg(values, count, "values") }) else {
            return MtbStatus::InvalidArgument.code();
        };

        let mut texts = Vec::with_capacity(values.len());
        for value in values {
            // SAFETY: Forwarded caller guarantee on each string buffer.
            match unsafe { args::string_in(value, "values[].data") } {
                Some(text) => texts.push(text),
                None => return MtbStatus::InvalidArgument.code(),
            }
        }

        with_buffer_mut(ep, target, |buffer| {
            buffer.set_texts(texts);
            MTB_OK
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{mtb_close_endpoint, mtb_open_endpoint};
    use crate::indicator::mtb_create_indicator;

    fn out_string(storage: &mut [u8]) -> MtbString {
        MtbString {
            len: storage.len(),
            data: storage.as_mut_ptr().cast(),
        }
    }

    #[test]
    fn set_then_get_round_trips_all_sequences() {
        let ep = mtb_open_endpoint(0);
        assert!(!ep.is_null());

        let ints = [3i64, -1, 7];
        let reals = [0.25f64, -8.5];
        let mut eur = *b"EURUSD";
        let mut empty = [0u8; 0];
        let texts = [out_string(&mut eur), out_string(&mut empty)];

        // SAFETY: every pointer below refers to a live local of the stated length.
        unsafe {
            assert_eq!(mtb_set_int_array(ep, 0, ints.as_ptr(), ints.len()), MTB_OK);
            assert_eq!(mtb_set_real_array(ep, 0, reals.as_ptr(), reals.len()), MTB_OK);
            assert_eq!(mtb_set_text_array(ep, 0, texts.as_ptr(), texts.len()), MTB_OK);

            let mut sizes = [0usize; 3];
            assert_eq!(mtb_buffer_sizes(ep, 0, sizes.as_mut_ptr()), MTB_OK);
            assert_eq!(sizes, [3, 2, 2]);

            let mut got_ints = [0i64; 4];
            assert_eq!(mtb_get_int_array(ep, 0, got_ints.as_mut_ptr(), 4), 3);
            assert_eq!(got_ints[..3], ints);

            let mut got_reals = [0f64; 2];
            assert_eq!(mtb_get_real_array(ep, 0, got_reals.as_mut_ptr(), 2), 2);
            assert_eq!(got_reals, reals);

            let mut a = [0xAAu8; 16];
            let mut b = [0xAAu8; 16];
            let mut dest = [out_string(&mut a), out_string(&mut b)];
            assert_eq!(mtb_get_text_array(ep, 0, dest.as_mut_ptr(), dest.len()), 2);
            assert_eq!(dest[0].len, 7);
            assert_eq!(dest[1].len, 1);
            assert_eq!(&a[..7], b"EURUSD\0");
            assert_eq!(b[0], 0);

            mtb_close_endpoint(ep);
        }
    }

    #[test]
    fn undersized_destinations_write_nothing() {
        let ep = mtb_open_endpoint(0);
        let ints = [1i64, 2, 3];
        let mut long = *b"a longer text\0";
        let texts = [out_string(&mut long)];

        // SAFETY: every pointer below refers to a live local of the stated length.
        unsafe {
            mtb_set_int_array(ep, 0, ints.as_ptr(), ints.len());
            mtb_set_text_array(ep, 0, texts.as_ptr(), 1);

            let mut got = [0i64; 2];
            assert_eq!(
                mtb_get_int_array(ep, 0, got.as_mut_ptr(), 2),
                MtbStatus::BufferTooSmall.code()
            );
            assert_eq!(got, [0, 0]);

            let mut small = [0x55u8; 4];
            let mut dest = [out_string(&mut small)];
            assert_eq!(
                mtb_get_text_array(ep, 0, dest.as_mut_ptr(), 1),
                MtbStatus::BufferTooSmall.code()
            );
            assert_eq!(dest[0].len, 4);
            assert_eq!(small, [0x55; 4]);

            mtb_close_endpoint(ep);
        }
    }

    #[test]
    fn indicator_target_is_separate_and_unknown_target_fails() {
        let ep = mtb_open_endpoint(0);
        let name = c"MA";
        let symbol = c"EURUSD";
        let ints = [600i64, 1];

        // SAFETY: every pointer below refers to a live local of the stated length.
        unsafe {
            let handle = mtb_create_indicator(ep, name.as_ptr(), symbol.as_ptr(), 60);
            assert_eq!(handle, 1);
            let handle = handle as u32;

            assert_eq!(mtb_set_int_array(ep, handle, ints.as_ptr(), 2), MTB_OK);
            let mut sizes = [9usize; 3];
            mtb_buffer_sizes(ep, 0, sizes.as_mut_ptr());
            assert_eq!(sizes, [0, 0, 0]);
            mtb_buffer_sizes(ep, handle, sizes.as_mut_ptr());
            assert_eq!(sizes, [2, 0, 0]);

            assert_eq!(
                mtb_set_int_array(ep, 42, ints.as_ptr(), 2),
                MtbStatus::InvalidHandle.code()
            );
            assert_eq!(
                mtb_get_int_array(ep, 0, std::ptr::null_mut(), 3),
                MtbStatus::InvalidArgument.code()
            );

            mtb_close_endpoint(ep);
        }
    }
}
