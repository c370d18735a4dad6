use std::ffi::CStr;
use std::os::raw::c_char;

use mtbridge_exchange::text_from_bytes;

use crate::error;
use crate::types::MtbString;

/// Read a required NUL-terminated C string argument; invalid UTF-8 is replaced.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg(value: *const c_char, name: &str) -> Option<String> {
    if value.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null"));
        return None;
    }

    let as_cstr = {
        // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
        unsafe { CStr::from_ptr(value) }
    };
    Some(as_cstr.to_string_lossy().into_owned())
}

/// Convert an input pointer + count into a slice.
///
/// # Safety
/// If `count > 0`, `values` must be non-null and readable for `count` elements.
pub(crate) unsafe fn slice_arg<'a, T>(values: *const T, count: usize, name: &str) -> Option<&'a [T]> {
    if count == 0 {
        return Some(&[]);
    }
    if values.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null when count > 0"));
        return None;
    }

    // SAFETY: Pointer and count are validated above and owned by caller for the call duration.
    Some(unsafe { std::slice::from_raw_parts(values, count) })
}

/// Convert an output pointer + capacity into a mutable slice.
///
/// # Safety
/// If `capacity > 0`, `dest` must be non-null and writable for `capacity` elements.
pub(crate) unsafe fn slice_out_arg<'a, T>(
    dest: *mut T,
    capacity: usize,
    name: &str,
) -> Option<&'a mut [T]> {
    if capacity == 0 {
        return Some(&mut []);
    }
    if dest.is_null() {
        let _ = error::set_invalid_argument(format!("{name} cannot be null when capacity > 0"));
        return None;
    }

    // SAFETY: Pointer and capacity are validated above and owned by caller for the call duration.
    Some(unsafe { std::slice::from_raw_parts_mut(dest, capacity) })
}

/// Read one input string: up to `len` bytes or the first NUL.
///
/// # Safety
/// If `value.len > 0`, `value.data` must be readable for `len` bytes.
pub(crate) unsafe fn string_in(value: &MtbString, name: &str) -> Option<String> {
    // SAFETY: Forwarded caller guarantee on `data`/`len`.
    let bytes = unsafe { slice_arg(value.data.cast::<u8>().cast_const(), value.len, name) }?;
    Some(text_from_bytes(bytes))
}

/// View the character buffer of one output string.
///
/// # Safety
/// If `value.len > 0`, `value.data` must be writable for `len` bytes and must
/// not overlap any other buffer passed in the same call.
pub(crate) unsafe fn string_out<'a>(value: &MtbString, name: &str) -> Option<&'a mut [u8]> {
    // SAFETY: Forwarded caller guarantee on `data`/`len`.
    unsafe { slice_out_arg(value.data.cast::<u8>(), value.len, name) }
}

/// Convert a count to the non-negative return value of a C call.
pub(crate) fn count_ret(count: usize) -> i32 {
    match i32::try_from(count) {
        Ok(count) => count,
        Err(_) => error::fail(
            crate::types::MtbStatus::ResourceExhausted,
            format!("count {count} does not fit the return value"),
        ),
    }
}
