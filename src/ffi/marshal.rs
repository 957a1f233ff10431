// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Conversions between raw boundary arguments and safe Rust values.

use std::ffi::c_char;
use std::path::PathBuf;

use crate::engine::InferenceError;
use crate::tensor::Shape;

/// Read a NUL-terminated path of exactly `len` bytes.
///
/// At most `len + 1` bytes are read and never past the first NUL, so an
/// understated or overstated length is detected without overrunning the
/// caller's buffer.
///
/// # Safety
/// `ptr` must be null or point at a readable NUL-terminated string.
pub unsafe fn path_from_raw(ptr: *const c_char, len: u32) -> Result<PathBuf, InferenceError> {
    if ptr.is_null() {
        return Err(InferenceError::InvalidArgument("model path is null".into()));
    }
    let len = len as usize;
    if len == 0 {
        return Err(InferenceError::InvalidArgument("model path length is zero".into()));
    }

    let bytes = ptr.cast::<u8>();
    let mut terminator = None;
    for i in 0..=len {
        if *bytes.add(i) == 0 {
            terminator = Some(i);
            break;
        }
    }
    match terminator {
        Some(actual) if actual == len => {}
        Some(actual) => {
            return Err(InferenceError::InvalidArgument(format!(
                "model path length {} does not match string length {}",
                len, actual
            )))
        }
        None => {
            return Err(InferenceError::InvalidArgument(format!(
                "model path is longer than the declared {} bytes",
                len
            )))
        }
    }

    let raw = std::slice::from_raw_parts(bytes, len);
    let text = std::str::from_utf8(raw)
        .map_err(|_| InferenceError::InvalidArgument("model path is not valid UTF-8".into()))?;
    Ok(PathBuf::from(text))
}

/// Build a shape from boundary dimensions, `InvalidShape` on zeros.
pub fn shape_from_raw(batch: u32, channels: u32, height: u32, width: u32) -> Result<Shape, InferenceError> {
    Shape::validated(batch as usize, channels as usize, height as usize, width as usize)
}

/// Borrow the caller's input for the duration of one call.
///
/// # Safety
/// `ptr` must be null or point at `len` readable, initialized floats that
/// stay valid and unmodified until the call returns.
pub unsafe fn input_from_raw<'a>(ptr: *const f32, len: u32) -> Result<&'a [f32], InferenceError> {
    if ptr.is_null() {
        return Err(InferenceError::InvalidArgument("input data is null".into()));
    }
    if len == 0 {
        return Err(InferenceError::InvalidArgument("input length is zero".into()));
    }
    if !ptr.is_aligned() {
        return Err(InferenceError::InvalidArgument("input data is misaligned".into()));
    }
    Ok(std::slice::from_raw_parts(ptr, len as usize))
}

/// Hand an owned buffer to the caller as `(pointer, length)`.
pub fn output_into_raw(values: Vec<f32>) -> Result<(*mut f32, i32), InferenceError> {
    let len = i32::try_from(values.len()).map_err(|_| {
        InferenceError::InferenceFailure(format!(
            "output of {} values does not fit the boundary length",
            values.len()
        ))
    })?;
    if len == 0 {
        return Err(InferenceError::InferenceFailure("output is empty".into()));
    }
    let raw = Box::into_raw(values.into_boxed_slice());
    Ok((raw.cast::<f32>(), len))
}

/// Free a buffer produced by [`output_into_raw`].
///
/// # Safety
/// `(ptr, len)` must come from one `output_into_raw` call and not have been
/// freed already.
pub unsafe fn free_output(ptr: *mut f32, len: i32) {
    if ptr.is_null() || len <= 0 {
        return;
    }
    let slice = std::ptr::slice_from_raw_parts_mut(ptr, len as usize);
    drop(Box::from_raw(slice));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_path_exact_length() {
        let path = CString::new("models/net.json").unwrap();
        let parsed = unsafe { path_from_raw(path.as_ptr(), 15) }.unwrap();
        assert_eq!(parsed, PathBuf::from("models/net.json"));
    }

    #[test]
    fn test_path_length_mismatch() {
        let path = CString::new("models/net.json").unwrap();
        for len in [0, 3, 14, 16, 100] {
            let err = unsafe { path_from_raw(path.as_ptr(), len) }.unwrap_err();
            assert!(matches!(err, InferenceError::InvalidArgument(_)), "len {}", len);
        }
        let err = unsafe { path_from_raw(std::ptr::null(), 4) }.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidArgument(_)));
    }

    #[test]
    fn test_path_invalid_utf8() {
        let path = CString::new(vec![0xff, 0xfe, b'a']).unwrap();
        let err = unsafe { path_from_raw(path.as_ptr(), 3) }.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidArgument(_)));
    }

    #[test]
    fn test_shape_zero_dimension() {
        assert!(matches!(
            shape_from_raw(1, 3, 0, 224),
            Err(InferenceError::InvalidShape(_))
        ));
        assert_eq!(shape_from_raw(1, 3, 2, 2).unwrap(), Shape::new(1, 3, 2, 2));
    }

    #[test]
    fn test_output_round_trip_frees() {
        let (ptr, len) = output_into_raw(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(len, 3);
        assert_eq!(unsafe { std::slice::from_raw_parts(ptr, 3) }, &[1.0, 2.0, 3.0]);
        unsafe { free_output(ptr, len) };
        unsafe { free_output(std::ptr::null_mut(), 0) };
    }

    #[test]
    fn test_input_validation() {
        assert!(unsafe { input_from_raw(std::ptr::null(), 3) }.is_err());
        let data = [1.0f32, 2.0];
        assert!(unsafe { input_from_raw(data.as_ptr(), 0) }.is_err());
        assert_eq!(unsafe { input_from_raw(data.as_ptr(), 2) }.unwrap(), &data);
    }
}
