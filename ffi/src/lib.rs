//! C-ABI wrapper around `sesame-core`.
//!
//! # Overview
//! Exposes the Sesame status and history operations through `extern "C"`
//! functions so any language with a C FFI can build requests and parse
//! responses while doing the HTTP round trip itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Per-operation `build_*` / `parse_*` mirrors the core API 1:1.
//! - A single `FfiSesameResult` envelope with `FfiDataTag` + `void* data`
//!   conveys success payloads and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `sesame_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use sesame_core::http::HttpResponse;
use sesame_core::ClientConfig;

use types::*;

/// Borrow a C string as `&str`; null or invalid UTF-8 yields `None`.
fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new `SesameClient`.
///
/// A null or empty `endpoint` selects the vendor's default base URL.
/// Returns null if `api_key` is null or if an internal panic occurs.
/// The caller must free the returned pointer with `sesame_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_client_new(
    endpoint: *const c_char,
    api_key: *const c_char,
) -> *mut FfiSesameClient {
    catch_unwind(|| {
        let Some(api_key) = c_str(api_key) else {
            return std::ptr::null_mut();
        };
        let endpoint = c_str(endpoint).unwrap_or("");
        let client = sesame_core::SesameClient::new(ClientConfig::new(endpoint, api_key));
        Box::into_raw(Box::new(FfiSesameClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `SesameClient` created by `sesame_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_client_free(client: *mut FfiSesameClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build an HTTP request for the current status of `device_id`.
///
/// Returns null if `client` or `device_id` is null, or if `device_id` is
/// empty. The caller must free the returned pointer with
/// `sesame_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_build_status(
    client: *const FfiSesameClient,
    device_id: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(device_id) = c_str(device_id) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        match client.inner.build_status(device_id) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Build an HTTP request for one page of `device_id`'s history.
///
/// `page` and `page_size` are sent as `page` and `lg` without bounds checks.
/// Returns null if `client` or `device_id` is null, or if `device_id` is
/// empty.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_build_history(
    client: *const FfiSesameClient,
    device_id: *const c_char,
    page: u32,
    page_size: u32,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(device_id) = c_str(device_id) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        match client.inner.build_history(device_id, page, page_size) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`.
///
/// A null body is treated as empty.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        Vec::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }.to_bytes().to_vec()
    };
    HttpResponse::new(resp.status, body)
}

/// Parse an HTTP response from a status request.
///
/// Returns a result with `data_tag = Status` on success.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_parse_status(
    client: *const FfiSesameClient,
    response: *const FfiHttpResponse,
) -> *mut FfiSesameResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiSesameResult::null_arg("client");
        }
        if response.is_null() {
            return FfiSesameResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_status(ffi_response_to_core(resp)) {
            Ok(status) => FfiSesameResult::ok_status(status),
            Err(e) => FfiSesameResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiSesameResult::panic("panic in sesame_parse_status"))
}

/// Parse an HTTP response from a history request.
///
/// Returns a result with `data_tag = HistoryList` on success, records in
/// server order.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_parse_history(
    client: *const FfiSesameClient,
    response: *const FfiHttpResponse,
) -> *mut FfiSesameResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiSesameResult::null_arg("client");
        }
        if response.is_null() {
            return FfiSesameResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.parse_history(ffi_response_to_core(resp)) {
            Ok(records) => FfiSesameResult::ok_history(records),
            Err(e) => FfiSesameResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiSesameResult::panic("panic in sesame_parse_history"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `sesame_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    }));
}

/// Free an `FfiSesameResult` returned by any `sesame_parse_*` function.
/// Safe to call with null. Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_free_result(result: *mut FfiSesameResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Status => {
                let status = unsafe { Box::from_raw(result.data as *mut FfiStatus) };
                free_c_string(status.lock_state_raw);
            }
            FfiDataTag::HistoryList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiHistoryList) };
                if !list.items.is_null() && list.len > 0 {
                    let items = unsafe {
                        Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                            list.items,
                            list.len as usize,
                        ))
                    };
                    for item in items.iter() {
                        free_c_string(item.tag);
                        free_c_string(item.device_public_key);
                    }
                }
            }
            FfiDataTag::None => {}
        }
    }));
}

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn sesame_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
