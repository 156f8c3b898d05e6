//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, Unix
//! seconds instead of `DateTime`, and tagged enums with explicit
//! discriminants. Open enums keep their raw wire value next to the tag.
//! Conversion functions live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use sesame_core::error::ApiError;
use sesame_core::http::HttpMethod;
use sesame_core::types::{HistoryRecord, LockState, StatusSnapshot};

/// Opaque handle to a `SesameClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiSesameClient {
    pub(crate) inner: sesame_core::SesameClient,
}

/// Copy `s` into a heap C string owned by the caller. Interior NULs are
/// dropped rather than failing the whole conversion.
pub(crate) fn to_c_string(s: &str) -> *mut c_char {
    let cleaned: String = s.chars().filter(|&c| c != '\0').collect();
    CString::new(cleaned).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `sesame_build_*` functions. The C caller executes the request
/// and passes the response back through `sesame_parse_*`. `url` is absolute
/// and already carries the query string.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: sesame_core::HttpRequest) -> *mut Self {
        let url = to_c_string(&req.url);

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url,
            headers,
            headers_len,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing an HTTP request,
/// then passes a pointer to a `sesame_parse_*` function. The FFI layer reads
/// but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiSesameResult`.
#[repr(C)]
pub enum FfiErrorCode {
    Ok = 0,
    RequestConstruction = 1,
    Transport = 2,
    Canceled = 3,
    Timeout = 4,
    UnexpectedStatus = 5,
    Decode = 6,
    Panic = 7,
    NullArg = 8,
}

/// Tag that tells `sesame_free_result` what `FfiSesameResult::data` points to.
#[repr(C)]
pub enum FfiDataTag {
    None = 0,
    Status = 1,
    HistoryList = 2,
}

/// Lock state as a C enum. `Unknown` means "see `lock_state_raw`".
#[repr(C)]
pub enum FfiLockState {
    Locked = 0,
    Unlocked = 1,
    Moved = 2,
    Unknown = 3,
}

impl From<&LockState> for FfiLockState {
    fn from(state: &LockState) -> Self {
        match state {
            LockState::Locked => FfiLockState::Locked,
            LockState::Unlocked => FfiLockState::Unlocked,
            LockState::Moved => FfiLockState::Moved,
            LockState::Unknown(_) => FfiLockState::Unknown,
        }
    }
}

/// A status snapshot exposed to C. `timestamp` is Unix seconds.
#[repr(C)]
pub struct FfiStatus {
    pub battery_percentage: i64,
    pub battery_voltage: f64,
    pub position: i64,
    pub lock_state: FfiLockState,
    pub lock_state_raw: *mut c_char,
    pub timestamp: i64,
}

impl From<StatusSnapshot> for FfiStatus {
    fn from(status: StatusSnapshot) -> Self {
        FfiStatus {
            battery_percentage: status.battery_percentage,
            battery_voltage: status.battery_voltage,
            position: status.position,
            lock_state: FfiLockState::from(&status.lock_state),
            lock_state_raw: to_c_string(status.lock_state.as_str()),
            timestamp: status.timestamp.timestamp(),
        }
    }
}

/// A history record exposed to C. `event_type` is the raw wire code;
/// `event_type_known` is false for codes outside 0..=13.
#[repr(C)]
pub struct FfiHistoryRecord {
    pub record_id: i64,
    pub event_type: i64,
    pub event_type_known: bool,
    pub tag: *mut c_char,
    pub device_public_key: *mut c_char,
    pub timestamp: i64,
}

impl From<HistoryRecord> for FfiHistoryRecord {
    fn from(record: HistoryRecord) -> Self {
        FfiHistoryRecord {
            record_id: record.record_id,
            event_type: record.event_type.code(),
            event_type_known: record.event_type.is_known(),
            tag: to_c_string(&record.tag),
            device_public_key: to_c_string(&record.device_public_key),
            timestamp: record.timestamp.timestamp(),
        }
    }
}

/// A list of history records exposed to C.
#[repr(C)]
pub struct FfiHistoryList {
    pub items: *mut FfiHistoryRecord,
    pub len: u32,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the parsed payload (tagged by `data_tag`).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, and `data` is null.
#[repr(C)]
pub struct FfiSesameResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut std::ffi::c_void,
}

impl FfiSesameResult {
    fn ok(data_tag: FfiDataTag, data: *mut std::ffi::c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiSesameResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 200,
            data_tag,
            data,
        }))
    }

    fn err(error_code: FfiErrorCode, http_status: u16, msg: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiSesameResult {
            error_code,
            error_message: to_c_string(msg),
            http_status,
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }

    /// Build a success result carrying a single `FfiStatus`.
    pub(crate) fn ok_status(status: StatusSnapshot) -> *mut Self {
        let ffi_status = Box::new(FfiStatus::from(status));
        Self::ok(FfiDataTag::Status, Box::into_raw(ffi_status) as *mut std::ffi::c_void)
    }

    /// Build a success result carrying an `FfiHistoryList`.
    pub(crate) fn ok_history(records: Vec<HistoryRecord>) -> *mut Self {
        let len = records.len() as u32;
        let items = if records.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_records: Box<[FfiHistoryRecord]> =
                records.into_iter().map(FfiHistoryRecord::from).collect();
            Box::into_raw(ffi_records) as *mut FfiHistoryRecord
        };

        let ffi_list = Box::new(FfiHistoryList { items, len });
        Self::ok(FfiDataTag::HistoryList, Box::into_raw(ffi_list) as *mut std::ffi::c_void)
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let error_code = match &err {
            ApiError::RequestConstruction(_) => FfiErrorCode::RequestConstruction,
            ApiError::Transport(_) => FfiErrorCode::Transport,
            ApiError::Canceled => FfiErrorCode::Canceled,
            ApiError::Timeout => FfiErrorCode::Timeout,
            ApiError::UnexpectedStatus { .. } => FfiErrorCode::UnexpectedStatus,
            ApiError::Decode(_) => FfiErrorCode::Decode,
        };
        Self::err(error_code, err.status().unwrap_or(0), &err.to_string())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::err(FfiErrorCode::NullArg, 0, &format!("null argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::err(FfiErrorCode::Panic, 0, msg)
    }
}
