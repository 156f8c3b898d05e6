//! Blocking client core for the Sesame smart-lock cloud API.
//!
//! # Overview
//! Two read operations: the current status of a lock and a page of its event
//! history. Requests are built and responses parsed without touching the
//! network (host-does-IO pattern); `SesameClient::status` and
//! `SesameClient::history` add one blocking round trip through a pluggable
//! `Transport` in between.
//!
//! # Design
//! - `SesameClient` is stateless apart from its immutable `ClientConfig`.
//! - Each operation is split into `build_*` (produces request) and `parse_*`
//!   (consumes response), so the I/O boundary is explicit.
//! - Every call takes a `Context` carrying cancellation and a deadline.
//! - One attempt per call; failures go straight back to the caller.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{SesameClient, API_KEY_HEADER};
pub use config::{ClientConfig, ConfigError, DEFAULT_ENDPOINT};
pub use context::{CancelHandle, Context, ContextError};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use transport::{Transport, UreqTransport};
pub use types::{HistoryRecord, HistoryType, LockState, StatusSnapshot};
