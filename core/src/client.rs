//! Request builder, response parser and blocking client for the Sesame API.
//!
//! # Design
//! `SesameClient` holds only its immutable configuration and a shared
//! transport, so clones are cheap and calls can run concurrently. Each
//! operation is split into a `build_*` method that produces an `HttpRequest`
//! and a `parse_*` method that consumes an `HttpResponse`. `status` and
//! `history` glue the two halves around one `Transport::execute` call; hosts
//! that do their own I/O use the halves directly.

use std::sync::Arc;

use tracing::{debug, debug_span};
use url::Url;

use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{HistoryRecord, StatusSnapshot};

/// Header carrying the account's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const PAGES_FIELD: &str = "Pages";

/// Blocking client for the Sesame status and history endpoints.
#[derive(Clone)]
pub struct SesameClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl SesameClient {
    /// Client using the default `ureq` transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }

    pub fn with_transport<T>(config: ClientConfig, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint()
    }

    /// Current status of one device.
    ///
    /// `device_id` must be the upper-case form the server expects; unknown
    /// IDs come back as `UnexpectedStatus`.
    pub fn status(&self, ctx: &Context, device_id: &str) -> Result<StatusSnapshot, ApiError> {
        let req = self.build_status(device_id)?;
        let response = self.execute(ctx, &req)?;
        self.parse_status(response)
    }

    /// One page of a device's history, in server order.
    pub fn history(
        &self,
        ctx: &Context,
        device_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<HistoryRecord>, ApiError> {
        let req = self.build_history(device_id, page, page_size)?;
        let response = self.execute(ctx, &req)?;
        self.parse_history(response)
    }

    pub fn build_status(&self, device_id: &str) -> Result<HttpRequest, ApiError> {
        self.build_get(device_id, &[])
    }

    /// `page` and `page_size` are forwarded as `page` and `lg` without
    /// bounds checks.
    pub fn build_history(
        &self,
        device_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<HttpRequest, ApiError> {
        self.build_get(
            device_id,
            &[("page", page.to_string()), ("lg", page_size.to_string())],
        )
    }

    pub fn parse_status(&self, response: HttpResponse) -> Result<StatusSnapshot, ApiError> {
        let body = read_ok_body(response)?;
        serde_json::from_slice(&body).map_err(ApiError::Decode)
    }

    pub fn parse_history(&self, response: HttpResponse) -> Result<Vec<HistoryRecord>, ApiError> {
        let body = read_ok_body(response)?;
        decode_history(&body)
    }

    fn build_get(&self, device_id: &str, query: &[(&str, String)]) -> Result<HttpRequest, ApiError> {
        if device_id.is_empty() {
            return Err(ApiError::RequestConstruction("device ID is empty".to_string()));
        }

        let endpoint = self.config.endpoint();
        let mut url = Url::parse(endpoint).map_err(|e| {
            ApiError::RequestConstruction(format!("invalid endpoint {endpoint:?}: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::RequestConstruction(format!("endpoint {endpoint:?} cannot be a base URL"))
            })?
            .pop_if_empty()
            .push(device_id);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![(API_KEY_HEADER.to_string(), self.config.api_key().to_string())],
        })
    }

    fn execute(&self, ctx: &Context, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let span = debug_span!("sesame_request", method = req.method.as_str(), url = %req.url);
        let _guard = span.enter();

        let response = self.transport.execute(ctx, req)?;
        if let Some(err) = ctx.err() {
            debug!("context done before decode");
            return Err(err.into());
        }
        debug!(status = response.status, "response received");
        Ok(response)
    }
}

/// Bodies of non-200 responses are never decoded; dropping the response
/// drains and releases them.
fn read_ok_body(mut response: HttpResponse) -> Result<Vec<u8>, ApiError> {
    check_status(&response)?;
    response.body.read_to_vec().map_err(ApiError::from_body_io)
}

fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 200 {
        return Ok(());
    }
    let reason = ureq::http::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default();
    Err(ApiError::UnexpectedStatus {
        status: response.status,
        reason: reason.to_string(),
    })
}

/// The history endpoint answers with a bare array; an object wrapping the
/// array under `Pages` is accepted as well, with the key matched
/// case-insensitively.
fn decode_history(body: &[u8]) -> Result<Vec<HistoryRecord>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(ApiError::Decode)?;
    let list = match value {
        serde_json::Value::Object(mut fields) => {
            let key = if fields.contains_key(PAGES_FIELD) {
                Some(PAGES_FIELD.to_string())
            } else {
                fields
                    .keys()
                    .find(|k| k.eq_ignore_ascii_case(PAGES_FIELD))
                    .cloned()
            };
            key.and_then(|k| fields.remove(&k))
                .ok_or_else(|| ApiError::Decode(serde::de::Error::missing_field(PAGES_FIELD)))?
        }
        other => other,
    };
    serde_json::from_value(list).map_err(ApiError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENDPOINT;
    use crate::types::{HistoryType, LockState};

    fn client() -> SesameClient {
        SesameClient::new(ClientConfig::new("http://localhost:3000", "test-key"))
    }

    #[test]
    fn build_status_produces_correct_request() {
        let req = client().build_status("ABCD-1234").unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/ABCD-1234");
        assert_eq!(
            req.headers,
            vec![("x-api-key".to_string(), "test-key".to_string())]
        );
        assert!(req.query().is_none());
    }

    #[test]
    fn build_status_keeps_device_id_case() {
        let req = client().build_status("abcd-1234").unwrap();
        assert_eq!(req.url, "http://localhost:3000/abcd-1234");
    }

    #[test]
    fn build_status_against_default_endpoint() {
        let client = SesameClient::new(ClientConfig::new("", "k"));
        let req = client.build_status("ABCD").unwrap();
        assert_eq!(req.url, format!("{DEFAULT_ENDPOINT}/ABCD"));
    }

    #[test]
    fn build_history_uses_page_and_lg() {
        let req = client().build_history("ABCD", 0, 10).unwrap();
        assert_eq!(req.url, "http://localhost:3000/ABCD?page=0&lg=10");
        assert_eq!(req.query(), Some("page=0&lg=10"));
        assert_eq!(req.header("x-api-key"), Some("test-key"));
    }

    #[test]
    fn build_history_forwards_zero_page_size() {
        let req = client().build_history("ABCD", 7, 0).unwrap();
        assert_eq!(req.query(), Some("page=7&lg=0"));
    }

    #[test]
    fn empty_device_id_is_rejected_before_io() {
        let err = client().build_status("").unwrap_err();
        assert!(matches!(err, ApiError::RequestConstruction(_)));
        let err = client().build_history("", 0, 10).unwrap_err();
        assert!(matches!(err, ApiError::RequestConstruction(_)));
    }

    #[test]
    fn invalid_endpoint_is_request_construction_error() {
        let client = SesameClient::new(ClientConfig::new("not a url", "k"));
        let err = client.build_status("ABCD").unwrap_err();
        assert!(matches!(err, ApiError::RequestConstruction(_)));
    }

    #[test]
    fn device_id_is_a_single_path_segment() {
        let req = client().build_status("AB/CD").unwrap();
        assert_eq!(req.url, "http://localhost:3000/AB%2FCD");
    }

    #[test]
    fn parse_status_success() {
        let response = HttpResponse::new(
            200,
            r#"{"batteryPercentage":87,"batteryVoltage":5.85,"position":-12,
                "CHSesame2Status":"unlocked","timestamp":"2021-02-03T04:05:06Z"}"#,
        );
        let status = client().parse_status(response).unwrap();
        assert_eq!(status.battery_percentage, 87);
        assert_eq!(status.battery_voltage, 5.85);
        assert_eq!(status.position, -12);
        assert_eq!(status.lock_state, LockState::Unlocked);
    }

    #[test]
    fn parse_status_wrong_status() {
        let response = HttpResponse::new(500, "internal error");
        let err = client().parse_status(response).unwrap_err();
        match err {
            ApiError::UnexpectedStatus { status, reason } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "Internal Server Error");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    }

    #[test]
    fn parse_status_non_200_success_code_is_still_unexpected() {
        let response = HttpResponse::new(204, "");
        let err = client().parse_status(response).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { status: 204, .. }));
    }

    #[test]
    fn parse_status_bad_json() {
        let response = HttpResponse::new(200, "not json");
        let err = client().parse_status(response).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn parse_history_bare_array() {
        let response = HttpResponse::new(
            200,
            r#"[{"recordID":2,"type":7,"historyTag":"t","devicePk":"pk","timestamp":1612325106},
                {"recordID":1,"type":1,"historyTag":"","devicePk":"pk","timestamp":1612325000}]"#,
        );
        let records = client().parse_history(response).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_id, 2);
        assert_eq!(records[0].event_type, HistoryType::ManualLocked);
        assert_eq!(records[1].record_id, 1);
        assert_eq!(records[1].event_type, HistoryType::BleLock);
    }

    #[test]
    fn parse_history_pages_envelope() {
        let response = HttpResponse::new(
            200,
            r#"{"Pages":[{"recordID":5,"type":10,"historyTag":"x","devicePk":"pk","timestamp":1612325106}]}"#,
        );
        let records = client().parse_history(response).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, HistoryType::DriveLocked);
    }

    #[test]
    fn parse_history_empty_page() {
        let records = client().parse_history(HttpResponse::new(200, "[]")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn parse_history_pages_key_ignores_case() {
        for key in ["pages", "PAGES", "pAgEs"] {
            let body = format!(
                r#"{{"{key}":[{{"recordID":6,"type":1,"historyTag":"","devicePk":"pk","timestamp":1612325106}}]}}"#
            );
            let records = client().parse_history(HttpResponse::new(200, body)).unwrap();
            assert_eq!(records.len(), 1, "{key}");
            assert_eq!(records[0].record_id, 6, "{key}");
        }
    }

    #[test]
    fn parse_history_object_without_pages_is_decode_error() {
        let err = client()
            .parse_history(HttpResponse::new(200, r#"{"records":[]}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn parse_history_wrong_status() {
        let err = client()
            .parse_history(HttpResponse::new(403, "Forbidden"))
            .unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { status: 403, .. }));
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SesameClient>();
    }
}
