use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEMO_DEVICE_ID: &str = "488ABAAB-164F-7A86-595F-DDD778CB86C3";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub battery_percentage: i64,
    pub battery_voltage: f64,
    pub position: i64,
    #[serde(rename = "CHSesame2Status")]
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "recordID")]
    pub record_id: i64,
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(rename = "historyTag")]
    pub history_tag: String,
    #[serde(rename = "devicePk")]
    pub device_pk: String,
    pub timestamp: DateTime<Utc>,
}

/// A fake lock. `history` is stored oldest first.
#[derive(Clone, Debug)]
pub struct Device {
    pub status: Status,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug)]
pub struct AppState {
    api_key: String,
    devices: HashMap<String, Device>,
}

pub type SharedState = Arc<AppState>;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub lg: Option<u32>,
}

pub fn app(api_key: &str, devices: HashMap<String, Device>) -> Router {
    let state: SharedState = Arc::new(AppState {
        api_key: api_key.to_string(),
        devices,
    });
    Router::new()
        .route("/{device_id}", get(get_device))
        .with_state(state)
}

pub async fn run(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

/// One device with a dozen history entries, all on fixed timestamps.
pub fn demo_devices() -> HashMap<String, Device> {
    let base = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_612_325_106);
    let kinds = [1, 2, 7, 8, 6, 10, 11, 12, 3, 4, 5, 9];
    let history = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| HistoryEntry {
            record_id: i as i64 + 1,
            kind,
            history_tag: format!("tag-{}", i + 1),
            device_pk: "demo-device-pk".to_string(),
            timestamp: base + Duration::minutes(i as i64),
        })
        .collect::<Vec<_>>();
    let status = Status {
        battery_percentage: 87,
        battery_voltage: 5.85,
        position: 11,
        state: "locked".to_string(),
        timestamp: base + Duration::minutes(kinds.len() as i64),
    };
    HashMap::from([(DEMO_DEVICE_ID.to_string(), Device { status, history })])
}

/// Status without `page`, a history page with it. The vendor answers 500 for
/// IDs it does not know, lower-case forms of real IDs included.
async fn get_device(
    State(state): State<SharedState>,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Response {
    let api_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if api_key != Some(state.api_key.as_str()) {
        warn!(%device_id, "rejected request with bad api key");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let Some(device) = state.devices.get(&device_id) else {
        debug!(%device_id, "unknown device");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    };

    match query.page {
        None => Json(device.status.clone()).into_response(),
        Some(page) => {
            let lg = query.lg.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
            let page: Vec<HistoryEntry> = device
                .history
                .iter()
                .rev()
                .skip((page as usize).saturating_mul(lg))
                .take(lg)
                .cloned()
                .collect();
            debug!(%device_id, records = page.len(), "history page");
            Json(page).into_response()
        }
    }
}
