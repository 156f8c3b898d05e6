use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, demo_devices, HistoryEntry, Status, API_KEY_HEADER, DEMO_DEVICE_ID};
use tower::ServiceExt;

const KEY: &str = "test-key";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header(API_KEY_HEADER, KEY)
        .body(String::new())
        .unwrap()
}

fn history_ids(entries: &[HistoryEntry]) -> Vec<i64> {
    entries.iter().map(|e| e.record_id).collect()
}

// --- status ---

#[tokio::test]
async fn status_of_known_device() {
    let resp = app(KEY, demo_devices())
        .oneshot(get(&format!("/{DEMO_DEVICE_ID}")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let status: Status = body_json(resp).await;
    assert_eq!(status.battery_percentage, 87);
    assert_eq!(status.state, "locked");
}

#[tokio::test]
async fn unknown_device_returns_500_plain_text() {
    let resp = app(KEY, demo_devices())
        .oneshot(get("/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Internal Server Error");
}

#[tokio::test]
async fn lower_case_device_id_is_unknown() {
    let resp = app(KEY, demo_devices())
        .oneshot(get(&format!("/{}", DEMO_DEVICE_ID.to_lowercase())))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- auth ---

#[tokio::test]
async fn missing_api_key_returns_403() {
    let resp = app(KEY, demo_devices())
        .oneshot(
            Request::builder()
                .uri(format!("/{DEMO_DEVICE_ID}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wrong_api_key_returns_403() {
    let resp = app(KEY, demo_devices())
        .oneshot(
            Request::builder()
                .uri(format!("/{DEMO_DEVICE_ID}?page=0&lg=5"))
                .header(API_KEY_HEADER, "nope")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// --- history ---

#[tokio::test]
async fn history_pages_are_newest_first() {
    let app = app(KEY, demo_devices());

    let resp = app
        .clone()
        .oneshot(get(&format!("/{DEMO_DEVICE_ID}?page=0&lg=5")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first: Vec<HistoryEntry> = body_json(resp).await;
    assert_eq!(history_ids(&first), vec![12, 11, 10, 9, 8]);

    let resp = app
        .clone()
        .oneshot(get(&format!("/{DEMO_DEVICE_ID}?page=2&lg=5")))
        .await
        .unwrap();
    let last: Vec<HistoryEntry> = body_json(resp).await;
    assert_eq!(history_ids(&last), vec![2, 1]);
}

#[tokio::test]
async fn history_past_the_end_is_empty() {
    let resp = app(KEY, demo_devices())
        .oneshot(get(&format!("/{DEMO_DEVICE_ID}?page=99&lg=10")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let entries: Vec<HistoryEntry> = body_json(resp).await;
    assert!(entries.is_empty());
}

#[tokio::test]
async fn history_without_lg_uses_default_page_size() {
    let resp = app(KEY, demo_devices())
        .oneshot(get(&format!("/{DEMO_DEVICE_ID}?page=0")))
        .await
        .unwrap();

    let entries: Vec<HistoryEntry> = body_json(resp).await;
    assert_eq!(entries.len(), 12);
}

#[tokio::test]
async fn history_with_negative_page_is_rejected() {
    let resp = app(KEY, demo_devices())
        .oneshot(get(&format!("/{DEMO_DEVICE_ID}?page=-1&lg=10")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
