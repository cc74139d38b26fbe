use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use entanglement_core::SnapshotBuilder;
use entanglement_exporter::*;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

async fn get(state: AppState, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn metrics_endpoint_exposes_published_gauges() {
    let mut b = SnapshotBuilder::new();
    b.add_group("proj-a", "web", 4);
    b.add_group("proj-a", "app", 0);
    b.add_references("proj-a", "app", "web", 3);
    let evaluations = evaluate_snapshot(&b.finish(), 50);

    let metrics = Arc::new(EntanglementMetrics::new().unwrap());
    metrics.publish(&evaluations);

    let (status, content_type, body) = get(AppState::new(metrics), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
    assert!(body.contains(r#"security_group_max_entanglement{project_id="proj-a"} 12"#));
    assert!(body.contains(r#"security_group_total_entanglement{project_id="proj-a"} 12"#));
    assert!(body.contains("security_group_entanglement_cycles_total 1"));
}

#[tokio::test]
async fn health_reports_cycle_state() {
    let metrics = Arc::new(EntanglementMetrics::new().unwrap());
    let (status, _, body) = get(AppState::new(metrics), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["cycles"], 0);
    assert_eq!(json["last_cycle_projects"], 0);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let metrics = Arc::new(EntanglementMetrics::new().unwrap());
    let (status, _, _) = get(AppState::new(metrics), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
