use super::*;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{AspectRatio, ModifiableParameter, Seed, ShotType};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl ServerState {
    async fn record(&self, route: impl Into<String>, body: Value) {
        self.requests.lock().await.push((route.into(), body));
    }
}

fn shot_json(shot_id: &str, scene: &str) -> Value {
    json!({
        "shot_id": shot_id,
        "scene_description": scene,
        "shot_type": "medium shot",
        "aspect_ratio": "16:9",
        "seed": 4242,
        "image_url": format!("https://cdn.example/{shot_id}.png"),
        "hdr_16bit_path": null,
        "hdr_comparison_path": null,
        "created_at": "2025-12-16T14:30:22.123456",
        "modified_at": null,
        "tags": []
    })
}

async fn handle_status() -> Json<Value> {
    Json(json!({
        "message": "Cinematics API",
        "version": "1.0.0",
        "status": "operational",
        "services": {"generator": "connected", "hdr_pipeline": "ready"}
    }))
}

async fn handle_create(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.record("create", body.clone()).await;
    let mut shot = shot_json("shot_1", body["scene_description"].as_str().unwrap_or_default());
    shot["shot_type"] = body["shot_type"].clone();
    shot["aspect_ratio"] = body["aspect_ratio"].clone();
    Json(json!({
        "success": true,
        "shot_id": "shot_1",
        "shot": shot,
        "message": "Shot created successfully. HDR processing in progress."
    }))
}

async fn handle_list() -> Json<Value> {
    Json(json!({
        "shots": [
            {"shot_id": "shot_2", "shot_type": "close-up", "scene_description": "B",
             "created_at": "2025-12-16T15:00:00", "image_url": "https://cdn.example/2.png"},
            {"shot_id": "shot_1", "shot_type": "medium shot", "scene_description": "A",
             "created_at": "2025-12-16T14:30:22", "image_url": "https://cdn.example/1.png"}
        ],
        "total": 2
    }))
}

async fn handle_get(Path(shot_id): Path<String>) -> impl IntoResponse {
    if shot_id == "shot_1" {
        (StatusCode::OK, Json(json!({ "shot": shot_json("shot_1", "A") })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Shot not found" })),
        )
    }
}

async fn handle_modify(
    State(state): State<ServerState>,
    Path(shot_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(format!("modify:{shot_id}"), body.clone()).await;
    let mut shot = shot_json(&shot_id, "A");
    let parameter = body["parameter"].as_str().unwrap_or_default().to_string();
    shot[parameter.as_str()] = body["value"].clone();
    shot["image_url"] = json!("https://cdn.example/modified.png");
    Json(json!({
        "success": true,
        "original_shot_id": shot_id,
        "parameter_changed": parameter,
        "shot": shot
    }))
}

async fn handle_refine(
    State(state): State<ServerState>,
    Path(shot_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(format!("refine:{shot_id}"), body).await;
    Json(json!({ "shot": shot_json(&format!("{shot_id}_refined_120000"), "A (refined)") }))
}

async fn handle_slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "shots": [] }))
}

async fn handle_garbage() -> &'static str {
    "<html>gateway</html>"
}

async fn handle_validation_error() -> impl IntoResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"detail": [{"loc": ["body", "value"], "msg": "field required"}]})),
    )
}

async fn spawn_backend() -> (String, ServerState) {
    let state = ServerState::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/", get(handle_status))
        .route("/api/shots", get(handle_list))
        .route("/api/shots/create", post(handle_create))
        .route("/api/shots/:shot_id", get(handle_get))
        .route("/api/shots/:shot_id/modify", post(handle_modify))
        .route("/api/shots/:shot_id/refine", post(handle_refine))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

async fn spawn_misbehaving_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/shots", get(handle_slow))
        .route("/api/shots/:shot_id", get(handle_garbage))
        .route("/api/shots/:shot_id/modify", post(handle_validation_error));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn client_for(base_url: &str) -> GenerationClient {
    GenerationClient::new(&Settings {
        base_url: base_url.to_string(),
        request_timeout_secs: 1,
        ..Settings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn create_echoes_requested_fields_and_sends_neutral_hdr() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);

    let spec = ShotSpec::new("A")
        .with_shot_type(ShotType::Medium)
        .with_aspect_ratio(AspectRatio::Widescreen);
    let shot = client.create_shot(&spec).await.expect("create");

    assert_eq!(shot.scene_description, "A");
    assert_eq!(shot.shot_type, "medium shot");
    assert_eq!(shot.aspect_ratio, "16:9");
    assert!(!shot.shot_id.is_empty());
    assert_eq!(shot.seed, Some(Seed(4242)));

    let requests = state.requests.lock().await;
    let (route, body) = &requests[0];
    assert_eq!(route, "create");
    assert_eq!(body["apply_hdr"], true);
    assert_eq!(body["hdr_preset"], "neutral");
    assert_eq!(
        body["hdr_settings"],
        json!({"exposure": 0.0, "contrast": 1.0, "saturation": 1.0, "temperature": 0.0})
    );
}

#[tokio::test]
async fn create_with_blank_description_never_reaches_the_network() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);

    let err = client
        .create_shot(&ShotSpec::new("   "))
        .await
        .expect_err("must fail");

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(state.requests.lock().await.is_empty());
}

#[tokio::test]
async fn list_preserves_backend_order() {
    let (base_url, _) = spawn_backend().await;
    let shots = client_for(&base_url).list_shots().await.expect("list");
    let ids: Vec<&str> = shots.iter().map(|s| s.shot_id.as_str()).collect();
    assert_eq!(ids, ["shot_2", "shot_1"]);
}

#[tokio::test]
async fn modify_posts_parameter_and_value_to_shot_path() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);
    let change = ParameterChange::parse("camera_angle", "low-angle").expect("change");

    let shot = client
        .modify_parameter(&ShotId::from("shot_1"), change)
        .await
        .expect("modify");

    assert_eq!(shot.camera_angle.as_deref(), Some("low-angle"));
    assert_eq!(shot.seed, Some(Seed(4242)));
    let requests = state.requests.lock().await;
    let (route, body) = &requests[0];
    assert_eq!(route, "modify:shot_1");
    assert_eq!(
        body,
        &json!({"shot_id": "shot_1", "parameter": "camera_angle", "value": "low-angle"})
    );
    assert_eq!(
        ModifiableParameter::CameraAngle.as_str(),
        body["parameter"].as_str().expect("parameter")
    );
}

#[tokio::test]
async fn refine_passes_prompt_through() {
    let (base_url, state) = spawn_backend().await;
    let shot = client_for(&base_url)
        .refine_shot(&ShotId::from("shot_1"), "  add rain  ", true)
        .await
        .expect("refine");

    assert_eq!(shot.shot_id.as_str(), "shot_1_refined_120000");
    let requests = state.requests.lock().await;
    assert_eq!(requests[0].1["refinement_prompt"], "add rain");
    assert_eq!(requests[0].1["apply_hdr"], true);
}

#[tokio::test]
async fn missing_shot_surfaces_backend_detail() {
    let (base_url, _) = spawn_backend().await;
    let err = client_for(&base_url)
        .get_shot(&ShotId::from("nope"))
        .await
        .expect_err("must fail");

    match &err {
        ClientError::Backend { status, detail, .. } => {
            assert_eq!(*status, 404);
            assert_eq!(detail.as_deref(), Some("Shot not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(err.user_message("Failed to load shot"), "Shot not found");
}

#[tokio::test]
async fn slow_backend_is_reported_as_retryable_timeout() {
    let base_url = spawn_misbehaving_backend().await;
    let err = client_for(&base_url)
        .list_shots()
        .await
        .expect_err("must time out");

    assert!(err.is_timeout(), "unexpected error: {err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn non_json_success_body_is_a_decode_error() {
    let base_url = spawn_misbehaving_backend().await;
    let err = client_for(&base_url)
        .get_shot(&ShotId::from("shot_1"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, ClientError::Decode { .. }), "{err:?}");
}

#[tokio::test]
async fn field_validation_details_are_flattened() {
    let base_url = spawn_misbehaving_backend().await;
    let change = ParameterChange::parse("color_scheme", "vibrant").expect("change");
    let err = client_for(&base_url)
        .modify_parameter(&ShotId::from("shot_1"), change)
        .await
        .expect_err("must fail");
    assert_eq!(err.detail(), Some("value: field required"));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client_for(&format!("http://{addr}"))
        .list_shots()
        .await
        .expect_err("must fail");
    assert!(
        matches!(err, ClientError::Transport { .. } | ClientError::Timeout { .. }),
        "{err:?}"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn health_reports_service_status() {
    let (base_url, _) = spawn_backend().await;
    let status = client_for(&base_url).health().await.expect("health");
    assert!(status.is_operational());
    assert_eq!(status.services.get("hdr_pipeline").map(String::as_str), Some("ready"));
}

#[test]
fn resolver_joins_relative_paths_onto_base() {
    let resolver = ArtifactResolver::new(Url::parse("http://localhost:8000/").expect("url"));

    assert_eq!(
        resolver
            .output_url("outputs/hdr/shot_1_comparison.png")
            .expect("url")
            .as_str(),
        "http://localhost:8000/outputs/hdr/shot_1_comparison.png"
    );
    assert_eq!(
        resolver.output_url("/outputs/a.tiff").expect("url").as_str(),
        "http://localhost:8000/outputs/a.tiff"
    );
    assert_eq!(
        resolver
            .output_url("https://cdn.example/x.png")
            .expect("url")
            .as_str(),
        "https://cdn.example/x.png"
    );
    assert_eq!(
        resolver.download_url("shot 1.tiff").expect("url").as_str(),
        "http://localhost:8000/api/download/shot%201.tiff"
    );
}

#[test]
fn resolver_keeps_base_path_prefix() {
    let resolver = ArtifactResolver::new(Url::parse("http://host/studio/").expect("url"));
    assert_eq!(
        resolver.output_url("outputs/a.png").expect("url").as_str(),
        "http://host/studio/outputs/a.png"
    );
    assert_eq!(
        resolver.download_url("a.png").expect("url").as_str(),
        "http://host/studio/api/download/a.png"
    );
}
