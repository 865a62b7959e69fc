pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

/// Tamaño máximo de una imagen subida.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn router(state: HttpState, assets_dir: &Path) -> Router {
    Router::new()
        .route("/api/settings", get(routes::get_settings))
        .route("/api/cameras", get(routes::list_cameras))
        .route("/api/models/:kind", get(routes::load_model))
        .route("/api/image", post(routes::render_image))
        .route("/ws/render", get(ws_handler))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::tests::{
        fake_camera_service, service_with, Counters, FakeLoader, FakeMedia,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(fail_load: bool) -> (Router, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let loader = FakeLoader { counters: counters.clone(), fail: fail_load, fail_on_call: None };
        let state = HttpState {
            camera: Arc::new(fake_camera_service()),
            render: Arc::new(service_with(loader, FakeMedia::with_frames(2))),
        };
        (router(state, Path::new("assets")), counters)
    }

    async fn json(res: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([90, 90, 90]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn settings_describe_the_sidebar() {
        let (app, _) = app(false);
        let res = app
            .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["model_kinds"], serde_json::json!(["detection", "segmentation"]));
        assert_eq!(body["sources"], serde_json::json!(["Image", "Video", "Webcam", "YouTube"]));
        assert_eq!(body["confidence"]["default"], 40);
        assert_eq!(body["confidence"]["min"], 1);
        assert_eq!(body["confidence"]["max"], 100);
    }

    #[tokio::test]
    async fn cameras_are_listed_with_their_index() {
        let (app, _) = app(false);
        let res = app
            .oneshot(Request::get("/api/cameras").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json(res).await;
        assert_eq!(body[0]["index"], 4);
        assert_eq!(body[0]["card"], "USB Camera");
    }

    #[tokio::test]
    async fn image_without_upload_returns_default_panels_and_loads_nothing() {
        let (app, counters) = app(false);
        let res = app
            .oneshot(
                Request::post("/api/image?confidence=40&detect=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        let panels = body["panels"].as_array().unwrap();
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0]["caption"], "Default Image");
        assert_eq!(panels[1]["caption"], "Detected Image");
        assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn uploaded_image_is_detected() {
        let (app, counters) = app(false);
        let res = app
            .oneshot(
                Request::post("/api/image?model=segmentation&confidence=25&detect=true")
                    .body(Body::from(png()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json(res).await;
        let kinds: Vec<_> = body["panels"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, ["image", "image", "results"]);
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_a_bad_request() {
        let (app, _) = app(false);
        let res = app
            .oneshot(Request::post("/api/image?confidence=101").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(res).await["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn non_numeric_confidence_is_a_json_bad_request() {
        let (app, counters) = app(false);
        let res = app
            .oneshot(Request::post("/api/image?confidence=abc&detect=true").body(Body::from(png())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json(res).await;
        assert_eq!(body["kind"], "invalid_input");
        assert!(body["message"].as_str().unwrap().contains("abc"));
        assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_model_kind_is_a_bad_request() {
        let (app, _) = app(false);
        let res = app
            .oneshot(Request::get("/api/models/pose").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn model_load_failure_names_the_path() {
        let (app, _) = app(true);
        let res = app
            .oneshot(Request::get("/api/models/detection").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(res).await;
        assert_eq!(body["kind"], "model_load");
        assert!(body["message"].as_str().unwrap().contains("yolov8n.onnx"));
    }
}
