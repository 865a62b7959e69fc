mod adapters;
mod application;
mod config;
mod domain;

use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use crate::adapters::{
    http::{router, state::HttpState},
    media::{youtube::YtDlpResolver, MediaAdapter},
    onnx::model_catalog::OnnxModelCatalog,
    v4l2::camera_repo::V4l2CameraCatalog,
};
use crate::application::{
    annotate::Annotator,
    services::{CameraService, RenderService},
};
use crate::config::{Settings, SETTINGS_FILE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logs (RUST_LOG=info por defecto)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Arc::new(Settings::load(SETTINGS_FILE)?);
    tracing::info!("🎞️ {} vídeos en catálogo, webcam por defecto {}", settings.videos.len(), settings.webcam.device);

    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Adaptadores, compartidos entre servicios y servidor HTTP
    let camera_cat = Arc::new(V4l2CameraCatalog::new());
    let model_cat = Arc::new(OnnxModelCatalog::new());
    let media = Arc::new(MediaAdapter::new(settings.ffmpeg_bin.clone(), settings.display));
    let resolver = Arc::new(YtDlpResolver::new(settings.ytdlp_bin.clone()));
    let annotator = Arc::new(Annotator::new(&settings.font_path));

    // 3. Servicios (casos de uso)
    let camera_service = Arc::new(CameraService::new(camera_cat));
    let render_service = Arc::new(RenderService::new(
        settings.clone(),
        model_cat,
        media,
        resolver,
        annotator,
    ));

    let state = HttpState {
        camera: camera_service,
        render: render_service,
    };

    // 4. Router y archivos estáticos
    let app = router(state, &settings.assets_dir)
        .fallback_service(ServeDir::new(&settings.server.static_dir));

    // 5. Servidor
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("🚀 Servidor YOLO iniciado en http://{}", addr);
    tracing::info!("📂 Archivos estáticos servidos desde '{}'", settings.server.static_dir.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Servidor detenido");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("No se pudo escuchar Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
