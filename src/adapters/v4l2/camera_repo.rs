use async_trait::async_trait;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::CameraCatalogPort;
use crate::domain::camera::{CameraId, CameraInfo};
use crate::domain::errors::DomainResult;

/// Inventario de webcams V4L2 que admiten captura.
pub struct V4l2CameraCatalog;

impl V4l2CameraCatalog {
    pub fn new() -> Self { Self }
}

#[async_trait]
impl CameraCatalogPort for V4l2CameraCatalog {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        let cameras = tokio::task::spawn_blocking(enumerate).await.unwrap_or_default();
        tracing::debug!("🎥 {} cámaras detectadas", cameras.len());
        Ok(cameras)
    }
}

fn enumerate() -> Vec<CameraInfo> {
    let mut out = Vec::new();
    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        let Ok(dev) = Device::with_path(&path) else { continue };
        let Ok(caps) = dev.query_caps() else { continue };
        // Los nodos de metadatos no sirven para capturar
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            continue;
        }
        out.push(CameraInfo {
            id: CameraId { path },
            name: node.name().unwrap_or_else(|| "Unknown".to_string()),
            driver: caps.driver,
            card: caps.card,
            bus: caps.bus,
        });
    }
    out.sort_by(|a, b| a.id.path.cmp(&b.id.path));
    out
}
