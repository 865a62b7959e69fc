use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;

use crate::domain::{
    camera::{CameraInfo, CameraMode},
    detection::Prediction,
    errors::DomainResult,
    model::{ModelConfig, ModelInfo, YoloParams},
};

#[async_trait]
pub trait CameraCatalogPort: Send + Sync {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>>;
}

/// Modelo en memoria. Pertenece a un único ciclo de render.
pub trait InferenceModel: Send {
    fn info(&self) -> ModelInfo;
    fn predict(&mut self, image: &RgbImage, params: &YoloParams) -> DomainResult<Prediction>;
}

pub trait ModelLoaderPort: Send + Sync {
    fn load(&self, config: &ModelConfig) -> DomainResult<Box<dyn InferenceModel>>;
}

/// Fuente de frames secuencial. `Ok(None)` indica que la fuente se agotó.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> DomainResult<Option<RgbImage>>;
}

/// Apertura de fuentes de vídeo (fichero, cámara o URL de stream).
pub trait MediaPort: Send + Sync {
    fn open_file(&self, path: &Path) -> DomainResult<Box<dyn FrameSource>>;
    fn open_stream(&self, url: &str) -> DomainResult<Box<dyn FrameSource>>;
    fn open_camera(&self, device: &str, mode: &CameraMode) -> DomainResult<Box<dyn FrameSource>>;
}

/// Resuelve una URL de página de vídeo a una URL reproducible.
pub trait StreamResolverPort: Send + Sync {
    fn resolve(&self, url: &str) -> DomainResult<String>;
}
