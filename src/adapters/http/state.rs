use std::sync::Arc;
use crate::application::services::{CameraService, RenderService};

/// Estado compartido para los manejadores HTTP de Axum.
/// Contiene los servicios (casos de uso), nunca adaptadores directos.
#[derive(Clone)]
pub struct HttpState {
    /// Inventario de webcams para el selector.
    pub camera: Arc<CameraService>,
    /// Ciclos de render: imagen, vídeo, webcam y YouTube.
    pub render: Arc<RenderService>,
}
