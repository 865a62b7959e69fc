use std::path::Path;

use crate::adapters::onnx::yolo_engine::OnnxYoloEngine;
use crate::application::ports::{InferenceModel, ModelLoaderPort};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelConfig;

/// Cargador de pesos ONNX: valida la ruta y abre la sesión.
pub struct OnnxModelCatalog;

impl OnnxModelCatalog {
    pub fn new() -> Self { Self }

    pub fn validate_model(&self, config: &ModelConfig) -> DomainResult<()> {
        let path = config.weights_path.display().to_string();
        if path.trim().is_empty() {
            return Err(DomainError::ModelLoad { path, reason: "weights path is empty".into() });
        }
        if !Path::new(&config.weights_path).is_file() {
            return Err(DomainError::ModelLoad { path, reason: "model file not found".into() });
        }
        Ok(())
    }
}

impl ModelLoaderPort for OnnxModelCatalog {
    fn load(&self, config: &ModelConfig) -> DomainResult<Box<dyn InferenceModel>> {
        self.validate_model(config)?;
        let engine = OnnxYoloEngine::load(config).map_err(|e| DomainError::ModelLoad {
            path: config.weights_path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(engine))
    }
}
