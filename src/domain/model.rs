use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Detection,
    Segmentation,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Detection, ModelKind::Segmentation];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Detection => "detection",
            ModelKind::Segmentation => "segmentation",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detection" => Ok(ModelKind::Detection),
            "segmentation" => Ok(ModelKind::Segmentation),
            other => Err(DomainError::InvalidInput(format!("unknown model type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub weights_path: PathBuf,
}

/// Lo que el cargador sabe del modelo una vez en memoria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub kind: ModelKind,
    pub path: String,
    pub num_classes: usize,
    pub segmentation: bool,
}

/// Posición del slider de confianza (1..=100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confidence(u8);

impl Confidence {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;
    pub const DEFAULT: Confidence = Confidence(40);

    pub fn from_slider(position: u32) -> DomainResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&position) {
            return Err(DomainError::InvalidInput(format!(
                "confidence must be between {} and {}, got {position}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(position as u8))
    }

    pub fn position(&self) -> u32 {
        self.0 as u32
    }

    /// Umbral efectivo que recibe la inferencia.
    pub fn threshold(&self) -> f32 {
        self.0 as f32 / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YoloParams {
    pub input_size: u32,        // 640 típico
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,  // p.ej. 300
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

impl YoloParams {
    pub fn with_confidence(&self, confidence: Confidence) -> Self {
        Self { conf_threshold: confidence.threshold(), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_slider_position_maps_to_hundredths() {
        for pos in 1..=100u32 {
            let c = Confidence::from_slider(pos).unwrap();
            assert_eq!(c.threshold(), pos as f32 / 100.0);
            assert_eq!(YoloParams::default().with_confidence(c).conf_threshold, pos as f32 / 100.0);
        }
    }

    #[test]
    fn slider_rejects_out_of_range() {
        assert!(matches!(Confidence::from_slider(0), Err(DomainError::InvalidInput(_))));
        assert!(matches!(Confidence::from_slider(101), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn model_kind_parses_radio_labels() {
        assert_eq!("Detection".parse::<ModelKind>().unwrap(), ModelKind::Detection);
        assert_eq!(" segmentation ".parse::<ModelKind>().unwrap(), ModelKind::Segmentation);
        assert!(matches!("pose".parse::<ModelKind>(), Err(DomainError::InvalidInput(_))));
    }
}
