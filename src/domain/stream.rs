use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::detection::{Detection, DetectionRecord};
use super::errors::UserMessage;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameMeta {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub infer_ms: f32,
    pub fps_est: f32,
    pub annotated: bool,
    pub detections: Vec<Detection>,
}

/// Columna de la página donde cae una imagen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    Original,
    Detected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    /// Recurso estático servido bajo `/assets`.
    Asset { url: String },
    Jpeg(Vec<u8>),
}

/// Una actualización de la vista.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Image { slot: ImageSlot, caption: String, image: ImageRef },
    Results(Vec<DetectionRecord>),
    Frame { meta: FrameMeta, jpeg: Vec<u8> },
    Message(UserMessage),
    End,
}

pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(&det.label).or_insert(0) += 1;
    }
    counts.iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_labels() {
        let d = |label: &str| Detection {
            x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0, score: 0.5, class_id: 0, label: label.into(),
        };
        assert_eq!(summarize_detections(&[d("person"), d("car"), d("person")]), "1 car, 2 person");
        assert_eq!(summarize_detections(&[]), "");
    }
}
