use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
    pub label: String,
}

impl Detection {
    /// Fila cruda `[x1, y1, x2, y2, score, class]`, tal cual se lista en "Detection Results".
    pub fn data(&self) -> [f32; 6] {
        [self.x1, self.y1, self.x2, self.y2, self.score, self.class_id as f32]
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }
}

/// Máscara binaria (0/255) del tamaño de la imagen original.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Resultado de una invocación del modelo sobre una imagen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub detections: Vec<Detection>,
    /// Vacío en modelos de detección; alineado con `detections` en segmentación.
    pub masks: Vec<Mask>,
}

/// Registro serializable para el panel "Detection Results".
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DetectionRecord {
    pub label: String,
    pub data: [f32; 6],
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        Self { label: d.label.clone(), data: d.data() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection { x1, y1, x2, y2, score: 0.9, class_id: 2, label: "car".into() }
    }

    #[test]
    fn data_row_matches_box_layout() {
        assert_eq!(det(1.0, 2.0, 3.0, 4.0).data(), [1.0, 2.0, 3.0, 4.0, 0.9, 2.0]);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = det(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&det(20.0, 20.0, 30.0, 30.0)), 0.0);
        let half = det(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&half) - 50.0 / 150.0).abs() < 1e-6);
    }
}
