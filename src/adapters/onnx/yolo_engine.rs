use anyhow::{anyhow, Result};
use image::{imageops::FilterType, ImageBuffer, Luma, RgbImage};
use ndarray::{s, Array, Array4, ArrayD, ArrayView3, ArrayViewD, Axis, Ix2, Ix3, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::{DynValue, Value};
use std::fs;
use tracing::{info, warn};

use crate::application::ports::InferenceModel;
use crate::domain::detection::{Detection, Mask, Prediction};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::{ModelConfig, ModelInfo, ModelKind, YoloParams};

pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

pub struct OnnxYoloEngine {
    session: Session,
    kind: ModelKind,
    path: String,
    names: Vec<String>,
    segmentation: bool,
}

impl OnnxYoloEngine {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let path = config.weights_path.display().to_string();
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        // CUDA es opcional: si está disponible se registra, si no continuamos en CPU.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        let model_bytes = fs::read(&config.weights_path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        // Los exportes de Ultralytics guardan las clases en los metadatos ("names").
        let names = session
            .metadata()
            .ok()
            .and_then(|m| m.custom("names").ok().flatten())
            .map(|raw| parse_class_names(&raw))
            .filter(|names| !names.is_empty())
            .unwrap_or_else(|| COCO_CLASSES.iter().map(|c| c.to_string()).collect());

        let segmentation = config.kind == ModelKind::Segmentation;
        info!("✅ Modelo {} cargado: {} clases, segmentación={}", path, names.len(), segmentation);

        Ok(Self { session, kind: config.kind, path, names, segmentation })
    }

    pub fn infer(&mut self, rgb: &RgbImage, params: &YoloParams) -> Result<Prediction> {
        let imgsz = params.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Value::from_array((input_shape, input.into_raw_vec_and_offset().0))?;

        let (preds, protos) = {
            let outputs = self.session.run(ort::inputs![input_tensor])?;
            let preds = to_array(&outputs[0])?;
            // Dos salidas (cajas + prototipos) indican un modelo de segmentación
            let protos = if outputs.len() > 1 { Some(to_array(&outputs[1])?) } else { None };
            if (outputs.len() > 1) != self.segmentation {
                warn!("El modelo {} no coincide con la tarea {}: {} salidas", self.path, self.kind, outputs.len());
            }
            (preds, protos)
        };

        decode_output(
            preds.view(),
            protos.as_ref().map(|p| p.view()),
            (rgb.width(), rgb.height()),
            params,
            &self.names,
        )
    }
}

impl InferenceModel for OnnxYoloEngine {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            kind: self.kind,
            path: self.path.clone(),
            num_classes: self.names.len(),
            segmentation: self.segmentation,
        }
    }

    fn predict(&mut self, image: &RgbImage, params: &YoloParams) -> DomainResult<Prediction> {
        self.infer(image, params).map_err(|e| DomainError::Inference(e.to_string()))
    }
}

fn to_array(value: &DynValue) -> Result<ArrayD<f32>> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
    Ok(ArrayViewD::from_shape(IxDyn(&dims), data)?.to_owned())
}

/// `"{0: 'person', 1: 'bicycle'}"` -> `["person", "bicycle"]`.
pub(crate) fn parse_class_names(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(_, name)| name.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Decodifica la salida `[1, 4 + nc (+ nm), N]` de YOLOv8/11.
/// Con `protos` (`[1, nm, mh, mw]`) genera además una máscara por detección.
pub(crate) fn decode_output(
    preds: ArrayViewD<f32>,
    protos: Option<ArrayViewD<f32>>,
    (src_w, src_h): (u32, u32),
    params: &YoloParams,
    names: &[String],
) -> Result<Prediction> {
    if preds.ndim() != 3 {
        return Err(anyhow!("unexpected output rank {:?}", preds.shape()));
    }
    let view = preds.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
    let (rows, num_candidates) = (view.shape()[0], view.shape()[1]);

    let protos: Option<ArrayView3<f32>> = match protos {
        Some(p) if p.ndim() == 4 => Some(p.index_axis_move(Axis(0), 0).into_dimensionality::<Ix3>()?),
        Some(p) => return Err(anyhow!("unexpected mask prototype shape {:?}", p.shape())),
        None => None,
    };
    let nm = protos.map(|p| p.shape()[0]).unwrap_or(0);
    let nc = rows
        .checked_sub(4 + nm)
        .filter(|&nc| nc > 0)
        .ok_or_else(|| anyhow!("output has {rows} rows, not enough for boxes and {nm} mask coefficients"))?;

    let imgsz = params.input_size as f32;
    let sx = src_w as f32 / imgsz;
    let sy = src_h as f32 / imgsz;

    let mut candidates: Vec<(Detection, Vec<f32>)> = Vec::new();
    for i in 0..num_candidates {
        let scores = view.slice(s![4..4 + nc, i]);
        let Some((class_id, &max_score)) = scores.indexed_iter().max_by(|(_, a), (_, b)| a.total_cmp(b)) else {
            continue;
        };
        if max_score < params.conf_threshold {
            continue;
        }

        let cx = view[[0, i]];
        let cy = view[[1, i]];
        let w = view[[2, i]];
        let h = view[[3, i]];
        let det = Detection {
            x1: ((cx - w / 2.0) * sx).clamp(0.0, src_w as f32),
            y1: ((cy - h / 2.0) * sy).clamp(0.0, src_h as f32),
            x2: ((cx + w / 2.0) * sx).clamp(0.0, src_w as f32),
            y2: ((cy + h / 2.0) * sy).clamp(0.0, src_h as f32),
            score: max_score,
            class_id,
            label: names.get(class_id).cloned().unwrap_or_else(|| format!("class {class_id}")),
        };
        let coefs = if nm > 0 { view.slice(s![4 + nc.., i]).to_vec() } else { Vec::new() };
        candidates.push((det, coefs));
    }

    non_max_suppression(&mut candidates, params.iou_threshold);
    candidates.truncate(params.max_detections);

    let mut masks = Vec::new();
    if let Some(protos) = protos {
        for (det, coefs) in &candidates {
            masks.push(build_mask(coefs, protos, det, src_w, src_h)?);
        }
    }

    Ok(Prediction { detections: candidates.into_iter().map(|(d, _)| d).collect(), masks })
}

/// NMS voraz independiente de la clase, ordenando por puntuación.
pub(crate) fn non_max_suppression<T>(xs: &mut Vec<(Detection, T)>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.0.score.total_cmp(&a.0.score));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].0.iou(&xs[index].0) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

fn build_mask(
    coefs: &[f32],
    protos: ArrayView3<f32>,
    det: &Detection,
    src_w: u32,
    src_h: u32,
) -> Result<Mask> {
    let (nm, mh, mw) = protos.dim();
    let coefs = Array::from_shape_vec((1, nm), coefs.to_vec())?;
    let protos = protos.to_shape((nm, mh * mw))?;
    let logits = coefs.dot(&protos);

    let values: Vec<f32> = logits.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect();
    let small: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(mw as u32, mh as u32, values)
        .ok_or_else(|| anyhow!("mask buffer does not match {mw}x{mh}"))?;
    let full = image::imageops::resize(&small, src_w, src_h, FilterType::Triangle);

    let mut data = Vec::with_capacity((src_w * src_h) as usize);
    for (x, y, p) in full.enumerate_pixels() {
        let (xf, yf) = (x as f32, y as f32);
        let inside = xf >= det.x1 && xf <= det.x2 && yf >= det.y1 && yf <= det.y2;
        data.push(if inside && p[0] > 0.5 { 255 } else { 0 });
    }
    Ok(Mask { width: src_w, height: src_h, data })
}
