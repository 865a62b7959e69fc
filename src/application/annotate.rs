use ab_glyph::{FontArc, PxScale};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{
    detection::{Detection, Mask, Prediction},
    errors::{DomainError, DomainResult},
};

/// Paleta por clase (la misma que usan los gráficos de Ultralytics).
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38], [0xFF, 0x9D, 0x97], [0xFF, 0x70, 0x1F], [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31], [0x48, 0xF9, 0x0A], [0x92, 0xCC, 0x17], [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34], [0x00, 0xD4, 0xBB], [0x2C, 0x99, 0xA8], [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93], [0x64, 0x73, 0xFF], [0x00, 0x18, 0xEC], [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85], [0xCB, 0x38, 0xFF], [0xFF, 0x95, 0xC8], [0xFF, 0x37, 0xC7],
];

const JPEG_QUALITY: u8 = 80;
const MASK_ALPHA: f32 = 0.5;

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Dibuja cajas, etiquetas y máscaras sobre una copia de la imagen.
pub struct Annotator {
    font: Option<FontArc>,
    line_width: u32,
}

impl Annotator {
    pub fn new(font_path: &Path) -> Self {
        let font = std::fs::read(font_path)
            .ok()
            .and_then(|bytes| FontArc::try_from_vec(bytes).ok());
        match &font {
            Some(_) => info!("🔤 Fuente de etiquetas: {}", font_path.display()),
            None => warn!("Fuente {} no disponible, se dibujan cajas sin texto", font_path.display()),
        }
        Self { font, line_width: 2 }
    }

    pub fn without_font() -> Self {
        Self { font: None, line_width: 2 }
    }

    pub fn plot(&self, image: &RgbImage, prediction: &Prediction) -> RgbImage {
        let mut out = image.clone();
        for (det, mask) in prediction.detections.iter().zip(&prediction.masks) {
            blend_mask(&mut out, mask, class_color(det.class_id));
        }
        for det in &prediction.detections {
            self.draw_box(&mut out, det);
        }
        out
    }

    fn draw_box(&self, img: &mut RgbImage, det: &Detection) {
        let color = class_color(det.class_id);
        let x = det.x1.round() as i32;
        let y = det.y1.round() as i32;
        let w = (det.x2 - det.x1).round().max(1.0) as u32;
        let h = (det.y2 - det.y1).round().max(1.0) as u32;

        // Grosor: rectángulos concéntricos hacia dentro.
        for t in 0..self.line_width.min(w / 2).min(h / 2).max(1) {
            let rect = Rect::at(x + t as i32, y + t as i32).of_size(w - 2 * t, h - 2 * t);
            draw_hollow_rect_mut(img, rect, color);
        }

        let Some(font) = &self.font else { return };
        let text = format!("{} {:.2}", det.label, det.score);
        let scale = PxScale::from(16.0);
        let (tw, th) = text_size(scale, font, &text);
        let ty = if y >= th as i32 + 2 { y - th as i32 - 2 } else { y };
        draw_filled_rect_mut(img, Rect::at(x, ty).of_size(tw + 4, th + 2), color);
        draw_text_mut(img, Rgb([255, 255, 255]), x + 2, ty, scale, font, &text);
    }
}

fn blend_mask(img: &mut RgbImage, mask: &Mask, color: Rgb<u8>) {
    if mask.width != img.width() || mask.height != img.height() {
        return;
    }
    for (pixel, &m) in img.pixels_mut().zip(&mask.data) {
        if m > 127 {
            for c in 0..3 {
                let v = pixel[c] as f32 * (1.0 - MASK_ALPHA) + color[c] as f32 * MASK_ALPHA;
                pixel[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

pub fn encode_jpeg(img: &RgbImage) -> DomainResult<Vec<u8>> {
    let mut jpeg = Vec::new();
    let mut enc = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    enc.encode(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| DomainError::Inference(format!("jpeg encoding failed: {e}")))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection { x1, y1, x2, y2, score: 0.8, class_id: 2, label: "car".into() }
    }

    #[test]
    fn box_edges_take_the_class_color() {
        let img = RgbImage::new(40, 40);
        let pred = Prediction { detections: vec![car(5.0, 5.0, 30.0, 25.0)], masks: vec![] };
        let out = Annotator::without_font().plot(&img, &pred);
        assert_eq!(*out.get_pixel(5, 5), class_color(2));
        assert_eq!(*out.get_pixel(6, 6), class_color(2));
        assert_eq!(*out.get_pixel(15, 15), Rgb([0, 0, 0]));
        // la imagen original no se toca
        assert_eq!(*img.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn masks_are_blended_inside_only() {
        let img = RgbImage::from_pixel(4, 1, Rgb([0, 0, 0]));
        let mask = Mask { width: 4, height: 1, data: vec![255, 0, 255, 0] };
        let pred = Prediction { detections: vec![car(0.0, 0.0, 1.0, 1.0)], masks: vec![mask] };
        let mut out = img.clone();
        blend_mask(&mut out, &pred.masks[0], Rgb([200, 100, 50]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([100, 50, 25]));
        assert_eq!(*out.get_pixel(1, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn degenerate_boxes_do_not_panic() {
        let img = RgbImage::new(10, 10);
        let pred = Prediction { detections: vec![car(9.6, 9.6, 9.7, 9.7)], masks: vec![] };
        let _ = Annotator::without_font().plot(&img, &pred);
    }

    #[test]
    fn jpeg_output_decodes() {
        let img = RgbImage::from_pixel(16, 8, Rgb([10, 200, 30]));
        let jpeg = encode_jpeg(&img).unwrap();
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (16, 8));
    }
}
