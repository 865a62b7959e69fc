//! Almacén de configuración: constantes del proceso, inmutables tras el arranque.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::{
    camera::{CameraMode, FrameSize},
    errors::{DomainError, DomainResult},
    model::{Confidence, ModelConfig, ModelKind, YoloParams},
    source::SourceKind,
};

pub const SETTINGS_FILE: &str = "settings.toml";

/// Extensiones aceptadas por el selector de imágenes.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoEntry {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 8501, static_dir: "static".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebcamSettings {
    pub device: String,
    pub mode: CameraMode,
}

impl Default for WebcamSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            mode: CameraMode {
                format: "MJPG".into(),
                size: FrameSize { width: 640, height: 480 },
                fps: 30,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    /// Pesos ONNX por tipo de modelo.
    pub detection_model: PathBuf,
    pub segmentation_model: PathBuf,
    /// Directorio servido bajo `/assets`.
    pub assets_dir: PathBuf,
    pub default_image: String,
    pub default_detect_image: String,
    /// Fuente TrueType para las etiquetas; sin ella solo se dibujan cajas.
    pub font_path: PathBuf,
    pub videos: Vec<VideoEntry>,
    pub webcam: WebcamSettings,
    /// Tamaño al que se escalan los frames de vídeo antes de inferir.
    pub display: FrameSize,
    pub default_confidence: u32,
    pub yolo: YoloParams,
    pub ffmpeg_bin: String,
    pub ytdlp_bin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            detection_model: "weights/yolov8n.onnx".into(),
            segmentation_model: "weights/yolov8n-seg.onnx".into(),
            assets_dir: "assets".into(),
            default_image: "office_4.jpg".into(),
            default_detect_image: "office_4_detected.jpg".into(),
            font_path: "assets/Arial.ttf".into(),
            videos: (1..=3)
                .map(|i| VideoEntry {
                    name: format!("video_{i}"),
                    path: format!("videos/video_{i}.mp4").into(),
                })
                .collect(),
            webcam: WebcamSettings::default(),
            display: FrameSize { width: 720, height: 405 },
            default_confidence: 40,
            yolo: YoloParams::default(),
            ffmpeg_bin: "ffmpeg".into(),
            ytdlp_bin: "yt-dlp".into(),
        }
    }
}

impl Settings {
    /// Carga `path` si existe; si no, usa los valores por defecto.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let parsed: Settings = toml::from_str(&raw)?;
            tracing::info!("⚙️ Configuración cargada desde {}", path.display());
            parsed
        } else {
            tracing::info!("⚙️ {} no existe, usando configuración por defecto", path.display());
            Settings::default()
        };
        settings.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err("display size must be non-zero".into());
        }
        if Confidence::from_slider(self.default_confidence).is_err() {
            return Err(format!(
                "default_confidence must be between {} and {}",
                Confidence::MIN,
                Confidence::MAX
            ));
        }
        if self.yolo.input_size == 0 {
            return Err("yolo.input_size must be non-zero".into());
        }
        if self.videos.iter().any(|v| v.name.trim().is_empty()) {
            return Err("video entries need a name".into());
        }
        Ok(())
    }

    pub fn model_config(&self, kind: ModelKind) -> ModelConfig {
        let weights_path = match kind {
            ModelKind::Detection => self.detection_model.clone(),
            ModelKind::Segmentation => self.segmentation_model.clone(),
        };
        ModelConfig { kind, weights_path }
    }

    pub fn sources(&self) -> &'static [SourceKind] {
        &SourceKind::ALL
    }

    pub fn default_confidence(&self) -> Confidence {
        Confidence::from_slider(self.default_confidence).unwrap_or(Confidence::DEFAULT)
    }

    pub fn video_path(&self, name: &str) -> DomainResult<&Path> {
        self.videos
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.path.as_path())
            .ok_or_else(|| DomainError::SourceUnavailable(format!("unknown video '{name}'")))
    }

    pub fn asset_url(name: &str) -> String {
        format!("/assets/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.default_confidence().threshold(), 0.40);
        assert_eq!(
            s.sources(),
            &[SourceKind::Image, SourceKind::Video, SourceKind::Webcam, SourceKind::YouTube]
        );
    }

    #[test]
    fn each_kind_resolves_its_weights() {
        let s = Settings::default();
        assert_eq!(
            s.model_config(ModelKind::Detection).weights_path,
            PathBuf::from("weights/yolov8n.onnx")
        );
        assert_eq!(
            s.model_config(ModelKind::Segmentation).weights_path,
            PathBuf::from("weights/yolov8n-seg.onnx")
        );
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "detection_model = \"m/det.onnx\"\ndefault_confidence = 55\n\n[server]\nport = 9000\n\n[yolo]\niou_threshold = 0.6"
        )
        .unwrap();
        let s = Settings::load(file.path()).unwrap();
        assert_eq!(s.detection_model, PathBuf::from("m/det.onnx"));
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.default_confidence, 55);
        assert_eq!(s.yolo.iou_threshold, 0.6);
        assert_eq!(s.yolo.input_size, 640);
        assert_eq!(s.segmentation_model, PathBuf::from("weights/yolov8n-seg.onnx"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = Settings::load("/definitely/not/here/settings.toml").unwrap();
        assert_eq!(s.server.port, 8501);
    }

    #[test]
    fn invalid_confidence_is_rejected() {
        let s = Settings { default_confidence: 0, ..Settings::default() };
        assert!(s.validate().is_err());
    }

    #[test]
    fn unknown_video_is_source_unavailable() {
        let s = Settings::default();
        assert_eq!(s.video_path("video_2").unwrap(), Path::new("videos/video_2.mp4"));
        assert!(matches!(s.video_path("nope"), Err(DomainError::SourceUnavailable(_))));
    }
}
