use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::config::{Settings, IMAGE_EXTENSIONS};
use crate::domain::{
    detection::DetectionRecord,
    errors::{DomainError, DomainResult, UserMessage},
    model::{Confidence, ModelKind},
    source::{SourceKind, SourceSelection},
    stream::{FrameMeta, ImageRef, ImageSlot, Panel},
};

/// Selecciones de la barra lateral, tal como llegan en la query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderQuery {
    pub source: Option<String>,
    pub model: Option<String>,
    // Texto crudo: un valor mal formado debe acabar en `InvalidInput`, no en un rechazo del extractor
    pub confidence: Option<String>,
    pub detect: Option<String>,
    pub video: Option<String>,
    pub device: Option<String>,
    pub url: Option<String>,
}

/// Un ciclo de render completamente resuelto.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub model: ModelKind,
    pub confidence: Confidence,
    pub selection: SourceSelection,
}

impl RenderQuery {
    pub fn into_request(self, settings: &Settings, upload: Option<Vec<u8>>) -> DomainResult<RenderRequest> {
        let source: SourceKind = self
            .source
            .as_deref()
            .ok_or_else(|| DomainError::InvalidSelection("no source selected".into()))?
            .parse()?;
        let model = match self.model.as_deref() {
            Some(raw) => raw.parse()?,
            None => ModelKind::Detection,
        };
        let confidence = match self.confidence.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let position = raw.parse::<u32>().map_err(|_| {
                    DomainError::InvalidInput(format!("confidence must be a whole number, got '{raw}'"))
                })?;
                Confidence::from_slider(position)?
            }
            _ => settings.default_confidence(),
        };
        let detect = parse_flag(self.detect.as_deref())?;

        let selection = match source {
            SourceKind::Image => SourceSelection::Image {
                upload: upload.filter(|b| !b.is_empty()),
                detect,
            },
            SourceKind::Video => {
                let name = self
                    .video
                    .or_else(|| settings.videos.first().map(|v| v.name.clone()))
                    .ok_or_else(|| DomainError::SourceUnavailable("no stored videos configured".into()))?;
                SourceSelection::Video { name }
            }
            SourceKind::Webcam => SourceSelection::Webcam {
                device: self.device.filter(|d| !d.trim().is_empty()),
            },
            SourceKind::YouTube => SourceSelection::YouTube { url: self.url.unwrap_or_default() },
        };

        Ok(RenderRequest { model, confidence, selection })
    }
}

fn parse_flag(raw: Option<&str>) -> DomainResult<bool> {
    match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") | Some("off") => Ok(false),
        Some("true") | Some("1") | Some("on") => Ok(true),
        Some(other) => Err(DomainError::InvalidInput(format!("detect must be true or false, got '{other}'"))),
    }
}

/// Forma serializada de un `Panel`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelView {
    Image { slot: ImageSlot, caption: String, src: String },
    Results { count: usize, records: Vec<DetectionRecord> },
    Frame { meta: FrameMeta },
    Message(UserMessage),
    End,
}

impl PanelView {
    /// Devuelve la vista JSON y, para frames de vídeo, el JPEG aparte en binario.
    pub fn from_panel(panel: Panel) -> (PanelView, Option<Vec<u8>>) {
        match panel {
            Panel::Image { slot, caption, image } => {
                let src = match image {
                    ImageRef::Asset { url } => url,
                    ImageRef::Jpeg(bytes) => {
                        format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(bytes))
                    }
                };
                (PanelView::Image { slot, caption, src }, None)
            }
            Panel::Results(records) => (PanelView::Results { count: records.len(), records }, None),
            Panel::Frame { meta, jpeg } => (PanelView::Frame { meta }, Some(jpeg)),
            Panel::Message(msg) => (PanelView::Message(msg), None),
            Panel::End => (PanelView::End, None),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderResponse {
    pub panels: Vec<PanelView>,
}

impl From<Vec<Panel>> for RenderResponse {
    fn from(panels: Vec<Panel>) -> Self {
        Self { panels: panels.into_iter().map(|p| PanelView::from_panel(p).0).collect() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SliderView {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

/// Lo que la barra lateral necesita para pintarse.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub model_kinds: Vec<&'static str>,
    pub sources: Vec<&'static str>,
    pub confidence: SliderView,
    pub videos: Vec<String>,
    pub webcam_device: String,
    pub image_extensions: Vec<&'static str>,
    pub default_image: String,
    pub default_detect_image: String,
}

impl From<&Settings> for SettingsView {
    fn from(s: &Settings) -> Self {
        Self {
            model_kinds: ModelKind::ALL.iter().map(|k| k.as_str()).collect(),
            sources: s.sources().iter().map(|k| k.label()).collect(),
            confidence: SliderView {
                min: Confidence::MIN,
                max: Confidence::MAX,
                default: s.default_confidence().position(),
            },
            videos: s.videos.iter().map(|v| v.name.clone()).collect(),
            webcam_device: s.webcam.device.clone(),
            image_extensions: IMAGE_EXTENSIONS.to_vec(),
            default_image: Settings::asset_url(&s.default_image),
            default_detect_image: Settings::asset_url(&s.default_detect_image),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraView {
    pub index: u32,
    pub card: String,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(source: &str) -> RenderQuery {
        RenderQuery { source: Some(source.into()), ..Default::default() }
    }

    #[test]
    fn image_query_uses_settings_defaults() {
        let req = query("Image").into_request(&Settings::default(), None).unwrap();
        assert_eq!(req.model, ModelKind::Detection);
        assert_eq!(req.confidence.position(), 40);
        assert_eq!(req.selection, SourceSelection::Image { upload: None, detect: false });
    }

    #[test]
    fn empty_upload_counts_as_no_upload() {
        let q = RenderQuery { detect: Some("true".into()), ..query("image") };
        let req = q.into_request(&Settings::default(), Some(Vec::new())).unwrap();
        assert_eq!(req.selection, SourceSelection::Image { upload: None, detect: true });
    }

    #[test]
    fn unknown_or_missing_source_is_invalid_selection() {
        let s = Settings::default();
        assert!(matches!(
            query("satellite").into_request(&s, None),
            Err(DomainError::InvalidSelection(_))
        ));
        assert!(matches!(
            RenderQuery::default().into_request(&s, None),
            Err(DomainError::InvalidSelection(_))
        ));
    }

    #[test]
    fn bad_model_or_confidence_is_invalid_input() {
        let s = Settings::default();
        let q = RenderQuery { model: Some("pose".into()), ..query("image") };
        assert!(matches!(q.into_request(&s, None), Err(DomainError::InvalidInput(_))));
        let q = RenderQuery { confidence: Some("0".into()), ..query("image") };
        assert!(matches!(q.into_request(&s, None), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn non_numeric_confidence_or_flag_is_invalid_input() {
        let s = Settings::default();
        for raw in ["abc", "40.5", "-3"] {
            let q = RenderQuery { confidence: Some(raw.into()), ..query("image") };
            assert!(matches!(q.into_request(&s, None), Err(DomainError::InvalidInput(_))), "{raw}");
        }
        let q = RenderQuery { detect: Some("maybe".into()), ..query("image") };
        assert!(matches!(q.into_request(&s, None), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn blank_confidence_falls_back_to_default() {
        let q = RenderQuery { confidence: Some(" ".into()), detect: Some("1".into()), ..query("image") };
        let req = q.into_request(&Settings::default(), None).unwrap();
        assert_eq!(req.confidence.position(), 40);
        assert_eq!(req.selection, SourceSelection::Image { upload: None, detect: true });
    }

    #[test]
    fn video_defaults_to_first_catalog_entry() {
        let req = query("video").into_request(&Settings::default(), None).unwrap();
        assert_eq!(req.selection, SourceSelection::Video { name: "video_1".into() });
    }

    #[test]
    fn frames_split_json_and_binary() {
        let meta = FrameMeta {
            index: 0, width: 2, height: 2, infer_ms: 1.0, fps_est: 0.0, annotated: true, detections: vec![],
        };
        let (view, bin) = PanelView::from_panel(Panel::Frame { meta, jpeg: vec![1, 2, 3] });
        assert_eq!(bin, Some(vec![1, 2, 3]));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "frame");
        assert_eq!(json["meta"]["width"], 2);
    }

    #[test]
    fn inline_images_become_data_urls() {
        let (view, _) = PanelView::from_panel(Panel::Image {
            slot: ImageSlot::Detected,
            caption: "Detected Image".into(),
            image: ImageRef::Jpeg(vec![0xFF, 0xD8]),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["slot"], "detected");
        assert_eq!(json["src"], "data:image/jpeg;base64,/9g=");
    }

    #[test]
    fn messages_flatten_kind_and_text() {
        let err = DomainError::SourceUnavailable("gone".into());
        let (view, _) = PanelView::from_panel(Panel::Message(UserMessage::from(&err)));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["kind"], "source_unavailable");
    }
}
