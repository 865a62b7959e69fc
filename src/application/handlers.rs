//! Un manejador por tipo de fuente. Todos reciben el modelo, los parámetros
//! de inferencia y un sumidero de vista, y producen paneles anotados.

use image::{imageops::FilterType, ImageFormat, RgbImage};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::application::annotate::{encode_jpeg, Annotator};
use crate::application::ports::{
    FrameSource, InferenceModel, MediaPort, ModelLoaderPort, StreamResolverPort,
};
use crate::config::Settings;
use crate::domain::{
    detection::DetectionRecord,
    errors::{DomainError, DomainResult, UserMessage},
    model::{ModelConfig, YoloParams},
    stream::{summarize_detections, FrameMeta, ImageRef, ImageSlot, Panel},
};

/// Fallos seguidos de captura antes de dar la fuente por perdida.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Destino de los paneles. Devuelve `false` cuando ya nadie está mirando.
pub trait DisplaySink: Send {
    fn emit(&mut self, panel: Panel) -> bool;
}

impl DisplaySink for Vec<Panel> {
    fn emit(&mut self, panel: Panel) -> bool {
        self.push(panel);
        true
    }
}

/// Modelo cargado bajo demanda: un ciclo que no infiere nunca lo carga.
pub struct LazyModel<'a> {
    loader: &'a dyn ModelLoaderPort,
    config: ModelConfig,
    model: Option<Box<dyn InferenceModel>>,
}

impl<'a> LazyModel<'a> {
    pub fn new(loader: &'a dyn ModelLoaderPort, config: ModelConfig) -> Self {
        Self { loader, config, model: None }
    }

    pub fn get(&mut self) -> DomainResult<&mut dyn InferenceModel> {
        let model = match self.model.take() {
            Some(model) => model,
            None => {
                info!("📦 Cargando modelo {} desde {}", self.config.kind, self.config.weights_path.display());
                self.loader.load(&self.config)?
            }
        };
        Ok(&mut **self.model.insert(model))
    }
}

pub struct RenderContext<'a> {
    pub settings: &'a Settings,
    pub params: YoloParams,
    pub annotator: &'a Annotator,
}

pub trait SourceHandler {
    fn run(
        &self,
        ctx: &RenderContext<'_>,
        model: &mut LazyModel<'_>,
        sink: &mut dyn DisplaySink,
    ) -> DomainResult<()>;
}

pub struct ImageHandler<'a> {
    pub upload: Option<&'a [u8]>,
    pub detect: bool,
}

impl SourceHandler for ImageHandler<'_> {
    fn run(
        &self,
        ctx: &RenderContext<'_>,
        model: &mut LazyModel<'_>,
        sink: &mut dyn DisplaySink,
    ) -> DomainResult<()> {
        let Some(bytes) = self.upload.filter(|b| !b.is_empty()) else {
            sink.emit(Panel::Image {
                slot: ImageSlot::Original,
                caption: "Default Image".into(),
                image: ImageRef::Asset { url: Settings::asset_url(&ctx.settings.default_image) },
            });
            sink.emit(Panel::Image {
                slot: ImageSlot::Detected,
                caption: "Detected Image".into(),
                image: ImageRef::Asset {
                    url: Settings::asset_url(&ctx.settings.default_detect_image),
                },
            });
            return Ok(());
        };

        let rgb = decode_upload(bytes)?;
        sink.emit(Panel::Image {
            slot: ImageSlot::Original,
            caption: "Uploaded Image".into(),
            image: ImageRef::Jpeg(encode_jpeg(&rgb)?),
        });
        if !self.detect {
            return Ok(());
        }

        let prediction = model.get()?.predict(&rgb, &ctx.params)?;
        info!(
            "🖼️ {}x{}: {} detecciones [{}]",
            rgb.width(),
            rgb.height(),
            prediction.detections.len(),
            summarize_detections(&prediction.detections)
        );
        let plotted = ctx.annotator.plot(&rgb, &prediction);
        sink.emit(Panel::Image {
            slot: ImageSlot::Detected,
            caption: "Detected Image".into(),
            image: ImageRef::Jpeg(encode_jpeg(&plotted)?),
        });
        sink.emit(Panel::Results(
            prediction.detections.iter().map(DetectionRecord::from).collect(),
        ));
        Ok(())
    }
}

/// Decodifica una subida, aceptando solo jpg/jpeg/png/bmp/webp.
pub fn decode_upload(bytes: &[u8]) -> DomainResult<RgbImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| DomainError::ImageDecode(format!("unrecognized image data: {e}")))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp | ImageFormat::WebP) {
        return Err(DomainError::ImageDecode(format!("unsupported image format {format:?}")));
    }
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DomainError::ImageDecode(e.to_string()))?;
    Ok(img.to_rgb8())
}

pub struct VideoHandler<'a> {
    pub media: &'a dyn MediaPort,
    pub name: &'a str,
}

impl SourceHandler for VideoHandler<'_> {
    fn run(
        &self,
        ctx: &RenderContext<'_>,
        model: &mut LazyModel<'_>,
        sink: &mut dyn DisplaySink,
    ) -> DomainResult<()> {
        let model = model.get()?;
        let path = ctx.settings.video_path(self.name)?;
        info!("🎞️ Reproduciendo vídeo '{}' ({})", self.name, path.display());
        let mut source = self.media.open_file(path)?;
        play(source.as_mut(), ctx, model, sink)
    }
}

pub struct WebcamHandler<'a> {
    pub media: &'a dyn MediaPort,
    pub device: Option<&'a str>,
}

impl SourceHandler for WebcamHandler<'_> {
    fn run(
        &self,
        ctx: &RenderContext<'_>,
        model: &mut LazyModel<'_>,
        sink: &mut dyn DisplaySink,
    ) -> DomainResult<()> {
        let model = model.get()?;
        let device = self.device.unwrap_or(ctx.settings.webcam.device.as_str());
        info!("📷 Abriendo webcam {}", device);
        let mut source = self.media.open_camera(device, &ctx.settings.webcam.mode)?;
        play(source.as_mut(), ctx, model, sink)
    }
}

pub struct YoutubeHandler<'a> {
    pub media: &'a dyn MediaPort,
    pub resolver: &'a dyn StreamResolverPort,
    pub url: &'a str,
}

impl SourceHandler for YoutubeHandler<'_> {
    fn run(
        &self,
        ctx: &RenderContext<'_>,
        model: &mut LazyModel<'_>,
        sink: &mut dyn DisplaySink,
    ) -> DomainResult<()> {
        let stream_url = self.resolver.resolve(self.url)?;
        info!("📺 YouTube {} resuelto", self.url);
        let model = model.get()?;
        let mut source = self.media.open_stream(&stream_url)?;
        play(source.as_mut(), ctx, model, sink)
    }
}

/// Bucle común de vídeo: leer frame, inferir, anotar, emitir.
fn play(
    source: &mut dyn FrameSource,
    ctx: &RenderContext<'_>,
    model: &mut dyn InferenceModel,
    sink: &mut dyn DisplaySink,
) -> DomainResult<()> {
    let display = ctx.settings.display;
    let mut fps_est: f32 = 0.0;
    let mut last_t = Instant::now();
    let mut index: u64 = 0;
    let mut failures: u32 = 0;

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => {
                failures = 0;
                frame
            }
            Ok(None) => {
                info!("⏹️ Fuente agotada tras {} frames", index);
                sink.emit(Panel::End);
                return Ok(());
            }
            Err(e) => {
                failures += 1;
                warn!("Error capturando frame ({}/{}): {}", failures, MAX_CONSECUTIVE_FAILURES, e);
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(e);
                }
                if !sink.emit(Panel::Message(UserMessage::from(&e))) {
                    return Ok(());
                }
                continue;
            }
        };

        let frame = if frame.dimensions() != (display.width, display.height) {
            image::imageops::resize(&frame, display.width, display.height, FilterType::Triangle)
        } else {
            frame
        };

        let t_infer_start = Instant::now();
        let (shown, detections, annotated) = match model.predict(&frame, &ctx.params) {
            Ok(prediction) => {
                let plotted = ctx.annotator.plot(&frame, &prediction);
                (plotted, prediction.detections, true)
            }
            Err(e) => {
                warn!("Inferencia fallida en frame {}: {}", index, e);
                if !sink.emit(Panel::Message(UserMessage::from(&e))) {
                    return Ok(());
                }
                (frame, Vec::new(), false)
            }
        };
        let infer_ms = t_infer_start.elapsed().as_secs_f32() * 1000.0;

        let dt = last_t.elapsed().as_secs_f32().max(0.001);
        last_t = Instant::now();
        fps_est = 0.9 * fps_est + 0.1 * (1.0 / dt);

        let meta = FrameMeta {
            index,
            width: shown.width(),
            height: shown.height(),
            infer_ms,
            fps_est,
            annotated,
            detections,
        };
        let jpeg = encode_jpeg(&shown)?;
        index += 1;

        if !sink.emit(Panel::Frame { meta, jpeg }) {
            debug!("Visor desconectado en frame {}", index);
            return Ok(());
        }
    }
}
