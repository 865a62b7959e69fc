use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    application::{
        annotate::Annotator,
        dto::{CameraView, RenderRequest},
        handlers::{
            DisplaySink, ImageHandler, LazyModel, RenderContext, SourceHandler, VideoHandler,
            WebcamHandler, YoutubeHandler,
        },
        ports::{CameraCatalogPort, MediaPort, ModelLoaderPort, StreamResolverPort},
    },
    config::Settings,
    domain::{
        camera::CameraInfo,
        errors::{DomainError, DomainResult, UserMessage},
        model::{ModelInfo, ModelKind},
        source::{SourceKind, SourceSelection},
        stream::Panel,
    },
};

/// Paneles en vuelo entre el hilo de render y el socket.
const PANEL_BUFFER: usize = 8;

/// Inventario de cámaras para el selector de webcam.
#[derive(Clone)]
pub struct CameraService {
    catalog: Arc<dyn CameraCatalogPort>,
}

impl CameraService {
    pub fn new(catalog: Arc<dyn CameraCatalogPort>) -> Self {
        Self { catalog }
    }

    pub async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        self.catalog.list_cameras().await
    }

    /// Vista compacta con el índice `/dev/videoN`.
    pub async fn camera_views(&self) -> DomainResult<Vec<CameraView>> {
        Ok(self
            .list_cameras()
            .await?
            .into_iter()
            .map(|c| {
                let index = c.id.path.chars().filter(|ch| ch.is_ascii_digit()).collect::<String>();
                CameraView { index: index.parse().unwrap_or(0), card: c.card, path: c.id.path }
            })
            .collect())
    }
}

/// Orquestador de un ciclo de render: resuelve el modelo, elige el manejador
/// de la fuente y vuelca todo error como mensaje en la vista.
#[derive(Clone)]
pub struct RenderService {
    settings: Arc<Settings>,
    loader: Arc<dyn ModelLoaderPort>,
    media: Arc<dyn MediaPort>,
    resolver: Arc<dyn StreamResolverPort>,
    annotator: Arc<Annotator>,
}

impl RenderService {
    pub fn new(
        settings: Arc<Settings>,
        loader: Arc<dyn ModelLoaderPort>,
        media: Arc<dyn MediaPort>,
        resolver: Arc<dyn StreamResolverPort>,
        annotator: Arc<Annotator>,
    ) -> Self {
        Self { settings, loader, media, resolver, annotator }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Carga el modelo configurado para `kind` y lo describe. Bloqueante.
    pub fn load_model(&self, kind: ModelKind) -> DomainResult<ModelInfo> {
        let config = self.settings.model_config(kind);
        let model = self.loader.load(&config)?;
        Ok(model.info())
    }

    pub async fn describe_model(&self, kind: ModelKind) -> DomainResult<ModelInfo> {
        let svc = self.clone();
        tokio::task::spawn_blocking(move || svc.load_model(kind))
            .await
            .map_err(|e| DomainError::Inference(format!("model worker failed: {e}")))?
    }

    /// Ejecuta un ciclo completo de forma síncrona. Nunca falla: los errores
    /// llegan al sumidero como `Panel::Message`.
    pub fn render(&self, request: RenderRequest, sink: &mut dyn DisplaySink) {
        let config = self.settings.model_config(request.model);
        let ctx = RenderContext {
            settings: &self.settings,
            params: self.settings.yolo.with_confidence(request.confidence),
            annotator: &self.annotator,
        };
        let mut model = LazyModel::new(self.loader.as_ref(), config);
        let kind = request.selection.kind();
        info!(
            "▶️ Render: fuente={} modelo={} confianza={:.2}",
            kind,
            request.model,
            ctx.params.conf_threshold
        );

        let result = match &request.selection {
            SourceSelection::Image { upload, detect } => ImageHandler {
                upload: upload.as_deref(),
                detect: *detect,
            }
            .run(&ctx, &mut model, sink),
            SourceSelection::Video { name } => VideoHandler {
                media: self.media.as_ref(),
                name,
            }
            .run(&ctx, &mut model, sink),
            SourceSelection::Webcam { device } => WebcamHandler {
                media: self.media.as_ref(),
                device: device.as_deref(),
            }
            .run(&ctx, &mut model, sink),
            SourceSelection::YouTube { url } => YoutubeHandler {
                media: self.media.as_ref(),
                resolver: self.resolver.as_ref(),
                url,
            }
            .run(&ctx, &mut model, sink),
        };

        if let Err(e) = result {
            warn!("Render {} terminado con error: {}", kind, e);
            if sink.emit(Panel::Message(UserMessage::from(&e))) && kind != SourceKind::Image {
                // Las fuentes de vídeo siempre cierran con `End`, también al fallar
                sink.emit(Panel::End);
            }
        }
    }

    /// Ciclo completo en un hilo bloqueante, devolviendo todos los paneles.
    pub async fn render_collect(&self, request: RenderRequest) -> DomainResult<Vec<Panel>> {
        let svc = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut panels = Vec::new();
            svc.render(request, &mut panels);
            panels
        })
        .await
        .map_err(|e| DomainError::Inference(format!("render worker failed: {e}")))
    }

    /// Ciclo en un hilo bloqueante que publica paneles según se producen.
    /// Al soltar el receptor el bucle se detiene en el siguiente panel.
    pub fn render_streaming(&self, request: RenderRequest) -> mpsc::Receiver<Panel> {
        let (tx, rx) = mpsc::channel(PANEL_BUFFER);
        let svc = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink { tx };
            svc.render(request, &mut sink);
        });
        rx
    }
}

struct ChannelSink {
    tx: mpsc::Sender<Panel>,
}

impl DisplaySink for ChannelSink {
    fn emit(&mut self, panel: Panel) -> bool {
        self.tx.blocking_send(panel).is_ok()
    }
}
