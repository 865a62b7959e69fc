use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::adapters::http::state::HttpState;
use crate::application::dto::{PanelView, RenderQuery};
use crate::domain::{errors::UserMessage, stream::Panel};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(st): State<HttpState>,
    Query(query): Query<RenderQuery>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st, query))
}

async fn handle_socket(mut socket: WebSocket, st: HttpState, query: RenderQuery) {
    let mut rx = panel_stream(&st, query);
    while let Some(panel) = rx.recv().await {
        if send_panel(&mut socket, panel).await.is_err() {
            break;
        }
    }
    // Al soltar `rx` el hilo de render se detiene en el siguiente frame
    debug!("🔌 Visor desconectado");
}

/// Paneles de un ciclo pedido por query. Una selección inválida produce
/// el mensaje de error seguido de `End`.
pub(crate) fn panel_stream(st: &HttpState, query: RenderQuery) -> mpsc::Receiver<Panel> {
    match query.into_request(st.render.settings(), None) {
        Ok(request) => {
            info!("🔌 Visor conectado: {}", request.selection.kind());
            st.render.render_streaming(request)
        }
        Err(e) => {
            let (tx, rx) = mpsc::channel(2);
            let _ = tx.try_send(Panel::Message(UserMessage::from(&e)));
            let _ = tx.try_send(Panel::End);
            rx
        }
    }
}

/// Cada panel va como JSON; los frames añaden el JPEG en un mensaje binario.
async fn send_panel(socket: &mut WebSocket, panel: Panel) -> Result<(), axum::Error> {
    let (view, jpeg) = PanelView::from_panel(panel);
    let json = serde_json::to_string(&view).unwrap_or_default();
    socket.send(Message::Text(json)).await?;
    if let Some(jpeg) = jpeg {
        socket.send(Message::Binary(jpeg)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::tests::{
        fake_camera_service, service_with, Counters, FakeLoader, FakeMedia,
    };
    use std::sync::Arc;

    fn state() -> HttpState {
        let loader = FakeLoader { counters: Arc::new(Counters::default()), fail: false, fail_on_call: None };
        HttpState {
            camera: Arc::new(fake_camera_service()),
            render: Arc::new(service_with(loader, FakeMedia::with_frames(1))),
        }
    }

    async fn drain(mut rx: mpsc::Receiver<Panel>) -> Vec<Panel> {
        let mut out = Vec::new();
        while let Some(panel) = rx.recv().await {
            out.push(panel);
        }
        out
    }

    fn query(pairs: &[(&str, &str)]) -> RenderQuery {
        let mut q = RenderQuery::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "source" => q.source = v,
                "video" => q.video = v,
                "confidence" => q.confidence = v,
                _ => unreachable!(),
            }
        }
        q
    }

    #[tokio::test]
    async fn invalid_selection_sends_message_then_end() {
        let panels = drain(panel_stream(&state(), query(&[("source", "satellite")]))).await;
        assert_eq!(panels.len(), 2);
        assert!(matches!(&panels[0], Panel::Message(m) if m.kind == "invalid_selection"));
        assert_eq!(panels[1], Panel::End);
    }

    #[tokio::test]
    async fn bad_confidence_sends_message_then_end() {
        let q = query(&[("source", "video"), ("confidence", "lots")]);
        let panels = drain(panel_stream(&state(), q)).await;
        assert!(matches!(&panels[0], Panel::Message(m) if m.kind == "invalid_input"));
        assert_eq!(panels.last(), Some(&Panel::End));
    }

    #[tokio::test]
    async fn unknown_video_ends_the_stream_after_the_error() {
        let q = query(&[("source", "video"), ("video", "missing")]);
        let panels = drain(panel_stream(&state(), q)).await;
        assert_eq!(panels.len(), 2);
        assert!(matches!(&panels[0], Panel::Message(m) if m.kind == "source_unavailable"));
        assert_eq!(panels[1], Panel::End);
    }

    #[tokio::test]
    async fn video_frames_stream_until_end() {
        let panels = drain(panel_stream(&state(), query(&[("source", "video")]))).await;
        assert!(matches!(panels[0], Panel::Frame { .. }));
        assert_eq!(panels.last(), Some(&Panel::End));
    }
}
