use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};

use crate::adapters::http::{error::ApiError, state::HttpState};
use crate::application::dto::{CameraView, RenderQuery, RenderResponse, SettingsView};
use crate::domain::model::{ModelInfo, ModelKind};

pub async fn get_settings(State(st): State<HttpState>) -> Json<SettingsView> {
    Json(SettingsView::from(st.render.settings()))
}

pub async fn list_cameras(State(st): State<HttpState>) -> Result<Json<Vec<CameraView>>, ApiError> {
    Ok(Json(st.camera.camera_views().await?))
}

/// Carga el modelo elegido en la barra lateral y devuelve su descripción.
pub async fn load_model(
    State(st): State<HttpState>,
    Path(kind): Path<String>,
) -> Result<Json<ModelInfo>, ApiError> {
    let kind: ModelKind = kind.parse()?;
    Ok(Json(st.render.describe_model(kind).await?))
}

/// Ciclo de imagen: el cuerpo son los bytes subidos (vacío = sin subida).
pub async fn render_image(
    State(st): State<HttpState>,
    Query(mut query): Query<RenderQuery>,
    body: Bytes,
) -> Result<Json<RenderResponse>, ApiError> {
    query.source = Some("image".into());
    let request = query.into_request(st.render.settings(), Some(body.to_vec()))?;
    let panels = st.render.render_collect(request).await?;
    Ok(Json(RenderResponse::from(panels)))
}
