// routes/reference.rs
// Bancos, agências and tipos de conta. Small tables, no pagination; the
// código uniqueness rules live in the state layer.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};

use crate::error::{ApiError, ApiResponse, ValidationErrors};
use crate::session::SessionUser;
use crate::state::{self, AppState};

use super::parse_id;

#[derive(Deserialize)]
pub struct BancoPayload {
    #[serde(default)]
    pub codigo: String,
    #[serde(default)]
    pub nome: String,
}

impl BancoPayload {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        errors.require("codigo", &self.codigo);
        errors.require("nome", &self.nome);
        if !self.codigo.trim().is_empty() && !self.codigo.trim().chars().all(|c| c.is_ascii_digit())
        {
            errors.add("codigo", "código de compensação deve ser numérico");
        }
        errors.into_result()
    }
}

pub async fn list_bancos(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
) -> Result<Json<ApiResponse>, ApiError> {
    let bancos = state::list_bancos(&state).await?;
    ApiResponse::ok_record(&bancos)
}

pub async fn show_banco(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let banco = state::get_banco_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;
    ApiResponse::ok_deletable(&banco, "este banco")
}

pub async fn create_banco(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<BancoPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    payload.validate()?;
    let id = state::create_banco(&state, payload.codigo.trim(), payload.nome.trim()).await?;
    Ok(ApiResponse::ok_message(
        "banco cadastrado",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update_banco(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<BancoPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    payload.validate()?;
    state::get_banco_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;
    state::update_banco(&state, &id, payload.codigo.trim(), payload.nome.trim()).await?;
    Ok(ApiResponse::ok_message("banco atualizado", None))
}

pub async fn remove_banco(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    state::get_banco_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;
    state::delete_banco(&state, &id).await?;
    Ok(ApiResponse::ok_message("banco excluído", None))
}

#[derive(Deserialize)]
pub struct AgenciaPayload {
    #[serde(default)]
    pub id_banco: String,
    #[serde(default)]
    pub codigo: String,
    #[serde(default)]
    pub digito: Option<String>,
    #[serde(default)]
    pub nome: String,
}

pub async fn list_agencias(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let banco = match params.get("banco").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => Some(parse_id("banco", raw)?),
        None => None,
    };
    let agencias = state::list_agencias(&state, banco.as_ref()).await?;
    ApiResponse::ok_record(&agencias)
}

pub async fn show_agencia(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let agencia = state::get_agencia_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("agência"))?;
    ApiResponse::ok_deletable(&agencia, "esta agência")
}

pub async fn create_agencia(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<AgenciaPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let mut errors = ValidationErrors::new();
    errors.require("id_banco", &payload.id_banco);
    errors.require("codigo", &payload.codigo);
    errors.require("nome", &payload.nome);
    errors.into_result()?;

    let id_banco = parse_id("id_banco", &payload.id_banco)?;
    state::get_banco_by_id(&state, &id_banco)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;

    let id = state::create_agencia(
        &state,
        &id_banco,
        payload.codigo.trim(),
        payload.digito.as_deref().map(str::trim).map(String::from),
        payload.nome.trim(),
    )
    .await?;
    Ok(ApiResponse::ok_message(
        "agência cadastrada",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update_agencia(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<AgenciaPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let mut errors = ValidationErrors::new();
    errors.require("id_banco", &payload.id_banco);
    errors.require("codigo", &payload.codigo);
    errors.require("nome", &payload.nome);
    errors.into_result()?;

    state::get_agencia_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("agência"))?;
    let id_banco = parse_id("id_banco", &payload.id_banco)?;
    state::get_banco_by_id(&state, &id_banco)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;

    state::update_agencia(
        &state,
        &id,
        &id_banco,
        payload.codigo.trim(),
        payload.digito.as_deref().map(str::trim).map(String::from),
        payload.nome.trim(),
    )
    .await?;
    Ok(ApiResponse::ok_message("agência atualizada", None))
}

pub async fn remove_agencia(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    state::get_agencia_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("agência"))?;
    state::delete_agencia(&state, &id).await?;
    Ok(ApiResponse::ok_message("agência excluída", None))
}

#[derive(Deserialize)]
pub struct TipoContaPayload {
    #[serde(default)]
    pub codigo: String,
    #[serde(default)]
    pub descricao: String,
}

pub async fn list_tipos_conta(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
) -> Result<Json<ApiResponse>, ApiError> {
    let tipos = state::list_tipos_conta(&state).await?;
    ApiResponse::ok_record(&tipos)
}

impl TipoContaPayload {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        errors.require("codigo", &self.codigo);
        errors.require("descricao", &self.descricao);
        errors.into_result()
    }
}

pub async fn show_tipo_conta(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let tipo = state::get_tipo_conta_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("tipo de conta"))?;
    ApiResponse::ok_deletable(&tipo, "este tipo de conta")
}

pub async fn create_tipo_conta(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<TipoContaPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    payload.validate()?;
    let id =
        state::create_tipo_conta(&state, payload.codigo.trim(), payload.descricao.trim()).await?;
    Ok(ApiResponse::ok_message(
        "tipo de conta cadastrado",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update_tipo_conta(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<TipoContaPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    payload.validate()?;
    state::get_tipo_conta_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("tipo de conta"))?;
    state::update_tipo_conta(&state, &id, payload.codigo.trim(), payload.descricao.trim()).await?;
    Ok(ApiResponse::ok_message("tipo de conta atualizado", None))
}

pub async fn remove_tipo_conta(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    state::get_tipo_conta_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("tipo de conta"))?;
    state::delete_tipo_conta(&state, &id).await?;
    Ok(ApiResponse::ok_message("tipo de conta excluído", None))
}
