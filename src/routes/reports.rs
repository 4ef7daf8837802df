// routes/reports.rs
// GET /relatorios/lancamentos renders the filtered entries as a PDF and
// answers it base64-encoded inside the usual envelope.

use axum::{
    Json,
    extract::{Query, State},
};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use std::{collections::HashMap, sync::Arc};

use crate::error::{ApiError, ApiResponse};
use crate::report::{ReportFilters, compile_typst, lancamentos_report_source};
use crate::session::SessionUser;
use crate::state::AppState;

use super::valid_competencia;

const STATUSES: &[&str] = &["aberto", "pago_parcial", "pago", "cancelado", "suspenso"];

pub async fn lancamentos_pdf(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let mut filter = doc! {};
    let mut filters = ReportFilters::default();

    if let Some(c) = params.get("competencia").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !valid_competencia(c) {
            return Err(ApiError::invalid(
                "competencia",
                "competência deve estar no formato AAAA-MM",
            ));
        }
        filter.insert("competencia", c);
        filters.competencia = Some(c.to_string());
    }
    if let Some(s) = params.get("status").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !STATUSES.contains(&s) {
            return Err(ApiError::invalid("status", "situação desconhecida"));
        }
        filter.insert("status", s);
        filters.status = Some(s.to_string());
    }
    if let Some(t) = params.get("tipo").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if t != "receber" && t != "pagar" {
            return Err(ApiError::invalid("tipo", "tipo desconhecido"));
        }
        filter.insert("tipo", t);
        filters.tipo = Some(t.to_string());
    }

    let mut cursor = state
        .lancamentos
        .find(filter)
        .sort(doc! { "numero": 1 })
        .await?;
    let mut entries = Vec::new();
    while let Some(entry) = cursor.try_next().await? {
        entries.push(entry);
    }

    let source = lancamentos_report_source(&entries, &filters);
    let pdf = tokio::task::spawn_blocking(move || compile_typst(&source))
        .await
        .map_err(anyhow::Error::from)?;
    match pdf {
        Ok(bytes) => Ok(ApiResponse::ok(serde_json::json!({
            "pdf_base64": data_encoding::BASE64.encode(&bytes),
            "lancamentos": entries.len(),
        }))),
        Err(err) => {
            tracing::error!(error = %err, "geração de PDF falhou");
            Ok(ApiResponse::failure(err, None))
        }
    }
}
