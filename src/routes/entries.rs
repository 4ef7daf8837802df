// routes/entries.rs
// Lançamentos: CRUD plus the named transitions (baixa, estornar, cancelar,
// suspender, reativar), the overdue listing and the per-competência totals.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use mongodb::bson::DateTime;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::SystemTime};

use crate::error::{ApiError, ApiResponse, ValidationErrors};
use crate::models::{EntryKind, EntryStatus, FinancialEntry};
use crate::query::{FilterField, FilterKind, SortField, build_list_query};
use crate::session::SessionUser;
use crate::state::{
    AppState, Baixa, cancel_entry, create_entry, delete_entry, entry_stats, get_bank_account_by_id,
    get_entry_by_id, get_person_by_id, list_entries, list_overdue, reactivate_entry,
    reverse_entry, settle_entry, suspend_entry, update_entry,
};

use super::{page_envelope, parse_date, parse_id, valid_competencia};

const FILTERS: &[FilterField] = &[
    FilterField {
        name: "historico",
        path: "historico",
        kind: FilterKind::Text { exact: false },
    },
    FilterField {
        name: "tipo",
        path: "tipo",
        kind: FilterKind::Select {
            choices: &["receber", "pagar"],
        },
    },
    FilterField {
        name: "status",
        path: "status",
        kind: FilterKind::Select {
            choices: &["aberto", "pago_parcial", "pago", "cancelado", "suspenso"],
        },
    },
    FilterField {
        name: "competencia",
        path: "competencia",
        kind: FilterKind::Text { exact: true },
    },
    FilterField {
        name: "pessoa",
        path: "id_pessoa",
        kind: FilterKind::Id,
    },
    FilterField {
        name: "vencimento",
        path: "data_vencimento",
        kind: FilterKind::Date,
    },
];

const SORTS: &[SortField] = &[
    SortField {
        name: "vencimento",
        path: "data_vencimento",
        descending: false,
    },
    SortField {
        name: "numero",
        path: "numero",
        descending: true,
    },
    SortField {
        name: "valor",
        path: "valor",
        descending: true,
    },
];

#[derive(Deserialize)]
pub struct EntryPayload {
    pub tipo: EntryKind,
    #[serde(default)]
    pub historico: String,
    #[serde(default)]
    pub id_pessoa: Option<String>,
    #[serde(default)]
    pub id_conta_bancaria: Option<String>,
    #[serde(default)]
    pub valor: f64,
    #[serde(default)]
    pub valor_desconto: f64,
    #[serde(default)]
    pub valor_juros: f64,
    #[serde(default)]
    pub valor_multa: f64,
    #[serde(default)]
    pub data_movimento: Option<String>,
    #[serde(default)]
    pub data_vencimento: String,
    #[serde(default)]
    pub competencia: Option<String>,
    #[serde(default)]
    pub reter_inss: bool,
    #[serde(default)]
    pub perc_inss: Option<f64>,
    #[serde(default)]
    pub reter_iss: bool,
    #[serde(default)]
    pub perc_iss: Option<f64>,
    #[serde(default)]
    pub forma_pagamento: Option<String>,
}

async fn resolve(state: &AppState, payload: EntryPayload) -> Result<FinancialEntry, ApiError> {
    let mut errors = ValidationErrors::new();
    errors.require("historico", &payload.historico);
    errors.require("data_vencimento", &payload.data_vencimento);
    if payload.valor <= 0.0 {
        errors.add("valor", "deve ser maior que zero");
    }
    if payload.reter_inss && payload.perc_inss.map(|p| p <= 0.0).unwrap_or(true) {
        errors.add("perc_inss", "percentual obrigatório quando há retenção");
    }
    if payload.reter_iss && payload.perc_iss.map(|p| p <= 0.0).unwrap_or(true) {
        errors.add("perc_iss", "percentual obrigatório quando há retenção");
    }
    let competencia = payload
        .competencia
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    if let Some(c) = &competencia {
        if !valid_competencia(c) {
            errors.add("competencia", "competência deve estar no formato AAAA-MM");
        }
    }
    errors.into_result()?;

    let data_vencimento = parse_date("data_vencimento", &payload.data_vencimento)?;
    let data_movimento = match payload
        .data_movimento
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => parse_date("data_movimento", raw)?,
        None => DateTime::from_system_time(SystemTime::now()),
    };

    let id_pessoa = match payload
        .id_pessoa
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => {
            let id = parse_id("id_pessoa", raw)?;
            get_person_by_id(state, &id)
                .await?
                .ok_or_else(|| ApiError::not_found("pessoa"))?;
            Some(id)
        }
        None => None,
    };
    let id_conta_bancaria = match payload
        .id_conta_bancaria
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => {
            let id = parse_id("id_conta_bancaria", raw)?;
            get_bank_account_by_id(state, &id)
                .await?
                .ok_or_else(|| ApiError::not_found("conta bancária"))?;
            Some(id)
        }
        None => None,
    };

    Ok(FinancialEntry {
        id: None,
        numero: 0,
        tipo: payload.tipo,
        historico: payload.historico.trim().to_string(),
        id_pessoa,
        id_conta_bancaria,
        valor: payload.valor,
        valor_desconto: payload.valor_desconto,
        valor_juros: payload.valor_juros,
        valor_multa: payload.valor_multa,
        valor_pago: 0.0,
        data_movimento,
        data_vencimento,
        competencia: competencia.unwrap_or_default(),
        reter_inss: payload.reter_inss,
        perc_inss: payload.perc_inss,
        valor_inss: None,
        reter_iss: payload.reter_iss,
        perc_iss: payload.perc_iss,
        valor_iss: None,
        forma_pagamento: payload.forma_pagamento,
        data_pagamento: None,
        status: EntryStatus::Aberto,
        motivo: None,
        created_at: None,
        updated_at: None,
    })
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let query = build_list_query(FILTERS, SORTS, &params);
    let page = list_entries(&state, &query).await?;
    page_envelope(&page, &query)
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let entry = get_entry_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;
    ApiResponse::ok_deletable(&entry, "este lançamento")
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<EntryPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let entry = resolve(&state, payload).await?;
    let id = create_entry(&state, entry).await?;
    Ok(ApiResponse::ok_message(
        "lançamento criado",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<EntryPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let entry = resolve(&state, payload).await?;
    let updated = update_entry(&state, &id, entry).await?;
    Ok(ApiResponse::ok_message(
        "lançamento atualizado",
        Some(serde_json::to_value(updated).map_err(anyhow::Error::from)?),
    ))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    delete_entry(&state, &id).await?;
    Ok(ApiResponse::ok_message("lançamento excluído", None))
}

#[derive(Deserialize)]
pub struct BaixaPayload {
    #[serde(default)]
    pub data_pagamento: Option<String>,
    #[serde(default)]
    pub valor_pago: f64,
    #[serde(default)]
    pub forma_pagamento: Option<String>,
    #[serde(default)]
    pub id_conta_bancaria: Option<String>,
    #[serde(default)]
    pub valor_desconto: Option<f64>,
    #[serde(default)]
    pub valor_juros: Option<f64>,
    #[serde(default)]
    pub valor_multa: Option<f64>,
}

pub async fn baixa(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<BaixaPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;

    let data_pagamento = match payload
        .data_pagamento
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => parse_date("data_pagamento", raw)?,
        None => DateTime::from_system_time(SystemTime::now()),
    };
    let id_conta_bancaria = match payload
        .id_conta_bancaria
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => {
            let conta = parse_id("id_conta_bancaria", raw)?;
            get_bank_account_by_id(&state, &conta)
                .await?
                .ok_or_else(|| ApiError::not_found("conta bancária"))?;
            Some(conta)
        }
        None => None,
    };

    let entry = settle_entry(
        &state,
        &id,
        Baixa {
            data_pagamento,
            valor_pago: payload.valor_pago,
            forma_pagamento: payload.forma_pagamento,
            id_conta_bancaria,
            valor_desconto: payload.valor_desconto,
            valor_juros: payload.valor_juros,
            valor_multa: payload.valor_multa,
        },
    )
    .await?;
    Ok(ApiResponse::ok_message(
        "baixa efetuada",
        Some(serde_json::to_value(entry).map_err(anyhow::Error::from)?),
    ))
}

pub async fn estornar(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let entry = reverse_entry(&state, &id).await?;
    Ok(ApiResponse::ok_message(
        "pagamento estornado",
        Some(serde_json::to_value(entry).map_err(anyhow::Error::from)?),
    ))
}

#[derive(Deserialize)]
pub struct MotivoPayload {
    #[serde(default)]
    pub motivo: String,
}

impl MotivoPayload {
    fn motivo(&self) -> Result<&str, ApiError> {
        let motivo = self.motivo.trim();
        if motivo.is_empty() {
            return Err(ApiError::invalid("motivo", "campo obrigatório"));
        }
        Ok(motivo)
    }
}

pub async fn cancelar(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<MotivoPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let entry = cancel_entry(&state, &id, payload.motivo()?).await?;
    Ok(ApiResponse::ok_message(
        "lançamento cancelado",
        Some(serde_json::to_value(entry).map_err(anyhow::Error::from)?),
    ))
}

pub async fn suspender(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<MotivoPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let entry = suspend_entry(&state, &id, payload.motivo()?).await?;
    Ok(ApiResponse::ok_message(
        "lançamento suspenso",
        Some(serde_json::to_value(entry).map_err(anyhow::Error::from)?),
    ))
}

pub async fn reativar(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let entry = reactivate_entry(&state, &id).await?;
    Ok(ApiResponse::ok_message(
        "lançamento reativado",
        Some(serde_json::to_value(entry).map_err(anyhow::Error::from)?),
    ))
}

pub async fn overdue(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let tipo = match params.get("tipo").map(|v| v.trim()) {
        Some("receber") => Some(EntryKind::Receber),
        Some("pagar") => Some(EntryKind::Pagar),
        _ => None,
    };
    let entries = list_overdue(&state, tipo).await?;
    ApiResponse::ok_record(&entries)
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let competencia = params
        .get("competencia")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty());
    if let Some(c) = competencia {
        if !valid_competencia(c) {
            return Err(ApiError::invalid(
                "competencia",
                "competência deve estar no formato AAAA-MM",
            ));
        }
    }
    let stats = entry_stats(&state, competencia).await?;
    ApiResponse::ok_record(&stats)
}
