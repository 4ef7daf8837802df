// routes/boletos.rs
// Boleto issuance. Creation only snapshots the lançamento's open balance;
// talking to the bank happens in the explicit registrar/baixar actions, and a
// bank refusal lands in mensagem_erro instead of bubbling up as a 500.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use mongodb::bson::DateTime;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::SystemTime};

use crate::clients::bank_api::BankApiClient;
use crate::error::{ApiError, ApiResponse};
use crate::models::{Boleto, BoletoStatus};
use crate::query::{FilterField, FilterKind, SortField, build_list_query};
use crate::session::SessionUser;
use crate::state::{
    AppState, config_for_boleto, create_boleto, delete_boleto, get_boleto_by_id, get_entry_by_id,
    get_person_by_id, list_boletos, mark_baixado, mark_error, mark_registered, next_nosso_numero,
};

use super::{page_envelope, parse_date, parse_id};

const FILTERS: &[FilterField] = &[
    FilterField {
        name: "status",
        path: "status",
        kind: FilterKind::Select {
            choices: &["pendente", "registrado", "pago", "baixado", "erro"],
        },
    },
    FilterField {
        name: "lancamento",
        path: "id_lancamento",
        kind: FilterKind::Id,
    },
    FilterField {
        name: "pagador",
        path: "id_pessoa_pagador",
        kind: FilterKind::Id,
    },
    FilterField {
        name: "nosso_numero",
        path: "nosso_numero",
        kind: FilterKind::Text { exact: true },
    },
    FilterField {
        name: "vencimento",
        path: "data_vencimento",
        kind: FilterKind::Date,
    },
];

const SORTS: &[SortField] = &[SortField {
    name: "vencimento",
    path: "data_vencimento",
    descending: false,
}];

#[derive(Deserialize)]
pub struct BoletoPayload {
    #[serde(default)]
    pub id_lancamento: String,
    #[serde(default)]
    pub id_configuracao: Option<String>,
    #[serde(default)]
    pub data_vencimento: Option<String>,
    #[serde(default)]
    pub seu_numero: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let query = build_list_query(FILTERS, SORTS, &params);
    let page = list_boletos(&state, &query).await?;
    page_envelope(&page, &query)
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let boleto = get_boleto_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("boleto"))?;
    ApiResponse::ok_deletable(&boleto, "este boleto")
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<BoletoPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    if payload.id_lancamento.trim().is_empty() {
        return Err(ApiError::invalid("id_lancamento", "campo obrigatório"));
    }
    let id_lancamento = parse_id("id_lancamento", &payload.id_lancamento)?;
    let entry = get_entry_by_id(&state, &id_lancamento)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;
    let Some(id_pessoa_pagador) = entry.id_pessoa else {
        return Err(ApiError::invalid(
            "id_lancamento",
            "lançamento não possui pessoa vinculada para ser o pagador",
        ));
    };

    let id_configuracao = match payload
        .id_configuracao
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => Some(parse_id("id_configuracao", raw)?),
        None => None,
    };

    let data_vencimento = match payload
        .data_vencimento
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => parse_date("data_vencimento", raw)?,
        None => entry.data_vencimento,
    };

    // The nosso número comes from the config counter, so resolve the config
    // first even though the bank is only contacted at registration.
    let probe = Boleto {
        id: None,
        id_configuracao,
        id_lancamento,
        id_pessoa_pagador,
        nosso_numero: String::new(),
        seu_numero: None,
        valor_nominal: 0.0,
        data_emissao: DateTime::from_system_time(SystemTime::now()),
        data_vencimento,
        codigo_barras: None,
        linha_digitavel: None,
        txid_pix: None,
        status: BoletoStatus::Pendente,
        mensagem_erro: None,
        created_at: None,
        updated_at: None,
    };
    let config = config_for_boleto(&state, &probe).await?;
    let config_id = config
        .id
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("configuração sem _id")))?;
    let nosso_numero = next_nosso_numero(&state, &config_id).await?;

    let saldo = (entry.valor_liquido() - entry.valor_pago).max(0.0);
    let boleto = Boleto {
        id_configuracao: Some(config_id),
        nosso_numero,
        seu_numero: payload.seu_numero,
        valor_nominal: saldo,
        ..probe
    };

    let id = create_boleto(&state, boleto).await?;
    Ok(ApiResponse::ok_message(
        "boleto criado",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn registrar(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let boleto = get_boleto_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("boleto"))?;
    if !matches!(boleto.status, BoletoStatus::Pendente | BoletoStatus::Erro) {
        return Err(ApiError::Conflict(format!(
            "boleto está {}; apenas boletos pendentes ou com erro podem ser registrados",
            boleto.status.as_str()
        )));
    }

    let config = config_for_boleto(&state, &boleto).await?;
    let pagador = get_person_by_id(&state, &boleto.id_pessoa_pagador)
        .await?
        .ok_or_else(|| ApiError::not_found("pessoa pagadora"))?;

    let client = BankApiClient::new(&state.http, &config);
    match client.registrar(&boleto, &pagador).await {
        Ok(registro) => {
            mark_registered(&state, &id, registro).await?;
            let updated = get_boleto_by_id(&state, &id).await?;
            Ok(ApiResponse::ok_message(
                "boleto registrado",
                updated.and_then(|b| serde_json::to_value(b).ok()),
            ))
        }
        Err(failure) => {
            tracing::warn!(boleto = %id, error = %failure, "registro de boleto falhou");
            mark_error(&state, &id, &failure.0).await?;
            Ok(ApiResponse::failure(failure.0, None))
        }
    }
}

pub async fn baixar(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let boleto = get_boleto_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("boleto"))?;
    if boleto.status != BoletoStatus::Registrado {
        return Err(ApiError::Conflict(format!(
            "boleto está {}; apenas boletos registrados podem ser baixados",
            boleto.status.as_str()
        )));
    }

    let config = config_for_boleto(&state, &boleto).await?;
    let client = BankApiClient::new(&state.http, &config);
    match client.baixar(&boleto).await {
        Ok(()) => {
            mark_baixado(&state, &id).await?;
            Ok(ApiResponse::ok_message("boleto baixado", None))
        }
        Err(failure) => {
            tracing::warn!(boleto = %id, error = %failure, "baixa de boleto falhou");
            Ok(ApiResponse::failure(failure.0, None))
        }
    }
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    delete_boleto(&state, &id).await?;
    Ok(ApiResponse::ok_message("boleto excluído", None))
}
