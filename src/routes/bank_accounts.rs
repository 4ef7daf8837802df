// routes/bank_accounts.rs
// Contas bancárias. References are checked in two steps: a missing id is a
// validation problem, an id that resolves to nothing is a 404.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};

use crate::error::{ApiError, ApiResponse, ValidationErrors};
use crate::models::BankAccount;
use crate::query::{FilterField, FilterKind, SortField, build_list_query};
use crate::session::SessionUser;
use crate::state::{
    AppState, create_bank_account, delete_bank_account, get_agencia_by_id, get_bank_account_by_id,
    get_banco_by_id, get_person_by_id, get_tipo_conta_by_id, list_bank_accounts,
    update_bank_account,
};

use super::{page_envelope, parse_id};

const FILTERS: &[FilterField] = &[
    FilterField {
        name: "pessoa",
        path: "id_pessoa",
        kind: FilterKind::Id,
    },
    FilterField {
        name: "banco",
        path: "id_banco",
        kind: FilterKind::Id,
    },
    FilterField {
        name: "codigo",
        path: "codigo",
        kind: FilterKind::Text { exact: true },
    },
    FilterField {
        name: "ativo",
        path: "ativo",
        kind: FilterKind::Flag,
    },
    FilterField {
        name: "principal",
        path: "principal",
        kind: FilterKind::Flag,
    },
];

const SORTS: &[SortField] = &[SortField {
    name: "codigo",
    path: "codigo",
    descending: false,
}];

#[derive(Deserialize)]
pub struct BankAccountPayload {
    #[serde(default)]
    pub id_pessoa: String,
    #[serde(default)]
    pub id_banco: String,
    #[serde(default)]
    pub id_agencia: Option<String>,
    #[serde(default)]
    pub id_tipo_conta: String,
    #[serde(default)]
    pub codigo: String,
    #[serde(default)]
    pub digito: Option<String>,
    #[serde(default)]
    pub titular: Option<String>,
    #[serde(default)]
    pub principal: bool,
    #[serde(default = "default_true")]
    pub ativo: bool,
    #[serde(default)]
    pub registrada: bool,
    #[serde(default)]
    pub aceita_multipag: bool,
    #[serde(default)]
    pub usa_endereco_cobranca: bool,
    #[serde(default)]
    pub cobranca_compartilhada: bool,
    #[serde(default)]
    pub descricao: Option<String>,
}

fn default_true() -> bool {
    true
}

async fn resolve(state: &AppState, payload: BankAccountPayload) -> Result<BankAccount, ApiError> {
    let mut errors = ValidationErrors::new();
    errors.require("id_pessoa", &payload.id_pessoa);
    errors.require("id_banco", &payload.id_banco);
    errors.require("id_tipo_conta", &payload.id_tipo_conta);
    errors.require("codigo", &payload.codigo);
    errors.into_result()?;

    let id_pessoa = parse_id("id_pessoa", &payload.id_pessoa)?;
    let id_banco = parse_id("id_banco", &payload.id_banco)?;
    let id_tipo_conta = parse_id("id_tipo_conta", &payload.id_tipo_conta)?;
    let id_agencia: Option<ObjectId> = match payload
        .id_agencia
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(raw) => Some(parse_id("id_agencia", raw)?),
        None => None,
    };

    get_person_by_id(state, &id_pessoa)
        .await?
        .ok_or_else(|| ApiError::not_found("pessoa"))?;
    get_banco_by_id(state, &id_banco)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;
    get_tipo_conta_by_id(state, &id_tipo_conta)
        .await?
        .ok_or_else(|| ApiError::not_found("tipo de conta"))?;
    if let Some(agencia) = &id_agencia {
        let found = get_agencia_by_id(state, agencia)
            .await?
            .ok_or_else(|| ApiError::not_found("agência"))?;
        if found.id_banco != id_banco {
            return Err(ApiError::invalid(
                "id_agencia",
                "agência não pertence ao banco informado",
            ));
        }
    }

    Ok(BankAccount {
        id: None,
        id_pessoa,
        id_banco,
        id_agencia,
        id_tipo_conta,
        codigo: payload.codigo.trim().to_string(),
        digito: payload.digito.as_deref().map(str::trim).map(String::from),
        titular: payload.titular,
        principal: payload.principal,
        ativo: payload.ativo,
        registrada: payload.registrada,
        aceita_multipag: payload.aceita_multipag,
        usa_endereco_cobranca: payload.usa_endereco_cobranca,
        cobranca_compartilhada: payload.cobranca_compartilhada,
        descricao: payload.descricao,
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
    let page = list_bank_accounts(&state, &query).await?;
    page_envelope(&page, &query)
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let conta = get_bank_account_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("conta bancária"))?;
    ApiResponse::ok_deletable(&conta, "esta conta bancária")
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<BankAccountPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let conta = resolve(&state, payload).await?;
    let id = create_bank_account(&state, conta).await?;
    Ok(ApiResponse::ok_message(
        "conta bancária cadastrada",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<BankAccountPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let existing = get_bank_account_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("conta bancária"))?;
    let mut conta = resolve(&state, payload).await?;
    conta.created_at = existing.created_at;
    update_bank_account(&state, &id, conta).await?;
    Ok(ApiResponse::ok_message("conta bancária atualizada", None))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    get_bank_account_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("conta bancária"))?;
    delete_bank_account(&state, &id).await?;
    Ok(ApiResponse::ok_message("conta bancária excluída", None))
}
