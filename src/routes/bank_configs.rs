// routes/bank_configs.rs
// Configurações de API bancária. Uploading a certificate validates the
// PKCS#12 bundle up front; test-connection only inspects the stored config
// and reports what is missing, it never calls the bank.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};

use crate::clients::bank_api::validar_certificado;
use crate::error::{ApiError, ApiResponse, ValidationErrors};
use crate::models::{Ambiente, BankApiConfig};
use crate::query::{FilterField, FilterKind, SortField, build_list_query};
use crate::session::SessionUser;
use crate::state::{
    AppState, create_bank_config, delete_bank_config, get_bank_account_by_id,
    get_bank_config_by_id, get_banco_by_id, list_bank_configs, update_bank_config,
};

use super::{page_envelope, parse_id};

const FILTERS: &[FilterField] = &[
    FilterField {
        name: "banco",
        path: "id_banco",
        kind: FilterKind::Id,
    },
    FilterField {
        name: "ambiente",
        path: "ambiente",
        kind: FilterKind::Select {
            choices: &["sandbox", "producao"],
        },
    },
    FilterField {
        name: "ativo",
        path: "ativo",
        kind: FilterKind::Flag,
    },
];

const SORTS: &[SortField] = &[SortField {
    name: "convenio",
    path: "convenio",
    descending: false,
}];

#[derive(Deserialize)]
pub struct BankConfigPayload {
    #[serde(default)]
    pub id_banco: String,
    #[serde(default)]
    pub id_conta_bancaria: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub convenio: String,
    #[serde(default)]
    pub carteira: String,
    pub ambiente: Ambiente,
    #[serde(default)]
    pub url_autenticacao: String,
    #[serde(default)]
    pub url_api: String,
    #[serde(default)]
    pub certificado_path: Option<String>,
    #[serde(default)]
    pub certificado_senha: Option<String>,
    #[serde(default = "default_true")]
    pub ativo: bool,
}

fn default_true() -> bool {
    true
}

// Endpoints da API de cobrança do Santander por ambiente; usados quando a
// configuração não informa URLs próprias.
const URL_AUTENTICACAO_PRODUCAO: &str = "https://trust.api.santander.com.br/auth/oauth/v2/token";
const URL_API_PRODUCAO: &str = "https://trust.api.santander.com.br/collection_bill_management/v2";
const URL_AUTENTICACAO_SANDBOX: &str =
    "https://trust-sandbox.api.santander.com.br/auth/oauth/v2/token";
const URL_API_SANDBOX: &str =
    "https://trust-sandbox.api.santander.com.br/collection_bill_management/v2";

fn default_urls(ambiente: Ambiente) -> (&'static str, &'static str) {
    match ambiente {
        Ambiente::Producao => (URL_AUTENTICACAO_PRODUCAO, URL_API_PRODUCAO),
        Ambiente::Sandbox => (URL_AUTENTICACAO_SANDBOX, URL_API_SANDBOX),
    }
}

async fn resolve(state: &AppState, payload: BankConfigPayload) -> Result<BankApiConfig, ApiError> {
    let mut errors = ValidationErrors::new();
    errors.require("id_banco", &payload.id_banco);
    errors.require("convenio", &payload.convenio);
    for (field, value) in [
        ("url_autenticacao", &payload.url_autenticacao),
        ("url_api", &payload.url_api),
    ] {
        let v = value.trim();
        if !v.is_empty() && !v.starts_with("https://") && !v.starts_with("http://") {
            errors.add(field, "deve ser uma URL http(s)");
        }
    }
    errors.into_result()?;

    let id_banco = parse_id("id_banco", &payload.id_banco)?;
    get_banco_by_id(state, &id_banco)
        .await?
        .ok_or_else(|| ApiError::not_found("banco"))?;

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

    let certificado_path = payload
        .certificado_path
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    // File read plus openssl parsing is blocking work.
    let certificado_validade = match &certificado_path {
        Some(path) => {
            let path = path.clone();
            let senha = payload
                .certificado_senha
                .as_deref()
                .unwrap_or("")
                .to_string();
            let info = tokio::task::spawn_blocking(move || validar_certificado(&path, &senha))
                .await
                .map_err(anyhow::Error::from)?
                .map_err(|msg| ApiError::invalid("certificado_path", msg))?;
            Some(info.validade)
        }
        None => None,
    };

    let carteira = match payload.carteira.trim() {
        "" => "101".to_string(),
        v => v.to_string(),
    };
    let (auth_padrao, api_padrao) = default_urls(payload.ambiente);
    let url_autenticacao = match payload.url_autenticacao.trim() {
        "" => auth_padrao.to_string(),
        v => v.to_string(),
    };
    let url_api = match payload.url_api.trim() {
        "" => api_padrao.to_string(),
        v => v.to_string(),
    };

    Ok(BankApiConfig {
        id: None,
        id_banco,
        id_conta_bancaria,
        client_id: payload.client_id,
        client_secret: payload.client_secret,
        convenio: payload.convenio.trim().to_string(),
        carteira,
        ambiente: payload.ambiente,
        url_autenticacao,
        url_api,
        certificado_path,
        certificado_validade,
        sequencia: 0,
        ativo: payload.ativo,
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
    let page = list_bank_configs(&state, &query).await?;
    page_envelope(&page, &query)
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let config = get_bank_config_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("configuração de API"))?;
    ApiResponse::ok_deletable(&config, "esta configuração")
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<BankConfigPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let config = resolve(&state, payload).await?;
    let id = create_bank_config(&state, config).await?;
    Ok(ApiResponse::ok_message(
        "configuração cadastrada",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<BankConfigPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let config = resolve(&state, payload).await?;
    update_bank_config(&state, &id, config).await?;
    Ok(ApiResponse::ok_message("configuração atualizada", None))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    get_bank_config_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("configuração de API"))?;
    delete_bank_config(&state, &id).await?;
    Ok(ApiResponse::ok_message("configuração excluída", None))
}

pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let config = get_bank_config_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("configuração de API"))?;

    let client_id_ok = config
        .client_id
        .as_deref()
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let client_secret_ok = config
        .client_secret
        .as_deref()
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let certificado_configurado = config.certificado_path.is_some();
    let certificado_valido = config.certificado_valido();

    let detalhes = serde_json::json!({
        "ambiente": config.ambiente.as_str(),
        "ativo": config.ativo,
        "client_id_configurado": client_id_ok,
        "client_secret_configurado": client_secret_ok,
        "certificado_configurado": certificado_configurado,
        "certificado_valido": certificado_valido,
        "certificado_validade": config.certificado_validade,
        "url_autenticacao": config.url_autenticacao,
        "url_api": config.url_api,
    });
    let data = serde_json::json!({ "detalhes": detalhes });

    // Um certificado vencido é o único estado que invalida a configuração;
    // credenciais ausentes apenas aparecem no detalhamento.
    if certificado_configurado && !certificado_valido {
        Ok(ApiResponse::failure("certificado digital expirado", Some(data)))
    } else {
        Ok(ApiResponse::ok_message("configuração verificada", Some(data)))
    }
}
