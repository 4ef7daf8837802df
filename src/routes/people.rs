// routes/people.rs
// Pessoas CRUD. Contact children (telefones, emails, endereços, chaves pix)
// ride inside the pessoa payload and are saved in the same document write.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use mongodb::bson::DateTime;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::SystemTime};

use crate::error::{ApiError, ApiResponse, ValidationErrors};
use crate::models::{ChavePix, EmailContato, Endereco, Person, PersonKind, Telefone};
use crate::query::{FilterField, FilterKind, SortField, build_list_query};
use crate::session::SessionUser;
use crate::state::{
    AppState, create_person, delete_person, get_person_by_id, list_people, update_person,
};

use super::{page_envelope, parse_date, parse_id};

const FILTERS: &[FilterField] = &[
    FilterField {
        name: "nome",
        path: "nome",
        kind: FilterKind::Text { exact: false },
    },
    FilterField {
        name: "documento",
        path: "documento",
        kind: FilterKind::Text { exact: true },
    },
    FilterField {
        name: "fisica_juridica",
        path: "fisica_juridica",
        kind: FilterKind::Select {
            choices: &["F", "J"],
        },
    },
    FilterField {
        name: "ativo",
        path: "ativo",
        kind: FilterKind::Flag,
    },
    FilterField {
        name: "cadastro",
        path: "dt_cadastro",
        kind: FilterKind::Date,
    },
];

const SORTS: &[SortField] = &[
    SortField {
        name: "nome",
        path: "nome",
        descending: false,
    },
    SortField {
        name: "cadastro",
        path: "dt_cadastro",
        descending: true,
    },
];

#[derive(Deserialize)]
pub struct PersonPayload {
    #[serde(default)]
    pub nome: String,
    pub fisica_juridica: PersonKind,
    #[serde(default)]
    pub documento: String,
    #[serde(default)]
    pub dt_cadastro: Option<String>,
    #[serde(default = "default_true")]
    pub ativo: bool,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub telefones: Vec<Telefone>,
    #[serde(default)]
    pub emails: Vec<EmailContato>,
    #[serde(default)]
    pub enderecos: Vec<Endereco>,
    #[serde(default)]
    pub chaves_pix: Vec<ChavePix>,
}

fn default_true() -> bool {
    true
}

impl PersonPayload {
    fn into_person(self) -> Result<Person, ApiError> {
        let mut errors = ValidationErrors::new();
        errors.require("nome", &self.nome);

        let documento: String = self
            .documento
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        match self.fisica_juridica {
            PersonKind::Fisica if documento.len() != 11 => {
                errors.add("documento", "CPF deve ter 11 dígitos");
            }
            PersonKind::Juridica if documento.len() != 14 => {
                errors.add("documento", "CNPJ deve ter 14 dígitos");
            }
            _ => {}
        }
        errors.into_result()?;

        let dt_cadastro = match &self.dt_cadastro {
            Some(raw) if !raw.trim().is_empty() => parse_date("dt_cadastro", raw)?,
            _ => DateTime::from_system_time(SystemTime::now()),
        };

        Ok(Person {
            id: None,
            nome: self.nome.trim().to_string(),
            fisica_juridica: self.fisica_juridica,
            documento,
            dt_cadastro,
            ativo: self.ativo,
            observacoes: self.observacoes,
            telefones: self.telefones,
            emails: self.emails,
            enderecos: self.enderecos,
            chaves_pix: self.chaves_pix,
            created_at: None,
            updated_at: None,
        })
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let query = build_list_query(FILTERS, SORTS, &params);
    let page = list_people(&state, &query).await?;
    page_envelope(&page, &query)
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let person = get_person_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("pessoa"))?;
    ApiResponse::ok_deletable(&person, "esta pessoa")
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Json(payload): Json<PersonPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let person = payload.into_person()?;
    let id = create_person(&state, person).await?;
    Ok(ApiResponse::ok_message(
        "pessoa cadastrada",
        Some(serde_json::json!({ "id": id.to_hex() })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
    Json(payload): Json<PersonPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    let existing = get_person_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("pessoa"))?;
    let mut person = payload.into_person()?;
    person.created_at = existing.created_at;
    update_person(&state, &id, person).await?;
    Ok(ApiResponse::ok_message("pessoa atualizada", None))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_id("id", &id)?;
    get_person_by_id(&state, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("pessoa"))?;
    delete_person(&state, &id).await?;
    Ok(ApiResponse::ok_message("pessoa excluída", None))
}
