use anyhow::Context;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use std::time::SystemTime;

use crate::error::ApiError;
use crate::models::{Ambiente, BankApiConfig};
use crate::query::ListQuery;

use super::{AppState, Page, run_list};

pub async fn list_bank_configs(
    state: &AppState,
    query: &ListQuery,
) -> Result<Page<BankApiConfig>, ApiError> {
    run_list(&state.configuracoes_api, query).await
}

pub async fn get_bank_config_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<BankApiConfig>, ApiError> {
    state
        .configuracoes_api
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// One config per conta bancária and ambiente.
pub async fn config_exists_for(
    state: &AppState,
    conta: &ObjectId,
    ambiente: Ambiente,
    exclude: Option<&ObjectId>,
) -> Result<bool, ApiError> {
    let mut filter = doc! {
        "id_conta_bancaria": conta,
        "ambiente": ambiente.as_str(),
    };
    if let Some(id) = exclude {
        filter.insert("_id", doc! { "$ne": id });
    }
    Ok(state.configuracoes_api.find_one(filter).await?.is_some())
}

pub async fn create_bank_config(
    state: &AppState,
    mut config: BankApiConfig,
) -> Result<ObjectId, ApiError> {
    if let Some(conta) = &config.id_conta_bancaria {
        if config_exists_for(state, conta, config.ambiente, None).await? {
            return Err(ApiError::Conflict(
                "já existe uma configuração para esta conta neste ambiente".to_string(),
            ));
        }
    }
    config.id = None;
    config.sequencia = 0;
    config.created_at = Some(DateTime::from_system_time(SystemTime::now()));
    config.updated_at = None;
    let res = state.configuracoes_api.insert_one(config).await?;
    res.inserted_id
        .as_object_id()
        .context("configuração insert missing _id")
        .map_err(Into::into)
}

pub async fn update_bank_config(
    state: &AppState,
    id: &ObjectId,
    mut config: BankApiConfig,
) -> Result<(), ApiError> {
    let existing = get_bank_config_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("configuração de API"))?;
    if let Some(conta) = &config.id_conta_bancaria {
        if config_exists_for(state, conta, config.ambiente, Some(id)).await? {
            return Err(ApiError::Conflict(
                "já existe uma configuração para esta conta neste ambiente".to_string(),
            ));
        }
    }
    config.id = Some(*id);
    config.sequencia = existing.sequencia;
    config.created_at = existing.created_at;
    config.updated_at = Some(DateTime::from_system_time(SystemTime::now()));
    state
        .configuracoes_api
        .replace_one(doc! { "_id": id }, config)
        .await?;
    Ok(())
}

pub async fn delete_bank_config(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let in_use = state
        .boletos
        .find_one(doc! { "id_configuracao": id })
        .await?
        .is_some();
    if in_use {
        return Err(ApiError::Conflict(
            "configuração possui boletos vinculados".to_string(),
        ));
    }
    state
        .configuracoes_api
        .delete_one(doc! { "_id": id })
        .await?;
    Ok(())
}
