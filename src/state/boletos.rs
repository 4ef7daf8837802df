// Boletos: creation against a lançamento, the registrar/baixar lifecycle and
// the per-config nosso número sequence.

use anyhow::Context;
use mongodb::bson::{Bson, DateTime, doc, oid::ObjectId};
use std::time::SystemTime;

use crate::error::ApiError;
use crate::models::{BankApiConfig, Boleto, BoletoStatus, EntryStatus};
use crate::query::ListQuery;

use super::{AppState, Page, get_entry_by_id, run_list};

pub async fn list_boletos(state: &AppState, query: &ListQuery) -> Result<Page<Boleto>, ApiError> {
    run_list(&state.boletos, query).await
}

pub async fn get_boleto_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<Boleto>, ApiError> {
    state
        .boletos
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Composes the nosso número from the convênio and the config's counter,
/// incrementing the counter in the same operation.
pub async fn next_nosso_numero(
    state: &AppState,
    config_id: &ObjectId,
) -> Result<String, ApiError> {
    let config = state
        .configuracoes_api
        .find_one_and_update(
            doc! { "_id": config_id },
            doc! { "$inc": { "sequencia": 1i64 } },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("configuração de API"))?;
    Ok(format!("{}{:010}", config.convenio, config.sequencia + 1))
}

/// Creates a pendente boleto against an open lançamento.
pub async fn create_boleto(state: &AppState, mut boleto: Boleto) -> Result<ObjectId, ApiError> {
    let entry = get_entry_by_id(state, &boleto.id_lancamento)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;
    if !matches!(
        entry.status,
        EntryStatus::Aberto | EntryStatus::PagoParcial
    ) {
        return Err(ApiError::Conflict(format!(
            "lançamento está {}; boletos só podem ser emitidos para lançamentos em aberto",
            entry.status.as_str()
        )));
    }

    boleto.id = None;
    boleto.status = BoletoStatus::Pendente;
    boleto.codigo_barras = None;
    boleto.linha_digitavel = None;
    boleto.mensagem_erro = None;
    boleto.created_at = Some(DateTime::from_system_time(SystemTime::now()));
    boleto.updated_at = None;

    let res = state.boletos.insert_one(boleto).await?;
    res.inserted_id
        .as_object_id()
        .context("boleto insert missing _id")
        .map_err(Into::into)
}

/// Active config for the boleto's bank integration.
pub async fn config_for_boleto(
    state: &AppState,
    boleto: &Boleto,
) -> Result<BankApiConfig, ApiError> {
    let filter = match boleto.id_configuracao {
        Some(id) => doc! { "_id": id },
        None => doc! { "ativo": true },
    };
    let config = state
        .configuracoes_api
        .find_one(filter)
        .await?
        .ok_or_else(|| ApiError::not_found("configuração de API ativa"))?;
    if !config.ativo {
        return Err(ApiError::Conflict(
            "configuração de API está inativa".to_string(),
        ));
    }
    Ok(config)
}

/// Data returned by the bank on a successful registration.
#[derive(Debug, Clone)]
pub struct Registro {
    pub codigo_barras: Option<String>,
    pub linha_digitavel: Option<String>,
    pub txid_pix: Option<String>,
}

pub async fn mark_registered(
    state: &AppState,
    id: &ObjectId,
    registro: Registro,
) -> Result<(), ApiError> {
    state
        .boletos
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "status": BoletoStatus::Registrado.as_str(),
                "codigo_barras": registro.codigo_barras.map(Bson::from).unwrap_or(Bson::Null),
                "linha_digitavel": registro.linha_digitavel.map(Bson::from).unwrap_or(Bson::Null),
                "txid_pix": registro.txid_pix.map(Bson::from).unwrap_or(Bson::Null),
                "mensagem_erro": Bson::Null,
                "updated_at": DateTime::from_system_time(SystemTime::now()),
            } },
        )
        .await?;
    Ok(())
}

pub async fn mark_error(state: &AppState, id: &ObjectId, mensagem: &str) -> Result<(), ApiError> {
    state
        .boletos
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "status": BoletoStatus::Erro.as_str(),
                "mensagem_erro": mensagem,
                "updated_at": DateTime::from_system_time(SystemTime::now()),
            } },
        )
        .await?;
    Ok(())
}

pub async fn mark_baixado(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    state
        .boletos
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "status": BoletoStatus::Baixado.as_str(),
                "updated_at": DateTime::from_system_time(SystemTime::now()),
            } },
        )
        .await?;
    Ok(())
}

/// Only boletos the bank never accepted can be removed.
pub async fn delete_boleto(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let boleto = get_boleto_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("boleto"))?;
    if !matches!(boleto.status, BoletoStatus::Pendente | BoletoStatus::Erro) {
        return Err(ApiError::Conflict(format!(
            "boleto está {}; apenas boletos pendentes ou com erro podem ser excluídos",
            boleto.status.as_str()
        )));
    }
    state.boletos.delete_one(doc! { "_id": id }).await?;
    Ok(())
}
