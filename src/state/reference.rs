// Reference data: bancos, agências, tipos de conta and the logradouro cache.
// All keyed by código; inserting a duplicate código is a conflict.

use anyhow::Context;
use futures::stream::TryStreamExt;
use mongodb::bson::{Bson, doc, oid::ObjectId};

use crate::error::ApiError;
use crate::models::{Agencia, Banco, Logradouro, TipoConta};

use super::AppState;

pub async fn list_bancos(state: &AppState) -> Result<Vec<Banco>, ApiError> {
    let mut cursor = state.bancos.find(doc! {}).sort(doc! { "codigo": 1 }).await?;
    let mut items = Vec::new();
    while let Some(banco) = cursor.try_next().await? {
        items.push(banco);
    }
    Ok(items)
}

pub async fn get_banco_by_id(state: &AppState, id: &ObjectId) -> Result<Option<Banco>, ApiError> {
    state
        .bancos
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_banco(
    state: &AppState,
    codigo: &str,
    nome: &str,
) -> Result<ObjectId, ApiError> {
    if state
        .bancos
        .find_one(doc! { "codigo": codigo })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "banco com código {codigo} já cadastrado"
        )));
    }
    let res = state
        .bancos
        .insert_one(Banco {
            id: None,
            codigo: codigo.to_string(),
            nome: nome.to_string(),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("banco insert missing _id")
        .map_err(Into::into)
}

pub async fn update_banco(
    state: &AppState,
    id: &ObjectId,
    codigo: &str,
    nome: &str,
) -> Result<(), ApiError> {
    if let Some(other) = state.bancos.find_one(doc! { "codigo": codigo }).await? {
        if other.id.as_ref() != Some(id) {
            return Err(ApiError::Conflict(format!(
                "banco com código {codigo} já cadastrado"
            )));
        }
    }
    state
        .bancos
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "codigo": codigo, "nome": nome } },
        )
        .await?;
    Ok(())
}

pub async fn delete_banco(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let in_use = state
        .contas_bancarias
        .find_one(doc! { "id_banco": id })
        .await?
        .is_some()
        || state
            .agencias
            .find_one(doc! { "id_banco": id })
            .await?
            .is_some()
        || state
            .configuracoes_api
            .find_one(doc! { "id_banco": id })
            .await?
            .is_some();
    if in_use {
        return Err(ApiError::Conflict(
            "banco possui registros vinculados".to_string(),
        ));
    }
    state.bancos.delete_one(doc! { "_id": id }).await?;
    Ok(())
}

pub async fn list_agencias(
    state: &AppState,
    banco: Option<&ObjectId>,
) -> Result<Vec<Agencia>, ApiError> {
    let filter = match banco {
        Some(id) => doc! { "id_banco": id },
        None => doc! {},
    };
    let mut cursor = state.agencias.find(filter).sort(doc! { "codigo": 1 }).await?;
    let mut items = Vec::new();
    while let Some(agencia) = cursor.try_next().await? {
        items.push(agencia);
    }
    Ok(items)
}

pub async fn get_agencia_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<Agencia>, ApiError> {
    state
        .agencias
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_agencia(
    state: &AppState,
    id_banco: &ObjectId,
    codigo: &str,
    digito: Option<String>,
    nome: &str,
) -> Result<ObjectId, ApiError> {
    if state
        .agencias
        .find_one(doc! { "id_banco": id_banco, "codigo": codigo })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "agência {codigo} já cadastrada para este banco"
        )));
    }
    let res = state
        .agencias
        .insert_one(Agencia {
            id: None,
            id_banco: *id_banco,
            codigo: codigo.to_string(),
            digito,
            nome: nome.to_string(),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("agencia insert missing _id")
        .map_err(Into::into)
}

pub async fn update_agencia(
    state: &AppState,
    id: &ObjectId,
    id_banco: &ObjectId,
    codigo: &str,
    digito: Option<String>,
    nome: &str,
) -> Result<(), ApiError> {
    if let Some(other) = state
        .agencias
        .find_one(doc! { "id_banco": id_banco, "codigo": codigo })
        .await?
    {
        if other.id.as_ref() != Some(id) {
            return Err(ApiError::Conflict(format!(
                "agência {codigo} já cadastrada para este banco"
            )));
        }
    }
    state
        .agencias
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "id_banco": id_banco,
                "codigo": codigo,
                "digito": digito.map(Bson::from).unwrap_or(Bson::Null),
                "nome": nome,
            } },
        )
        .await?;
    Ok(())
}

pub async fn delete_agencia(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let in_use = state
        .contas_bancarias
        .find_one(doc! { "id_agencia": id })
        .await?
        .is_some();
    if in_use {
        return Err(ApiError::Conflict(
            "agência possui contas vinculadas".to_string(),
        ));
    }
    state.agencias.delete_one(doc! { "_id": id }).await?;
    Ok(())
}

pub async fn list_tipos_conta(state: &AppState) -> Result<Vec<TipoConta>, ApiError> {
    let mut cursor = state
        .tipos_conta
        .find(doc! {})
        .sort(doc! { "codigo": 1 })
        .await?;
    let mut items = Vec::new();
    while let Some(tipo) = cursor.try_next().await? {
        items.push(tipo);
    }
    Ok(items)
}

pub async fn get_tipo_conta_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<TipoConta>, ApiError> {
    state
        .tipos_conta
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

pub async fn create_tipo_conta(
    state: &AppState,
    codigo: &str,
    descricao: &str,
) -> Result<ObjectId, ApiError> {
    if state
        .tipos_conta
        .find_one(doc! { "codigo": codigo })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "tipo de conta {codigo} já cadastrado"
        )));
    }
    let res = state
        .tipos_conta
        .insert_one(TipoConta {
            id: None,
            codigo: codigo.to_string(),
            descricao: descricao.to_string(),
        })
        .await?;
    res.inserted_id
        .as_object_id()
        .context("tipo de conta insert missing _id")
        .map_err(Into::into)
}

pub async fn update_tipo_conta(
    state: &AppState,
    id: &ObjectId,
    codigo: &str,
    descricao: &str,
) -> Result<(), ApiError> {
    if let Some(other) = state.tipos_conta.find_one(doc! { "codigo": codigo }).await? {
        if other.id.as_ref() != Some(id) {
            return Err(ApiError::Conflict(format!(
                "tipo de conta {codigo} já cadastrado"
            )));
        }
    }
    state
        .tipos_conta
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "codigo": codigo, "descricao": descricao } },
        )
        .await?;
    Ok(())
}

pub async fn delete_tipo_conta(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let in_use = state
        .contas_bancarias
        .find_one(doc! { "id_tipo_conta": id })
        .await?
        .is_some();
    if in_use {
        return Err(ApiError::Conflict(
            "tipo de conta possui contas vinculadas".to_string(),
        ));
    }
    state.tipos_conta.delete_one(doc! { "_id": id }).await?;
    Ok(())
}

pub async fn find_logradouro_by_cep(
    state: &AppState,
    cep: &str,
) -> Result<Option<Logradouro>, ApiError> {
    state
        .logradouros
        .find_one(doc! { "cep": cep })
        .await
        .map_err(Into::into)
}

/// Caches a ViaCEP hit so the next lookup is local.
pub async fn save_logradouro(state: &AppState, logradouro: Logradouro) -> Result<(), ApiError> {
    if state
        .logradouros
        .find_one(doc! { "cep": &logradouro.cep })
        .await?
        .is_none()
    {
        state.logradouros.insert_one(logradouro).await?;
    }
    Ok(())
}
