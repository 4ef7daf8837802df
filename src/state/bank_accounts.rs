use anyhow::Context;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use std::time::SystemTime;

use crate::error::ApiError;
use crate::models::BankAccount;
use crate::query::ListQuery;

use super::{AppState, Page, run_list};

pub async fn list_bank_accounts(
    state: &AppState,
    query: &ListQuery,
) -> Result<Page<BankAccount>, ApiError> {
    run_list(&state.contas_bancarias, query).await
}

pub async fn get_bank_account_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<BankAccount>, ApiError> {
    state
        .contas_bancarias
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Inserts the conta; when it is marked principal the flag is first cleared
/// on the pessoa's other contas so at most one stays principal.
pub async fn create_bank_account(
    state: &AppState,
    mut conta: BankAccount,
) -> Result<ObjectId, ApiError> {
    if conta.principal {
        clear_principal(state, &conta.id_pessoa, None).await?;
    }
    conta.id = None;
    conta.created_at = Some(DateTime::from_system_time(SystemTime::now()));
    conta.updated_at = None;
    let res = state.contas_bancarias.insert_one(conta).await?;
    res.inserted_id
        .as_object_id()
        .context("conta bancária insert missing _id")
        .map_err(Into::into)
}

pub async fn update_bank_account(
    state: &AppState,
    id: &ObjectId,
    mut conta: BankAccount,
) -> Result<(), ApiError> {
    if conta.principal {
        clear_principal(state, &conta.id_pessoa, Some(id)).await?;
    }
    conta.id = Some(*id);
    conta.updated_at = Some(DateTime::from_system_time(SystemTime::now()));
    state
        .contas_bancarias
        .replace_one(doc! { "_id": id }, conta)
        .await?;
    Ok(())
}

pub async fn delete_bank_account(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let in_use = state
        .lancamentos
        .find_one(doc! { "id_conta_bancaria": id })
        .await?
        .is_some()
        || state
            .configuracoes_api
            .find_one(doc! { "id_conta_bancaria": id })
            .await?
            .is_some();
    if in_use {
        return Err(ApiError::Conflict(
            "conta bancária possui registros vinculados; inative em vez de excluir".to_string(),
        ));
    }
    state
        .contas_bancarias
        .delete_one(doc! { "_id": id })
        .await?;
    Ok(())
}

async fn clear_principal(
    state: &AppState,
    id_pessoa: &ObjectId,
    keep: Option<&ObjectId>,
) -> Result<(), ApiError> {
    let mut filter = doc! { "id_pessoa": id_pessoa, "principal": true };
    if let Some(id) = keep {
        filter.insert("_id", doc! { "$ne": id });
    }
    state
        .contas_bancarias
        .update_many(filter, doc! { "$set": { "principal": false } })
        .await?;
    Ok(())
}
