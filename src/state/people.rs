use anyhow::Context;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use std::time::SystemTime;

use crate::error::ApiError;
use crate::models::Person;
use crate::query::ListQuery;

use super::{AppState, Page, run_list};

pub async fn list_people(state: &AppState, query: &ListQuery) -> Result<Page<Person>, ApiError> {
    run_list(&state.people, query).await
}

pub async fn get_person_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<Person>, ApiError> {
    state
        .people
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Inserts the pessoa with all embedded children in one document write.
pub async fn create_person(state: &AppState, mut person: Person) -> Result<ObjectId, ApiError> {
    person.id = None;
    person.created_at = Some(DateTime::from_system_time(SystemTime::now()));
    person.updated_at = None;
    let res = state.people.insert_one(person).await?;
    res.inserted_id
        .as_object_id()
        .context("person insert missing _id")
        .map_err(Into::into)
}

/// Replaces the whole document, children included, atomically.
pub async fn update_person(
    state: &AppState,
    id: &ObjectId,
    mut person: Person,
) -> Result<(), ApiError> {
    person.id = Some(*id);
    person.updated_at = Some(DateTime::from_system_time(SystemTime::now()));
    state
        .people
        .replace_one(doc! { "_id": id }, person)
        .await?;
    Ok(())
}

/// Refuses to delete a pessoa that other records still reference.
pub async fn delete_person(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let has_accounts = state
        .contas_bancarias
        .find_one(doc! { "id_pessoa": id })
        .await?
        .is_some();
    let has_entries = state
        .lancamentos
        .find_one(doc! { "id_pessoa": id })
        .await?
        .is_some();
    let has_boletos = state
        .boletos
        .find_one(doc! { "id_pessoa_pagador": id })
        .await?
        .is_some();

    if has_accounts || has_entries || has_boletos {
        return Err(ApiError::Conflict(
            "pessoa possui registros vinculados; inative em vez de excluir".to_string(),
        ));
    }

    state.people.delete_one(doc! { "_id": id }).await?;
    Ok(())
}
