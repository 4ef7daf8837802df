// Lançamentos: CRUD, the settle/reverse/cancel/suspend lifecycle, retention
// math and the per-tipo sequential number.

use anyhow::Context;
use futures::stream::TryStreamExt;
use mongodb::bson::{Bson, DateTime, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;
use serde::Serialize;
use std::time::SystemTime;

use crate::error::ApiError;
use crate::models::{EntryKind, EntryStatus, FinancialEntry};
use crate::query::ListQuery;

use super::{AppState, Page, run_list};

// Tolerance when comparing accumulated payments against the net value.
const CENT: f64 = 0.005;

pub async fn list_entries(
    state: &AppState,
    query: &ListQuery,
) -> Result<Page<FinancialEntry>, ApiError> {
    run_list(&state.lancamentos, query).await
}

pub async fn get_entry_by_id(
    state: &AppState,
    id: &ObjectId,
) -> Result<Option<FinancialEntry>, ApiError> {
    state
        .lancamentos
        .find_one(doc! { "_id": id })
        .await
        .map_err(Into::into)
}

/// Next sequential número for the tipo, drawn from an upserted `$inc`
/// counter so concurrent creates never share a número.
pub async fn next_numero(state: &AppState, tipo: EntryKind) -> Result<i64, ApiError> {
    let counter = state
        .counters
        .find_one_and_update(
            doc! { "_id": format!("lancamentos_{}", tipo.as_str()) },
            doc! { "$inc": { "seq": 1i64 } },
        )
        .upsert(true)
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| anyhow::anyhow!("contador de lançamentos indisponível"))?;
    Ok(counter.seq)
}

/// INSS/ISS retention amounts, recomputed on every save.
pub fn apply_retencoes(entry: &mut FinancialEntry) {
    entry.valor_inss = match (entry.reter_inss, entry.perc_inss) {
        (true, Some(perc)) if perc > 0.0 => Some(round2(entry.valor * perc / 100.0)),
        _ => None,
    };
    entry.valor_iss = match (entry.reter_iss, entry.perc_iss) {
        (true, Some(perc)) if perc > 0.0 => Some(round2(entry.valor * perc / 100.0)),
        _ => None,
    };
}

/// Derives the open/partial/paid status from the accumulated payment.
/// Cancelado and suspenso are set only by their named transitions.
pub fn recompute_status(entry: &mut FinancialEntry) {
    if matches!(entry.status, EntryStatus::Cancelado | EntryStatus::Suspenso) {
        return;
    }
    let liquido = entry.valor_liquido();
    entry.status = if entry.valor_pago <= CENT {
        EntryStatus::Aberto
    } else if entry.valor_pago + CENT >= liquido {
        EntryStatus::Pago
    } else {
        EntryStatus::PagoParcial
    };
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub async fn create_entry(
    state: &AppState,
    mut entry: FinancialEntry,
) -> Result<ObjectId, ApiError> {
    entry.id = None;
    entry.numero = next_numero(state, entry.tipo).await?;
    if entry.competencia.trim().is_empty() {
        entry.competencia = competencia_from(&entry.data_vencimento);
    }
    apply_retencoes(&mut entry);
    entry.valor_pago = 0.0;
    entry.data_pagamento = None;
    entry.status = EntryStatus::Aberto;
    recompute_status(&mut entry);
    entry.created_at = Some(DateTime::from_system_time(SystemTime::now()));
    entry.updated_at = None;

    let res = state.lancamentos.insert_one(entry).await?;
    res.inserted_id
        .as_object_id()
        .context("lançamento insert missing _id")
        .map_err(Into::into)
}

/// Rewrites the editable fields of an entry. Payment and lifecycle fields are
/// owned by the named transitions and survive the update untouched.
pub async fn update_entry(
    state: &AppState,
    id: &ObjectId,
    mut entry: FinancialEntry,
) -> Result<FinancialEntry, ApiError> {
    let existing = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;

    match existing.status {
        EntryStatus::Cancelado => {
            return Err(ApiError::Conflict(
                "não é possível editar um lançamento cancelado".to_string(),
            ));
        }
        EntryStatus::Pago => {
            return Err(ApiError::Conflict(
                "não é possível editar um lançamento já pago; estorne primeiro".to_string(),
            ));
        }
        _ => {}
    }

    entry.id = Some(*id);
    entry.numero = existing.numero;
    entry.valor_pago = existing.valor_pago;
    entry.data_pagamento = existing.data_pagamento;
    entry.forma_pagamento = existing.forma_pagamento;
    entry.status = existing.status;
    entry.motivo = existing.motivo;
    entry.created_at = existing.created_at;
    entry.updated_at = Some(DateTime::from_system_time(SystemTime::now()));
    if entry.competencia.trim().is_empty() {
        entry.competencia = competencia_from(&entry.data_vencimento);
    }
    apply_retencoes(&mut entry);
    recompute_status(&mut entry);

    let updated = entry.clone();
    state
        .lancamentos
        .replace_one(doc! { "_id": id }, entry)
        .await?;
    Ok(updated)
}

pub async fn delete_entry(state: &AppState, id: &ObjectId) -> Result<(), ApiError> {
    let entry = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;
    if entry.valor_pago > CENT {
        return Err(ApiError::Conflict(
            "não é possível excluir um lançamento com pagamento; estorne primeiro".to_string(),
        ));
    }
    if state
        .boletos
        .find_one(doc! { "id_lancamento": id })
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "lançamento possui boletos vinculados".to_string(),
        ));
    }
    state.lancamentos.delete_one(doc! { "_id": id }).await?;
    Ok(())
}

/// Payment data submitted to the baixa action.
#[derive(Debug, Clone)]
pub struct Baixa {
    pub data_pagamento: DateTime,
    pub valor_pago: f64,
    pub forma_pagamento: Option<String>,
    pub id_conta_bancaria: Option<ObjectId>,
    pub valor_desconto: Option<f64>,
    pub valor_juros: Option<f64>,
    pub valor_multa: Option<f64>,
}

/// Settle: accumulates the payment and moves the entry to pago or
/// pago_parcial. One update_one call, so the transition never half-applies.
pub async fn settle_entry(
    state: &AppState,
    id: &ObjectId,
    baixa: Baixa,
) -> Result<FinancialEntry, ApiError> {
    let mut entry = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;

    match entry.status {
        EntryStatus::Cancelado => {
            return Err(ApiError::Conflict(
                "não é possível baixar um lançamento cancelado".to_string(),
            ));
        }
        EntryStatus::Suspenso => {
            return Err(ApiError::Conflict(
                "não é possível baixar um lançamento suspenso".to_string(),
            ));
        }
        EntryStatus::Pago => {
            return Err(ApiError::Conflict(
                "lançamento já está totalmente pago".to_string(),
            ));
        }
        EntryStatus::Aberto | EntryStatus::PagoParcial => {}
    }

    if baixa.valor_pago <= 0.0 {
        return Err(ApiError::invalid("valor_pago", "deve ser maior que zero"));
    }

    entry.data_pagamento = Some(baixa.data_pagamento);
    entry.valor_pago = round2(entry.valor_pago + baixa.valor_pago);
    if let Some(forma) = baixa.forma_pagamento {
        entry.forma_pagamento = Some(forma);
    }
    if let Some(conta) = baixa.id_conta_bancaria {
        entry.id_conta_bancaria = Some(conta);
    }
    if let Some(desconto) = baixa.valor_desconto {
        entry.valor_desconto = round2(desconto);
    }
    if let Some(juros) = baixa.valor_juros {
        entry.valor_juros = round2(juros);
    }
    if let Some(multa) = baixa.valor_multa {
        entry.valor_multa = round2(multa);
    }
    recompute_status(&mut entry);

    persist_transition(state, id, &entry).await?;
    Ok(entry)
}

/// Estorno: undoes the payment and returns the entry to aberto.
pub async fn reverse_entry(state: &AppState, id: &ObjectId) -> Result<FinancialEntry, ApiError> {
    let mut entry = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;

    if !matches!(entry.status, EntryStatus::Pago | EntryStatus::PagoParcial) {
        return Err(ApiError::Conflict(
            "lançamento não possui pagamento para estornar".to_string(),
        ));
    }

    entry.data_pagamento = None;
    entry.valor_pago = 0.0;
    entry.forma_pagamento = None;
    entry.status = EntryStatus::Aberto;

    persist_transition(state, id, &entry).await?;
    Ok(entry)
}

pub async fn cancel_entry(
    state: &AppState,
    id: &ObjectId,
    motivo: &str,
) -> Result<FinancialEntry, ApiError> {
    let mut entry = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;

    match entry.status {
        EntryStatus::Pago => {
            return Err(ApiError::Conflict(
                "não é possível cancelar um lançamento totalmente pago".to_string(),
            ));
        }
        EntryStatus::Cancelado => {
            return Err(ApiError::Conflict(
                "lançamento já está cancelado".to_string(),
            ));
        }
        _ => {}
    }

    entry.status = EntryStatus::Cancelado;
    entry.motivo = Some(motivo.to_string());

    persist_transition(state, id, &entry).await?;
    Ok(entry)
}

pub async fn suspend_entry(
    state: &AppState,
    id: &ObjectId,
    motivo: &str,
) -> Result<FinancialEntry, ApiError> {
    let mut entry = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;

    match entry.status {
        EntryStatus::Cancelado => {
            return Err(ApiError::Conflict(
                "não é possível suspender um lançamento cancelado".to_string(),
            ));
        }
        EntryStatus::Pago => {
            return Err(ApiError::Conflict(
                "não é possível suspender um lançamento pago".to_string(),
            ));
        }
        EntryStatus::Suspenso => {
            return Err(ApiError::Conflict(
                "lançamento já está suspenso".to_string(),
            ));
        }
        _ => {}
    }

    entry.status = EntryStatus::Suspenso;
    entry.motivo = Some(motivo.to_string());

    persist_transition(state, id, &entry).await?;
    Ok(entry)
}

/// Reativar: leaves suspenso, recomputing the status from the paid total.
pub async fn reactivate_entry(
    state: &AppState,
    id: &ObjectId,
) -> Result<FinancialEntry, ApiError> {
    let mut entry = get_entry_by_id(state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("lançamento"))?;

    if entry.status != EntryStatus::Suspenso {
        return Err(ApiError::Conflict(
            "lançamento não está suspenso".to_string(),
        ));
    }

    entry.motivo = None;
    entry.status = EntryStatus::Aberto;
    recompute_status(&mut entry);

    persist_transition(state, id, &entry).await?;
    Ok(entry)
}

async fn persist_transition(
    state: &AppState,
    id: &ObjectId,
    entry: &FinancialEntry,
) -> Result<(), ApiError> {
    state
        .lancamentos
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "status": entry.status.as_str(),
                "motivo": entry.motivo.as_deref().map(Bson::from).unwrap_or(Bson::Null),
                "valor_pago": entry.valor_pago,
                "valor_desconto": entry.valor_desconto,
                "valor_juros": entry.valor_juros,
                "valor_multa": entry.valor_multa,
                "data_pagamento": entry.data_pagamento.map(Bson::from).unwrap_or(Bson::Null),
                "forma_pagamento": entry.forma_pagamento.as_deref().map(Bson::from).unwrap_or(Bson::Null),
                "id_conta_bancaria": entry.id_conta_bancaria.map(Bson::from).unwrap_or(Bson::Null),
                "updated_at": DateTime::from_system_time(SystemTime::now()),
            } },
        )
        .await?;
    Ok(())
}

/// Open or partially paid entries past their due date.
pub async fn list_overdue(
    state: &AppState,
    tipo: Option<EntryKind>,
) -> Result<Vec<FinancialEntry>, ApiError> {
    let now = DateTime::from_system_time(SystemTime::now());
    let mut filter = doc! {
        "status": { "$in": ["aberto", "pago_parcial"] },
        "data_vencimento": { "$lt": now },
    };
    if let Some(tipo) = tipo {
        filter.insert("tipo", tipo.as_str());
    }
    let mut cursor = state
        .lancamentos
        .find(filter)
        .sort(doc! { "data_vencimento": 1 })
        .await?;
    let mut items = Vec::new();
    while let Some(entry) = cursor.try_next().await? {
        items.push(entry);
    }
    Ok(items)
}

#[derive(Debug, Default, Serialize)]
pub struct EntryStats {
    pub total: u64,
    pub abertos: u64,
    pub pagos: u64,
    pub parciais: u64,
    pub cancelados: u64,
    pub suspensos: u64,
    pub valor_a_receber: f64,
    pub valor_a_pagar: f64,
    pub valor_recebido: f64,
    pub valor_pago: f64,
}

/// Totals by status and tipo, optionally restricted to one competência.
pub async fn entry_stats(
    state: &AppState,
    competencia: Option<&str>,
) -> Result<EntryStats, ApiError> {
    let filter = match competencia {
        Some(c) => doc! { "competencia": c },
        None => doc! {},
    };
    let mut cursor = state.lancamentos.find(filter).await?;
    let mut stats = EntryStats::default();
    while let Some(entry) = cursor.try_next().await? {
        stats.total += 1;
        match entry.status {
            EntryStatus::Aberto => stats.abertos += 1,
            EntryStatus::Pago => stats.pagos += 1,
            EntryStatus::PagoParcial => stats.parciais += 1,
            EntryStatus::Cancelado => stats.cancelados += 1,
            EntryStatus::Suspenso => stats.suspensos += 1,
        }
        if matches!(
            entry.status,
            EntryStatus::Aberto | EntryStatus::PagoParcial | EntryStatus::Pago
        ) {
            let pendente = (entry.valor_liquido() - entry.valor_pago).max(0.0);
            match entry.tipo {
                EntryKind::Receber => {
                    stats.valor_a_receber += pendente;
                    stats.valor_recebido += entry.valor_pago;
                }
                EntryKind::Pagar => {
                    stats.valor_a_pagar += pendente;
                    stats.valor_pago += entry.valor_pago;
                }
            }
        }
    }
    Ok(stats)
}

fn competencia_from(vencimento: &DateTime) -> String {
    let chrono = vencimento.to_chrono();
    chrono.format("%Y-%m").to_string()
}
