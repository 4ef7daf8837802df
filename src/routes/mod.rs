// routes: JSON endpoints. /login is public; everything else sits behind the
// session middleware, which also enforces the CSRF header on mutations.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use chrono::NaiveDate;
use mongodb::bson::{DateTime, oid::ObjectId};

use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResponse};
use crate::query::ListQuery;
use crate::session::require_session;
use crate::state::{AppState, Page};

mod bank_accounts;
mod bank_configs;
mod boletos;
mod cep;
mod entries;
mod login;
mod people;
mod reference;
mod reports;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logout", post(login::logout))
        .route("/pessoas", get(people::list).post(people::create))
        .route(
            "/pessoas/{id}",
            get(people::show).put(people::update).delete(people::remove),
        )
        .route("/bancos", get(reference::list_bancos).post(reference::create_banco))
        .route(
            "/bancos/{id}",
            get(reference::show_banco)
                .put(reference::update_banco)
                .delete(reference::remove_banco),
        )
        .route(
            "/agencias",
            get(reference::list_agencias).post(reference::create_agencia),
        )
        .route(
            "/agencias/{id}",
            get(reference::show_agencia)
                .put(reference::update_agencia)
                .delete(reference::remove_agencia),
        )
        .route(
            "/tipos-conta",
            get(reference::list_tipos_conta).post(reference::create_tipo_conta),
        )
        .route(
            "/tipos-conta/{id}",
            get(reference::show_tipo_conta)
                .put(reference::update_tipo_conta)
                .delete(reference::remove_tipo_conta),
        )
        .route(
            "/contas-bancarias",
            get(bank_accounts::list).post(bank_accounts::create),
        )
        .route(
            "/contas-bancarias/{id}",
            get(bank_accounts::show)
                .put(bank_accounts::update)
                .delete(bank_accounts::remove),
        )
        .route("/lancamentos", get(entries::list).post(entries::create))
        .route("/lancamentos/vencidos", get(entries::overdue))
        .route("/lancamentos/estatisticas", get(entries::stats))
        .route(
            "/lancamentos/{id}",
            get(entries::show).put(entries::update).delete(entries::remove),
        )
        .route("/lancamentos/{id}/baixa", post(entries::baixa))
        .route("/lancamentos/{id}/estornar", post(entries::estornar))
        .route("/lancamentos/{id}/cancelar", post(entries::cancelar))
        .route("/lancamentos/{id}/suspender", post(entries::suspender))
        .route("/lancamentos/{id}/reativar", post(entries::reativar))
        .route("/boletos", get(boletos::list).post(boletos::create))
        .route("/boletos/{id}", get(boletos::show).delete(boletos::remove))
        .route("/boletos/{id}/registrar", post(boletos::registrar))
        .route("/boletos/{id}/baixar", post(boletos::baixar))
        .route(
            "/configuracoes-api",
            get(bank_configs::list).post(bank_configs::create),
        )
        .route(
            "/configuracoes-api/{id}",
            get(bank_configs::show)
                .put(bank_configs::update)
                .delete(bank_configs::remove),
        )
        .route(
            "/configuracoes-api/{id}/test-connection",
            post(bank_configs::test_connection),
        )
        .route("/cep/{cep}", get(cep::lookup))
        .route("/relatorios/lancamentos", get(reports::lancamentos_pdf))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/login", post(login::login))
        .merge(protected)
        .with_state(state)
}

/// List envelope: the page plus the echo of the filters that actually became
/// predicates, so the client can re-render the search form as submitted.
pub(crate) fn page_envelope<T: Serialize>(
    page: &Page<T>,
    query: &ListQuery,
) -> Result<Json<ApiResponse>, ApiError> {
    let records = serde_json::to_value(&page.records).map_err(anyhow::Error::from)?;
    let active: serde_json::Map<String, Value> = query
        .active
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Ok(ApiResponse::ok(serde_json::json!({
        "records": records,
        "total_count": page.total,
        "page": query.page,
        "per_page": query.per_page,
        "active_filters": active,
    })))
}

/// Path/payload ObjectId parsing; a malformed id is a validation problem,
/// not a 404.
pub(crate) fn parse_id(field: &str, raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| ApiError::invalid(field, "identificador inválido"))
}

/// "YYYY-MM-DD" at midnight UTC.
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<DateTime, ApiError> {
    let day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(field, "data deve estar no formato AAAA-MM-DD"))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ApiError::invalid(field, "data inválida"))?
        .and_utc();
    Ok(DateTime::from_chrono(midnight))
}

/// "YYYY-MM" accounting period.
pub(crate) fn valid_competencia(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    let year_ok = bytes[..4].iter().all(u8::is_ascii_digit);
    let month_ok = value[5..]
        .parse::<u8>()
        .map(|m| (1..=12).contains(&m))
        .unwrap_or(false);
    year_ok && month_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competencia_format_is_strict() {
        assert!(valid_competencia("2026-08"));
        assert!(valid_competencia("1999-12"));
        assert!(!valid_competencia("2026-13"));
        assert!(!valid_competencia("2026-00"));
        assert!(!valid_competencia("2026/08"));
        assert!(!valid_competencia("26-08"));
        assert!(!valid_competencia(""));
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        assert!(parse_id("id", "abc").is_err());
        assert!(parse_id("id", "0123456789abcdef01234567").is_ok());
    }
}
