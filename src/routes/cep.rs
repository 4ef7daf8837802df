// routes/cep.rs
// GET /cep/{cep} resolves an address, serving repeats from the local cache.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use crate::clients::cep::lookup_cep;
use crate::error::{ApiError, ApiResponse};
use crate::session::SessionUser;
use crate::state::AppState;

pub async fn lookup(
    State(state): State<Arc<AppState>>,
    _session: SessionUser,
    Path(cep): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let logradouro = lookup_cep(&state, &cep).await?;
    ApiResponse::ok_record(&logradouro)
}
