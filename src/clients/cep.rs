// cep.rs
// CEP lookup against ViaCEP with a local logradouros cache. Looked-up
// addresses are cached so repeated lookups never hit the upstream again.

use serde::Deserialize;

use crate::error::ApiError;
use crate::models::Logradouro;
use crate::state::{AppState, find_logradouro_by_cep, save_logradouro};

#[derive(Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    erro: bool,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

/// Strips formatting and validates the CEP shape (8 digits).
pub fn normalize_cep(raw: &str) -> Result<String, ApiError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 8 {
        return Err(ApiError::invalid("cep", "CEP deve ter 8 dígitos"));
    }
    Ok(digits)
}

/// Resolves a CEP, first from the local cache, then from ViaCEP.
pub async fn lookup_cep(state: &AppState, raw: &str) -> Result<Logradouro, ApiError> {
    let cep = normalize_cep(raw)?;

    if let Some(cached) = find_logradouro_by_cep(state, &cep).await? {
        return Ok(cached);
    }

    let url = format!("{}/ws/{}/json/", state.viacep_base.trim_end_matches('/'), cep);
    let response = state
        .http
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("consulta ViaCEP falhou: {e}"))?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "ViaCEP respondeu HTTP {}",
            response.status().as_u16()
        )
        .into());
    }
    let body: ViaCepResponse = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("resposta ViaCEP inválida: {e}"))?;
    if body.erro {
        return Err(ApiError::not_found("CEP"));
    }

    let logradouro = Logradouro {
        id: None,
        cep,
        logradouro: body.logradouro,
        bairro: body.bairro,
        cidade: body.localidade,
        uf: body.uf,
    };
    save_logradouro(state, logradouro.clone()).await?;
    Ok(logradouro)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize_cep("01310-100").unwrap(), "01310100");
        assert_eq!(normalize_cep("01310100").unwrap(), "01310100");
    }

    #[test]
    fn normalize_rejects_short_and_garbage() {
        assert!(normalize_cep("1310-100").is_err());
        assert!(normalize_cep("abcdefgh").is_err());
        assert!(normalize_cep("").is_err());
    }
}
