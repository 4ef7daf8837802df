// bank_api.rs
// Client for the bank's boleto issuance API: OAuth token, registration and
// baixa requests, plus PKCS#12 certificate validation for the config screen.

use mongodb::bson::DateTime;
use openssl::asn1::Asn1Time;
use openssl::pkcs12::Pkcs12;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, SystemTime};

use crate::models::{Boleto, BankApiConfig, Person};
use crate::state::Registro;

/// Failures talking to the bank. The message ends up in the boleto's
/// mensagem_erro and in the envelope, so it is written for an operator.
#[derive(Debug)]
pub struct BankApiFailure(pub String);

impl std::fmt::Display for BankApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Default)]
struct RegistroResponse {
    #[serde(default)]
    codigo_barras: Option<String>,
    #[serde(default)]
    linha_digitavel: Option<String>,
    #[serde(default)]
    txid_pix: Option<String>,
    #[serde(default)]
    mensagem: Option<String>,
}

pub struct BankApiClient<'a> {
    http: &'a reqwest::Client,
    config: &'a BankApiConfig,
}

impl<'a> BankApiClient<'a> {
    pub fn new(http: &'a reqwest::Client, config: &'a BankApiConfig) -> Self {
        BankApiClient { http, config }
    }

    async fn authenticate(&self) -> Result<String, BankApiFailure> {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BankApiFailure("client_id não configurado".to_string()))?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BankApiFailure("client_secret não configurado".to_string()))?;

        let response = self
            .http
            .post(&self.config.url_autenticacao)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| BankApiFailure(format!("falha ao autenticar no banco: {e}")))?;

        if !response.status().is_success() {
            return Err(BankApiFailure(format!(
                "autenticação recusada pelo banco (HTTP {})",
                response.status().as_u16()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BankApiFailure(format!("resposta de autenticação inválida: {e}")))?;
        Ok(token.access_token)
    }

    /// Registers the boleto with the bank and returns the issuance data.
    pub async fn registrar(
        &self,
        boleto: &Boleto,
        pagador: &Person,
    ) -> Result<Registro, BankApiFailure> {
        let token = self.authenticate().await?;
        let payload = registro_payload(self.config, boleto, pagador);

        let url = format!("{}/boletos", self.config.url_api.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BankApiFailure(format!("falha ao registrar boleto: {e}")))?;

        let status = response.status();
        let body: RegistroResponse = response.json().await.unwrap_or_default();
        if !status.is_success() {
            let detail = body
                .mensagem
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(BankApiFailure(format!(
                "registro recusado pelo banco: {detail}"
            )));
        }

        Ok(Registro {
            codigo_barras: body.codigo_barras,
            linha_digitavel: body.linha_digitavel,
            txid_pix: body.txid_pix,
        })
    }

    /// Asks the bank to write the boleto off (baixa).
    pub async fn baixar(&self, boleto: &Boleto) -> Result<(), BankApiFailure> {
        let token = self.authenticate().await?;
        let url = format!(
            "{}/boletos/{}/baixar",
            self.config.url_api.trim_end_matches('/'),
            boleto.nosso_numero
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "motivo": "SOLICITACAO_BENEFICIARIO" }))
            .send()
            .await
            .map_err(|e| BankApiFailure(format!("falha ao baixar boleto: {e}")))?;

        if !response.status().is_success() {
            return Err(BankApiFailure(format!(
                "baixa recusada pelo banco (HTTP {})",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

fn registro_payload(
    config: &BankApiConfig,
    boleto: &Boleto,
    pagador: &Person,
) -> serde_json::Value {
    let endereco = pagador.enderecos.iter().find(|e| e.principal).or_else(|| {
        pagador.enderecos.first()
    });
    json!({
        "convenio": config.convenio,
        "carteira": config.carteira,
        "nossoNumero": boleto.nosso_numero,
        "seuNumero": boleto.seu_numero,
        "valorNominal": boleto.valor_nominal,
        "dataEmissao": boleto.data_emissao.try_to_rfc3339_string().ok(),
        "dataVencimento": boleto.data_vencimento.try_to_rfc3339_string().ok(),
        "pagador": {
            "nome": pagador.nome,
            "tipoDocumento": pagador.fisica_juridica.as_str(),
            "documento": pagador.documento,
            "endereco": endereco.map(|e| json!({
                "logradouro": e.logradouro,
                "numero": e.numero,
                "bairro": e.bairro,
                "cidade": e.cidade,
                "uf": e.uf,
                "cep": e.cep,
            })),
        },
    })
}

/// Result of validating an uploaded PKCS#12 certificate.
#[derive(Debug)]
pub struct CertificadoInfo {
    pub validade: DateTime,
    pub expirado: bool,
}

/// Opens the PKCS#12 bundle with the given password and reads the
/// certificate expiry. Errors are human messages for the config form.
pub fn validar_certificado(path: &str, senha: &str) -> Result<CertificadoInfo, String> {
    let der = std::fs::read(path).map_err(|e| format!("não foi possível ler o certificado: {e}"))?;
    let pkcs12 =
        Pkcs12::from_der(&der).map_err(|_| "arquivo não é um PKCS#12 válido".to_string())?;
    let parsed = pkcs12
        .parse2(senha)
        .map_err(|_| "senha do certificado incorreta".to_string())?;
    let cert = parsed
        .cert
        .ok_or_else(|| "pacote PKCS#12 não contém certificado".to_string())?;

    let now = Asn1Time::days_from_now(0).map_err(|e| e.to_string())?;
    let diff = now.diff(cert.not_after()).map_err(|e| e.to_string())?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    let expirado = seconds <= 0;
    let validade = if expirado {
        SystemTime::now() - Duration::from_secs(seconds.unsigned_abs())
    } else {
        SystemTime::now() + Duration::from_secs(seconds as u64)
    };

    Ok(CertificadoInfo {
        validade: DateTime::from_system_time(validade),
        expirado,
    })
}
