// models.rs
// Domain documents stored in MongoDB and the enums they carry.

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// User roles for authorization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Staff
    }
}

/// Back-office user; `secret` is a Base32 TOTP seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub secret: String,
    pub role: UserRole,
}

/// Session document linking a cookie token to a user, its CSRF token and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub csrf_token: String,
    pub user_email: String,
    pub expires_at: DateTime,
}

/// Physical person ("F") or legal entity ("J").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersonKind {
    #[serde(rename = "F")]
    Fisica,
    #[serde(rename = "J")]
    Juridica,
}

impl PersonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonKind::Fisica => "F",
            PersonKind::Juridica => "J",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telefone {
    pub numero: String,
    pub tipo: String,
    #[serde(default)]
    pub principal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContato {
    pub endereco: String,
    pub tipo: String,
    #[serde(default)]
    pub principal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endereco {
    pub cep: String,
    pub logradouro: String,
    #[serde(default)]
    pub numero: Option<String>,
    #[serde(default)]
    pub complemento: Option<String>,
    pub bairro: String,
    pub cidade: String,
    pub uf: String,
    pub tipo: String,
    #[serde(default)]
    pub principal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChavePix {
    pub chave: String,
    pub tipo: String,
}

/// Pessoa document. Contact children are embedded so a person and its
/// phones/emails/addresses are always written in one atomic document update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub nome: String,
    pub fisica_juridica: PersonKind,
    pub documento: String,
    pub dt_cadastro: DateTime,
    pub ativo: bool,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub telefones: Vec<Telefone>,
    #[serde(default)]
    pub emails: Vec<EmailContato>,
    #[serde(default)]
    pub enderecos: Vec<Endereco>,
    #[serde(default)]
    pub chaves_pix: Vec<ChavePix>,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

/// Reference data: bank, uniquely keyed by its compensation code ("033", "341", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banco {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub codigo: String,
    pub nome: String,
}

/// Reference data: branch, keyed by código within its bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agencia {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub id_banco: ObjectId,
    pub codigo: String,
    #[serde(default)]
    pub digito: Option<String>,
    pub nome: String,
}

/// Reference data: account type (corrente, poupança, ...), keyed by código.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipoConta {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub codigo: String,
    pub descricao: String,
}

/// Conta bancária belonging to exactly one pessoa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub id_pessoa: ObjectId,
    pub id_banco: ObjectId,
    #[serde(default)]
    pub id_agencia: Option<ObjectId>,
    pub id_tipo_conta: ObjectId,
    pub codigo: String,
    #[serde(default)]
    pub digito: Option<String>,
    #[serde(default)]
    pub titular: Option<String>,
    pub principal: bool,
    pub ativo: bool,
    #[serde(default)]
    pub registrada: bool,
    #[serde(default)]
    pub aceita_multipag: bool,
    #[serde(default)]
    pub usa_endereco_cobranca: bool,
    #[serde(default)]
    pub cobranca_compartilhada: bool,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

/// Receivable ("receber") or payable ("pagar").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Receber,
    Pagar,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Receber => "receber",
            EntryKind::Pagar => "pagar",
        }
    }
}

/// Lifecycle state of a lançamento.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Aberto,
    PagoParcial,
    Pago,
    Cancelado,
    Suspenso,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Aberto => "aberto",
            EntryStatus::PagoParcial => "pago_parcial",
            EntryStatus::Pago => "pago",
            EntryStatus::Cancelado => "cancelado",
            EntryStatus::Suspenso => "suspenso",
        }
    }
}

/// Named sequence backing sequential numbering, bumped with `$inc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub seq: i64,
}

/// Lançamento financeiro.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub numero: i64,
    pub tipo: EntryKind,
    pub historico: String,
    #[serde(default)]
    pub id_pessoa: Option<ObjectId>,
    #[serde(default)]
    pub id_conta_bancaria: Option<ObjectId>,
    pub valor: f64,
    #[serde(default)]
    pub valor_desconto: f64,
    #[serde(default)]
    pub valor_juros: f64,
    #[serde(default)]
    pub valor_multa: f64,
    #[serde(default)]
    pub valor_pago: f64,
    pub data_movimento: DateTime,
    pub data_vencimento: DateTime,
    /// Accounting period, "YYYY-MM".
    pub competencia: String,
    #[serde(default)]
    pub reter_inss: bool,
    #[serde(default)]
    pub perc_inss: Option<f64>,
    #[serde(default)]
    pub valor_inss: Option<f64>,
    #[serde(default)]
    pub reter_iss: bool,
    #[serde(default)]
    pub perc_iss: Option<f64>,
    #[serde(default)]
    pub valor_iss: Option<f64>,
    #[serde(default)]
    pub forma_pagamento: Option<String>,
    #[serde(default)]
    pub data_pagamento: Option<DateTime>,
    pub status: EntryStatus,
    #[serde(default)]
    pub motivo: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl FinancialEntry {
    /// Net amount owed after retentions, discount, interest and fine.
    pub fn valor_liquido(&self) -> f64 {
        self.valor - self.valor_desconto - self.valor_inss.unwrap_or(0.0)
            - self.valor_iss.unwrap_or(0.0)
            + self.valor_juros
            + self.valor_multa
    }
}

/// Lifecycle state of a boleto.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoletoStatus {
    Pendente,
    Registrado,
    Pago,
    Baixado,
    Erro,
}

impl BoletoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoletoStatus::Pendente => "pendente",
            BoletoStatus::Registrado => "registrado",
            BoletoStatus::Pago => "pago",
            BoletoStatus::Baixado => "baixado",
            BoletoStatus::Erro => "erro",
        }
    }
}

/// Boleto generated against a lançamento.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boleto {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub id_configuracao: Option<ObjectId>,
    pub id_lancamento: ObjectId,
    pub id_pessoa_pagador: ObjectId,
    pub nosso_numero: String,
    #[serde(default)]
    pub seu_numero: Option<String>,
    pub valor_nominal: f64,
    pub data_emissao: DateTime,
    pub data_vencimento: DateTime,
    #[serde(default)]
    pub codigo_barras: Option<String>,
    #[serde(default)]
    pub linha_digitavel: Option<String>,
    #[serde(default)]
    pub txid_pix: Option<String>,
    pub status: BoletoStatus,
    #[serde(default)]
    pub mensagem_erro: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

/// Target environment for a bank API integration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Ambiente {
    Sandbox,
    Producao,
}

impl Ambiente {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ambiente::Sandbox => "sandbox",
            Ambiente::Producao => "producao",
        }
    }
}

/// Per-bank issuance API credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankApiConfig {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub id_banco: ObjectId,
    #[serde(default)]
    pub id_conta_bancaria: Option<ObjectId>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub convenio: String,
    pub carteira: String,
    pub ambiente: Ambiente,
    pub url_autenticacao: String,
    pub url_api: String,
    #[serde(default)]
    pub certificado_path: Option<String>,
    #[serde(default)]
    pub certificado_validade: Option<DateTime>,
    /// Per-config counter used when composing the nosso número.
    #[serde(default)]
    pub sequencia: i64,
    pub ativo: bool,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl BankApiConfig {
    pub fn certificado_valido(&self) -> bool {
        match self.certificado_validade {
            Some(validade) => validade.to_system_time() > std::time::SystemTime::now(),
            None => false,
        }
    }
}

/// Cached street record fed by the CEP lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logradouro {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub cep: String,
    pub logradouro: String,
    pub bairro: String,
    pub cidade: String,
    pub uf: String,
}
