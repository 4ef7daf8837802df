// state module: AppState, initialization, and re-exports of submodules.

use anyhow::Result;
use futures::stream::TryStreamExt;
use mongodb::{Client, Collection};
use serde::de::DeserializeOwned;
use std::env;

use crate::error::ApiError;
use crate::models::{
    Agencia, Banco, BankAccount, BankApiConfig, Boleto, Counter, FinancialEntry, Logradouro,
    Person, Session, TipoConta, User,
};
use crate::query::ListQuery;

mod bank_accounts;
mod bank_configs;
mod boletos;
mod entries;
mod people;
mod reference;
mod seed;
mod sessions;

pub use bank_accounts::*;
pub use bank_configs::*;
pub use boletos::*;
pub use entries::*;
pub use people::*;
pub use reference::*;
pub use sessions::*;

pub const SESSION_TTL_SECONDS: u64 = 60 * 60 * 24; // 1 day

#[derive(Clone)]
pub struct AppState {
    pub users: Collection<User>,
    pub sessions: Collection<Session>,
    pub people: Collection<Person>,
    pub bancos: Collection<Banco>,
    pub agencias: Collection<Agencia>,
    pub tipos_conta: Collection<TipoConta>,
    pub contas_bancarias: Collection<BankAccount>,
    pub lancamentos: Collection<FinancialEntry>,
    pub boletos: Collection<Boleto>,
    pub configuracoes_api: Collection<BankApiConfig>,
    pub logradouros: Collection<Logradouro>,
    pub counters: Collection<Counter>,
    pub http: reqwest::Client,
    pub viacep_base: String,
}

pub async fn init_state() -> Result<AppState> {
    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = env::var("MONGODB_DB").unwrap_or_else(|_| "predios".to_string());
    let viacep_base =
        env::var("VIACEP_BASE").unwrap_or_else(|_| "https://viacep.com.br".to_string());

    let client = Client::with_uri_str(uri).await?;
    let db = client.database(&db_name);

    let state = AppState {
        users: db.collection::<User>("users"),
        sessions: db.collection::<Session>("sessions"),
        people: db.collection::<Person>("pessoas"),
        bancos: db.collection::<Banco>("bancos"),
        agencias: db.collection::<Agencia>("agencias"),
        tipos_conta: db.collection::<TipoConta>("tipos_conta"),
        contas_bancarias: db.collection::<BankAccount>("contas_bancarias"),
        lancamentos: db.collection::<FinancialEntry>("lancamentos"),
        boletos: db.collection::<Boleto>("boletos"),
        configuracoes_api: db.collection::<BankApiConfig>("configuracoes_api"),
        logradouros: db.collection::<Logradouro>("logradouros"),
        counters: db.collection::<Counter>("counters"),
        http: reqwest::Client::new(),
        viacep_base,
    };

    seed::ensure_reference_data(&state).await?;
    seed::ensure_admin_user(&state).await?;

    Ok(state)
}

/// One page of records plus the total the filter matches.
#[derive(Debug)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
}

/// Runs a built ListQuery against a collection. A page past the end of the
/// result set comes back empty, never as an error.
pub(crate) async fn run_list<T>(
    coll: &Collection<T>,
    query: &ListQuery,
) -> Result<Page<T>, ApiError>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    let total = coll.count_documents(query.filter.clone()).await?;
    let mut cursor = coll
        .find(query.filter.clone())
        .sort(query.sort.clone())
        .skip(query.skip)
        .limit(query.limit)
        .await?;
    let mut records = Vec::new();
    while let Some(item) = cursor.try_next().await? {
        records.push(item);
    }
    Ok(Page { records, total })
}
