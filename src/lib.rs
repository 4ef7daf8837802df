// Back office prediale: pessoas, contas bancárias, lançamentos financeiros,
// boletos e integrações bancárias, servidos como uma API JSON sobre MongoDB.

pub mod clients;
pub mod error;
pub mod models;
pub mod notify;
pub mod query;
pub mod report;
pub mod routes;
pub mod session;
pub mod state;
pub mod totp;
