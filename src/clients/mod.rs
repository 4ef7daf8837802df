// clients: external collaborators reached over HTTP plus certificate checks.

pub mod bank_api;
pub mod cep;
