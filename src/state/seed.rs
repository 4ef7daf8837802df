// Seeds reference data and the initial admin user on an empty database.

use anyhow::Result;
use mongodb::bson::doc;
use std::env;

use crate::models::{Banco, TipoConta, User, UserRole};
use crate::totp::generate_base32_secret;

use super::AppState;

const BANCOS: &[(&str, &str)] = &[
    ("001", "Banco do Brasil"),
    ("033", "Santander"),
    ("104", "Caixa Econômica Federal"),
    ("237", "Bradesco"),
    ("341", "Itaú Unibanco"),
    ("748", "Sicredi"),
];

const TIPOS_CONTA: &[(&str, &str)] = &[
    ("CC", "Conta corrente"),
    ("CP", "Conta poupança"),
    ("CS", "Conta salário"),
    ("PG", "Conta de pagamento"),
];

pub async fn ensure_reference_data(state: &AppState) -> Result<()> {
    if state.bancos.count_documents(doc! {}).await? == 0 {
        for (codigo, nome) in BANCOS {
            state
                .bancos
                .insert_one(Banco {
                    id: None,
                    codigo: codigo.to_string(),
                    nome: nome.to_string(),
                })
                .await?;
        }
    }

    if state.tipos_conta.count_documents(doc! {}).await? == 0 {
        for (codigo, descricao) in TIPOS_CONTA {
            state
                .tipos_conta
                .insert_one(TipoConta {
                    id: None,
                    codigo: codigo.to_string(),
                    descricao: descricao.to_string(),
                })
                .await?;
        }
    }

    Ok(())
}

/// Seeds the first admin when no users exist. Secret comes from ADMIN_SECRET
/// or is generated and logged once so the operator can enroll.
pub async fn ensure_admin_user(state: &AppState) -> Result<()> {
    if state.users.count_documents(doc! {}).await? > 0 {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@predios.local".to_string());
    let secret = match env::var("ADMIN_SECRET") {
        Ok(s) if !s.trim().is_empty() => s,
        _ => {
            let generated = generate_base32_secret(20);
            tracing::warn!(%email, secret = %generated, "seeded admin with generated TOTP secret");
            generated
        }
    };

    state
        .users
        .insert_one(User {
            id: None,
            email,
            secret,
            role: UserRole::Admin,
        })
        .await?;

    Ok(())
}
