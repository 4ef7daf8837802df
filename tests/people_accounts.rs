// Pessoas, reference data and contas bancárias against a real MongoDB.

#[path = "common/mod.rs"]
mod common;

use mongodb::bson::{DateTime, oid::ObjectId};
use std::collections::HashMap;

use predios::error::ApiError;
use predios::models::{BankAccount, Person, PersonKind, Telefone};
use predios::query::{FilterField, FilterKind, SortField, build_list_query};
use predios::state::{
    AppState, create_agencia, create_bank_account, create_banco, create_person,
    create_tipo_conta, delete_bank_account, delete_banco, delete_person, delete_tipo_conta,
    get_agencia_by_id, get_bank_account_by_id, get_person_by_id, get_tipo_conta_by_id,
    list_bancos, list_people, list_tipos_conta, update_agencia, update_bank_account,
    update_person, update_tipo_conta,
};

fn pessoa(nome: &str, documento: &str) -> Person {
    Person {
        id: None,
        nome: nome.into(),
        fisica_juridica: PersonKind::Fisica,
        documento: documento.into(),
        dt_cadastro: DateTime::now(),
        ativo: true,
        observacoes: None,
        telefones: vec![Telefone {
            numero: "11 98888-0001".into(),
            tipo: "celular".into(),
            principal: true,
        }],
        emails: vec![],
        enderecos: vec![],
        chaves_pix: vec![],
        created_at: None,
        updated_at: None,
    }
}

async fn conta(
    state: &AppState,
    id_pessoa: ObjectId,
    codigo: &str,
    principal: bool,
) -> ObjectId {
    let bancos = list_bancos(state).await.unwrap();
    let tipos = list_tipos_conta(state).await.unwrap();
    create_bank_account(
        state,
        BankAccount {
            id: None,
            id_pessoa,
            id_banco: bancos[0].id.unwrap(),
            id_agencia: None,
            id_tipo_conta: tipos[0].id.unwrap(),
            codigo: codigo.into(),
            digito: Some("7".into()),
            titular: None,
            principal,
            ativo: true,
            registrada: false,
            aceita_multipag: false,
            usa_endereco_cobranca: false,
            cobranca_compartilhada: false,
            descricao: None,
            created_at: None,
            updated_at: None,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn reference_data_is_seeded() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let bancos = list_bancos(state).await.unwrap();
    assert!(bancos.iter().any(|b| b.codigo == "341"));
    let tipos = list_tipos_conta(state).await.unwrap();
    assert!(tipos.iter().any(|t| t.codigo == "CC"));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn person_children_survive_update_in_one_document() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let id = create_person(state, pessoa("Maria Souza", "52998224725"))
        .await
        .unwrap();
    let mut loaded = get_person_by_id(state, &id).await.unwrap().unwrap();
    assert_eq!(loaded.telefones.len(), 1);

    loaded.telefones.push(Telefone {
        numero: "11 97777-0002".into(),
        tipo: "comercial".into(),
        principal: false,
    });
    loaded.nome = "Maria S. Lima".into();
    update_person(state, &id, loaded).await.unwrap();

    let reloaded = get_person_by_id(state, &id).await.unwrap().unwrap();
    assert_eq!(reloaded.nome, "Maria S. Lima");
    assert_eq!(reloaded.telefones.len(), 2);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn person_with_accounts_cannot_be_deleted() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let id = create_person(state, pessoa("João Pereira", "15350946056"))
        .await
        .unwrap();
    let conta_id = conta(state, id, "12345", false).await;

    let err = delete_person(state, &id).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    delete_bank_account(state, &conta_id).await.unwrap();
    delete_person(state, &id).await.unwrap();
    assert!(get_person_by_id(state, &id).await.unwrap().is_none());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn at_most_one_principal_account_per_person() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let id = create_person(state, pessoa("Ana Lima", "11144477735"))
        .await
        .unwrap();
    let primeira = conta(state, id, "1111", true).await;
    let segunda = conta(state, id, "2222", true).await;

    let a = get_bank_account_by_id(state, &primeira).await.unwrap().unwrap();
    let b = get_bank_account_by_id(state, &segunda).await.unwrap().unwrap();
    assert!(!a.principal);
    assert!(b.principal);

    // Updating the first back to principal flips the flag again.
    let mut a = a;
    a.principal = true;
    update_bank_account(state, &primeira, a).await.unwrap();
    let a = get_bank_account_by_id(state, &primeira).await.unwrap().unwrap();
    let b = get_bank_account_by_id(state, &segunda).await.unwrap().unwrap();
    assert!(a.principal);
    assert!(!b.principal);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn omitting_a_filter_never_narrows_the_people_list() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let filters: &[FilterField] = &[
        FilterField {
            name: "nome",
            path: "nome",
            kind: FilterKind::Text { exact: false },
        },
        FilterField {
            name: "ativo",
            path: "ativo",
            kind: FilterKind::Flag,
        },
    ];
    let sorts: &[SortField] = &[SortField {
        name: "nome",
        path: "nome",
        descending: false,
    }];

    create_person(state, pessoa("Carlos Prado", "52998224725"))
        .await
        .unwrap();
    let mut inativa = pessoa("Carla Prado", "15350946056");
    inativa.ativo = false;
    create_person(state, inativa).await.unwrap();
    create_person(state, pessoa("Beatriz Nunes", "11144477735"))
        .await
        .unwrap();

    async fn page_for(
        state: &AppState,
        filters: &[FilterField],
        sorts: &[SortField],
        pairs: &[(&str, &str)],
    ) -> Vec<ObjectId> {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let query = build_list_query(filters, sorts, &params);
        let page = list_people(state, &query).await.unwrap();
        page.records.into_iter().filter_map(|p| p.id).collect()
    }

    let all = page_for(state, filters, sorts, &[]).await;
    let by_nome = page_for(state, filters, sorts, &[("nome", "prado")]).await;
    let by_both = page_for(
        state,
        filters,
        sorts,
        &[("nome", "prado"), ("ativo", "true")],
    )
    .await;

    assert_eq!(all.len(), 3);
    assert_eq!(by_nome.len(), 2);
    assert_eq!(by_both.len(), 1);
    assert!(by_nome.iter().all(|id| all.contains(id)));
    assert!(by_both.iter().all(|id| by_nome.contains(id)));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn banco_codigo_is_unique_and_delete_is_guarded() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let banco = create_banco(state, "999", "Banco de Teste").await.unwrap();
    let err = create_banco(state, "999", "Outro Nome").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    create_agencia(state, &banco, "0001", Some("9".into()), "Agência Centro")
        .await
        .unwrap();
    let err = create_agencia(state, &banco, "0001", None, "Duplicada")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // The agência keeps the banco alive.
    let err = delete_banco(state, &banco).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn agencia_update_respects_per_bank_uniqueness() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let banco = create_banco(state, "998", "Banco Norte").await.unwrap();
    create_agencia(state, &banco, "0001", None, "Centro")
        .await
        .unwrap();
    let norte = create_agencia(state, &banco, "0002", None, "Norte")
        .await
        .unwrap();

    let err = update_agencia(state, &norte, &banco, "0001", None, "Norte")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    // Keeping its own código only renames.
    update_agencia(state, &norte, &banco, "0002", Some("3".into()), "Zona Norte")
        .await
        .unwrap();
    let reloaded = get_agencia_by_id(state, &norte).await.unwrap().unwrap();
    assert_eq!(reloaded.nome, "Zona Norte");
    assert_eq!(reloaded.digito.as_deref(), Some("3"));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn tipo_conta_codigo_is_unique_and_delete_is_guarded() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;

    let tipo = create_tipo_conta(state, "PP", "Poupança Plus").await.unwrap();
    let err = create_tipo_conta(state, "PP", "Duplicado").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // "CC" is seeded, so renaming onto it collides; keeping the own código
    // updates the descrição.
    let err = update_tipo_conta(state, &tipo, "CC", "Corrente").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    update_tipo_conta(state, &tipo, "PP", "Poupança Premium")
        .await
        .unwrap();
    let reloaded = get_tipo_conta_by_id(state, &tipo).await.unwrap().unwrap();
    assert_eq!(reloaded.descricao, "Poupança Premium");

    let pessoa_id = create_person(state, pessoa("Rita Prado", "93541134780"))
        .await
        .unwrap();
    let bancos = list_bancos(state).await.unwrap();
    let conta_id = create_bank_account(
        state,
        BankAccount {
            id: None,
            id_pessoa: pessoa_id,
            id_banco: bancos[0].id.unwrap(),
            id_agencia: None,
            id_tipo_conta: tipo,
            codigo: "4444".into(),
            digito: None,
            titular: None,
            principal: false,
            ativo: true,
            registrada: false,
            aceita_multipag: false,
            usa_endereco_cobranca: false,
            cobranca_compartilhada: false,
            descricao: None,
            created_at: None,
            updated_at: None,
        },
    )
    .await
    .unwrap();

    let err = delete_tipo_conta(state, &tipo).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    delete_bank_account(state, &conta_id).await.unwrap();
    delete_tipo_conta(state, &tipo).await.unwrap();
    assert!(get_tipo_conta_by_id(state, &tipo).await.unwrap().is_none());

    common::teardown(Some(ctx)).await;
}
