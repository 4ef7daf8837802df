// Configurações de API and boleto issuance rules against a real MongoDB.
// Nothing here talks to a bank; registration failures are driven through
// mark_error/mark_registered directly.

#[path = "common/mod.rs"]
mod common;

use mongodb::bson::{DateTime, oid::ObjectId};

use predios::error::ApiError;
use predios::models::{
    Ambiente, BankApiConfig, Boleto, BoletoStatus, EntryKind, EntryStatus, FinancialEntry, Person,
    PersonKind,
};
use predios::state::{
    AppState, Registro, cancel_entry, create_bank_config, create_boleto, create_entry,
    create_person, delete_bank_config, delete_boleto, get_boleto_by_id, list_bancos, mark_error,
    mark_registered, next_nosso_numero,
};

fn config(id_banco: ObjectId, conta: Option<ObjectId>, ambiente: Ambiente) -> BankApiConfig {
    BankApiConfig {
        id: None,
        id_banco,
        id_conta_bancaria: conta,
        client_id: Some("abc".into()),
        client_secret: Some("xyz".into()),
        convenio: "123456".into(),
        carteira: "17".into(),
        ambiente,
        url_autenticacao: "https://sandbox.banco.example/oauth/token".into(),
        url_api: "https://sandbox.banco.example/cobranca/v3".into(),
        certificado_path: None,
        certificado_validade: None,
        sequencia: 0,
        ativo: true,
        created_at: None,
        updated_at: None,
    }
}

async fn entry_with_pagador(state: &AppState, valor: f64) -> (ObjectId, ObjectId) {
    let pagador = create_person(
        state,
        Person {
            id: None,
            nome: "Condomínio Jardim".into(),
            fisica_juridica: PersonKind::Juridica,
            documento: "19131243000197".into(),
            dt_cadastro: DateTime::now(),
            ativo: true,
            observacoes: None,
            telefones: vec![],
            emails: vec![],
            enderecos: vec![],
            chaves_pix: vec![],
            created_at: None,
            updated_at: None,
        },
    )
    .await
    .unwrap();

    let entry = create_entry(
        state,
        FinancialEntry {
            id: None,
            numero: 0,
            tipo: EntryKind::Receber,
            historico: "taxa condominial".into(),
            id_pessoa: Some(pagador),
            id_conta_bancaria: None,
            valor,
            valor_desconto: 0.0,
            valor_juros: 0.0,
            valor_multa: 0.0,
            valor_pago: 0.0,
            data_movimento: DateTime::now(),
            data_vencimento: DateTime::now(),
            competencia: "2026-08".into(),
            reter_inss: false,
            perc_inss: None,
            valor_inss: None,
            reter_iss: false,
            perc_iss: None,
            valor_iss: None,
            forma_pagamento: None,
            data_pagamento: None,
            status: EntryStatus::Aberto,
            motivo: None,
            created_at: None,
            updated_at: None,
        },
    )
    .await
    .unwrap();

    (entry, pagador)
}

fn boleto(config: Option<ObjectId>, lancamento: ObjectId, pagador: ObjectId, nn: &str) -> Boleto {
    Boleto {
        id: None,
        id_configuracao: config,
        id_lancamento: lancamento,
        id_pessoa_pagador: pagador,
        nosso_numero: nn.into(),
        seu_numero: None,
        valor_nominal: 100.0,
        data_emissao: DateTime::now(),
        data_vencimento: DateTime::now(),
        codigo_barras: None,
        linha_digitavel: None,
        txid_pix: None,
        status: BoletoStatus::Pendente,
        mensagem_erro: None,
        created_at: None,
        updated_at: None,
    }
}

#[tokio::test]
async fn one_config_per_conta_and_ambiente() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;
    let banco = list_bancos(state).await.unwrap()[0].id.unwrap();
    let conta = ObjectId::new();

    create_bank_config(state, config(banco, Some(conta), Ambiente::Sandbox))
        .await
        .unwrap();
    let err = create_bank_config(state, config(banco, Some(conta), Ambiente::Sandbox))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    // Same conta, other ambiente is fine.
    create_bank_config(state, config(banco, Some(conta), Ambiente::Producao))
        .await
        .unwrap();

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn nosso_numero_counts_up_from_the_convenio() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;
    let banco = list_bancos(state).await.unwrap()[0].id.unwrap();
    let config_id = create_bank_config(state, config(banco, None, Ambiente::Sandbox))
        .await
        .unwrap();

    let first = next_nosso_numero(state, &config_id).await.unwrap();
    let second = next_nosso_numero(state, &config_id).await.unwrap();
    assert_eq!(first, "1234560000000001");
    assert_eq!(second, "1234560000000002");

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn boleto_needs_an_open_entry() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;
    let (lancamento, pagador) = entry_with_pagador(state, 300.0).await;

    cancel_entry(state, &lancamento, "contrato rescindido")
        .await
        .unwrap();
    let err = create_boleto(state, boleto(None, lancamento, pagador, "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn registration_outcome_moves_the_boleto() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;
    let (lancamento, pagador) = entry_with_pagador(state, 250.0).await;

    let id = create_boleto(state, boleto(None, lancamento, pagador, "9000000001"))
        .await
        .unwrap();

    mark_error(state, &id, "convênio não habilitado").await.unwrap();
    let b = get_boleto_by_id(state, &id).await.unwrap().unwrap();
    assert_eq!(b.status, BoletoStatus::Erro);
    assert_eq!(b.mensagem_erro.as_deref(), Some("convênio não habilitado"));

    mark_registered(
        state,
        &id,
        Registro {
            codigo_barras: Some("34191790010104351004791020150008999990000025000".into()),
            linha_digitavel: Some("34191.79001 01043.510047 91020.150008 9 99999000002500".into()),
            txid_pix: None,
        },
    )
    .await
    .unwrap();
    let b = get_boleto_by_id(state, &id).await.unwrap().unwrap();
    assert_eq!(b.status, BoletoStatus::Registrado);
    assert!(b.mensagem_erro.is_none());
    assert!(b.codigo_barras.is_some());

    // A registered boleto can no longer simply be deleted.
    let err = delete_boleto(state, &id).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn config_with_boletos_cannot_be_deleted() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let state = &ctx.state;
    let banco = list_bancos(state).await.unwrap()[0].id.unwrap();
    let config_id = create_bank_config(state, config(banco, None, Ambiente::Sandbox))
        .await
        .unwrap();
    let (lancamento, pagador) = entry_with_pagador(state, 120.0).await;
    let boleto_id = create_boleto(
        state,
        boleto(Some(config_id), lancamento, pagador, "9000000002"),
    )
    .await
    .unwrap();

    let err = delete_bank_config(state, &config_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    delete_boleto(state, &boleto_id).await.unwrap();
    delete_bank_config(state, &config_id).await.unwrap();

    common::teardown(Some(ctx)).await;
}
