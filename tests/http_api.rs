// End-to-end HTTP tests through the router: login, session and CSRF guards,
// and the envelope the endpoints answer with. Skips when no MongoDB is up.

#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for oneshot

use predios::models::{User, UserRole};
use predios::routes::build_router;
use predios::session::{CSRF_HEADER, SESSION_COOKIE_NAME, XHR_HEADER};
use predios::state::{AppState, create_session};
use predios::totp::{build_totp, generate_base32_secret};

const EMAIL: &str = "operador@predios.test";

async fn seed_user(state: &AppState) -> String {
    let secret = generate_base32_secret(20);
    state
        .users
        .insert_one(User {
            id: None,
            email: EMAIL.to_string(),
            secret: secret.clone(),
            role: UserRole::Staff,
        })
        .await
        .expect("failed to insert test user");
    secret
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

struct Client {
    app: Router,
    cookie: String,
    csrf: String,
}

impl Client {
    async fn authenticated(state: &AppState) -> Client {
        let (token, csrf) = create_session(state, EMAIL).await.unwrap();
        Client {
            app: build_router(Arc::new(state.clone())),
            cookie: format!("{SESSION_COOKIE_NAME}={token}"),
            csrf,
        }
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .uri(uri)
            .header(header::COOKIE, &self.cookie)
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn send(&self, method: &str, uri: &str, body: Value) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, &self.cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .header(CSRF_HEADER, &self.csrf)
            .header(XHR_HEADER, "XMLHttpRequest")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }
}

#[tokio::test]
async fn login_rejects_wrong_code_and_accepts_current_one() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    let secret = seed_user(&ctx.state).await;
    let app = build_router(Arc::new(ctx.state.clone()));

    let bad = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": EMAIL, "code": "000000" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(bad).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let code = build_totp(EMAIL, &secret)
        .unwrap()
        .generate_current()
        .unwrap();
    let good = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": EMAIL, "code": code }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(good).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["data"]["csrf_token"].is_string());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn protected_routes_require_session_and_csrf() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    seed_user(&ctx.state).await;
    let client = Client::authenticated(&ctx.state).await;

    // No cookie at all.
    let response = client
        .app
        .clone()
        .oneshot(Request::builder().uri("/pessoas").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Cookie but no CSRF header on a mutation.
    let request = Request::builder()
        .method("POST")
        .uri("/bancos")
        .header(header::COOKIE, &client.cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "codigo": "999", "nome": "Banco Teste" }).to_string(),
        ))
        .unwrap();
    let response = client.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Reads pass with the cookie alone.
    let response = client.get("/pessoas").await;
    assert_eq!(response.status(), StatusCode::OK);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn pessoa_validation_and_crud_envelope() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    seed_user(&ctx.state).await;
    let client = Client::authenticated(&ctx.state).await;

    // Missing nome and a CPF with the wrong length: one 422 with both fields.
    let response = client
        .send(
            "POST",
            "/pessoas",
            json!({ "nome": "  ", "fisica_juridica": "F", "documento": "123" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["data"]["errors"].as_array().map(Vec::len), Some(2));

    let response = client
        .send(
            "POST",
            "/pessoas",
            json!({
                "nome": "Carlos Andrade",
                "fisica_juridica": "F",
                "documento": "529.982.247-25",
                "telefones": [{ "numero": "11 98888-0001", "tipo": "celular", "principal": true }],
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // The stored documento is digits-only.
    let response = client.get(&format!("/pessoas/{id}")).await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["documento"], json!("52998224725"));

    let response = client.send("DELETE", &format!("/pessoas/{id}"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = client.get(&format!("/pessoas/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn conta_bancaria_reference_errors_are_distinguished() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    seed_user(&ctx.state).await;
    let client = Client::authenticated(&ctx.state).await;

    // Missing banco id: validation.
    let response = client
        .send(
            "POST",
            "/contas-bancarias",
            json!({
                "id_pessoa": "0123456789abcdef01234567",
                "id_tipo_conta": "0123456789abcdef01234567",
                "codigo": "1234",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Well-formed but unknown pessoa: 404.
    let response = client
        .send(
            "POST",
            "/contas-bancarias",
            json!({
                "id_pessoa": "0123456789abcdef01234567",
                "id_banco": "0123456789abcdef01234567",
                "id_tipo_conta": "0123456789abcdef01234567",
                "codigo": "1234",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn lancamento_actions_over_http() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    seed_user(&ctx.state).await;
    let client = Client::authenticated(&ctx.state).await;

    let response = client
        .send(
            "POST",
            "/lancamentos",
            json!({
                "tipo": "receber",
                "historico": "aluguel sala 204",
                "valor": 1200.0,
                "data_vencimento": "2026-09-10",
                "reter_iss": true,
                "perc_iss": 5.0,
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // Cancel with a blank motivo is a validation error.
    let response = client
        .send("POST", &format!("/lancamentos/{id}/cancelar"), json!({ "motivo": "   " }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Partial baixa, then full, then one more is a conflict.
    let response = client
        .send("POST", &format!("/lancamentos/{id}/baixa"), json!({ "valor_pago": 500.0 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], json!("pago_parcial"));

    // Net value is 1200 - 60 (ISS) = 1140.
    let response = client
        .send("POST", &format!("/lancamentos/{id}/baixa"), json!({ "valor_pago": 640.0 }))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], json!("pago"));

    let response = client
        .send("POST", &format!("/lancamentos/{id}/baixa"), json!({ "valor_pago": 1.0 }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Estorno reopens it.
    let response = client
        .send("POST", &format!("/lancamentos/{id}/estornar"), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], json!("aberto"));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn cep_validation_over_http() {
    let Some(ctx) = common::setup_state().await else {
        return;
    };
    seed_user(&ctx.state).await;
    let client = Client::authenticated(&ctx.state).await;

    let response = client.get("/cep/123").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    common::teardown(Some(ctx)).await;
}
