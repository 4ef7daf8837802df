// routes/login.rs
// POST /login { "email", "code" } verifies the TOTP code and answers with the
// session cookie plus the CSRF token the client must echo on mutations.

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResponse};
use crate::session::{SESSION_COOKIE_NAME, SessionUser};
use crate::state::{AppState, SESSION_TTL_SECONDS, create_session, delete_session, find_user};
use crate::totp::build_totp;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub code: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let Some(user) = find_user(&state, &body.email).await? else {
        return Ok(rejected());
    };

    let totp = build_totp(&user.email, &user.secret)?;
    if !totp.check_current(&body.code).unwrap_or(false) {
        return Ok(rejected());
    }

    let (token, csrf_token) = create_session(&state, &user.email).await?;

    let mut response = ApiResponse::ok_message(
        "login efetuado",
        Some(serde_json::json!({
            "email": user.email,
            "role": user.role.as_str(),
            "csrf_token": csrf_token,
        })),
    )
    .into_response();
    set_session_cookie(&mut response, &token, SESSION_TTL_SECONDS);
    Ok(response)
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Response, ApiError> {
    delete_session(&state, session.token()).await?;
    let mut response = ApiResponse::ok_message("sessão encerrada", None).into_response();
    set_session_cookie(&mut response, "", 0);
    Ok(response)
}

fn rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        ApiResponse::failure("credenciais inválidas", None),
    )
        .into_response()
}

fn set_session_cookie(response: &mut Response, token: &str, max_age: u64) {
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE_NAME, token, max_age
    )) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}
