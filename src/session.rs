// session.rs
// Session middleware protecting the admin routes, the CSRF guard for
// mutating requests, and the extractor handlers use to read the session.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, StatusCode, header::COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;

use crate::{
    error::{ApiError, ApiResponse},
    models::{Session, User},
    state::{AppState, find_session, find_user},
};

pub const SESSION_COOKIE_NAME: &str = "session";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const XHR_HEADER: &str = "x-requested-with";

#[derive(Clone)]
pub struct SessionData {
    pub user: User,
    pub session: Session,
}

/// Resolves the session cookie and stashes the session in the request
/// extensions. Mutating methods additionally need the CSRF token header and
/// the XMLHttpRequest marker, matching how the admin UI submits actions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let tokens = extract_cookies(request.headers(), SESSION_COOKIE_NAME);
    if tokens.is_empty() {
        return Err(unauthorized());
    }

    let mut found = None;
    for token in tokens {
        match find_session(&state, &token).await {
            Ok(Some(session)) => {
                found = Some(session);
                break;
            }
            Ok(None) => continue,
            Err(err) => return Err(ApiError::Internal(err.into()).into_response()),
        }
    }
    let Some(session) = found else {
        return Err(unauthorized());
    };

    let user = match find_user(&state, &session.user_email).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(unauthorized()),
        Err(err) => return Err(ApiError::Internal(err.into()).into_response()),
    };

    if is_mutating(request.method()) {
        if let Err(resp) = check_csrf(request.headers(), &session) {
            return Err(resp);
        }
    }

    request.extensions_mut().insert(SessionData { user, session });
    Ok(next.run(request).await)
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn check_csrf(headers: &HeaderMap, session: &Session) -> Result<(), Response> {
    let xhr = headers
        .get(XHR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false);
    if !xhr {
        return Err(forbidden("requisição deve ser XMLHttpRequest"));
    }

    let token = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    match token {
        Some(t) if t == session.csrf_token => Ok(()),
        _ => Err(forbidden("token CSRF inválido")),
    }
}

pub struct SessionUser(pub SessionData);

impl SessionUser {
    pub fn user(&self) -> &User {
        &self.0.user
    }

    pub fn token(&self) -> &str {
        &self.0.session.token
    }

    pub fn is_admin(&self) -> bool {
        self.0.user.role.is_admin()
    }
}

#[allow(refining_impl_trait)]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> BoxFuture<'static, Result<Self, Self::Rejection>> {
        let data = parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .ok_or_else(unauthorized);

        Box::pin(async move {
            match data {
                Ok(session) => Ok(SessionUser(session)),
                Err(resp) => Err(resp),
            }
        })
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        ApiResponse::failure("sessão ausente ou expirada", None),
    )
        .into_response()
}

fn forbidden(message: &str) -> Response {
    ApiError::Auth(message.to_string()).into_response()
}

fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut split = pair.trim().splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            if key == name { Some(value.to_owned()) } else { None }
        })
        .collect()
}
