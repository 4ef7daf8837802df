use anyhow::Result;
use mongodb::bson::{DateTime, doc};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::models::{Session, User};

use super::{AppState, SESSION_TTL_SECONDS};

pub async fn find_user(state: &AppState, email: &str) -> Result<Option<User>> {
    state
        .users
        .find_one(doc! { "email": email })
        .await
        .map_err(Into::into)
}

/// Creates a fresh session for the user, invalidating any previous one.
/// Returns the cookie token and the CSRF token the client must echo back.
pub async fn create_session(state: &AppState, email: &str) -> Result<(String, String)> {
    let _ = state
        .sessions
        .delete_many(doc! { "user_email": email })
        .await;

    let token = Uuid::new_v4().simple().to_string();
    let csrf_token = Uuid::new_v4().simple().to_string();
    let expires_at =
        DateTime::from_system_time(SystemTime::now() + Duration::from_secs(SESSION_TTL_SECONDS));

    state
        .sessions
        .insert_one(Session {
            id: None,
            token: token.clone(),
            csrf_token: csrf_token.clone(),
            user_email: email.to_string(),
            expires_at,
        })
        .await?;

    Ok((token, csrf_token))
}

/// Resolves a cookie token into a live session; expired sessions are removed.
pub async fn find_session(state: &AppState, token: &str) -> Result<Option<Session>> {
    if let Some(session) = state.sessions.find_one(doc! { "token": token }).await? {
        if session.expires_at.to_system_time() <= SystemTime::now() {
            let _ = state.sessions.delete_one(doc! { "token": token }).await;
            return Ok(None);
        }
        Ok(Some(session))
    } else {
        Ok(None)
    }
}

pub async fn delete_session(state: &AppState, token: &str) -> Result<()> {
    let _ = state.sessions.delete_one(doc! { "token": token }).await?;
    Ok(())
}
