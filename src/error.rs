// error.rs
// Typed error taxonomy and the JSON envelope every endpoint answers with.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::notify::{Confirmation, Notice};

/// One field-level validation message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("dados inválidos")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Auth(String),
    #[error("erro interno")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Single-field validation shortcut.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(format!("{} não encontrado", what.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<mongodb::error::Error> for ApiError {
    fn from(err: mongodb::error::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => ApiResponse::failure(
                errors_summary(errors),
                Some(serde_json::json!({ "errors": errors })),
            ),
            ApiError::Internal(err) => {
                // Log the detail, answer a generic message.
                tracing::error!(error = %err, "unexpected error at endpoint boundary");
                ApiResponse::failure("erro interno, tente novamente", None)
            }
            other => ApiResponse::failure(other.to_string(), None),
        };
        (status, body).into_response()
    }
}

fn errors_summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Response envelope: `{success, message?, data?, notice?, confirmation?}`.
/// Messages double as a transient Notice so the client can render the banner
/// without interpreting the message itself.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
}

impl ApiResponse {
    /// Serializes any record into a success envelope.
    pub fn ok_record<T: serde::Serialize>(record: &T) -> Result<Json<ApiResponse>, ApiError> {
        let data = serde_json::to_value(record).map_err(anyhow::Error::from)?;
        Ok(Self::ok(data))
    }

    /// Like ok_record, but carries the delete prompt the client must show
    /// before submitting the destructive action.
    pub fn ok_deletable<T: serde::Serialize>(
        record: &T,
        what: &str,
    ) -> Result<Json<ApiResponse>, ApiError> {
        let data = serde_json::to_value(record).map_err(anyhow::Error::from)?;
        Ok(Json(ApiResponse {
            success: true,
            message: None,
            data: Some(data),
            notice: None,
            confirmation: Some(Confirmation::delete(what)),
        }))
    }

    pub fn ok(data: Value) -> Json<ApiResponse> {
        Json(ApiResponse {
            success: true,
            message: None,
            data: Some(data),
            notice: None,
            confirmation: None,
        })
    }

    pub fn ok_message(message: impl Into<String>, data: Option<Value>) -> Json<ApiResponse> {
        let message = message.into();
        Json(ApiResponse {
            success: true,
            notice: Some(Notice::success(message.clone())),
            message: Some(message),
            data,
            confirmation: None,
        })
    }

    pub fn failure(message: impl Into<String>, data: Option<Value>) -> Json<ApiResponse> {
        let message = message.into();
        Json(ApiResponse {
            success: false,
            notice: Some(Notice::error(message.clone())),
            message: Some(message),
            data,
            confirmation: None,
        })
    }
}

/// Collects field errors across a payload and yields one 422 with all of them.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "campo obrigatório");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::invalid("nome", "campo obrigatório").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::not_found("banco").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("já pago".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Auth("token CSRF inválido".into()).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn validation_errors_accumulate() {
        let mut v = ValidationErrors::new();
        v.require("nome", "  ");
        v.require("documento", "123");
        v.add("valor", "deve ser maior que zero");
        match v.into_result() {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "nome");
                assert_eq!(errors[1].field, "valor");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_collector_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
