// notify.rs
// Presentation model for transient notices and confirmation prompts. Pure:
// no persistence, no business logic. Handlers attach these to the envelope
// and the client renders them as dismissible banners.

use serde::Serialize;

/// Banners auto-expire after five seconds.
pub const AUTO_DISMISS_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub auto_dismiss_ms: u64,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
            auto_dismiss_ms: AUTO_DISMISS_MS,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
            auto_dismiss_ms: AUTO_DISMISS_MS,
        }
    }
}

/// Blocking prompt shown before a destructive action is sent.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Confirmation {
    pub message: String,
}

impl Confirmation {
    pub fn delete(what: &str) -> Self {
        Confirmation {
            message: format!("Tem certeza que deseja excluir {what}? Esta ação não pode ser desfeita."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_carry_the_dismiss_window() {
        let n = Notice::success("lançamento baixado");
        assert_eq!(n.level, NoticeLevel::Success);
        assert_eq!(n.auto_dismiss_ms, AUTO_DISMISS_MS);
        assert_eq!(Notice::error("falhou").level, NoticeLevel::Error);
    }

    #[test]
    fn confirmation_names_the_target() {
        let c = Confirmation::delete("a pessoa \"Maria\"");
        assert!(c.message.contains("Maria"));
    }
}
