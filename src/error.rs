use std::fmt;
use thiserror::Error;

use crate::discord::DiscordError;

/// Why an actor was turned away from a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotReviewer,
    NotTicketOwner,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotReviewer => write!(f, "actor holds no reviewer role"),
            Rejection::NotTicketOwner => write!(f, "actor is not the ticket applicant"),
        }
    }
}

/// What a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Guild,
    Candidate,
    Draft,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Guild => write!(f, "guild"),
            Missing::Candidate => write!(f, "candidate"),
            Missing::Draft => write!(f, "application draft"),
        }
    }
}

/// Everything that can go wrong while handling an interaction. Handlers
/// return this and the dispatcher turns it into a private reply, so no
/// failure ever leaves an interaction hanging.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unauthorized: {0}")]
    Unauthorized(Rejection),
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("platform error: {0}")]
    Platform(#[from] DiscordError),
}

impl IntakeError {
    /// The private message shown to whoever pressed the control. Platform
    /// details stay in the logs; the actor gets a generic apology.
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::Configuration(message) => format!("Ошибка: {}", message),
            IntakeError::Unauthorized(Rejection::NotReviewer) => "Недостаточно прав.".to_string(),
            IntakeError::Unauthorized(Rejection::NotTicketOwner) => {
                "Эта кнопка — для автора тикета.".to_string()
            }
            IntakeError::NotFound(Missing::Guild) => "Гильдия не найдена.".to_string(),
            IntakeError::NotFound(Missing::Candidate) => "Кандидат не найден.".to_string(),
            IntakeError::NotFound(Missing::Draft) => {
                "Анкета устарела. Нажмите «Заполнить анкету» и начните заново.".to_string()
            }
            IntakeError::Platform(_) => "Произошла ошибка. Попробуйте позже.".to_string(),
        }
    }
}
