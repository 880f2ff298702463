use thiserror::Error;

use crate::{
    config::ConfigValidationError, engine::DispatchError, mailer::MailerError,
    persistence::PersistenceError,
};

/// Errors that can occur during application context initialization.
#[derive(Debug, Error)]
pub enum AppContextError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration was loaded but holds unusable values.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ConfigValidationError),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The configured mailer could not be created.
    #[error("Mailer error: {0}")]
    Mailer(#[from] MailerError),

    /// The dispatcher could not be created.
    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),
}
