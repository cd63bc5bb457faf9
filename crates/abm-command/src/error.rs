use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("mailbox is closed")]
    Closed,

    #[error("command {command} failed: {reason}")]
    Failed {
        command: &'static str,
        reason:  String,
    },

    #[error("command manager thread panicked")]
    ManagerPanicked,
}

impl CommandError {
    /// Shorthand for command bodies reporting a failure.
    pub fn failed(command: &'static str, reason: impl Into<String>) -> Self {
        CommandError::Failed { command, reason: reason.into() }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;
