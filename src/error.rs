use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing command\n{available}")]
    MissingCommand { available: String },
    #[error("unknown command `{name}`\n{available}")]
    UnknownCommand { name: String, available: String },
    #[error("{message}\nUsage: {usage}")]
    Usage { message: String, usage: String },
    #[error("request failed with status {0}")]
    Status(StatusCode),
    /// The user declined an interactive confirmation.
    #[error("aborted")]
    Aborted,
}
