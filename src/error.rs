use std::io;

use rustyline::error::ReadlineError;
use thiserror::Error;

use crate::core::commands::CommandError;
use crate::core::config::ConfigError;
use crate::process::ProcessError;
use crate::remote::RemoteError;
use crate::shell::parser::ParseError;

/// Exit code for bad command-line usage.
pub const USAGE_ERROR: i32 = 2;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Readline error: {0}")]
    Readline(#[from] ReadlineError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Flag error: {0}")]
    FlagError(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("Ctrl-C error: {0}")]
    CtrlC(#[from] ctrlc::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl ShellError {
    /// Process exit code for an error that ends the program.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::FlagError(_) | ShellError::InvalidAddress(_) => USAGE_ERROR,
            ShellError::Process(e) => e.status(),
            _ => 1,
        }
    }
}

/// The OS description of an error without the trailing `(os error N)`.
pub fn os_reason(err: &io::Error) -> String {
    let text = err.to_string();
    match text.rfind(" (os error ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
