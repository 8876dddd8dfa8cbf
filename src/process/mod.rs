use std::io;

use thiserror::Error;

use crate::error::os_reason;

pub mod executor;
pub mod pipes;
pub mod signal;
pub mod status;

pub use executor::{open_builtin_output, Endpoints, PipelineExecutor, Sink, Source};
pub use pipes::PipeSet;
pub use status::PipelineOutcome;

/// Status reported when a pipeline could not be set up or spawned.
pub const COMMUNICATION_ERROR: i32 = 70;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("cannot create pipe: {0}")]
    Pipe(#[source] io::Error),
    #[error("cannot spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    /// The status recorded for the failed pipeline.
    pub fn status(&self) -> i32 {
        COMMUNICATION_ERROR
    }
}

/// A `<`, `>` or `>>` target that could not be opened.
#[derive(Debug, Error)]
#[error("{path}: {}", os_reason(.source))]
pub struct RedirectError {
    pub path: String,
    #[source]
    pub source: io::Error,
}

impl RedirectError {
    pub fn new(path: &str, source: io::Error) -> Self {
        Self {
            path: path.to_string(),
            source,
        }
    }
}
