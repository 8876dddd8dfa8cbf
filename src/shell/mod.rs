use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

mod executor;
pub mod parser;

use crate::error::ShellError;
use crate::highlight::SyntaxHighlighter;

pub use executor::{CommandHandler, Flow, LocalSession, RemoteSession};

/// The interactive prompt loop. Lines are handed to `H`, which runs them
/// locally or forwards them to a server.
pub struct Shell<H> {
    editor: DefaultEditor,
    handler: H,
    prompt: String,
    history_path: Option<PathBuf>,
    highlighter: SyntaxHighlighter,
}

impl<H: CommandHandler> Shell<H> {
    pub fn new(
        handler: H,
        prompt: &str,
        history_path: Option<PathBuf>,
        highlighter: SyntaxHighlighter,
    ) -> Result<Self, ShellError> {
        let mut editor = DefaultEditor::new()?;

        if let Some(path) = &history_path {
            if let Err(e) = editor.load_history(path) {
                debug!(path = %path.display(), error = %e, "no history loaded");
            }
        }

        Ok(Shell {
            editor,
            handler,
            prompt: highlighter.highlight_prompt(prompt),
            history_path,
            highlighter,
        })
    }

    /// Runs until `exit` or end of input. Returns the process exit code.
    pub fn run(&mut self) -> Result<i32, ShellError> {
        let code = loop {
            match self.editor.readline(&self.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                            warn!(error = %e, "couldn't add to history");
                        }
                    }

                    match self.handler.execute_command(&line) {
                        Ok(Flow::Exit(code)) => break code,
                        Ok(Flow::Continue) => {}
                        Err(ShellError::Io(e)) => return Err(ShellError::Io(e)),
                        Err(e) => eprintln!("{}", self.highlighter.highlight_error(&e.to_string())),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break 0,
                Err(e) => return Err(e.into()),
            }
        };

        self.save_history();
        Ok(code)
    }

    fn save_history(&mut self) {
        if let Some(path) = &self.history_path {
            if let Err(e) = self.editor.save_history(path) {
                warn!(path = %path.display(), error = %e, "couldn't save history");
            }
        }
    }
}
