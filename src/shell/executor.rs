use std::io::{self, Write};

use tracing::debug;

use crate::core::commands::{BuiltinContext, BuiltinKind, BuiltinOutcome, Builtins};
use crate::error::ShellError;
use crate::highlight::SyntaxHighlighter;
use crate::process::{open_builtin_output, Endpoints, PipelineExecutor};
use crate::remote::Client;
use crate::shell::parser::{CommandList, Limits, ParseError};

/// What the prompt loop does after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Leave the loop with this process exit code.
    Exit(i32),
}

pub trait CommandHandler {
    fn execute_command(&mut self, line: &str) -> Result<Flow, ShellError>;
}

/// Runs lines against this machine, wired to the terminal.
pub struct LocalSession {
    builtins: Builtins,
    executor: PipelineExecutor,
    limits: Limits,
    last_status: i32,
    highlighter: SyntaxHighlighter,
}

impl LocalSession {
    pub fn new(highlighter: SyntaxHighlighter) -> Self {
        Self {
            builtins: Builtins::new(),
            executor: PipelineExecutor::new(),
            limits: Limits::default(),
            last_status: 0,
            highlighter,
        }
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    fn report_error(&self, message: &str) {
        eprintln!("{}", self.highlighter.highlight_error(message));
    }

    fn run_builtin(&mut self, commands: &CommandList) -> Result<BuiltinOutcome, ShellError> {
        let spec = commands.first();
        if !self.builtins.is_builtin(spec.name()) {
            return Ok(BuiltinOutcome::NotBuiltin);
        }

        let mut out: Box<dyn Write> = match open_builtin_output(spec) {
            Ok(Some(file)) => Box::new(file),
            Ok(None) => Box::new(io::stdout().lock()),
            Err(e) => {
                self.report_error(&format!("rdsh: {}", e));
                self.last_status = 1;
                return Ok(BuiltinOutcome::Executed);
            }
        };
        let mut ctx = BuiltinContext::new(&mut *out, self.last_status);
        let outcome = self.builtins.execute(spec, &mut ctx)?;
        if outcome == BuiltinOutcome::Executed {
            self.last_status = ctx.last_status;
        }
        out.flush()?;
        Ok(outcome)
    }
}

impl CommandHandler for LocalSession {
    fn execute_command(&mut self, line: &str) -> Result<Flow, ShellError> {
        let commands = match CommandList::parse(line, &self.limits) {
            Ok(commands) => commands,
            Err(ParseError::EmptyCommand) => {
                let warning = format!("warning: {}", ParseError::EmptyCommand);
                eprintln!("{}", self.highlighter.highlight_warning(&warning));
                return Ok(Flow::Continue);
            }
            Err(e) => {
                self.report_error(&format!("error: {}", e));
                return Ok(Flow::Continue);
            }
        };

        if commands.len() == 1 {
            match self.run_builtin(&commands)? {
                BuiltinOutcome::NotBuiltin => {}
                BuiltinOutcome::Executed => return Ok(Flow::Continue),
                BuiltinOutcome::ExitSession => {
                    println!("exiting...");
                    return Ok(Flow::Exit(self.last_status));
                }
                BuiltinOutcome::StopServer => {
                    self.report_error("stop-server: not connected to a server");
                    self.last_status = 1;
                    return Ok(Flow::Continue);
                }
            }
        }

        match self
            .executor
            .execute(&commands, &Endpoints::inherit(), self.last_status)
        {
            Ok(outcome) => {
                debug!(status = outcome.status(), "pipeline finished");
                self.last_status = outcome.status();
            }
            Err(e) => {
                self.last_status = e.status();
                self.report_error(&format!("error: {}", e));
            }
        }
        Ok(Flow::Continue)
    }
}

/// Forwards lines to a server and prints its responses.
pub struct RemoteSession {
    client: Client,
    builtins: Builtins,
}

impl RemoteSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            builtins: Builtins::new(),
        }
    }
}

impl CommandHandler for RemoteSession {
    fn execute_command(&mut self, line: &str) -> Result<Flow, ShellError> {
        self.client.send(line)?;
        let response = self.client.read_response()?;

        let mut stdout = io::stdout();
        stdout.write_all(&response)?;
        stdout.flush()?;

        if ends_session(&self.builtins, line) {
            Ok(Flow::Exit(0))
        } else {
            Ok(Flow::Continue)
        }
    }
}

/// Whether the server closes the connection after answering `line`.
fn ends_session(builtins: &Builtins, line: &str) -> bool {
    CommandList::parse(line, &Limits::default())
        .ok()
        .filter(|commands| commands.len() == 1)
        .map(|commands| builtins.kind(commands.first().name()))
        .is_some_and(|kind| matches!(kind, BuiltinKind::Exit | BuiltinKind::StopServer))
}
