use std::collections::BTreeMap;
use std::io::{self, Write};

use thiserror::Error;

mod cd;
mod dragon;
mod exit;
mod rc;

pub use cd::CdCommand;
pub use dragon::{DragonCommand, DRAGON};
pub use exit::{ExitCommand, StopServerCommand};
pub use rc::RcCommand;

use crate::shell::parser::CommandSpec;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Which built-in, if any, a command name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    NotBuiltin,
    Cd,
    Rc,
    Dragon,
    Exit,
    StopServer,
}

impl BuiltinKind {
    pub fn is_builtin(self) -> bool {
        self != BuiltinKind::NotBuiltin
    }
}

/// What the caller has to do after handing a command to [`Builtins::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOutcome {
    /// Not a built-in; the caller runs it as a pipeline.
    NotBuiltin,
    /// Fully handled, nothing left to do.
    Executed,
    /// End the current session.
    ExitSession,
    /// End the session and shut the server down.
    StopServer,
}

/// State a built-in can read and update while it runs.
pub struct BuiltinContext<'a> {
    pub out: &'a mut dyn Write,
    pub last_status: i32,
    /// Print the new working directory after a successful `cd`.
    pub report_cwd: bool,
}

impl<'a> BuiltinContext<'a> {
    pub fn new(out: &'a mut dyn Write, last_status: i32) -> Self {
        Self {
            out,
            last_status,
            report_cwd: false,
        }
    }

    pub fn with_report_cwd(mut self, report_cwd: bool) -> Self {
        self.report_cwd = report_cwd;
        self
    }
}

pub trait Command {
    fn execute(
        &self,
        args: &[&str],
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError>;
}

#[derive(Clone)]
enum CommandType {
    Cd(CdCommand),
    Rc(RcCommand),
    Dragon(DragonCommand),
    Exit(ExitCommand),
    StopServer(StopServerCommand),
}

impl CommandType {
    fn kind(&self) -> BuiltinKind {
        match self {
            CommandType::Cd(_) => BuiltinKind::Cd,
            CommandType::Rc(_) => BuiltinKind::Rc,
            CommandType::Dragon(_) => BuiltinKind::Dragon,
            CommandType::Exit(_) => BuiltinKind::Exit,
            CommandType::StopServer(_) => BuiltinKind::StopServer,
        }
    }
}

impl Command for CommandType {
    fn execute(
        &self,
        args: &[&str],
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError> {
        match self {
            CommandType::Cd(cmd) => cmd.execute(args, ctx),
            CommandType::Rc(cmd) => cmd.execute(args, ctx),
            CommandType::Dragon(cmd) => cmd.execute(args, ctx),
            CommandType::Exit(cmd) => cmd.execute(args, ctx),
            CommandType::StopServer(cmd) => cmd.execute(args, ctx),
        }
    }
}

/// The built-in dispatcher. Runs in the calling thread and never forks.
#[derive(Clone)]
pub struct Builtins {
    commands: BTreeMap<&'static str, CommandType>,
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtins {
    pub fn new() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("cd", CommandType::Cd(CdCommand::new()));
        commands.insert("rc", CommandType::Rc(RcCommand));
        commands.insert("dragon", CommandType::Dragon(DragonCommand));
        commands.insert("exit", CommandType::Exit(ExitCommand));
        commands.insert("stop-server", CommandType::StopServer(StopServerCommand));
        Self { commands }
    }

    pub fn kind(&self, name: &str) -> BuiltinKind {
        self.commands
            .get(name)
            .map(CommandType::kind)
            .unwrap_or(BuiltinKind::NotBuiltin)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn execute(
        &self,
        spec: &CommandSpec,
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError> {
        match self.commands.get(spec.name()) {
            Some(cmd) => {
                let args: Vec<&str> = spec.args().skip(1).collect();
                cmd.execute(&args, ctx)
            }
            None => Ok(BuiltinOutcome::NotBuiltin),
        }
    }
}

/// Runs a built-in that sits inside a multi-stage pipeline.
///
/// Only the commands that produce output do anything here. `cd`, `exit` and
/// `stop-server` cannot affect the caller from inside a pipeline, so they
/// finish immediately with status 0.
pub fn run_in_pipeline(kind: BuiltinKind, last_status: i32, out: &mut dyn Write) -> i32 {
    let written = match kind {
        BuiltinKind::Dragon => out.write_all(DRAGON.as_bytes()),
        BuiltinKind::Rc => writeln!(out, "{}", last_status),
        _ => Ok(()),
    };
    match written.and_then(|_| out.flush()) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
