use std::io::{self, Write};
use std::net::TcpStream;
use std::os::fd::AsFd;

use tracing::{debug, warn};

use super::protocol::{send_eof, send_message, Request, RequestReader};
use crate::core::commands::{BuiltinContext, BuiltinOutcome, Builtins};
use crate::path;
use crate::process::status::NOT_FOUND;
use crate::process::{open_builtin_output, Endpoints, PipelineExecutor};
use crate::shell::parser::{CommandList, Limits};

/// Why a session stopped reading requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Disconnected,
    Exit,
    StopServer,
}

/// One client connection: reads requests, runs them and writes framed
/// responses until the client leaves or asks to stop.
pub struct Session {
    id: usize,
    stream: TcpStream,
    requests: RequestReader<TcpStream>,
    builtins: Builtins,
    executor: PipelineExecutor,
    limits: Limits,
    last_status: i32,
}

impl Session {
    pub fn new(id: usize, stream: TcpStream, buffer_size: usize) -> io::Result<Self> {
        let requests = RequestReader::new(stream.try_clone()?, buffer_size);
        Ok(Self {
            id,
            stream,
            requests,
            builtins: Builtins::new(),
            executor: PipelineExecutor::new(),
            limits: Limits::default(),
            last_status: 0,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn run(&mut self) -> io::Result<SessionEnd> {
        loop {
            let line = match self.requests.next_request()? {
                None => return Ok(SessionEnd::Disconnected),
                Some(Request::Oversized) => {
                    warn!(client = self.id, "request too large");
                    send_message(&mut self.stream, "Error: Command too large\n")?;
                    continue;
                }
                Some(Request::Command(line)) => line,
            };

            if let Some(end) = self.handle(&line)? {
                return Ok(end);
            }
        }
    }

    fn handle(&mut self, line: &str) -> io::Result<Option<SessionEnd>> {
        if line.trim().is_empty() {
            send_eof(&mut self.stream)?;
            return Ok(None);
        }
        debug!(client = self.id, command = line.trim(), "request");

        let commands = match CommandList::parse(line, &self.limits) {
            Ok(commands) => commands,
            Err(e) => {
                send_message(&mut self.stream, &format!("error: {}\n", e))?;
                return Ok(None);
            }
        };

        if commands.len() == 1 {
            match self.run_builtin(&commands)? {
                BuiltinOutcome::NotBuiltin => {}
                BuiltinOutcome::Executed => return Ok(None),
                BuiltinOutcome::ExitSession => {
                    send_message(&mut self.stream, "Exiting client connection...\n")?;
                    return Ok(Some(SessionEnd::Exit));
                }
                BuiltinOutcome::StopServer => {
                    send_message(&mut self.stream, "Stopping server...\n")?;
                    return Ok(Some(SessionEnd::StopServer));
                }
            }
        }

        if let Some(missing) = commands
            .iter()
            .filter(|spec| !spec.has_path_separator() && !self.builtins.is_builtin(spec.name()))
            .map(|spec| spec.name())
            .find(|name| path::find_executable(name).is_none())
        {
            self.last_status = NOT_FOUND;
            send_message(
                &mut self.stream,
                &format!("Error: Command '{}' not found\n", missing),
            )?;
            return Ok(None);
        }

        self.run_pipeline(&commands)?;
        Ok(None)
    }

    /// Runs a lone built-in in this thread. The reply for an executed
    /// built-in is already sent when this returns.
    fn run_builtin(&mut self, commands: &CommandList) -> io::Result<BuiltinOutcome> {
        let spec = commands.first();
        if !self.builtins.is_builtin(spec.name()) {
            return Ok(BuiltinOutcome::NotBuiltin);
        }

        let mut redirected = match open_builtin_output(spec) {
            Ok(file) => file,
            Err(e) => {
                self.last_status = 1;
                send_message(&mut self.stream, &format!("rdsh: {}\n", e))?;
                return Ok(BuiltinOutcome::Executed);
            }
        };
        let mut output = Vec::new();
        let out: &mut dyn Write = match redirected.as_mut() {
            Some(file) => file,
            None => &mut output,
        };
        let mut ctx = BuiltinContext::new(out, self.last_status).with_report_cwd(true);
        let result = self.builtins.execute(spec, &mut ctx);
        let status = ctx.last_status;

        match result {
            Ok(BuiltinOutcome::Executed) => {
                self.last_status = status;
                self.stream.write_all(&output)?;
                send_eof(&mut self.stream)?;
                Ok(BuiltinOutcome::Executed)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.last_status = 1;
                send_message(&mut self.stream, &format!("error: {}\n", e))?;
                Ok(BuiltinOutcome::Executed)
            }
        }
    }

    fn run_pipeline(&mut self, commands: &CommandList) -> io::Result<()> {
        let endpoints = Endpoints::from_fd(self.stream.as_fd())?;
        let result = self.executor.execute(commands, &endpoints, self.last_status);
        drop(endpoints);

        match result {
            Ok(outcome) => {
                self.last_status = outcome.status();
                if self.last_status != 0 {
                    self.stream
                        .write_all(format!("Command returned {}\n", self.last_status).as_bytes())?;
                }
                send_eof(&mut self.stream)
            }
            Err(e) => {
                warn!(client = self.id, error = %e, "pipeline failed");
                self.last_status = e.status();
                send_message(&mut self.stream, &format!("error: {}\n", e))
            }
        }
    }
}
