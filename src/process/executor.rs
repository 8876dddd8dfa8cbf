use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{BorrowedFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::pipes::PipeSet;
use super::status::{self, PipelineOutcome, NOT_EXECUTABLE, NOT_FOUND};
use super::{ProcessError, RedirectError};
use crate::core::commands::{self, Builtins};
use crate::error::os_reason;
use crate::shell::parser::{CommandList, CommandSpec};

/// Where a stage reads its standard input from.
#[derive(Debug)]
pub enum Source {
    Inherit,
    Fd(OwnedFd),
}

impl Source {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(match self {
            Source::Inherit => Source::Inherit,
            Source::Fd(fd) => Source::Fd(fd.try_clone()?),
        })
    }

    fn into_stdio(self) -> Stdio {
        match self {
            Source::Inherit => Stdio::inherit(),
            Source::Fd(fd) => Stdio::from(fd),
        }
    }
}

/// Where a stage's standard output and standard error go.
#[derive(Debug)]
pub enum Sink {
    Inherit,
    Fd(OwnedFd),
}

impl Sink {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(match self {
            Sink::Inherit => Sink::Inherit,
            Sink::Fd(fd) => Sink::Fd(fd.try_clone()?),
        })
    }

    fn stdio_pair(&self) -> io::Result<(Stdio, Stdio)> {
        Ok(match self {
            Sink::Inherit => (Stdio::inherit(), Stdio::inherit()),
            Sink::Fd(fd) => (Stdio::from(fd.try_clone()?), Stdio::from(fd.try_clone()?)),
        })
    }

    fn into_writer(self) -> Box<dyn Write + Send> {
        match self {
            Sink::Inherit => Box::new(io::stdout()),
            Sink::Fd(fd) => Box::new(File::from(fd)),
        }
    }

    /// Best-effort diagnostic; a sink that cannot be written to is ignored.
    fn report(&self, message: &str) {
        let written = match self {
            Sink::Inherit => io::stderr().write_all(message.as_bytes()),
            Sink::Fd(fd) => fd
                .try_clone()
                .and_then(|fd| File::from(fd).write_all(message.as_bytes())),
        };
        if let Err(e) = written {
            debug!(error = %e, "dropping diagnostic");
        }
    }
}

/// The outer ends of a pipeline: what the first stage reads and where the
/// last stage writes when they are not redirected.
#[derive(Debug)]
pub struct Endpoints {
    pub stdin: Source,
    pub stdout: Sink,
}

impl Endpoints {
    /// The caller's own terminal streams.
    pub fn inherit() -> Self {
        Self {
            stdin: Source::Inherit,
            stdout: Sink::Inherit,
        }
    }

    /// Both ends on one descriptor, e.g. a connected socket.
    pub fn from_fd(fd: BorrowedFd<'_>) -> io::Result<Self> {
        Ok(Self {
            stdin: Source::Fd(fd.try_clone_to_owned()?),
            stdout: Sink::Fd(fd.try_clone_to_owned()?),
        })
    }

    fn report(&self, message: &str) {
        self.stdout.report(message);
    }
}

enum Stage {
    Process(Child),
    Builtin(JoinHandle<i32>),
    Finished(i32),
}

impl Stage {
    fn wait(self) -> io::Result<i32> {
        match self {
            Stage::Process(mut child) => child.wait().map(status::exit_code),
            Stage::Builtin(handle) => Ok(handle.join().unwrap_or(1)),
            Stage::Finished(code) => Ok(code),
        }
    }

    /// Tears down a stage of a pipeline that failed to spawn completely.
    fn terminate(self) {
        let mut child = match self {
            Stage::Process(child) => child,
            other => {
                let _ = other.wait();
                return;
            }
        };

        // SAFETY: kill has no memory-safety preconditions; the pid belongs
        // to a child that has not been reaped yet.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        for _ in 0..10 {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Runs a [`CommandList`] as a chain of processes connected by pipes.
#[derive(Clone, Default)]
pub struct PipelineExecutor {
    builtins: Builtins,
}

impl PipelineExecutor {
    pub fn new() -> Self {
        Self {
            builtins: Builtins::new(),
        }
    }

    /// Spawns every stage, waits for all of them in spawn order and returns
    /// their statuses. Every pipe end is closed and every child reaped before
    /// this returns, on success and on failure.
    pub fn execute(
        &self,
        commands: &CommandList,
        endpoints: &Endpoints,
        last_status: i32,
    ) -> Result<PipelineOutcome, ProcessError> {
        let count = commands.len();
        let mut pipes = PipeSet::new(count.saturating_sub(1)).map_err(ProcessError::Pipe)?;
        let mut stages = Vec::with_capacity(count);

        for (index, spec) in commands.iter().enumerate() {
            let stage = self.spawn_stage(index, count, spec, &mut pipes, endpoints, last_status);
            match stage {
                Ok(stage) => stages.push(stage),
                Err(e) => {
                    warn!(stage = index, error = %e, "pipeline aborted");
                    drop(pipes);
                    tear_down(stages);
                    return Err(e);
                }
            }
        }

        // Stages hand data to each other; the parent must not hold any end.
        drop(pipes);
        debug!(stages = count, "pipeline running");

        let statuses = stages
            .into_iter()
            .enumerate()
            .map(|(index, stage)| match stage.wait() {
                Ok(code) => code,
                Err(e) => {
                    warn!(stage = index, error = %e, "wait failed");
                    1
                }
            })
            .collect();

        let outcome = PipelineOutcome::new(statuses);
        debug!(statuses = ?outcome.statuses(), "pipeline done");
        Ok(outcome)
    }

    fn spawn_stage(
        &self,
        index: usize,
        count: usize,
        spec: &CommandSpec,
        pipes: &mut PipeSet,
        endpoints: &Endpoints,
        last_status: i32,
    ) -> Result<Stage, ProcessError> {
        let input = match &spec.input {
            Some(path) => match File::open(path) {
                Ok(file) => Source::Fd(file.into()),
                Err(e) => return Ok(redirect_failed(path, e, endpoints)),
            },
            None if index > 0 => Source::Fd(take_end(pipes.take_reader(index - 1))?),
            None => endpoints.stdin.try_clone()?,
        };

        let output = match &spec.output {
            Some(path) => match open_output(path, spec.append) {
                Ok(file) => Sink::Fd(file.into()),
                Err(e) => return Ok(redirect_failed(path, e, endpoints)),
            },
            None if index + 1 < count => Sink::Fd(take_end(pipes.take_writer(index))?),
            None => endpoints.stdout.try_clone()?,
        };

        let kind = self.builtins.kind(spec.name());
        if kind.is_builtin() {
            drop(input);
            let mut writer = output.into_writer();
            let handle = thread::Builder::new()
                .name(format!("builtin-{}", spec.name()))
                .spawn(move || commands::run_in_pipeline(kind, last_status, &mut *writer))
                .map_err(|source| ProcessError::Spawn {
                    command: spec.name().to_string(),
                    source,
                })?;
            debug!(stage = index, command = %spec, "running built-in");
            return Ok(Stage::Builtin(handle));
        }

        let (stdout, stderr) = output.stdio_pair()?;
        let mut command = Command::new(spec.name());
        command
            .args(spec.args().skip(1))
            .stdin(input.into_stdio())
            .stdout(stdout)
            .stderr(stderr);

        match command.spawn() {
            Ok(child) => {
                debug!(stage = index, pid = child.id(), command = %spec, "spawned");
                Ok(Stage::Process(child))
            }
            Err(e) => match exec_failure_status(&e) {
                Some(code) => {
                    output.report(&format!("rdsh: {}: {}\n", spec.name(), exec_reason(&e)));
                    Ok(Stage::Finished(code))
                }
                None => Err(ProcessError::Spawn {
                    command: spec.name().to_string(),
                    source: e,
                }),
            },
        }
    }
}

/// Stops and reaps every stage of a pipeline that could not be completed.
fn tear_down(stages: Vec<Stage>) {
    stages.into_iter().for_each(Stage::terminate);
}

/// Applies a lone built-in's redirections. A `<` file must be readable; a
/// `>` or `>>` file is opened and returned as the built-in's output.
pub fn open_builtin_output(spec: &CommandSpec) -> Result<Option<File>, RedirectError> {
    if let Some(path) = &spec.input {
        File::open(path).map_err(|source| RedirectError::new(path, source))?;
    }
    match &spec.output {
        Some(path) => open_output(path, spec.append)
            .map(Some)
            .map_err(|source| RedirectError::new(path, source)),
        None => Ok(None),
    }
}

fn take_end(end: Option<OwnedFd>) -> io::Result<OwnedFd> {
    end.ok_or_else(|| io::Error::other("pipe end already in use"))
}

fn open_output(path: &str, append: bool) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .mode(0o644)
        .open(path)
}

fn redirect_failed(path: &str, err: io::Error, endpoints: &Endpoints) -> Stage {
    endpoints.report(&format!("rdsh: {}\n", RedirectError::new(path, err)));
    Stage::Finished(1)
}

/// Spawn errors that mean the program itself could not be run, as opposed
/// to the system failing to create a process.
fn exec_failure_status(err: &io::Error) -> Option<i32> {
    match err.raw_os_error()? {
        libc::ENOENT | libc::ENOTDIR | libc::ENAMETOOLONG | libc::ELOOP => Some(NOT_FOUND),
        libc::EACCES | libc::EPERM | libc::ENOEXEC | libc::E2BIG | libc::ETXTBSY => {
            Some(NOT_EXECUTABLE)
        }
        _ => None,
    }
}

fn exec_reason(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(libc::ENOENT) => "command not found".to_string(),
        Some(libc::EACCES) => "permission denied".to_string(),
        Some(libc::E2BIG) => "argument list too long".to_string(),
        Some(libc::ENOMEM) => "out of memory".to_string(),
        _ => os_reason(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pipes::anonymous_pipe;
    use crate::shell::parser::Limits;
    use std::fs;
    use std::io::Read;

    fn parse(line: &str) -> CommandList {
        CommandList::parse(line, &Limits::default()).unwrap()
    }

    /// Runs `line` with stdout captured through a pipe; returns (outcome, output).
    fn run_captured(line: &str) -> (PipelineOutcome, String) {
        let (reader, writer) = anonymous_pipe().unwrap();
        let endpoints = Endpoints {
            stdin: Source::Inherit,
            stdout: Sink::Fd(writer),
        };

        let reader_thread = thread::spawn(move || {
            let mut out = String::new();
            File::from(reader).read_to_string(&mut out).unwrap();
            out
        });

        let outcome = PipelineExecutor::new()
            .execute(&parse(line), &endpoints, 0)
            .unwrap();
        drop(endpoints);
        (outcome, reader_thread.join().unwrap())
    }

    #[test]
    fn test_single_stage_argv() {
        let (outcome, out) = run_captured(r#"printf "%s," "a  b" c"#);
        assert_eq!(outcome.status(), 0);
        assert_eq!(out, "a  b,c,");
    }

    #[test]
    fn test_cat_chain_preserves_input() {
        let (outcome, out) = run_captured("echo hello pipeline | cat | cat");
        assert_eq!(outcome.statuses(), &[0, 0, 0]);
        assert_eq!(out, "hello pipeline\n");
    }

    #[test]
    fn test_downstream_sees_eof() {
        let (outcome, out) = run_captured("printf 'a\\nb\\nc\\n' | wc -l");
        assert!(outcome.success());
        assert_eq!(out.trim(), "3");
    }

    #[test]
    fn test_exit_code_passthrough() {
        let (outcome, _) = run_captured("sh -c 'exit 3'");
        assert_eq!(outcome.status(), 3);
        assert_eq!(outcome.last(), 3);
    }

    #[test]
    fn test_signal_status() {
        let (outcome, _) = run_captured("sh -c 'kill -TERM $$'");
        assert_eq!(outcome.status(), 128 + libc::SIGTERM);
    }

    #[test]
    fn test_first_failure_reported() {
        let (outcome, out) = run_captured("sh -c 'exit 4' | echo done");
        assert_eq!(outcome.statuses(), &[4, 0]);
        assert_eq!(outcome.status(), 4);
        assert_eq!(outcome.last(), 0);
        assert_eq!(out, "done\n");
    }

    #[test]
    fn test_command_not_found() {
        let (outcome, out) = run_captured("definitely-not-a-real-command-xyz");
        assert_eq!(outcome.status(), NOT_FOUND);
        assert_eq!(out, "rdsh: definitely-not-a-real-command-xyz: command not found\n");
    }

    #[test]
    fn test_not_found_mid_pipeline_keeps_running() {
        let (outcome, out) = run_captured("true | no-such-program-abc | echo tail");
        assert_eq!(outcome.statuses(), &[0, NOT_FOUND, 0]);
        assert_eq!(out, "tail\n");
    }

    #[test]
    fn test_output_redirect_truncate_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path = path.to_str().unwrap();

        run_captured(&format!("echo first > {}", path));
        run_captured(&format!("echo second > {}", path));
        assert_eq!(fs::read_to_string(path).unwrap(), "second\n");

        run_captured(&format!("echo third >> {}", path));
        assert_eq!(fs::read_to_string(path).unwrap(), "second\nthird\n");
    }

    #[test]
    fn test_input_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "zebra\napple\n").unwrap();

        let (outcome, out) = run_captured(&format!("sort < {}", path.display()));
        assert!(outcome.success());
        assert_eq!(out, "apple\nzebra\n");
    }

    #[test]
    fn test_redirect_wins_over_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let (outcome, out) = run_captured(&format!("echo hi > {} | cat", path.display()));
        assert!(outcome.success());
        assert_eq!(out, "");
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi\n");
    }

    #[test]
    fn test_missing_input_file() {
        let (outcome, out) = run_captured("cat < /nonexistent/input.txt");
        assert_eq!(outcome.status(), 1);
        assert_eq!(out, "rdsh: /nonexistent/input.txt: No such file or directory\n");
    }

    #[test]
    fn test_stderr_follows_stdout() {
        let (_, out) = run_captured("sh -c 'echo oops 1>&2'");
        assert_eq!(out, "oops\n");
    }

    #[test]
    fn test_builtin_inside_pipeline() {
        let (outcome, out) = run_captured("dragon | wc -l");
        assert!(outcome.success());
        assert_eq!(out.trim(), "38");

        let (outcome, out) = run_captured("cd /tmp | echo after");
        assert_eq!(outcome.statuses(), &[0, 0]);
        assert_eq!(out, "after\n");
    }

    #[test]
    fn test_rc_inside_pipeline_sees_last_status() {
        let (reader, writer) = anonymous_pipe().unwrap();
        let endpoints = Endpoints {
            stdin: Source::Inherit,
            stdout: Sink::Fd(writer),
        };
        PipelineExecutor::new()
            .execute(&parse("rc | cat"), &endpoints, 9)
            .unwrap();
        drop(endpoints);

        let mut out = String::new();
        File::from(reader).read_to_string(&mut out).unwrap();
        assert_eq!(out, "9\n");
    }

    #[test]
    fn test_stdin_from_endpoint() {
        let (in_reader, in_writer) = anonymous_pipe().unwrap();
        let (out_reader, out_writer) = anonymous_pipe().unwrap();

        let mut feeder = File::from(in_writer);
        feeder.write_all(b"from endpoint\n").unwrap();
        drop(feeder);

        let endpoints = Endpoints {
            stdin: Source::Fd(in_reader),
            stdout: Sink::Fd(out_writer),
        };
        let outcome = PipelineExecutor::new()
            .execute(&parse("cat | tr a-z A-Z"), &endpoints, 0)
            .unwrap();
        drop(endpoints);
        assert!(outcome.success());

        let mut out = String::new();
        File::from(out_reader).read_to_string(&mut out).unwrap();
        assert_eq!(out, "FROM ENDPOINT\n");
    }

    fn is_reaped(pid: libc::pid_t) -> bool {
        let mut status = 0;
        // SAFETY: waitpid only writes to the status integer passed in.
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        rc == -1 && io::Error::last_os_error().raw_os_error() == Some(libc::ECHILD)
    }

    #[test]
    fn test_terminate_reaps_running_child() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as libc::pid_t;

        let started = std::time::Instant::now();
        Stage::Process(child).terminate();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(is_reaped(pid));
    }

    #[test]
    fn test_terminate_kills_child_ignoring_sigterm() {
        let child = Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .unwrap();
        let pid = child.id() as libc::pid_t;
        // Give the shell time to install its trap.
        thread::sleep(Duration::from_millis(200));

        let started = std::time::Instant::now();
        Stage::Process(child).terminate();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(is_reaped(pid));
    }

    #[test]
    fn test_tear_down_reaps_every_stage() {
        let first = Command::new("sleep").arg("30").spawn().unwrap();
        let second = Command::new("sleep").arg("30").spawn().unwrap();
        let pids = [first.id() as libc::pid_t, second.id() as libc::pid_t];

        tear_down(vec![
            Stage::Process(first),
            Stage::Builtin(thread::spawn(|| 0)),
            Stage::Finished(127),
            Stage::Process(second),
        ]);
        assert!(pids.iter().all(|&pid| is_reaped(pid)));
    }

    #[test]
    fn test_builtin_output_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rc.txt");

        let list = parse(&format!("rc > {}", path.display()));
        let file = open_builtin_output(list.first()).unwrap();
        assert!(file.is_some());
        assert!(path.exists());

        let list = parse("rc");
        assert!(open_builtin_output(list.first()).unwrap().is_none());

        let list = parse("dragon < /nonexistent/input.txt");
        let err = open_builtin_output(list.first()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/nonexistent/input.txt: No such file or directory"
        );
    }

    #[test]
    fn test_exec_failure_classification() {
        let not_found = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(exec_failure_status(&not_found), Some(NOT_FOUND));

        let denied = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(exec_failure_status(&denied), Some(NOT_EXECUTABLE));
        assert_eq!(exec_reason(&denied), "permission denied");

        let no_procs = io::Error::from_raw_os_error(libc::EAGAIN);
        assert_eq!(exec_failure_status(&no_procs), None);
    }
}
