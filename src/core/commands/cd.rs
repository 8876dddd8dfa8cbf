use std::env;
use std::io::Write;

use super::{BuiltinContext, BuiltinOutcome, Command, CommandError};
use crate::error::os_reason;
use crate::path::expand_home;

#[derive(Clone, Default)]
pub struct CdCommand;

impl CdCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Command for CdCommand {
    fn execute(
        &self,
        args: &[&str],
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError> {
        let Some(target) = args.first() else {
            return Ok(BuiltinOutcome::Executed);
        };

        match env::set_current_dir(expand_home(target)) {
            Ok(()) => {
                ctx.last_status = 0;
                if ctx.report_cwd {
                    let cwd = env::current_dir()?;
                    writeln!(ctx.out, "Changed directory to: {}", cwd.display())?;
                }
            }
            Err(e) => {
                ctx.last_status = e.raw_os_error().unwrap_or(1);
                writeln!(ctx.out, "cd: {}: {}", target, os_reason(&e))?;
            }
        }
        Ok(BuiltinOutcome::Executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn run(args: &[&str], report_cwd: bool) -> (String, i32) {
        let mut out = Vec::new();
        let mut ctx = BuiltinContext::new(&mut out, 5).with_report_cwd(report_cwd);
        let outcome = CdCommand::new().execute(args, &mut ctx).unwrap();
        assert_eq!(outcome, BuiltinOutcome::Executed);
        let status = ctx.last_status;
        (String::from_utf8(out).unwrap(), status)
    }

    #[test]
    #[serial]
    fn test_cd_without_args_is_noop() {
        let before = env::current_dir().unwrap();
        let (out, status) = run(&[], false);
        assert!(out.is_empty());
        assert_eq!(status, 5);
        assert_eq!(env::current_dir().unwrap(), before);
    }

    #[test]
    #[serial]
    fn test_cd_temp() {
        let before = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().canonicalize().unwrap();

        let (out, status) = run(&[target.to_str().unwrap()], false);
        assert!(out.is_empty());
        assert_eq!(status, 0);
        assert_eq!(env::current_dir().unwrap().canonicalize().unwrap(), target);

        env::set_current_dir(before).unwrap();
    }

    #[test]
    #[serial]
    fn test_cd_reports_cwd() {
        let before = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let (out, _) = run(&[dir.path().to_str().unwrap()], true);
        assert!(out.starts_with("Changed directory to: "));

        env::set_current_dir(before).unwrap();
    }

    #[test]
    #[serial]
    fn test_cd_invalid() {
        let (out, status) = run(&["/nonexistent/path"], false);
        assert_eq!(out, "cd: /nonexistent/path: No such file or directory\n");
        assert_eq!(status, libc::ENOENT);
    }
}
