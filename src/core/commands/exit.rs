use super::{BuiltinContext, BuiltinOutcome, Command, CommandError};

/// Ends the local shell or the current remote connection.
#[derive(Clone, Default)]
pub struct ExitCommand;

impl Command for ExitCommand {
    fn execute(
        &self,
        _args: &[&str],
        _ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError> {
        Ok(BuiltinOutcome::ExitSession)
    }
}

/// Asks a remote server to stop accepting clients.
#[derive(Clone, Default)]
pub struct StopServerCommand;

impl Command for StopServerCommand {
    fn execute(
        &self,
        _args: &[&str],
        _ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError> {
        Ok(BuiltinOutcome::StopServer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_command() {
        let mut out = Vec::new();
        let mut ctx = BuiltinContext::new(&mut out, 3);
        let outcome = ExitCommand.execute(&["ignored"], &mut ctx).unwrap();
        assert_eq!(outcome, BuiltinOutcome::ExitSession);
        assert_eq!(ctx.last_status, 3);
        assert!(out.is_empty());
    }
}
