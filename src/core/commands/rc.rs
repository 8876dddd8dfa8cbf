use std::io::Write;

use super::{BuiltinContext, BuiltinOutcome, Command, CommandError};

#[derive(Clone, Default)]
pub struct RcCommand;

impl Command for RcCommand {
    fn execute(
        &self,
        _args: &[&str],
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<BuiltinOutcome, CommandError> {
        writeln!(ctx.out, "{}", ctx.last_status)?;
        Ok(BuiltinOutcome::Executed)
    }
}
