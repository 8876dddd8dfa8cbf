use std::fmt;
use std::iter::Peekable;
use std::ops::Range;
use std::str::Chars;

use thiserror::Error;

pub const PIPE_CHAR: char = '|';

/// Bounds enforced while tokenizing a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of stages in one pipeline.
    pub max_stages: usize,
    /// Maximum number of tokens per stage, executable included.
    pub max_args: usize,
    /// Executable names must be strictly shorter than this many bytes.
    pub exe_max: usize,
    /// Arguments must be strictly shorter than this many bytes.
    pub arg_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stages: 8,
            max_args: 8,
            exe_max: 64,
            arg_max: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no commands provided")]
    EmptyCommand,
    #[error("empty command in pipe")]
    EmptyStage,
    #[error("redirection without a command")]
    MissingCommand,
    #[error("piping limited to {max} commands")]
    TooManyStages { max: usize },
    #[error("too many arguments (limit {max})")]
    TooManyArguments { max: usize },
    #[error("command name too large (limit {max})")]
    ExecutableTooLong { max: usize },
    #[error("argument too large (limit {max})")]
    ArgumentTooLong { max: usize },
    #[error("missing file name after '{0}'")]
    MissingRedirectTarget(char),
}

/// One stage of a pipeline.
///
/// Token text lives in a single buffer owned by the command; arguments are
/// byte ranges into it. Quote characters are dropped while the buffer is
/// filled, so a range always covers exactly the text handed to the program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    buffer: String,
    args: Vec<Range<usize>>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub append: bool,
}

impl CommandSpec {
    pub fn parse(stage: &str, limits: &Limits) -> Result<Self, ParseError> {
        let mut spec = CommandSpec {
            buffer: String::with_capacity(stage.len()),
            ..Default::default()
        };
        let mut token_start = 0;
        let mut quote: Option<char> = None;
        let mut chars = stage.chars().peekable();

        while let Some(c) = chars.next() {
            match (quote, c) {
                (Some(open), c) if c == open => quote = None,
                (Some(_), c) => spec.buffer.push(c),
                (None, '"' | '\'') => quote = Some(c),
                (None, '<') if spec.input.is_none() => {
                    spec.close_token(&mut token_start, limits)?;
                    spec.input = Some(read_target(&mut chars, '<')?);
                    token_start = spec.buffer.len();
                }
                (None, '>') if spec.output.is_none() => {
                    spec.close_token(&mut token_start, limits)?;
                    spec.append = chars.next_if_eq(&'>').is_some();
                    spec.output = Some(read_target(&mut chars, '>')?);
                    token_start = spec.buffer.len();
                }
                (None, c) if c.is_whitespace() => spec.close_token(&mut token_start, limits)?,
                (None, c) => spec.buffer.push(c),
            }
        }
        spec.close_token(&mut token_start, limits)?;

        if spec.args.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        Ok(spec)
    }

    fn close_token(&mut self, start: &mut usize, limits: &Limits) -> Result<(), ParseError> {
        let end = self.buffer.len();
        let len = end - *start;
        if len == 0 {
            return Ok(());
        }

        if self.args.len() >= limits.max_args {
            return Err(ParseError::TooManyArguments {
                max: limits.max_args,
            });
        }
        if self.args.is_empty() && len >= limits.exe_max {
            return Err(ParseError::ExecutableTooLong {
                max: limits.exe_max,
            });
        }
        if len >= limits.arg_max {
            return Err(ParseError::ArgumentTooLong {
                max: limits.arg_max,
            });
        }

        self.args.push(*start..end);
        *start = end;
        Ok(())
    }

    /// The executable name; by convention also the first argument.
    pub fn name(&self) -> &str {
        self.arg(0).unwrap_or_default()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|range| &self.buffer[range.clone()])
    }

    pub fn argc(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().map(|range| &self.buffer[range.clone()])
    }

    pub fn argv(&self) -> Vec<&str> {
        self.args().collect()
    }

    pub fn has_path_separator(&self) -> bool {
        self.name().contains('/')
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))?;
        if let Some(input) = &self.input {
            write!(f, " < {}", input)?;
        }
        if let Some(output) = &self.output {
            let op = if self.append { ">>" } else { ">" };
            write!(f, " {} {}", op, output)?;
        }
        Ok(())
    }
}

fn read_target(chars: &mut Peekable<Chars<'_>>, op: char) -> Result<String, ParseError> {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}

    let mut target = String::new();
    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
        target.push(c);
    }

    if target.is_empty() {
        return Err(ParseError::MissingRedirectTarget(op));
    }
    Ok(target)
}

/// The ordered stages parsed from one input line. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandList {
    commands: Vec<CommandSpec>,
}

impl CommandList {
    pub fn parse(line: &str, limits: &Limits) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.chars().all(|c| c == PIPE_CHAR || c.is_whitespace()) {
            return Err(ParseError::EmptyCommand);
        }

        let stages: Vec<&str> = line.split(PIPE_CHAR).collect();
        if stages.len() > limits.max_stages {
            return Err(ParseError::TooManyStages {
                max: limits.max_stages,
            });
        }
        if stages.iter().any(|stage| stage.trim().is_empty()) {
            return Err(ParseError::EmptyStage);
        }

        let commands = stages
            .iter()
            .map(|stage| CommandSpec::parse(stage, limits))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn first(&self) -> &CommandSpec {
        &self.commands[0]
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandSpec> {
        self.commands.iter()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a CommandSpec;
    type IntoIter = std::slice::Iter<'a, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}
