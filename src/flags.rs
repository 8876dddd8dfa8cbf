use crate::error::ShellError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Switch,
    /// Requires the next argument as its value.
    Value,
    /// Takes the next argument as its value unless it looks like a flag.
    OptionalValue,
}

#[derive(Debug, Clone)]
pub struct Flag {
    pub short: String,
    pub long: String,
    pub description: String,
    pub kind: FlagKind,
    pub value: Option<String>,
}

impl Flag {
    fn new(short: &str, long: &str, kind: FlagKind, description: &str) -> Self {
        Flag {
            short: short.to_string(),
            long: long.to_string(),
            description: description.to_string(),
            kind,
            value: None,
        }
    }

    fn matches(&self, arg: &str) -> bool {
        arg == self.long || (!self.short.is_empty() && arg == self.short)
    }
}

/// Marks a flag that was given without a value.
const SET: &str = "true";

#[derive(Debug, Clone)]
pub struct Flags {
    flags: BTreeMap<&'static str, Flag>,
}

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

impl Flags {
    pub fn new() -> Self {
        let mut flags = BTreeMap::new();
        let defs: [(&'static str, &str, &str, FlagKind, &str); 8] = [
            ("help", "-h", "--help", FlagKind::Switch, "Print this help message"),
            ("version", "-v", "--version", FlagKind::Switch, "Show version information"),
            ("quiet", "-q", "--quiet", FlagKind::Switch, "Only log warnings and errors"),
            ("debug", "-d", "--debug", FlagKind::Switch, "Enable debug logging"),
            (
                "server",
                "-s",
                "--server",
                FlagKind::OptionalValue,
                "Run as a server on [HOST][:PORT] (default 0.0.0.0:1234)",
            ),
            (
                "client",
                "-c",
                "--client",
                FlagKind::OptionalValue,
                "Connect to a server at [HOST][:PORT] (default 127.0.0.1:1234)",
            ),
            (
                "threaded",
                "-x",
                "--threaded",
                FlagKind::Switch,
                "Serve each client on its own thread",
            ),
            ("config", "", "--config", FlagKind::Value, "Read FILE instead of ~/.rdshrc"),
        ];
        for (name, short, long, kind, description) in defs {
            flags.insert(name, Flag::new(short, long, kind, description));
        }

        Flags { flags }
    }

    pub fn parse(&mut self, args: &[String]) -> Result<(), ShellError> {
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            let flag = self
                .flags
                .values_mut()
                .find(|flag| flag.matches(arg))
                .ok_or_else(|| ShellError::FlagError(format!("unknown option {}", arg)))?;

            let next = args.get(i + 1);
            flag.value = match (flag.kind, next) {
                (FlagKind::Switch, _) => Some(SET.to_string()),
                (FlagKind::Value, Some(value)) => {
                    i += 1;
                    Some(value.clone())
                }
                (FlagKind::Value, None) => {
                    return Err(ShellError::FlagError(format!(
                        "Flag {} requires a value",
                        arg
                    )));
                }
                (FlagKind::OptionalValue, Some(value)) if !value.starts_with('-') => {
                    i += 1;
                    Some(value.clone())
                }
                (FlagKind::OptionalValue, _) => Some(SET.to_string()),
            };
            i += 1;
        }
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.flags
            .get(name)
            .and_then(|f| f.value.as_ref())
            .is_some()
    }

    pub fn get_value(&self, name: &str) -> Option<&String> {
        self.flags.get(name).and_then(|f| f.value.as_ref())
    }

    /// The value given to an optional-value flag, if one was supplied.
    pub fn get_argument(&self, name: &str) -> Option<&str> {
        self.get_value(name)
            .map(String::as_str)
            .filter(|value| *value != SET)
    }

    pub fn print_help(&self) {
        println!("Usage: rdsh [OPTIONS]");
        println!("\nOptions:");
        for flag in self.flags.values() {
            let short = if flag.short.is_empty() {
                "  ".to_string()
            } else {
                format!("{},", flag.short)
            };
            println!("  {:<3} {:<15} {}", short, flag.long, flag.description);
        }
    }
}
