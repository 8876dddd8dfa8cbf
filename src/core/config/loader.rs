use std::borrow::Cow;
use std::env;
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use super::{ConfigError, ConfigPaths};

/// Reads `export NAME=value` and `PATH=value` lines into the environment.
pub struct ConfigLoader<'a> {
    paths: &'a ConfigPaths,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(paths: &'a ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn load(&self) -> Result<usize, ConfigError> {
        self.source_if_exists(&self.paths.rc_path)
    }

    fn source_if_exists(&self, path: &Path) -> Result<usize, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut applied = 0;
        for line in content.lines() {
            if self.process_line(line)? {
                applied += 1;
            }
        }
        debug!(path = %path.display(), applied, "rc file loaded");
        Ok(applied)
    }

    fn process_line(&self, line: &str) -> Result<bool, ConfigError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(false);
        }

        if let Some(def) = line.strip_prefix("export ") {
            self.process_env_var(def)
        } else if let Some(value) = line.strip_prefix("PATH=") {
            set_var("PATH", value)
        } else {
            Ok(false)
        }
    }

    fn process_env_var(&self, def: &str) -> Result<bool, ConfigError> {
        match def.split_once('=') {
            Some((name, value)) => set_var(name.trim(), value),
            None => Ok(false),
        }
    }
}

fn set_var(name: &str, value: &str) -> Result<bool, ConfigError> {
    if name.is_empty() || name.contains(['=', '\0']) {
        return Err(ConfigError::InvalidValue(format!(
            "bad variable name '{}'",
            name
        )));
    }
    let value = expand_value(strip_quotes(value.trim()));
    if value.contains('\0') {
        return Err(ConfigError::InvalidValue(format!("bad value for {}", name)));
    }
    env::set_var(name, &*value);
    Ok(true)
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Substitutes `$HOME` and `$PATH` with their current values.
fn expand_value(value: &str) -> Cow<'_, str> {
    let mut result = Cow::Borrowed(value);
    for name in ["HOME", "PATH"] {
        let token = format!("${}", name);
        if result.contains(&token) {
            let current = env::var(name).unwrap_or_default();
            result = Cow::Owned(result.replace(&token, &current));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn load(content: &str) -> Result<usize, ConfigError> {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::in_dir(dir.path());
        fs::write(&paths.rc_path, content).unwrap();
        ConfigLoader::new(&paths).load()
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"hello world\""), "hello world");
        assert_eq!(strip_quotes("'single'"), "single");
        assert_eq!(strip_quotes("\"unbalanced"), "\"unbalanced");
        assert_eq!(strip_quotes("\""), "\"");
    }

    #[test]
    #[serial]
    fn test_expand_value() {
        let home = env::var("HOME").unwrap_or_default();
        assert_eq!(expand_value("$HOME/bin"), format!("{}/bin", home));
        assert!(matches!(expand_value("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    #[serial]
    fn test_export_lines() {
        let applied = load(
            "# comment\n\
             \n\
             export RDSH_TEST_QUOTED=\"hello world\"\n\
             export RDSH_TEST_PLAIN=value\n\
             alias ll='ls -la'\n",
        )
        .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(env::var("RDSH_TEST_QUOTED").unwrap(), "hello world");
        assert_eq!(env::var("RDSH_TEST_PLAIN").unwrap(), "value");
        env::remove_var("RDSH_TEST_QUOTED");
        env::remove_var("RDSH_TEST_PLAIN");
    }

    #[test]
    #[serial]
    fn test_path_line_extends_path() {
        let old_path = env::var("PATH").unwrap_or_default();
        load("PATH=/opt/rdsh-test/bin:$PATH\n").unwrap();

        let new_path = env::var("PATH").unwrap();
        assert_eq!(new_path, format!("/opt/rdsh-test/bin:{}", old_path));
        env::set_var("PATH", old_path);
    }

    #[test]
    #[serial]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::in_dir(dir.path());
        assert_eq!(ConfigLoader::new(&paths).load().unwrap(), 0);
    }

    #[test]
    #[serial]
    fn test_bad_name_is_rejected() {
        assert!(matches!(
            load("export =oops\n"),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
