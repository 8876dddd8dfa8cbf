use super::ConfigError;
use std::path::PathBuf;

const RC_FILE: &str = ".rdshrc";
const HISTORY_FILE: &str = ".rdsh_history";

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub rc_path: PathBuf,
    pub history_path: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(Self::in_dir(home))
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        ConfigPaths {
            rc_path: dir.join(RC_FILE),
            history_path: dir.join(HISTORY_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_in_dir() {
        let paths = ConfigPaths::in_dir("/home/testuser");
        assert_eq!(paths.rc_path, PathBuf::from("/home/testuser/.rdshrc"));
        assert_eq!(
            paths.history_path,
            PathBuf::from("/home/testuser/.rdsh_history")
        );
    }

    #[test]
    fn test_default_paths_live_in_home() {
        let paths = ConfigPaths::new().unwrap();
        let home = dirs::home_dir().unwrap();
        assert!(paths.rc_path.starts_with(&home));
        assert!(paths.history_path.starts_with(&home));
    }
}
