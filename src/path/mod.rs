use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Expands a leading `~` or `~/` to the home directory. Anything else,
/// including `~user`, is returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) => {
            let mut expanded = home;
            for part in rest.split('/').filter(|p| !p.is_empty()) {
                expanded.push(part);
            }
            expanded
        }
        None => PathBuf::from(path),
    }
}

/// Whether `path` is a regular file with at least one execute bit set.
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Looks `name` up in each directory of `search_path`, in order.
pub fn find_in(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Resolves a command name the way the spawner will. Names containing a
/// `/` are checked directly; bare names are searched in `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let search_path = env::var_os("PATH")?;
    find_in(name, &search_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/docs//notes"), home.join("docs").join("notes"));
        assert_eq!(expand_home("~other/x"), PathBuf::from("~other/x"));
        assert_eq!(expand_home("/tmp"), PathBuf::from("/tmp"));
    }

    #[test]
    fn test_find_in_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_file(first.path(), "tool", 0o644);
        let expected = make_file(second.path(), "tool", 0o755);

        let search: OsString = env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(find_in("tool", &search), Some(expected));
        assert_eq!(find_in("missing", &search), None);
    }

    #[test]
    fn test_directories_are_not_executables() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(find_in("sub", dir.path().as_os_str()), None);
    }

    #[test]
    fn test_find_executable_with_separator() {
        let dir = tempfile::tempdir().unwrap();
        let script = make_file(dir.path(), "run.sh", 0o700);
        let plain = make_file(dir.path(), "data.txt", 0o600);

        assert_eq!(find_executable(script.to_str().unwrap()), Some(script.clone()));
        assert_eq!(find_executable(plain.to_str().unwrap()), None);
        assert!(find_executable("sh").is_some());
    }
}
