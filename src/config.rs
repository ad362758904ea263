use anyhow::{Context, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_NAME: &str = "todos.json";
pub const FILE_ENV_VAR: &str = "TODO_FILE";

/// Where the task file lives: `--file`, then `$TODO_FILE`, then
/// `todos.json` in the working directory.
pub fn store_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    let work_dir = env::current_dir().context("cannot determine working directory")?;
    Ok(resolve(flag, env::var_os(FILE_ENV_VAR), &work_dir))
}

fn resolve(flag: Option<PathBuf>, env_value: Option<OsString>, work_dir: &Path) -> PathBuf {
    let chosen = flag.or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from));
    match chosen {
        Some(path) if path.is_absolute() => path,
        Some(path) => work_dir.join(path),
        None => work_dir.join(DEFAULT_FILE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_env() {
        let path = resolve(
            Some(PathBuf::from("/data/flag.json")),
            Some(OsString::from("/data/env.json")),
            Path::new("/work"),
        );
        assert_eq!(path, PathBuf::from("/data/flag.json"));
    }

    #[test]
    fn env_used_when_no_flag() {
        let path = resolve(None, Some(OsString::from("lists/env.json")), Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/lists/env.json"));
    }

    #[test]
    fn empty_env_falls_back_to_default() {
        let path = resolve(None, Some(OsString::new()), Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/todos.json"));
        let path = resolve(None, None, Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/todos.json"));
    }
}
