//! Executable-path resolution for the supervised command.
//!
//! Bare names are searched through PATH in order; names containing a slash
//! are canonicalized instead. Either way the result must be a regular file
//! executable by the effective user.

use nix::unistd::{getegid, geteuid};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Errors while resolving the command to a runnable path.
#[derive(Debug)]
pub enum ResolveError {
    /// No PATH entry holds an executable file with this name.
    NotFound { name: String },
    /// The path exists but is not a regular file executable by us.
    NotExecutable { path: PathBuf },
    /// The given path could not be canonicalized.
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound { name } => {
                write!(f, "cannot find executable: {}", name)
            }
            ResolveError::NotExecutable { path } => {
                write!(f, "not an executable file: {}", path.display())
            }
            ResolveError::Canonicalize { path, source } => {
                write!(f, "cannot resolve path {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Canonicalize { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Resolve a command name to an absolute executable path.
pub fn find_executable(name: &str) -> Result<PathBuf, ResolveError> {
    if name.contains('/') {
        let path = std::fs::canonicalize(name).map_err(|source| ResolveError::Canonicalize {
            path: PathBuf::from(name),
            source,
        })?;
        if is_executable(&path) {
            Ok(path)
        } else {
            Err(ResolveError::NotExecutable { path })
        }
    } else {
        let dirs = std::env::var_os("PATH").unwrap_or_default();
        search_path(std::env::split_paths(&dirs), name).ok_or_else(|| ResolveError::NotFound {
            name: name.to_string(),
        })
    }
}

/// First directory in the search order holding an executable match wins.
/// Empty PATH entries are skipped.
fn search_path(dirs: impl Iterator<Item = PathBuf>, name: &str) -> Option<PathBuf> {
    for dir in dirs {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// A regular file counts as executable when the execute bit that applies to
/// the effective user is set: the owner bit when we own the file, the group
/// bit when we share its group, the other bit otherwise.
fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    let mode = meta.mode();
    if meta.uid() == geteuid().as_raw() {
        mode & 0o100 != 0
    } else if meta.gid() == getegid().as_raw() {
        mode & 0o010 != 0
    } else {
        mode & 0o001 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn file_with_mode(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn search_stops_at_first_executable_match() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let want = file_with_mode(first.path(), "job", 0o755);
        file_with_mode(second.path(), "job", 0o755);

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(search_path(dirs.into_iter(), "job"), Some(want));
    }

    #[test]
    fn search_skips_non_executable_entries() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        file_with_mode(first.path(), "job", 0o644);
        let want = file_with_mode(second.path(), "job", 0o755);

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(search_path(dirs.into_iter(), "job"), Some(want));
    }

    #[test]
    fn search_skips_empty_path_entries() {
        let dir = tempfile::tempdir().unwrap();
        let want = file_with_mode(dir.path(), "job", 0o755);

        let dirs = vec![PathBuf::new(), dir.path().to_path_buf()];
        assert_eq!(search_path(dirs.into_iter(), "job"), Some(want));
    }

    #[test]
    fn owner_execute_bit_decides_for_files_we_own() {
        let dir = tempfile::tempdir().unwrap();
        // Other-execute alone does not make a file we own runnable.
        let ours = file_with_mode(dir.path(), "odd", 0o605);
        assert!(!is_executable(&ours));

        let runnable = file_with_mode(dir.path(), "fine", 0o700);
        assert!(is_executable(&runnable));
    }

    #[test]
    fn directories_are_not_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_executable(dir.path()));
    }

    #[test]
    fn slash_names_resolve_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let script = file_with_mode(dir.path(), "job", 0o755);

        let found = find_executable(script.to_str().unwrap()).unwrap();
        assert_eq!(found, script.canonicalize().unwrap());
    }

    #[test]
    fn slash_name_without_execute_bit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = file_with_mode(dir.path(), "job", 0o644);

        let err = find_executable(script.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ResolveError::NotExecutable { .. }));
    }

    #[test]
    fn missing_slash_path_is_an_error() {
        let err = find_executable("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ResolveError::Canonicalize { .. }));
    }

    #[test]
    fn bare_name_not_on_path_is_not_found() {
        let err = find_executable("idlerun-test-no-such-command").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot find executable: idlerun-test-no-such-command"
        );
    }

    #[test]
    fn sh_resolves_from_the_real_path() {
        let path = find_executable("sh").unwrap();
        assert!(path.is_absolute());
    }
}
