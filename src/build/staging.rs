//! Resolution of a plan's files against the source root.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use super::error::BuildError;

/// Validate plan files and resolve them under `root`.
///
/// Every file must be a non-empty relative path without `..`; duplicates are
/// dropped, first occurrence wins.
pub fn stage_files(root: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>, BuildError> {
    let mut seen = HashSet::new();
    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let reject = |reason: &str| BuildError::Staging {
            path: file.clone(),
            reason: reason.to_string(),
        };
        if file.as_os_str().is_empty() {
            return Err(reject("empty path"));
        }
        for part in file.components() {
            match part {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(reject("path escapes the source root")),
                Component::RootDir | Component::Prefix(_) => return Err(reject("path must be relative")),
            }
        }
        if seen.insert(file.clone()) {
            staged.push(root.join(file));
        }
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_files_resolve_under_root() {
        let staged = stage_files(
            Path::new("/src"),
            &["a/b.rs".into(), "./c.rs".into(), "a/b.rs".into()],
        )
        .unwrap();
        assert_eq!(staged, vec![PathBuf::from("/src/a/b.rs"), PathBuf::from("/src/./c.rs")]);
    }

    #[test]
    fn test_escaping_paths_rejected() {
        assert!(matches!(
            stage_files(Path::new("/src"), &["../etc/passwd".into()]),
            Err(BuildError::Staging { .. })
        ));
        assert!(matches!(
            stage_files(Path::new("/src"), &["/etc/passwd".into()]),
            Err(BuildError::Staging { .. })
        ));
    }
}
