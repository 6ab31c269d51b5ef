// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input / output path checks shared by convert, extract, and unlock.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, ScanlayerError};

/// Fail with `InputNotFound` unless `path` is an existing file.
pub fn require_input(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ScanlayerError::InputNotFound(path.to_path_buf()))
    }
}

/// Fail with `SamePath` if `input` and `output` name the same file.
///
/// Compares the paths as written first, then their resolved forms, so
/// `./a.pdf` and `a.pdf` collide as well as symlinks to the same file.
pub fn ensure_distinct(input: &Path, output: &Path) -> Result<()> {
    if input == output || resolve(input) == resolve(output) {
        return Err(ScanlayerError::SamePath(output.to_path_buf()));
    }
    Ok(())
}

/// Create the parent directories of `output` and reject directory targets.
pub fn prepare_output(output: &Path) -> Result<()> {
    if output.is_dir() {
        return Err(ScanlayerError::Io(std::io::Error::new(
            std::io::ErrorKind::IsADirectory,
            format!("output path {} is a directory", output.display()),
        )));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            debug!(dir = %parent.display(), "Creating output directory");
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Best-effort absolute form of `path`, valid even if the file does not
/// exist yet (its parent is resolved instead).
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_paths_collide() {
        let p = Path::new("/tmp/locked.pdf");
        assert!(matches!(
            ensure_distinct(p, p),
            Err(ScanlayerError::SamePath(_))
        ));
    }

    #[test]
    fn dotted_relative_path_collides() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("in.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        let dotted = dir.path().join(".").join("in.pdf");
        assert!(ensure_distinct(&file, &dotted).is_err());
    }

    #[test]
    fn different_files_pass() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_distinct(&dir.path().join("a.pdf"), &dir.path().join("b.pdf")).is_ok());
    }

    #[test]
    fn missing_input_is_reported() {
        let err = require_input(Path::new("/no/such/scan.pdf")).unwrap_err();
        assert!(matches!(err, ScanlayerError::InputNotFound(_)));
    }

    #[test]
    fn output_parents_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/out.pdf");
        prepare_output(&out).unwrap();
        assert!(out.parent().unwrap().is_dir());
    }

    #[test]
    fn directory_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare_output(dir.path()).is_err());
    }
}
