// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract executable discovery.
//
// Search order: explicit path, TESSERACT_CMD / TESSERACT_PATH, directories
// bundled next to the running executable, the standard Windows install
// locations, then the process PATH. A candidate is accepted only if
// `<candidate> --version` exits successfully.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use scanlayer_core::config::{ENV_TESSERACT_CMD, ENV_TESSERACT_PATH};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, info, warn};

/// Sub-directories of the executable's directory that may hold a bundled engine.
const BUNDLE_DIRS: [&str; 5] = ["", "Tesseract-OCR", "tesseract", "tesseract-ocr", "bin"];

const WINDOWS_INSTALLS: [&str; 2] = [
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

pub fn executable_name() -> &'static str {
    if cfg!(windows) { "tesseract.exe" } else { "tesseract" }
}

/// Locate a working Tesseract using the process environment.
pub fn locate_tesseract(explicit: Option<&Path>) -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let env_paths: Vec<PathBuf> = [ENV_TESSERACT_CMD, ENV_TESSERACT_PATH]
        .iter()
        .filter_map(|key| std::env::var_os(key))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .collect();

    locate_with(explicit, &env_paths, exe_dir.as_deref(), responds_to_version)
}

/// Search with injected inputs. `usable` decides whether a candidate works.
pub fn locate_with<F>(
    explicit: Option<&Path>,
    env_paths: &[PathBuf],
    exe_dir: Option<&Path>,
    usable: F,
) -> Result<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut tried = Vec::new();

    let installs = well_known_installs();
    let on_path = which::which(executable_name()).ok();
    for candidate in candidates(explicit, env_paths, exe_dir, &installs, on_path) {
        if tried.contains(&candidate) {
            continue;
        }
        debug!(candidate = %candidate.display(), "Probing OCR engine");
        if usable(&candidate) {
            info!(engine = %candidate.display(), "OCR engine located");
            return Ok(candidate);
        }
        if explicit.is_some_and(|e| expand(e) == candidate) {
            warn!(path = %candidate.display(), "Configured OCR engine does not run; searching elsewhere");
        }
        tried.push(candidate);
    }

    Err(ScanlayerError::EngineNotFound(format!(
        "no working tesseract among {} candidate(s); set TESSERACT_CMD or install tesseract on PATH",
        tried.len()
    )))
}

fn well_known_installs() -> Vec<PathBuf> {
    if cfg!(windows) {
        WINDOWS_INSTALLS.iter().map(PathBuf::from).collect()
    } else {
        Vec::new()
    }
}

fn candidates(
    explicit: Option<&Path>,
    env_paths: &[PathBuf],
    exe_dir: Option<&Path>,
    installs: &[PathBuf],
    on_path: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();

    out.extend(explicit.map(expand));
    out.extend(env_paths.iter().map(|p| expand(p)));

    if let Some(dir) = exe_dir {
        out.extend(
            BUNDLE_DIRS
                .iter()
                .map(|sub| dir.join(sub).join(executable_name()))
                .filter(|p| p.is_file()),
        );
    }

    out.extend(installs.iter().cloned());
    out.extend(on_path);
    out
}

/// A configured path may name the install directory rather than the binary.
fn expand(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(executable_name())
    } else {
        path.to_path_buf()
    }
}

fn responds_to_version(candidate: &Path) -> bool {
    Command::new(candidate)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
