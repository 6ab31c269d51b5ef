// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font discovery for the invisible text layer.
//
// Order: explicit file, well-known file names in each font directory, then a
// recursive name-pattern search of the same directories. CJK languages only
// accept CJK-capable fonts; other languages try common sans fonts first.
// Results are cached per query for the life of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const CJK_FILES: [&str; 11] = [
    "NotoSansCJK-Regular.ttc",
    "NotoSansCJKjp-Regular.otf",
    "NotoSerifCJK-Regular.ttc",
    "SourceHanSansJP-Regular.otf",
    "SourceHanSerifJP-Regular.otf",
    "ipaexg.ttf",
    "ipaexm.ttf",
    "ipag.ttf",
    "ipam.ttf",
    "YuGothR.ttc",
    "YuMincho.ttc",
];

/// (lower-case name fragment, accepted extensions)
const CJK_PATTERNS: [(&str, &[&str]); 9] = [
    ("notosanscjk", &["ttc", "otf"]),
    ("notoserifcjk", &["ttc", "otf"]),
    ("sourcehansans", &["otf", "ttc"]),
    ("sourcehanserif", &["otf", "ttc"]),
    ("ipaex", &["ttf", "otf"]),
    ("ipag", &["ttf", "ttc"]),
    ("ipam", &["ttf", "ttc"]),
    ("yugoth", &["ttc"]),
    ("yumincho", &["ttc"]),
];

const LATIN_FILES: [&str; 6] = [
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "FreeSans.ttf",
    "Arial.ttf",
    "arial.ttf",
];

const LATIN_PATTERNS: [(&str, &[&str]); 4] = [
    ("dejavusans", &["ttf"]),
    ("liberationsans-regular", &["ttf"]),
    ("notosans-regular", &["ttf", "otf"]),
    ("freesans", &["ttf", "otf"]),
];

/// Deepest directory level the pattern search descends to.
const MAX_SEARCH_DEPTH: usize = 6;

/// Whether `language` needs a CJK-capable font.
pub fn needs_cjk_font(language: &str) -> bool {
    language.split('+').any(|l| {
        l.starts_with("jpn") || l.starts_with("chi_") || l.starts_with("kor")
    })
}

/// Directories searched for fonts: `extra` first, then the platform defaults.
pub fn font_directories(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = extra.to_vec();

    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    for fixed in [
        "/usr/share/fonts",
        "/usr/local/share/fonts",
        "/Library/Fonts",
        "/System/Library/Fonts",
        "/System/Library/Fonts/Supplemental",
        "/Library/Application Support/Microsoft/Fonts",
    ] {
        dirs.push(PathBuf::from(fixed));
    }
    if cfg!(windows) {
        let windir = std::env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
        dirs.push(PathBuf::from(windir).join("Fonts"));
    }

    let mut seen = Vec::new();
    dirs.retain(|d| {
        let key = d.canonicalize().unwrap_or_else(|_| d.clone());
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    dirs
}

type CacheKey = (bool, Option<PathBuf>, Vec<PathBuf>);

fn cache() -> &'static Mutex<HashMap<CacheKey, PathBuf>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, PathBuf>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Find an embeddable font for `language`, using the process-wide cache.
pub fn locate_font(language: &str, explicit: Option<&Path>, extra_dirs: &[PathBuf]) -> Result<PathBuf> {
    let key: CacheKey = (
        needs_cjk_font(language),
        explicit.map(Path::to_path_buf),
        extra_dirs.to_vec(),
    );

    if let Ok(guard) = cache().lock() {
        if let Some(hit) = guard.get(&key).filter(|p| p.is_file()) {
            debug!(font = %hit.display(), "Font cache hit");
            return Ok(hit.clone());
        }
    }

    let found = search_font(language, explicit, &font_directories(extra_dirs))?;
    if let Ok(mut guard) = cache().lock() {
        guard.insert(key, found.clone());
    }
    info!(font = %found.display(), language, "Text-layer font selected");
    Ok(found)
}

/// Uncached search over exactly `dirs`.
pub fn search_font(language: &str, explicit: Option<&Path>, dirs: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configured font does not exist; searching font directories");
    }

    let cjk = needs_cjk_font(language);
    let mut names: Vec<&str> = Vec::new();
    let mut patterns: Vec<(&str, &[&str])> = Vec::new();
    if !cjk {
        names.extend(LATIN_FILES);
        patterns.extend(LATIN_PATTERNS);
    }
    names.extend(CJK_FILES);
    patterns.extend(CJK_PATTERNS);

    for dir in dirs {
        for name in &names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for (fragment, extensions) in &patterns {
            if let Some(found) = find_by_pattern(dir, fragment, extensions) {
                return Ok(found);
            }
        }
    }

    Err(ScanlayerError::FontNotFound(format!(
        "no font for language '{language}' in {} director{}; install {} or set OCR_FONT",
        dirs.len(),
        if dirs.len() == 1 { "y" } else { "ies" },
        if cjk { "Noto Sans CJK or IPAex Gothic" } else { "DejaVu Sans" }
    )))
}

/// First file (in sorted order) under `dir` whose name contains `fragment`
/// and has one of `extensions`, case-insensitively.
fn find_by_pattern(dir: &Path, fragment: &str, extensions: &[&str]) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(MAX_SEARCH_DEPTH)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            let ext_ok = Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e));
            ext_ok && name.contains(fragment)
        })
        .map(|entry| entry.into_path())
        .collect();
    matches.sort();
    matches.into_iter().next()
}
